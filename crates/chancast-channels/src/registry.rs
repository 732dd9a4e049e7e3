//! Session registry — the only owner of live session handles.
//!
//! Two lock levels. The manager lock protects the key → entry map and is
//! never held across a remote call. Each entry carries its own
//! `tokio::sync::Mutex` that serializes every operation against that
//! session, no matter which worker or scheduler job the operation came from.
//!
//! Removal is two-phase: the entry is popped from the map first (new callers
//! see `NotConnected` immediately), then the orphaned per-session lock is
//! awaited so in-flight work finishes before the handle is disconnected.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

use chancast_core::{ChanCastError, Result};

use crate::client::{SessionClient, SessionConnector};

#[derive(Clone)]
struct SessionEntry {
    client: Arc<dyn SessionClient>,
    lock: Arc<Mutex<()>>,
}

/// Live-session pool keyed by session name.
pub struct SessionRegistry {
    connector: Box<dyn SessionConnector>,
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new(connector: Box<dyn SessionConnector>) -> Self {
        Self {
            connector,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Build, connect, and authorize a session handle, then register it.
    ///
    /// Returns `false` without registering when the connection fails or the
    /// remote side rejects the login — callers decide whether to retry. An
    /// already-registered key is left untouched.
    pub async fn connect(&self, session_name: &str) -> bool {
        if self.is_online(session_name).await {
            tracing::debug!("session {session_name} already connected");
            return true;
        }

        let client = self.connector.build(session_name);
        tracing::info!("🔌 connecting session {session_name}...");

        if let Err(e) = client.connect().await {
            tracing::error!("failed to connect session {session_name}: {e}");
            return false;
        }

        match client.is_authorized().await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!("session {session_name} is not authorized, log in again");
                if let Err(e) = client.disconnect().await {
                    tracing::warn!("disconnect after failed authorization: {e}");
                }
                return false;
            }
            Err(e) => {
                tracing::error!("authorization check for {session_name} failed: {e}");
                if let Err(e) = client.disconnect().await {
                    tracing::warn!("disconnect after failed authorization: {e}");
                }
                return false;
            }
        }

        let mut sessions = self.sessions.lock().await;
        sessions.insert(
            session_name.to_string(),
            SessionEntry {
                client,
                lock: Arc::new(Mutex::new(())),
            },
        );
        tracing::info!("✅ session {session_name} connected");
        true
    }

    /// O(1) membership check; does not touch any per-session lock.
    pub async fn is_online(&self, session_name: &str) -> bool {
        self.sessions.lock().await.contains_key(session_name)
    }

    /// Number of live sessions.
    pub async fn online_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Run `f` with exclusive access to the session handle.
    ///
    /// The per-session lock is held for the whole call and released on every
    /// exit path. This is the only sanctioned way to reach a handle.
    pub async fn with_session<F, Fut, T>(&self, session_name: &str, f: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn SessionClient>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let entry = {
            let sessions = self.sessions.lock().await;
            sessions
                .get(session_name)
                .cloned()
                .ok_or_else(|| ChanCastError::NotConnected(session_name.to_string()))?
        };

        let _guard = entry.lock.lock().await;
        f(Arc::clone(&entry.client)).await
    }

    /// Remove a session: invisible to new callers at once, disconnected only
    /// after any in-flight `with_session` call releases the session lock.
    pub async fn remove(&self, session_name: &str) {
        let entry = {
            let mut sessions = self.sessions.lock().await;
            sessions.remove(session_name)
        };

        let Some(entry) = entry else {
            tracing::warn!("tried to remove unknown session {session_name}");
            return;
        };

        tracing::info!("session {session_name} unregistered, waiting for in-flight work...");
        let _guard = entry.lock.lock().await;
        if let Err(e) = entry.client.disconnect().await {
            tracing::warn!("disconnect of {session_name} failed: {e}");
        }
        tracing::info!("session {session_name} disconnected");
    }

    /// Drain the pool and disconnect every handle concurrently.
    ///
    /// Shutdown-only: no new work races with this because the gateway and
    /// workers are already stopped when it runs.
    pub async fn disconnect_all(&self) {
        let entries: Vec<SessionEntry> = {
            let mut sessions = self.sessions.lock().await;
            sessions.drain().map(|(_, entry)| entry).collect()
        };

        if entries.is_empty() {
            return;
        }

        tracing::info!("disconnecting {} session(s)...", entries.len());
        let results =
            futures::future::join_all(entries.iter().map(|entry| entry.client.disconnect())).await;
        for (entry, result) in entries.iter().zip(results) {
            if let Err(e) = result {
                tracing::warn!("disconnect of {} failed: {e}", entry.client.session_name());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::client::RemoteChannel;

    /// In-memory session for registry tests: tracks concurrency and lifecycle.
    struct FakeSession {
        name: String,
        authorized: bool,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
        disconnected: Arc<AtomicBool>,
    }

    #[async_trait]
    impl SessionClient for FakeSession {
        fn session_name(&self) -> &str {
            &self.name
        }

        async fn connect(&self) -> Result<()> {
            Ok(())
        }

        async fn is_authorized(&self) -> Result<bool> {
            Ok(self.authorized)
        }

        async fn disconnect(&self) -> Result<()> {
            self.disconnected.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn create_channel(&self, title: &str) -> Result<RemoteChannel> {
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(RemoteChannel {
                tid: 1,
                title: title.to_string(),
                username: None,
                access_hash: 42,
                is_admin: true,
            })
        }

        async fn set_username(&self, _: i64, _: i64, _: &str) -> Result<()> {
            Ok(())
        }

        async fn set_photo(&self, _: i64, _: i64, _: &str) -> Result<()> {
            Ok(())
        }

        async fn set_description(&self, _: i64, _: i64, _: &str) -> Result<()> {
            Ok(())
        }

        async fn send_message(&self, _: i64, _: &str) -> Result<()> {
            Ok(())
        }

        async fn send_file(&self, _: i64, _: &[String], _: &str) -> Result<()> {
            Ok(())
        }

        async fn list_broadcast_channels(&self) -> Result<Vec<RemoteChannel>> {
            Ok(vec![])
        }
    }

    struct FakeConnector {
        authorized: bool,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
        disconnected: Arc<AtomicBool>,
    }

    impl FakeConnector {
        fn authorized() -> Self {
            Self {
                authorized: true,
                in_flight: Arc::new(AtomicUsize::new(0)),
                max_in_flight: Arc::new(AtomicUsize::new(0)),
                disconnected: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl SessionConnector for FakeConnector {
        fn build(&self, session_name: &str) -> Arc<dyn SessionClient> {
            Arc::new(FakeSession {
                name: session_name.to_string(),
                authorized: self.authorized,
                in_flight: Arc::clone(&self.in_flight),
                max_in_flight: Arc::clone(&self.max_in_flight),
                disconnected: Arc::clone(&self.disconnected),
            })
        }
    }

    #[tokio::test]
    async fn with_session_is_mutually_exclusive() {
        let connector = FakeConnector::authorized();
        let max_in_flight = Arc::clone(&connector.max_in_flight);
        let registry = Arc::new(SessionRegistry::new(Box::new(connector)));
        assert!(registry.connect("acct1").await);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry
                    .with_session("acct1", |client| async move {
                        client.create_channel("t").await.map(|_| ())
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unauthorized_connect_does_not_register() {
        let connector = FakeConnector {
            authorized: false,
            ..FakeConnector::authorized()
        };
        let disconnected = Arc::clone(&connector.disconnected);
        let registry = SessionRegistry::new(Box::new(connector));

        assert!(!registry.connect("acct1").await);
        assert!(!registry.is_online("acct1").await);
        // The handle built for the failed attempt was torn down again.
        assert!(disconnected.load(Ordering::SeqCst));

        let result = registry
            .with_session("acct1", |_client| async move { Ok(()) })
            .await;
        assert!(matches!(result, Err(ChanCastError::NotConnected(_))));
    }

    #[tokio::test]
    async fn remove_waits_for_in_flight_work() {
        let connector = FakeConnector::authorized();
        let disconnected = Arc::clone(&connector.disconnected);
        let registry = Arc::new(SessionRegistry::new(Box::new(connector)));
        assert!(registry.connect("acct1").await);

        let op_finished = Arc::new(AtomicBool::new(false));
        let op_finished_inner = Arc::clone(&op_finished);
        let registry_op = Arc::clone(&registry);
        let slow_op = tokio::spawn(async move {
            registry_op
                .with_session("acct1", |_client| {
                    let op_finished = Arc::clone(&op_finished_inner);
                    async move {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        op_finished.store(true, Ordering::SeqCst);
                        Ok(())
                    }
                })
                .await
        });

        // Let the slow op take the session lock first.
        tokio::time::sleep(Duration::from_millis(20)).await;

        // New work started after removal begins is rejected immediately.
        let registry_late = Arc::clone(&registry);
        let late = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            registry_late
                .with_session("acct1", |_client| async move { Ok(()) })
                .await
        });

        registry.remove("acct1").await;

        // remove() only disconnects after the slow op released the lock.
        assert!(op_finished.load(Ordering::SeqCst));
        assert!(disconnected.load(Ordering::SeqCst));

        slow_op.await.unwrap().unwrap();
        assert!(matches!(
            late.await.unwrap(),
            Err(ChanCastError::NotConnected(_))
        ));
    }

    #[tokio::test]
    async fn remove_then_connect_round_trips() {
        let registry = SessionRegistry::new(Box::new(FakeConnector::authorized()));
        assert!(registry.connect("acct1").await);
        registry.remove("acct1").await;
        assert!(!registry.is_online("acct1").await);
        assert!(registry.connect("acct1").await);
        assert!(registry.is_online("acct1").await);
    }

    #[tokio::test]
    async fn disconnect_all_drains_the_pool() {
        let registry = SessionRegistry::new(Box::new(FakeConnector::authorized()));
        assert!(registry.connect("acct1").await);
        assert!(registry.connect("acct2").await);
        assert_eq!(registry.online_count().await, 2);

        registry.disconnect_all().await;
        assert_eq!(registry.online_count().await, 0);
    }
}
