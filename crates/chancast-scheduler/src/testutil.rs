//! Shared fixtures for scheduler crate tests.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use chancast_channels::{RemoteChannel, SessionClient, SessionConnector, SessionRegistry};
use chancast_core::{ChanCastConfig, ChanCastError, Result};
use chancast_db::Db;

use crate::context::AppContext;
use crate::queue::QueueReceivers;

/// Scripted fake session: fails exactly the operations a test names.
#[derive(Default, Clone)]
pub struct FakeBehavior {
    pub fail_create_titles: HashSet<String>,
    pub fail_username_tids: HashSet<i64>,
}

pub struct FakeSession {
    name: String,
    behavior: FakeBehavior,
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
        Ok(true)
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    async fn create_channel(&self, title: &str) -> Result<RemoteChannel> {
        if self.behavior.fail_create_titles.contains(title) {
            return Err(ChanCastError::Transport(format!(
                "remote rejected channel '{title}'"
            )));
        }
        Ok(RemoteChannel {
            tid: title.len() as i64 * 1000,
            title: title.to_string(),
            username: None,
            access_hash: 7,
            is_admin: true,
        })
    }

    async fn set_username(&self, tid: i64, _: i64, _: &str) -> Result<()> {
        if self.behavior.fail_username_tids.contains(&tid) {
            return Err(ChanCastError::Transport(format!(
                "username rejected for {tid}"
            )));
        }
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

pub struct FakeConnector {
    pub behavior: FakeBehavior,
}

impl SessionConnector for FakeConnector {
    fn build(&self, session_name: &str) -> Arc<dyn SessionClient> {
        Arc::new(FakeSession {
            name: session_name.to_string(),
            behavior: self.behavior.clone(),
        })
    }
}

/// Context over an in-memory DB and a scripted fake connector.
pub fn test_context(behavior: FakeBehavior) -> (Arc<AppContext>, QueueReceivers) {
    let db = Arc::new(Db::open_in_memory().unwrap());
    let registry = Arc::new(SessionRegistry::new(Box::new(FakeConnector { behavior })));
    AppContext::new(ChanCastConfig::default(), db, registry)
}
