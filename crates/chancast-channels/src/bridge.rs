//! MTProto bridge client — JSON over HTTP to the process that holds the
//! actual protocol state for each session file.
//!
//! Every call carries a request timeout so a hung remote operation cannot
//! hold a session lock forever.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use chancast_core::config::BridgeConfig;
use chancast_core::{ChanCastError, Result};

use crate::client::{RemoteChannel, SessionClient, SessionConnector};

/// Response envelope the bridge wraps every payload in.
#[derive(Debug, Deserialize)]
struct BridgeResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "Option::default")]
    result: Option<T>,
}

/// One session handle speaking to the bridge.
pub struct BridgeSession {
    session_name: String,
    config: BridgeConfig,
    client: reqwest::Client,
}

impl BridgeSession {
    pub fn new(session_name: &str, config: BridgeConfig) -> Self {
        let mut builder =
            reqwest::Client::builder().timeout(Duration::from_secs(config.request_timeout_secs));
        if config.enable_proxy && !config.proxy_url.is_empty() {
            match reqwest::Proxy::all(&config.proxy_url) {
                Ok(proxy) => builder = builder.proxy(proxy),
                Err(e) => tracing::warn!("invalid proxy url, connecting direct: {e}"),
            }
        }
        Self {
            session_name: session_name.to_string(),
            config,
            client: builder.build().unwrap_or_default(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/sessions/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.session_name,
            method
        )
    }

    /// POST a method call and unwrap the bridge envelope.
    async fn call<T: DeserializeOwned>(&self, method: &str, body: serde_json::Value) -> Result<T> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChanCastError::Transport(format!("{method} failed: {e}")))?;

        let envelope: BridgeResponse<T> = response
            .json()
            .await
            .map_err(|e| ChanCastError::Transport(format!("invalid {method} response: {e}")))?;

        if !envelope.ok {
            return Err(ChanCastError::Transport(format!(
                "{method} rejected: {}",
                envelope.description.unwrap_or_default()
            )));
        }
        envelope
            .result
            .ok_or_else(|| ChanCastError::Transport(format!("{method} returned empty result")))
    }

    /// Same as `call` but for methods whose result payload is irrelevant.
    async fn call_ok(&self, method: &str, body: serde_json::Value) -> Result<()> {
        let _: serde_json::Value = self.call(method, body).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionClient for BridgeSession {
    fn session_name(&self) -> &str {
        &self.session_name
    }

    async fn connect(&self) -> Result<()> {
        let sessions_root = shellexpand::tilde(&self.config.sessions_root).to_string();
        self.call_ok(
            "connect",
            serde_json::json!({
                "api_id": self.config.api_id,
                "api_hash": self.config.api_hash,
                "session_path": format!("{sessions_root}/{}", self.session_name),
            }),
        )
        .await
    }

    async fn is_authorized(&self) -> Result<bool> {
        #[derive(Deserialize)]
        struct Authorized {
            authorized: bool,
        }
        let result: Authorized = self.call("me", serde_json::json!({})).await?;
        Ok(result.authorized)
    }

    async fn disconnect(&self) -> Result<()> {
        self.call_ok("disconnect", serde_json::json!({})).await
    }

    async fn create_channel(&self, title: &str) -> Result<RemoteChannel> {
        self.call("createChannel", serde_json::json!({ "title": title }))
            .await
    }

    async fn set_username(&self, tid: i64, access_hash: i64, username: &str) -> Result<()> {
        self.call_ok(
            "setChannelUsername",
            serde_json::json!({ "tid": tid, "access_hash": access_hash, "username": username }),
        )
        .await
    }

    async fn set_photo(&self, tid: i64, access_hash: i64, photo_path: &str) -> Result<()> {
        self.call_ok(
            "setChannelPhoto",
            serde_json::json!({ "tid": tid, "access_hash": access_hash, "photo_path": photo_path }),
        )
        .await
    }

    async fn set_description(&self, tid: i64, access_hash: i64, description: &str) -> Result<()> {
        self.call_ok(
            "setChannelDescription",
            serde_json::json!({ "tid": tid, "access_hash": access_hash, "about": description }),
        )
        .await
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        self.call_ok(
            "sendMessage",
            serde_json::json!({ "chat_id": chat_id, "text": text }),
        )
        .await
    }

    async fn send_file(&self, chat_id: i64, media: &[String], caption: &str) -> Result<()> {
        self.call_ok(
            "sendFile",
            serde_json::json!({ "chat_id": chat_id, "media": media, "caption": caption }),
        )
        .await
    }

    async fn list_broadcast_channels(&self) -> Result<Vec<RemoteChannel>> {
        self.call("broadcastChannels", serde_json::json!({})).await
    }
}

/// Production connector: every session key gets a fresh bridge handle.
pub struct BridgeConnector {
    config: BridgeConfig,
}

impl BridgeConnector {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }
}

impl SessionConnector for BridgeConnector {
    fn build(&self, session_name: &str) -> Arc<dyn SessionClient> {
        Arc::new(BridgeSession::new(session_name, self.config.clone()))
    }
}
