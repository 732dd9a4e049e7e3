//! Capability boundary for one remote messaging account.
//!
//! Every mutation the service performs against a session goes through
//! [`SessionClient`]; the trait is deliberately narrow so workers and
//! scheduler jobs stay independent of the wire protocol. Handles are only
//! ever reached through `SessionRegistry::with_session`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use chancast_core::Result;

/// A broadcast channel as the remote side reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteChannel {
    /// Remote channel id (positive, without the broadcast prefix).
    pub tid: i64,
    pub title: String,
    #[serde(default)]
    pub username: Option<String>,
    /// Access token the remote side requires for admin mutations.
    pub access_hash: i64,
    /// Whether the session holds admin rights on this channel.
    #[serde(default)]
    pub is_admin: bool,
}

/// One live, authenticated connection to a remote messaging account.
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Session key this handle was built for.
    fn session_name(&self) -> &str;

    /// Establish the network connection. Does not imply authorization.
    async fn connect(&self) -> Result<()>;

    /// Whether the remote side accepts this session as logged in.
    async fn is_authorized(&self) -> Result<bool>;

    /// Tear down the connection. Idempotent.
    async fn disconnect(&self) -> Result<()>;

    /// Create a broadcast channel owned by this account.
    async fn create_channel(&self, title: &str) -> Result<RemoteChannel>;

    /// Set the public username of a channel.
    async fn set_username(&self, tid: i64, access_hash: i64, username: &str) -> Result<()>;

    /// Set the channel photo from a local file path.
    async fn set_photo(&self, tid: i64, access_hash: i64, photo_path: &str) -> Result<()>;

    /// Set the channel description text.
    async fn set_description(&self, tid: i64, access_hash: i64, description: &str) -> Result<()>;

    /// Send a plain text message to a chat.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;

    /// Send one or more media files with a caption.
    async fn send_file(&self, chat_id: i64, media: &[String], caption: &str) -> Result<()>;

    /// List broadcast channels where this session holds admin rights.
    async fn list_broadcast_channels(&self) -> Result<Vec<RemoteChannel>>;
}

/// Builds a fresh [`SessionClient`] handle for a session key.
///
/// The registry owns one of these so tests can inject fake sessions and the
/// production build wires in the HTTP bridge.
pub trait SessionConnector: Send + Sync {
    fn build(&self, session_name: &str) -> std::sync::Arc<dyn SessionClient>;
}

/// Convert a remote channel id into the chat id used for message delivery.
pub fn broadcast_chat_id(tid: i64) -> i64 {
    // Broadcast chats are addressed as -100<tid> on the wire.
    format!("-100{tid}").parse().unwrap_or(-tid)
}
