//! # ChanCast Channels
//!
//! The remote-session boundary: a narrow capability trait for everything the
//! service does against a messaging account, the HTTP bridge implementation
//! of that trait, and the [`SessionRegistry`] that guarantees at most one
//! in-flight operation per account session.

pub mod bridge;
pub mod client;
pub mod registry;

pub use bridge::{BridgeConnector, BridgeSession};
pub use client::{RemoteChannel, SessionClient, SessionConnector, broadcast_chat_id};
pub use registry::SessionRegistry;
