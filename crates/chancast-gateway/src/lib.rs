//! # ChanCast Gateway
//!
//! Thin axum HTTP surface over the app context. Creation failures map to
//! typed status codes here; task execution failures never do — they are
//! visible only through the task row.

pub mod routes;
pub mod server;

pub use server::{build_router, serve};
