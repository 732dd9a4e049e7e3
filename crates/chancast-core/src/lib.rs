//! # ChanCast Core
//!
//! Shared foundation for every ChanCast crate: the configuration file,
//! the error taxonomy, and the closed enums that cross crate boundaries.

pub mod config;
pub mod error;
pub mod types;

pub use config::ChanCastConfig;
pub use error::{ChanCastError, Result};
pub use types::{ChannelRole, MediaKind, ScheduleKind, ScheduleStatus, TaskKind, TaskStatus};
