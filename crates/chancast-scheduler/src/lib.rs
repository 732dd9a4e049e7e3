//! # ChanCast Scheduler
//!
//! Everything that runs work asynchronously: the typed task queues and their
//! per-kind worker loops, the in-process job scheduler with its closed set of
//! job kinds, the publish-message expander that turns one daily schedule into
//! N randomized one-shot posts, and the startup/shutdown status sync.
//!
//! ## Architecture
//! ```text
//! gateway ──creates──▶ Task row ──start──▶ TaskQueues (one FIFO per kind)
//!                                              │
//!                               worker loop per kind: pop → lock session
//!                               → remote op → atomic progress update
//!
//! JobScheduler (tokio interval tick)
//!   ├── "{schedule_id}"              DailyAt  → ExpandPublish
//!   │       └── expands into N one-shot PublishOnce jobs (random times)
//!   ├── "sync_channels"              Every 60s → SyncChannels
//!   └── "sync_accounts_online_status" Every 2s → SyncOnlineStatus
//! ```

pub mod compose;
pub mod context;
pub mod dispatch;
pub mod engine;
pub mod expand;
pub mod job;
pub mod queue;
pub mod schedules;
pub mod status_sync;
pub mod system;
pub mod tasks;
#[cfg(test)]
pub(crate) mod testutil;
pub mod worker;

pub use compose::Composer;
pub use context::AppContext;
pub use engine::{JobScheduler, spawn_scheduler};
pub use job::{Job, JobKind, JobTrigger, PublishPost, PublishScheduleArgs};
pub use queue::{QueueItem, QueueReceivers, QueueSenders, task_queues};
pub use worker::spawn_workers;
