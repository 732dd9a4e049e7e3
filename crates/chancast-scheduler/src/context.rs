//! Application context — one explicit object built at boot and passed by
//! `Arc` to workers, scheduler jobs, and gateway handlers. No module-level
//! singletons; lifecycle belongs to the process entry point.

use std::sync::Arc;

use tokio::sync::Mutex;

use chancast_channels::SessionRegistry;
use chancast_core::ChanCastConfig;
use chancast_db::Db;

use crate::compose::Composer;
use crate::engine::JobScheduler;
use crate::queue::{QueueReceivers, QueueSenders, task_queues};

pub struct AppContext {
    pub config: ChanCastConfig,
    pub db: Arc<Db>,
    pub registry: Arc<SessionRegistry>,
    pub scheduler: Arc<Mutex<JobScheduler>>,
    pub queues: QueueSenders,
    pub composer: Composer,
}

impl AppContext {
    /// Assemble the context. The queue receivers are returned separately so
    /// the entry point can hand them to `spawn_workers` exactly once.
    pub fn new(
        config: ChanCastConfig,
        db: Arc<Db>,
        registry: Arc<SessionRegistry>,
    ) -> (Arc<Self>, QueueReceivers) {
        let (queues, receivers) = task_queues();
        let composer = Composer::new(config.composer.clone());
        let ctx = Arc::new(Self {
            config,
            db,
            registry,
            scheduler: Arc::new(Mutex::new(JobScheduler::new())),
            queues,
            composer,
        });
        (ctx, receivers)
    }
}
