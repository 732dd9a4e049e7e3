//! # ChanCast — bulk channel automation server
//!
//! One process: session registry, task queues + workers, job scheduler, and
//! the HTTP gateway, wired together here and torn down together on ctrl-c.
//!
//! Usage:
//!   chancast                         # Start with ~/.chancast/config.toml
//!   chancast --config ./dev.toml     # Explicit config file
//!   chancast --port 9000             # Override gateway port

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use chancast_channels::{BridgeConnector, SessionRegistry};
use chancast_core::ChanCastConfig;
use chancast_db::Db;
use chancast_scheduler::{AppContext, spawn_scheduler, spawn_workers, status_sync, system};

#[derive(Parser)]
#[command(
    name = "chancast",
    version,
    about = "📡 ChanCast — bulk channel automation over messaging-account pools"
)]
struct Cli {
    /// Config file path (default: ~/.chancast/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Gateway port override
    #[arg(short, long)]
    port: Option<u16>,

    /// Database path override
    #[arg(long)]
    db_path: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => ChanCastConfig::load_from(std::path::Path::new(&expand_path(path)))?,
        None => ChanCastConfig::load()?,
    };
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }
    if let Some(db_path) = cli.db_path {
        config.database.path = db_path;
    }

    let db_path = expand_path(&config.database.path);
    if let Some(parent) = std::path::Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::create_dir_all(expand_path(&config.bridge.sessions_root))?;

    let db = Arc::new(Db::open(std::path::Path::new(&db_path))?);
    let registry = Arc::new(SessionRegistry::new(Box::new(BridgeConnector::new(
        config.bridge.clone(),
    ))));

    println!("📡 ChanCast v{}", env!("CARGO_PKG_VERSION"));
    println!("   🌐 Gateway:   http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   🗄️  Database:  {db_path}");
    println!("   🔌 Bridge:    {}", config.bridge.base_url);
    println!();

    let (ctx, queue_receivers) = AppContext::new(config, db, registry);

    // Reconnect persisted sessions and clear out what the last run left.
    status_sync::on_startup(&ctx).await;
    tracing::info!(
        "{} session(s) online after startup sync",
        ctx.registry.online_count().await
    );

    system::register_system_jobs(&ctx).await;
    let worker_handles = spawn_workers(Arc::clone(&ctx), queue_receivers);
    let scheduler_handle = spawn_scheduler(Arc::clone(&ctx));

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
    };
    chancast_gateway::serve(Arc::clone(&ctx), shutdown).await?;

    // Teardown: stop the clocks first, then drain sessions and settle rows.
    scheduler_handle.abort();
    for handle in worker_handles {
        handle.abort();
    }
    status_sync::on_shutdown(&ctx).await;

    tracing::info!("👋 ChanCast stopped");
    Ok(())
}
