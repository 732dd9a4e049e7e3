//! System jobs — process-wide singletons registered once at boot.

use std::sync::Arc;

use chancast_core::Result;
use chancast_core::types::ChannelRole;

use crate::context::AppContext;
use crate::job::{Job, JobKind, JobTrigger};

pub const SYNC_CHANNELS_JOB: &str = "sync_channels";
pub const SYNC_ONLINE_STATUS_JOB: &str = "sync_accounts_online_status";

/// Register both system jobs with their fixed ids.
pub async fn register_system_jobs(ctx: &Arc<AppContext>) {
    let mut scheduler = ctx.scheduler.lock().await;
    scheduler.add_job(Job::new(
        SYNC_CHANNELS_JOB,
        JobTrigger::Every {
            secs: ctx.config.sync.channels_interval_secs,
        },
        JobKind::SyncChannels,
    ));
    scheduler.add_job(Job::new(
        SYNC_ONLINE_STATUS_JOB,
        JobTrigger::Every {
            secs: ctx.config.sync.online_status_interval_secs,
        },
        JobKind::SyncOnlineStatus,
    ));
}

/// Tear both system jobs down at shutdown.
pub async fn remove_system_jobs(ctx: &Arc<AppContext>) {
    let mut scheduler = ctx.scheduler.lock().await;
    for job_id in [SYNC_CHANNELS_JOB, SYNC_ONLINE_STATUS_JOB] {
        scheduler.pause_job(job_id);
        scheduler.remove_job(job_id);
    }
}

/// Mirror every online account's remote admin channels into the database.
///
/// A failing session is skipped; the sweep continues with the next account.
pub async fn sync_channels(ctx: &Arc<AppContext>) -> Result<()> {
    for account in ctx.db.list_online_accounts()? {
        let channels = match ctx
            .registry
            .with_session(&account.session_name, |client| async move {
                client.list_broadcast_channels().await
            })
            .await
        {
            Ok(channels) => channels,
            Err(e) => {
                tracing::warn!("channel sync skipped {}: {e}", account.session_name);
                continue;
            }
        };

        for remote in channels.into_iter().filter(|c| c.is_admin) {
            let (channel, created) = ctx.db.upsert_channel_by_tid(
                account.user_id,
                remote.tid,
                &remote.title,
                remote.username.as_deref(),
            )?;
            if created {
                ctx.db.bind_account_channel(
                    account.id,
                    channel.id,
                    remote.access_hash,
                    ChannelRole::Admin,
                )?;
                tracing::info!(
                    "discovered channel {} ({}) via {}",
                    remote.tid,
                    remote.title,
                    account.session_name
                );
            }
        }
    }
    Ok(())
}

/// Mirror registry liveness into the accounts table.
pub async fn sync_online_status(ctx: &Arc<AppContext>) -> Result<()> {
    for account in ctx.db.list_authenticated_accounts()? {
        let online = ctx.registry.is_online(&account.session_name).await;
        if online != account.online {
            ctx.db.set_account_online(account.id, online)?;
        }
    }
    Ok(())
}
