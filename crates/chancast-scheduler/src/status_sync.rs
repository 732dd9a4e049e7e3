//! Startup/shutdown reconciliation between persisted state, the session
//! registry, and the job scheduler.
//!
//! Every step logs and continues on per-item failure: one bad session or row
//! must never abort a boot or a shutdown.

use std::sync::Arc;

use chancast_core::types::ScheduleStatus;

use crate::context::AppContext;
use crate::system;

/// Boot: reconnect previously authenticated sessions and clear out state the
/// dead process left behind.
pub async fn on_startup(ctx: &Arc<AppContext>) {
    // In-flight queue items died with the old process.
    match ctx.db.fail_running_tasks() {
        Ok(0) => {}
        Ok(n) => tracing::warn!("marked {n} interrupted task(s) as failed"),
        Err(e) => tracing::error!("failed to reconcile running tasks: {e}"),
    }

    launch_accounts(ctx).await;
}

/// Connect every authenticated account that is not already online.
pub async fn launch_accounts(ctx: &Arc<AppContext>) {
    let accounts = match ctx.db.list_authenticated_accounts() {
        Ok(accounts) => accounts,
        Err(e) => {
            tracing::error!("cannot list authenticated accounts: {e}");
            return;
        }
    };

    for account in accounts {
        if ctx.registry.is_online(&account.session_name).await {
            continue;
        }
        if ctx.registry.connect(&account.session_name).await {
            if let Err(e) = ctx.db.set_account_online(account.id, true) {
                tracing::warn!("could not flag {} online: {e}", account.session_name);
            }
        }
    }
}

/// Disconnect every online account and clear its flag.
pub async fn unlaunch_accounts(ctx: &Arc<AppContext>) {
    let accounts = match ctx.db.list_online_accounts() {
        Ok(accounts) => accounts,
        Err(e) => {
            tracing::error!("cannot list online accounts: {e}");
            return;
        }
    };

    for account in accounts {
        ctx.registry.remove(&account.session_name).await;
        if let Err(e) = ctx.db.set_account_online(account.id, false) {
            tracing::warn!("could not flag {} offline: {e}", account.session_name);
        }
    }
}

/// Pause and remove every schedule's job, reset rows to PENDING, and drop the
/// system jobs.
pub async fn stop_schedules(ctx: &Arc<AppContext>) {
    let schedules = match ctx.db.all_schedules() {
        Ok(schedules) => schedules,
        Err(e) => {
            tracing::error!("cannot list schedules: {e}");
            return;
        }
    };

    for schedule in schedules {
        let job_id = schedule.id.to_string();
        {
            let mut scheduler = ctx.scheduler.lock().await;
            if scheduler.contains(&job_id) {
                scheduler.pause_job(&job_id);
                scheduler.remove_job(&job_id);
            }
        }
        if let Err(e) = ctx
            .db
            .set_schedule_status(schedule.id, ScheduleStatus::Pending)
        {
            tracing::warn!("could not reset schedule {}: {e}", schedule.id);
        }
    }

    system::remove_system_jobs(ctx).await;
}

/// Shutdown: stop schedules, disconnect sessions, and fail anything still
/// marked RUNNING — its queue items will not survive the process.
pub async fn on_shutdown(ctx: &Arc<AppContext>) {
    stop_schedules(ctx).await;
    unlaunch_accounts(ctx).await;

    match ctx.db.fail_running_tasks() {
        Ok(0) => {}
        Ok(n) => tracing::info!("marked {n} running task(s) as failed"),
        Err(e) => tracing::error!("failed to reconcile running tasks: {e}"),
    }

    // Belt for sessions connected outside the accounts table.
    ctx.registry.disconnect_all().await;
}
