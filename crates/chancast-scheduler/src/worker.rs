//! Worker loops — one long-lived task per queue kind.
//!
//! Two failure planes, kept apart deliberately: an item failing its remote
//! operation is expected and becomes a failure count + log line on the task
//! row; the progress row being unreachable is an infrastructure fault and
//! backs the loop off briefly instead of spinning it hot.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use chancast_core::types::{ChannelRole, TaskKind};
use chancast_core::{ChanCastError, Result};

use crate::context::AppContext;
use crate::queue::{QueueItem, QueueReceivers};

/// Spawn one worker per task kind. Returns the join handles in
/// `TaskKind::all()` order.
pub fn spawn_workers(ctx: Arc<AppContext>, receivers: QueueReceivers) -> Vec<JoinHandle<()>> {
    vec![
        tokio::spawn(worker_loop(
            Arc::clone(&ctx),
            TaskKind::CreateChannel,
            receivers.create_channel,
        )),
        tokio::spawn(worker_loop(
            Arc::clone(&ctx),
            TaskKind::SetUsername,
            receivers.set_username,
        )),
        tokio::spawn(worker_loop(
            Arc::clone(&ctx),
            TaskKind::SetPhoto,
            receivers.set_photo,
        )),
        tokio::spawn(worker_loop(
            ctx,
            TaskKind::SetDescription,
            receivers.set_description,
        )),
    ]
}

async fn worker_loop(ctx: Arc<AppContext>, kind: TaskKind, mut rx: UnboundedReceiver<QueueItem>) {
    tracing::info!("⚙️ {kind} worker started");
    while let Some(item) = rx.recv().await {
        if let Err(e) = handle_item(&ctx, item).await {
            tracing::error!("{kind} worker infrastructure error: {e}");
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }
    // recv() returning None means every sender is gone: shutdown.
    tracing::info!("{kind} worker stopped");
}

/// Process one item and record its outcome.
///
/// The returned error is reserved for infrastructure faults (the task row
/// unreachable); remote-operation failures are consumed here as item
/// failures and never unwind the loop.
async fn handle_item(ctx: &Arc<AppContext>, item: QueueItem) -> Result<()> {
    let task_id = item.task_id();
    match run_item(ctx, item).await {
        Ok(line) => ctx.db.record_task_success(task_id, &line)?,
        Err((line, e)) => {
            tracing::warn!("task {task_id}: {line}: {e}");
            ctx.db
                .record_task_failure(task_id, &format!("{line}: {e}"))?;
        }
    }
    if ctx.db.finish_task_if_complete(task_id)? {
        tracing::info!("✅ task {task_id} completed");
    }
    Ok(())
}

/// Run the remote operation for one item. Ok carries the success log line;
/// Err carries the failure log prefix plus the cause.
async fn run_item(
    ctx: &Arc<AppContext>,
    item: QueueItem,
) -> std::result::Result<String, (String, ChanCastError)> {
    match item {
        QueueItem::CreateChannel {
            task_id,
            user_id,
            session_name,
            title,
        } => {
            let op_title = title.clone();
            let remote = ctx
                .registry
                .with_session(&session_name, |client| async move {
                    client.create_channel(&op_title).await
                })
                .await
                .map_err(|e| (format!("task {task_id}: create channel '{title}' failed"), e))?;

            // The channel exists remotely now; a bookkeeping miss must not
            // turn the item into a failure.
            if let Err(e) = record_created_channel(ctx, user_id, &session_name, &remote) {
                tracing::warn!("task {task_id}: created channel {} but could not record it: {e}", remote.tid);
            }
            Ok(format!(
                "task {task_id}: created channel {} - {}",
                remote.tid, remote.title
            ))
        }
        QueueItem::SetUsername {
            task_id,
            session_name,
            channel_tid,
            access_hash,
            username,
        } => {
            let op_username = username.clone();
            ctx.registry
                .with_session(&session_name, |client| async move {
                    client
                        .set_username(channel_tid, access_hash, &op_username)
                        .await
                })
                .await
                .map_err(|e| {
                    (
                        format!("task {task_id}: set username on {channel_tid} failed"),
                        e,
                    )
                })?;
            Ok(format!(
                "task {task_id}: set username of {channel_tid} to {username}"
            ))
        }
        QueueItem::SetPhoto {
            task_id,
            session_name,
            channel_tid,
            access_hash,
            photo_path,
        } => {
            let op_path = photo_path.clone();
            ctx.registry
                .with_session(&session_name, |client| async move {
                    client.set_photo(channel_tid, access_hash, &op_path).await
                })
                .await
                .map_err(|e| {
                    (
                        format!("task {task_id}: set photo on {channel_tid} failed"),
                        e,
                    )
                })?;
            Ok(format!("task {task_id}: set photo of {channel_tid}"))
        }
        QueueItem::SetDescription {
            task_id,
            session_name,
            channel_tid,
            access_hash,
            description,
        } => {
            let op_description = description.clone();
            ctx.registry
                .with_session(&session_name, |client| async move {
                    client
                        .set_description(channel_tid, access_hash, &op_description)
                        .await
                })
                .await
                .map_err(|e| {
                    (
                        format!("task {task_id}: set description on {channel_tid} failed"),
                        e,
                    )
                })?;
            Ok(format!("task {task_id}: set description of {channel_tid}"))
        }
    }
}

/// Persist a channel a worker just created, bound to its owning account.
fn record_created_channel(
    ctx: &Arc<AppContext>,
    user_id: i64,
    session_name: &str,
    remote: &chancast_channels::RemoteChannel,
) -> Result<()> {
    let channel = ctx.db.insert_channel(user_id, remote.tid, &remote.title)?;
    let account = ctx.db.get_account_by_session(session_name)?;
    ctx.db
        .bind_account_channel(account.id, channel.id, remote.access_hash, ChannelRole::Owner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chancast_core::types::TaskStatus;
    use chancast_db::TaskRecord;

    use crate::tasks;
    use crate::testutil::{FakeBehavior, test_context};

    async fn wait_for_completion(ctx: &Arc<AppContext>, task_id: i64) -> TaskRecord {
        for _ in 0..100 {
            let task = ctx.db.get_task(task_id).unwrap();
            if task.status == TaskStatus::Completed {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("task {task_id} never completed");
    }

    /// Three set-username items, one scripted to fail remotely: the task
    /// finishes with exact counters and one log line per item.
    #[tokio::test]
    async fn set_username_batch_accounts_for_every_item() {
        let behavior = FakeBehavior {
            fail_username_tids: [20].into_iter().collect(),
            ..FakeBehavior::default()
        };
        let (ctx, receivers) = test_context(behavior);

        let account = ctx.db.create_account(1, 100, "alice", "p1").unwrap();
        let mut channel_ids = Vec::new();
        for tid in [10, 20, 30] {
            let channel = ctx.db.insert_channel(1, tid, "ch").unwrap();
            ctx.db
                .bind_account_channel(account.id, channel.id, 5, ChannelRole::Admin)
                .unwrap();
            channel_ids.push(channel.id);
        }
        assert!(ctx.registry.connect("p1").await);

        let task = tasks::create_task(
            &ctx,
            1,
            "rename batch",
            TaskKind::SetUsername,
            serde_json::json!({ "channel_ids": channel_ids }),
        )
        .await
        .unwrap();
        assert_eq!(task.total, 3);

        spawn_workers(Arc::clone(&ctx), receivers);
        tasks::start_task(&ctx, 1, task.id).await.unwrap();

        let done = wait_for_completion(&ctx, task.id).await;
        assert_eq!(done.success, 2);
        assert_eq!(done.failure, 1);
        assert!(done.success + done.failure <= done.total);
        assert_eq!(done.logs.lines().count(), 3);
    }

    /// Create-channel success also records the channel and its owner binding.
    #[tokio::test]
    async fn create_channel_records_row_and_binding() {
        let (ctx, receivers) = test_context(FakeBehavior::default());
        let account = ctx.db.create_account(1, 100, "alice", "p1").unwrap();
        assert!(ctx.registry.connect("p1").await);

        let task = tasks::create_task(
            &ctx,
            1,
            "new channels",
            TaskKind::CreateChannel,
            serde_json::json!({ "session_name": "p1", "titles": ["Alpha"] }),
        )
        .await
        .unwrap();

        spawn_workers(Arc::clone(&ctx), receivers);
        tasks::start_task(&ctx, 1, task.id).await.unwrap();

        let done = wait_for_completion(&ctx, task.id).await;
        assert_eq!(done.success, 1);

        let channels = ctx.db.list_channels(1).unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].title, "Alpha");
        assert_eq!(ctx.db.count_channels_for_account(account.id).unwrap(), 1);
    }

    /// A disconnected session is an item failure, not a worker crash.
    #[tokio::test]
    async fn not_connected_is_recorded_as_item_failure() {
        let (ctx, receivers) = test_context(FakeBehavior::default());
        ctx.db.create_account(1, 100, "alice", "p1").unwrap();
        // Session deliberately left unconnected.

        let task = tasks::create_task(
            &ctx,
            1,
            "new channels",
            TaskKind::CreateChannel,
            serde_json::json!({ "session_name": "p1", "titles": ["Alpha", "Beta"] }),
        )
        .await
        .unwrap();

        spawn_workers(Arc::clone(&ctx), receivers);
        tasks::start_task(&ctx, 1, task.id).await.unwrap();

        let done = wait_for_completion(&ctx, task.id).await;
        assert_eq!(done.success, 0);
        assert_eq!(done.failure, 2);
        assert!(done.logs.contains("not connected"));
    }
}
