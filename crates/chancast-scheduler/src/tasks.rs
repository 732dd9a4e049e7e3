//! Task service — typed creation, start (enqueue), delete.
//!
//! Creation failures are synchronous and typed; execution failures only ever
//! surface through the task row's counters and log.

use std::sync::Arc;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use chancast_core::types::TaskKind;
use chancast_core::{ChanCastError, Result};
use chancast_db::TaskRecord;

use crate::context::AppContext;
use crate::queue::QueueItem;

/// Arguments for a create-channel batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChannelArgs {
    pub session_name: String,
    pub titles: Vec<String>,
}

/// Arguments for a set-username batch. Usernames are generated per channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetUsernameArgs {
    pub channel_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetPhotoArgs {
    pub channel_ids: Vec<i64>,
    pub photo_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetDescriptionArgs {
    pub channel_ids: Vec<i64>,
    pub description: String,
}

/// Validate and persist a new batch task. Returns the PENDING row; nothing
/// is enqueued until `start_task`.
pub async fn create_task(
    ctx: &Arc<AppContext>,
    user_id: i64,
    title: &str,
    kind: TaskKind,
    args: serde_json::Value,
) -> Result<TaskRecord> {
    let total = match kind {
        TaskKind::CreateChannel => {
            let parsed: CreateChannelArgs = serde_json::from_value(args.clone())?;
            if parsed.titles.is_empty() {
                return Err(ChanCastError::InvalidArgument(
                    "create-channel task needs at least one title".into(),
                ));
            }
            let account = ctx.db.get_account_by_session(&parsed.session_name)?;
            if account.user_id != user_id {
                return Err(ChanCastError::PermissionDenied(format!(
                    "account {} belongs to another user",
                    parsed.session_name
                )));
            }
            let bound = ctx.db.count_channels_for_account(account.id)?;
            let ceiling = ctx.config.limits.max_channels_per_account;
            if bound + parsed.titles.len() > ceiling {
                return Err(ChanCastError::CapacityExceeded(format!(
                    "account {} holds {bound} of {ceiling} channels",
                    parsed.session_name
                )));
            }
            parsed.titles.len()
        }
        TaskKind::SetUsername => {
            let parsed: SetUsernameArgs = serde_json::from_value(args.clone())?;
            verify_channels(ctx, user_id, &parsed.channel_ids)?
        }
        TaskKind::SetPhoto => {
            let parsed: SetPhotoArgs = serde_json::from_value(args.clone())?;
            if parsed.photo_path.is_empty() {
                return Err(ChanCastError::InvalidArgument("photo_path is empty".into()));
            }
            verify_channels(ctx, user_id, &parsed.channel_ids)?
        }
        TaskKind::SetDescription => {
            let parsed: SetDescriptionArgs = serde_json::from_value(args.clone())?;
            verify_channels(ctx, user_id, &parsed.channel_ids)?
        }
    };

    ctx.db
        .create_task(user_id, title, kind, &args, total as i64)
}

fn verify_channels(ctx: &Arc<AppContext>, user_id: i64, channel_ids: &[i64]) -> Result<usize> {
    if channel_ids.is_empty() {
        return Err(ChanCastError::InvalidArgument(
            "task needs at least one channel".into(),
        ));
    }
    for &channel_id in channel_ids {
        ctx.db.get_channel(channel_id, user_id)?;
    }
    Ok(channel_ids.len())
}

/// Flip a task to RUNNING and enqueue its items.
///
/// Items whose binding cannot be resolved are recorded as failures up front;
/// everything else goes to the kind's queue in submission order.
pub async fn start_task(ctx: &Arc<AppContext>, user_id: i64, task_id: i64) -> Result<TaskRecord> {
    let task = ctx.db.get_task_scoped(task_id, user_id)?;
    ctx.db.mark_task_running(task.id)?;

    match task.kind {
        TaskKind::CreateChannel => {
            let args: CreateChannelArgs = serde_json::from_value(task.args.clone())?;
            for title in args.titles {
                ctx.queues.enqueue(QueueItem::CreateChannel {
                    task_id: task.id,
                    user_id,
                    session_name: args.session_name.clone(),
                    title,
                })?;
            }
        }
        TaskKind::SetUsername => {
            let args: SetUsernameArgs = serde_json::from_value(task.args.clone())?;
            for channel_id in args.channel_ids {
                match ctx.db.mutation_binding(channel_id) {
                    Ok(binding) => ctx.queues.enqueue(QueueItem::SetUsername {
                        task_id: task.id,
                        session_name: binding.session_name,
                        channel_tid: binding.channel_tid,
                        access_hash: binding.access_hash,
                        username: generate_username(binding.channel_tid),
                    })?,
                    Err(e) => record_unresolved(ctx, task.id, channel_id, &e)?,
                }
            }
        }
        TaskKind::SetPhoto => {
            let args: SetPhotoArgs = serde_json::from_value(task.args.clone())?;
            for channel_id in args.channel_ids {
                match ctx.db.mutation_binding(channel_id) {
                    Ok(binding) => ctx.queues.enqueue(QueueItem::SetPhoto {
                        task_id: task.id,
                        session_name: binding.session_name,
                        channel_tid: binding.channel_tid,
                        access_hash: binding.access_hash,
                        photo_path: args.photo_path.clone(),
                    })?,
                    Err(e) => record_unresolved(ctx, task.id, channel_id, &e)?,
                }
            }
        }
        TaskKind::SetDescription => {
            let args: SetDescriptionArgs = serde_json::from_value(task.args.clone())?;
            for channel_id in args.channel_ids {
                match ctx.db.mutation_binding(channel_id) {
                    Ok(binding) => ctx.queues.enqueue(QueueItem::SetDescription {
                        task_id: task.id,
                        session_name: binding.session_name,
                        channel_tid: binding.channel_tid,
                        access_hash: binding.access_hash,
                        description: args.description.clone(),
                    })?,
                    Err(e) => record_unresolved(ctx, task.id, channel_id, &e)?,
                }
            }
        }
    }

    // Every item may have failed resolution; close the task out if so.
    ctx.db.finish_task_if_complete(task.id)?;
    ctx.db.get_task(task.id)
}

fn record_unresolved(
    ctx: &Arc<AppContext>,
    task_id: i64,
    channel_id: i64,
    e: &ChanCastError,
) -> Result<()> {
    ctx.db.record_task_failure(
        task_id,
        &format!("task {task_id}: channel {channel_id} has no usable binding: {e}"),
    )
}

/// Delete a task; rejected while RUNNING.
pub async fn delete_task(ctx: &Arc<AppContext>, user_id: i64, task_id: i64) -> Result<()> {
    ctx.db.delete_task(task_id, user_id)
}

/// Random public username, suffixed with the channel remote id so collisions
/// across channels are impossible.
pub fn generate_username(channel_tid: i64) -> String {
    const HEAD: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
    const BODY: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789_";
    const TAIL: &[u8] = b"abcdefghijklmnopqrstuvwxyz_";

    let mut rng = rand::thread_rng();
    let mut name = String::new();
    for &b in HEAD.choose_multiple(&mut rng, 2) {
        name.push(b as char);
    }
    for _ in 0..3 {
        name.push(BODY[rng.gen_range(0..BODY.len())] as char);
    }
    name.push(TAIL[rng.gen_range(0..TAIL.len())] as char);
    format!("{name}{channel_tid}")
}
