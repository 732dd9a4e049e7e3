//! Schedule service — create, start/resume, stop, delete.
//!
//! The top-level scheduler job of a schedule is addressed by the stringified
//! schedule id: `start` after a `stop` resumes that job instead of
//! registering a duplicate.

use std::sync::Arc;

use serde::Deserialize;

use chancast_core::types::{ScheduleKind, ScheduleStatus};
use chancast_core::{ChanCastError, Result};
use chancast_db::ScheduleRecord;

use crate::context::AppContext;
use crate::job::{Job, JobKind, JobTrigger, PublishScheduleArgs};

/// Creation payload as the gateway receives it.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleIn {
    pub title: String,
    pub kind: String,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub args: serde_json::Value,
}

/// Validate and persist a schedule. Nothing is registered with the scheduler
/// until `start_schedule`.
pub async fn create_schedule(
    ctx: &Arc<AppContext>,
    user_id: i64,
    data: ScheduleIn,
) -> Result<ScheduleRecord> {
    let kind = ScheduleKind::parse(&data.kind)?;
    if data.hour > 23 || data.minute > 59 || data.second > 59 {
        return Err(ChanCastError::InvalidArgument(format!(
            "invalid fire time {:02}:{:02}:{:02}",
            data.hour, data.minute, data.second
        )));
    }

    match kind {
        ScheduleKind::PublishMessage => {
            let args: PublishScheduleArgs = serde_json::from_value(data.args.clone())?;
            if args.channel_ids.is_empty() {
                return Err(ChanCastError::InvalidArgument(
                    "publish schedule needs at least one channel".into(),
                ));
            }
            for &channel_id in &args.channel_ids {
                ctx.db.get_channel(channel_id, user_id)?;
            }
        }
    }

    ctx.db.create_schedule(
        user_id,
        &data.title,
        kind,
        data.hour,
        data.minute,
        data.second,
        &data.args,
    )
}

/// Start (or resume) a schedule's top-level job and mark the row RUNNING.
pub async fn start_schedule(ctx: &Arc<AppContext>, user_id: i64, schedule_id: i64) -> Result<()> {
    let schedule = ctx.db.get_schedule(schedule_id, user_id)?;
    let job_id = schedule.id.to_string();

    {
        let mut scheduler = ctx.scheduler.lock().await;
        if scheduler.contains(&job_id) {
            scheduler.resume_job(&job_id);
        } else {
            let job = build_top_level_job(&schedule)?;
            scheduler.add_job(job);
        }
    }

    ctx.db
        .set_schedule_status(schedule.id, ScheduleStatus::Running)?;
    tracing::info!("▶️ schedule {schedule_id} started");
    Ok(())
}

/// Pause the top-level job and revert the row to PENDING.
///
/// Already-expanded one-shot publish jobs for the current day keep their
/// own payloads and are left to fire.
pub async fn stop_schedule(ctx: &Arc<AppContext>, user_id: i64, schedule_id: i64) -> Result<()> {
    let schedule = ctx.db.get_schedule(schedule_id, user_id)?;
    let job_id = schedule.id.to_string();

    {
        let mut scheduler = ctx.scheduler.lock().await;
        scheduler.pause_job(&job_id);
    }

    ctx.db
        .set_schedule_status(schedule.id, ScheduleStatus::Pending)?;
    tracing::info!("⏸️ schedule {schedule_id} stopped");
    Ok(())
}

/// Remove the top-level job and delete the row.
pub async fn delete_schedule(ctx: &Arc<AppContext>, user_id: i64, schedule_id: i64) -> Result<()> {
    let schedule = ctx.db.get_schedule(schedule_id, user_id)?;
    let job_id = schedule.id.to_string();

    {
        let mut scheduler = ctx.scheduler.lock().await;
        scheduler.pause_job(&job_id);
        scheduler.remove_job(&job_id);
    }

    ctx.db.delete_schedule(schedule.id, user_id)?;
    tracing::info!("🗑️ schedule {schedule_id} deleted");
    Ok(())
}

fn build_top_level_job(schedule: &ScheduleRecord) -> Result<Job> {
    match schedule.kind {
        ScheduleKind::PublishMessage => {
            let args: PublishScheduleArgs = serde_json::from_value(schedule.args.clone())?;
            Ok(Job::new(
                schedule.id.to_string(),
                JobTrigger::DailyAt {
                    hour: schedule.hour,
                    minute: schedule.minute,
                    second: schedule.second,
                },
                JobKind::ExpandPublish {
                    schedule_id: schedule.id,
                    user_id: schedule.user_id,
                    args,
                },
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FakeBehavior, test_context};

    fn publish_in(channel_id: i64) -> ScheduleIn {
        ScheduleIn {
            title: "daily posts".into(),
            kind: "publish_message".into(),
            hour: 9,
            minute: 0,
            second: 0,
            args: serde_json::json!({ "channel_ids": [channel_id], "ai_prompt": "news" }),
        }
    }

    #[tokio::test]
    async fn start_stop_start_resumes_the_same_job() {
        let (ctx, _receivers) = test_context(FakeBehavior::default());
        let channel = ctx.db.insert_channel(1, 77, "ch").unwrap();

        let schedule = create_schedule(&ctx, 1, publish_in(channel.id)).await.unwrap();
        let job_id = schedule.id.to_string();

        start_schedule(&ctx, 1, schedule.id).await.unwrap();
        {
            let scheduler = ctx.scheduler.lock().await;
            assert_eq!(scheduler.count_with_id(&job_id), 1);
        }
        assert_eq!(
            ctx.db.get_schedule(schedule.id, 1).unwrap().status,
            ScheduleStatus::Running
        );

        stop_schedule(&ctx, 1, schedule.id).await.unwrap();
        assert_eq!(
            ctx.db.get_schedule(schedule.id, 1).unwrap().status,
            ScheduleStatus::Pending
        );

        // Restart resumes; it must not register a duplicate job.
        start_schedule(&ctx, 1, schedule.id).await.unwrap();
        {
            let scheduler = ctx.scheduler.lock().await;
            assert_eq!(scheduler.count_with_id(&job_id), 1);
        }

        delete_schedule(&ctx, 1, schedule.id).await.unwrap();
        {
            let scheduler = ctx.scheduler.lock().await;
            assert!(!scheduler.contains(&job_id));
        }
        assert!(matches!(
            ctx.db.get_schedule(schedule.id, 1),
            Err(ChanCastError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn foreign_owner_sees_not_found() {
        let (ctx, _receivers) = test_context(FakeBehavior::default());
        let channel = ctx.db.insert_channel(1, 77, "ch").unwrap();
        let schedule = create_schedule(&ctx, 1, publish_in(channel.id)).await.unwrap();

        assert!(matches!(
            start_schedule(&ctx, 2, schedule.id).await,
            Err(ChanCastError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn create_rejects_bad_kind_and_time() {
        let (ctx, _receivers) = test_context(FakeBehavior::default());
        let channel = ctx.db.insert_channel(1, 77, "ch").unwrap();

        let mut bad_kind = publish_in(channel.id);
        bad_kind.kind = "mine_bitcoin".into();
        assert!(matches!(
            create_schedule(&ctx, 1, bad_kind).await,
            Err(ChanCastError::UnsupportedKind(_))
        ));

        let mut bad_time = publish_in(channel.id);
        bad_time.hour = 24;
        assert!(matches!(
            create_schedule(&ctx, 1, bad_time).await,
            Err(ChanCastError::InvalidArgument(_))
        ));

        let mut foreign_channel = publish_in(channel.id);
        foreign_channel.args = serde_json::json!({ "channel_ids": [channel.id + 9] });
        assert!(matches!(
            create_schedule(&ctx, 1, foreign_channel).await,
            Err(ChanCastError::NotFound(_))
        ));
    }
}
