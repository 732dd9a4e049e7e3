//! Publish-schedule expansion.
//!
//! A schedule's daily top-level job does not publish anything itself; it
//! samples N randomized timestamps across the current UTC day and registers
//! one one-shot job per timestamp. Randomized times keep the channel from
//! posting on a perfectly periodic, trivially detectable clock while staying
//! bounded within the day.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use chancast_core::{ChanCastError, Result};

use crate::context::AppContext;
use crate::job::{Job, JobKind, PublishPost, PublishScheduleArgs};

/// Sample `count` timestamps in the day containing `now`, pairwise separated
/// by at least `separation_minutes`, sorted ascending.
///
/// The day is cut into slots of the separation width; slots are sampled so no
/// two are adjacent, which keeps the guarantee even after per-slot jitter.
pub fn random_daily_times(
    now: DateTime<Utc>,
    count: usize,
    separation_minutes: u32,
) -> Result<Vec<DateTime<Utc>>> {
    if count == 0 || separation_minutes == 0 {
        return Err(ChanCastError::Schedule(
            "publish expansion needs a positive count and separation".into(),
        ));
    }
    let total_slots = (24 * 60 / separation_minutes) as usize;
    // Non-adjacent sampling halves the usable capacity.
    if count > total_slots.div_ceil(2) {
        return Err(ChanCastError::Schedule(format!(
            "cannot place {count} times {separation_minutes} minutes apart within one day"
        )));
    }

    let mut rng = rand::thread_rng();

    // Pick `count` ascending indices, then spread them so chosen slots are
    // never adjacent: gaps of ≥ 2 slots survive any jitter inside the slot.
    let mut picks = rand::seq::index::sample(&mut rng, total_slots - count + 1, count).into_vec();
    picks.sort_unstable();

    let day_start = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ChanCastError::Schedule("invalid day start".into()))?;

    let mut times: Vec<DateTime<Utc>> = picks
        .into_iter()
        .enumerate()
        .map(|(i, pick)| {
            let slot = pick + i;
            let jitter = rng.gen_range(0..separation_minutes) as usize;
            day_start + Duration::minutes((slot * separation_minutes as usize + jitter) as i64)
        })
        .collect();
    times.sort_unstable();
    Ok(times)
}

/// Expand one firing of a publish schedule into one-shot jobs.
///
/// Channels whose binding is missing are skipped with a warning — one broken
/// channel must not starve the rest of the schedule.
pub async fn expand_publish(
    ctx: &Arc<AppContext>,
    schedule_id: i64,
    user_id: i64,
    args: &PublishScheduleArgs,
) -> Result<()> {
    let count = ctx.config.publish.times_per_day;
    let separation = ctx.config.publish.min_separation_minutes;

    let mut registered = 0usize;
    for &channel_id in &args.channel_ids {
        let binding = match ctx.db.publish_binding(channel_id) {
            Ok(binding) => binding,
            Err(e) => {
                tracing::warn!("schedule {schedule_id}: skipping channel {channel_id}: {e}");
                continue;
            }
        };

        let times = random_daily_times(Utc::now(), count, separation)?;
        let mut scheduler = ctx.scheduler.lock().await;
        for at in times {
            let post = PublishPost {
                user_id,
                channel_tid: binding.channel_tid,
                session_name: binding.session_name.clone(),
                lang: binding.lang.clone(),
                primary_links: binding.primary_links.clone(),
                min_word_count: args.min_word_count,
                max_word_count: args.max_word_count,
                include_images: args.include_images,
                include_videos: args.include_videos,
                include_primary_links: args.include_primary_links,
                ai_prompt: args.ai_prompt.clone(),
            };
            scheduler.add_job(Job::once(at, JobKind::PublishOnce { post }));
            registered += 1;
        }
    }

    tracing::info!(
        "schedule {schedule_id}: registered {registered} publish job(s) across {} channel(s)",
        args.channel_ids.len()
    );
    Ok(())
}
