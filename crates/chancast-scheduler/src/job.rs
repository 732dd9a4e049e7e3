//! Job definitions — the closed set of things the scheduler can run.
//!
//! Jobs carry a tagged-union payload instead of a callable: the scheduler
//! stays serializable and the dispatch surface is a single match.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// When/how a job fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobTrigger {
    /// Fires every day at the given UTC time.
    DailyAt { hour: u32, minute: u32, second: u32 },
    /// Fires every N seconds.
    Every { secs: u64 },
    /// Fires once at a specific instant, then the job is dropped.
    Once { at: DateTime<Utc> },
}

impl JobTrigger {
    /// Next fire time strictly after `now`.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            JobTrigger::DailyAt {
                hour,
                minute,
                second,
            } => {
                let today = now
                    .date_naive()
                    .and_hms_opt(*hour, *minute, *second)?
                    .and_utc();
                if today > now {
                    Some(today)
                } else {
                    Some(today + Duration::days(1))
                }
            }
            JobTrigger::Every { secs } => Some(now + Duration::seconds(*secs as i64)),
            JobTrigger::Once { at } => {
                if *at > now {
                    Some(*at)
                } else {
                    // Missed one-shots (process was down) fire immediately.
                    Some(now)
                }
            }
        }
    }
}

/// Arguments stored on a publish-message schedule row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishScheduleArgs {
    pub channel_ids: Vec<i64>,
    #[serde(default = "default_min_words")]
    pub min_word_count: u32,
    #[serde(default = "default_max_words")]
    pub max_word_count: u32,
    #[serde(default)]
    pub include_images: bool,
    #[serde(default)]
    pub include_videos: bool,
    #[serde(default)]
    pub include_primary_links: bool,
    #[serde(default)]
    pub ai_prompt: String,
}

fn default_min_words() -> u32 {
    100
}
fn default_max_words() -> u32 {
    300
}

/// Fully-resolved payload for one publish execution against one channel.
///
/// Carries everything the send needs so it stays valid even if the parent
/// schedule row is deleted before the fire time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishPost {
    pub user_id: i64,
    pub channel_tid: i64,
    pub session_name: String,
    pub lang: String,
    pub primary_links: Vec<String>,
    pub min_word_count: u32,
    pub max_word_count: u32,
    pub include_images: bool,
    pub include_videos: bool,
    pub include_primary_links: bool,
    pub ai_prompt: String,
}

/// What a job does when it fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobKind {
    /// Daily top-level job of a publish schedule: expand into one-shot posts.
    ExpandPublish {
        schedule_id: i64,
        user_id: i64,
        args: PublishScheduleArgs,
    },
    /// One expanded post at one randomized time.
    PublishOnce { post: PublishPost },
    /// System job: mirror remote admin channels into the database.
    SyncChannels,
    /// System job: mirror registry liveness into the accounts table.
    SyncOnlineStatus,
}

impl JobKind {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            JobKind::ExpandPublish { .. } => "expand_publish",
            JobKind::PublishOnce { .. } => "publish_once",
            JobKind::SyncChannels => "sync_channels",
            JobKind::SyncOnlineStatus => "sync_online_status",
        }
    }
}

/// A scheduled job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub kind: JobKind,
    pub trigger: JobTrigger,
    pub paused: bool,
    pub next_run: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(id: impl Into<String>, trigger: JobTrigger, kind: JobKind) -> Self {
        let next_run = trigger.next_run_after(Utc::now());
        Self {
            id: id.into(),
            kind,
            trigger,
            paused: false,
            next_run,
        }
    }

    /// One-shot job with a random unique id.
    pub fn once(at: DateTime<Utc>, kind: JobKind) -> Self {
        Self::new(
            uuid::Uuid::new_v4().to_string(),
            JobTrigger::Once { at },
            kind,
        )
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.paused && self.next_run.is_some_and(|next| next <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn daily_trigger_rolls_to_tomorrow() {
        let trigger = JobTrigger::DailyAt {
            hour: 9,
            minute: 0,
            second: 0,
        };
        let before = Utc.with_ymd_and_hms(2026, 3, 1, 8, 59, 59).unwrap();
        assert_eq!(
            trigger.next_run_after(before).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
        );

        let after = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        assert_eq!(
            trigger.next_run_after(after).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn once_trigger_fires_immediately_when_missed() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let trigger = JobTrigger::Once { at };
        let late = Utc.with_ymd_and_hms(2026, 3, 1, 13, 0, 0).unwrap();
        assert_eq!(trigger.next_run_after(late).unwrap(), late);
    }

    #[test]
    fn one_shot_jobs_get_unique_ids() {
        let at = Utc::now() + Duration::minutes(5);
        let a = Job::once(at, JobKind::SyncChannels);
        let b = Job::once(at, JobKind::SyncChannels);
        assert_ne!(a.id, b.id);
        assert!(!a.is_due(Utc::now()));
    }
}
