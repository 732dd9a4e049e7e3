//! Job scheduler — registry of jobs plus the tick loop that fires them.
//!
//! The scheduler itself only does bookkeeping; due jobs are handed to
//! `dispatch::run_job` on their own tokio tasks so a slow publish never
//! delays the next tick.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::context::AppContext;
use crate::dispatch;
use crate::job::{Job, JobKind, JobTrigger};

/// In-process job registry. Addressed by job id for pause/resume/removal.
#[derive(Default)]
pub struct JobScheduler {
    jobs: Vec<Job>,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self { jobs: Vec::new() }
    }

    /// Register a job, replacing any existing job with the same id.
    pub fn add_job(&mut self, job: Job) {
        tracing::info!("📅 job registered: {} ({})", job.id, job.kind.label());
        self.jobs.retain(|existing| existing.id != job.id);
        self.jobs.push(job);
    }

    /// Pause a job in place; its trigger state survives for resume.
    pub fn pause_job(&mut self, id: &str) -> bool {
        match self.jobs.iter_mut().find(|job| job.id == id) {
            Some(job) => {
                job.paused = true;
                true
            }
            None => false,
        }
    }

    /// Resume a paused job, recomputing a fresh fire time so a long pause
    /// does not produce a burst of missed runs.
    pub fn resume_job(&mut self, id: &str) -> bool {
        let now = Utc::now();
        match self.jobs.iter_mut().find(|job| job.id == id) {
            Some(job) => {
                job.paused = false;
                if job.next_run.is_none_or(|next| next < now) {
                    job.next_run = job.trigger.next_run_after(now);
                }
                true
            }
            None => false,
        }
    }

    pub fn remove_job(&mut self, id: &str) -> bool {
        let before = self.jobs.len();
        self.jobs.retain(|job| job.id != id);
        self.jobs.len() < before
    }

    pub fn contains(&self, id: &str) -> bool {
        self.jobs.iter().any(|job| job.id == id)
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Number of jobs registered under an id — schedule round-trip tests
    /// assert this never exceeds one per schedule.
    pub fn count_with_id(&self, id: &str) -> usize {
        self.jobs.iter().filter(|job| job.id == id).count()
    }

    /// Collect every due job and advance trigger state.
    ///
    /// Recurring jobs get their next fire time; one-shots are dropped from
    /// the registry as they are returned.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<(String, JobKind)> {
        let mut due = Vec::new();
        for job in self.jobs.iter_mut() {
            if !job.is_due(now) {
                continue;
            }
            due.push((job.id.clone(), job.kind.clone()));
            job.next_run = match job.trigger {
                JobTrigger::Once { .. } => None,
                _ => job.trigger.next_run_after(now),
            };
        }
        // One-shots that just fired have no next_run left.
        self.jobs
            .retain(|job| !matches!(job.trigger, JobTrigger::Once { .. }) || job.next_run.is_some());
        due
    }
}

/// Spawn the scheduler tick loop as a background tokio task.
pub fn spawn_scheduler(ctx: Arc<AppContext>) -> tokio::task::JoinHandle<()> {
    let tick_secs = ctx.config.sync.scheduler_tick_secs.max(1);
    tokio::spawn(async move {
        tracing::info!("⏰ scheduler started (tick every {tick_secs}s)");
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(tick_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let due = {
                let mut scheduler = ctx.scheduler.lock().await;
                scheduler.take_due(Utc::now())
            };
            for (job_id, kind) in due {
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    dispatch::run_job(ctx, &job_id, kind).await;
                });
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn once_in(minutes: i64) -> Job {
        Job::once(Utc::now() + Duration::minutes(minutes), JobKind::SyncChannels)
    }

    #[test]
    fn add_job_replaces_same_id() {
        let mut scheduler = JobScheduler::new();
        let mut job = once_in(5);
        job.id = "42".into();
        scheduler.add_job(job.clone());
        scheduler.add_job(job);
        assert_eq!(scheduler.count_with_id("42"), 1);
        assert_eq!(scheduler.job_count(), 1);
    }

    #[test]
    fn pause_resume_round_trip_keeps_one_job() {
        let mut scheduler = JobScheduler::new();
        let mut job = once_in(5);
        job.id = "7".into();
        scheduler.add_job(job);

        assert!(scheduler.pause_job("7"));
        assert!(scheduler.contains("7"));
        assert!(scheduler.resume_job("7"));
        assert_eq!(scheduler.count_with_id("7"), 1);

        assert!(!scheduler.pause_job("missing"));
        assert!(!scheduler.resume_job("missing"));
    }

    #[test]
    fn paused_jobs_are_not_due() {
        let mut scheduler = JobScheduler::new();
        let mut job = once_in(-1);
        job.id = "7".into();
        scheduler.add_job(job);
        assert!(scheduler.pause_job("7"));
        assert!(scheduler.take_due(Utc::now()).is_empty());

        assert!(scheduler.resume_job("7"));
        // Resume recomputed the missed one-shot to fire now.
        let due = scheduler.take_due(Utc::now() + Duration::seconds(1));
        assert_eq!(due.len(), 1);
    }

    #[test]
    fn one_shot_fires_once_and_disappears() {
        let mut scheduler = JobScheduler::new();
        scheduler.add_job(once_in(-1));
        let due = scheduler.take_due(Utc::now());
        assert_eq!(due.len(), 1);
        assert_eq!(scheduler.job_count(), 0);
        assert!(scheduler.take_due(Utc::now()).is_empty());
    }

    #[test]
    fn recurring_job_advances_next_run() {
        let mut scheduler = JobScheduler::new();
        let mut job = Job::new(
            "sync",
            JobTrigger::Every { secs: 60 },
            JobKind::SyncOnlineStatus,
        );
        job.next_run = Some(Utc::now() - Duration::seconds(1));
        scheduler.add_job(job);

        let now = Utc::now();
        assert_eq!(scheduler.take_due(now).len(), 1);
        assert_eq!(scheduler.job_count(), 1);
        // Not due again until the interval elapses.
        assert!(scheduler.take_due(now + Duration::seconds(30)).is_empty());
        assert_eq!(scheduler.take_due(now + Duration::seconds(61)).len(), 1);
    }
}
