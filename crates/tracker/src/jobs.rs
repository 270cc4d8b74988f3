use std::path::PathBuf;
use std::time::Duration;

use chrono::{Datelike, Local, NaiveDateTime, NaiveTime, Weekday};
use tracing::{error, info};

use common::HoldingsTable;
use store::SharedStore;

use crate::alerts::AlertDispatcher;
use crate::report;

/// How often the job loop looks for due work.
pub const JOB_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Catch-up horizon after a long suspension.
const MAX_CATCH_UP_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    MorningGreeting,
    EveningSummary,
    WeeklySummary,
    NightlyBackup,
}

impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Job::MorningGreeting => write!(f, "Morning greeting"),
            Job::EveningSummary => write!(f, "Evening summary"),
            Job::WeeklySummary => write!(f, "Weekly summary"),
            Job::NightlyBackup => write!(f, "Nightly backup"),
        }
    }
}

/// A job firing at a local wall-clock time, daily or on one weekday.
#[derive(Debug, Clone, Copy)]
pub struct ScheduledJob {
    pub job: Job,
    pub weekday: Option<Weekday>,
    pub at: NaiveTime,
}

#[derive(Debug, Clone)]
pub struct JobSchedule {
    entries: Vec<ScheduledJob>,
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
}

impl Default for JobSchedule {
    fn default() -> Self {
        Self::new(vec![
            ScheduledJob { job: Job::MorningGreeting, weekday: None, at: hm(9, 0) },
            ScheduledJob { job: Job::EveningSummary, weekday: None, at: hm(15, 31) },
            ScheduledJob { job: Job::WeeklySummary, weekday: Some(Weekday::Sat), at: hm(16, 0) },
            ScheduledJob { job: Job::NightlyBackup, weekday: None, at: hm(23, 30) },
        ])
    }
}

impl JobSchedule {
    pub fn new(entries: Vec<ScheduledJob>) -> Self {
        Self { entries }
    }

    /// Jobs whose trigger falls in `(prev, now]`, earliest first. A job that
    /// was missed several times fires once.
    pub fn due_between(&self, prev: NaiveDateTime, now: NaiveDateTime) -> Vec<Job> {
        if now <= prev {
            return Vec::new();
        }
        let horizon = now.date() - chrono::Duration::days(MAX_CATCH_UP_DAYS);
        let mut day = prev.date().max(horizon);

        let mut due: Vec<(NaiveDateTime, Job)> = Vec::new();
        while day <= now.date() {
            for entry in &self.entries {
                if entry.weekday.is_some_and(|w| w != day.weekday()) {
                    continue;
                }
                let trigger = day.and_time(entry.at);
                if prev < trigger && trigger <= now {
                    due.push((trigger, entry.job));
                }
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }

        due.sort_by_key(|(trigger, _)| *trigger);
        let mut jobs: Vec<Job> = Vec::new();
        for (_, job) in due {
            if !jobs.contains(&job) {
                jobs.push(job);
            }
        }
        jobs
    }
}

/// Runs the scheduled operator messages and the nightly backup.
pub struct JobRunner {
    schedule: JobSchedule,
    store: SharedStore,
    backup_dir: PathBuf,
    alerts: AlertDispatcher,
}

impl JobRunner {
    pub fn new(store: SharedStore, backup_dir: PathBuf, alerts: AlertDispatcher) -> Self {
        Self {
            schedule: JobSchedule::default(),
            store,
            backup_dir,
            alerts,
        }
    }

    /// Perform `job` and return the message to send.
    pub async fn execute(&self, job: Job, now: NaiveDateTime) -> String {
        match job {
            Job::MorningGreeting => self.render(job, report::morning_greeting).await,
            Job::EveningSummary => self.render(job, report::daily_summary).await,
            Job::WeeklySummary => self.render(job, |t| report::weekly_summary(t, now)).await,
            Job::NightlyBackup => self.backup(now).await,
        }
    }

    async fn render<F>(&self, job: Job, f: F) -> String
    where
        F: FnOnce(&HoldingsTable) -> String,
    {
        match self.store.read().await {
            Ok(table) => f(&table),
            Err(e) => {
                error!(job = %job, error = %e, "Scheduled job could not read holdings");
                format!("⚠️ {job} unavailable: {e}")
            }
        }
    }

    async fn backup(&self, now: NaiveDateTime) -> String {
        match self.store.backup(&self.backup_dir, now).await {
            Ok(path) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                format!("💾 Nightly backup saved: {name}")
            }
            Err(e) => {
                error!(error = %e, "Nightly backup failed");
                format!("⚠️ Nightly backup failed: {e}")
            }
        }
    }

    /// Poll the schedule forever. Call from `tokio::spawn`.
    pub async fn run(self) {
        info!("Scheduled jobs running");
        let mut ticker = tokio::time::interval(JOB_POLL_INTERVAL);
        let mut prev = Local::now().naive_local();

        loop {
            ticker.tick().await;
            let now = Local::now().naive_local();
            for job in self.schedule.due_between(prev, now) {
                info!(job = %job, "Running scheduled job");
                let message = self.execute(job, now).await;
                self.alerts.dispatch(&message).await;
            }
            prev = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use common::Holding;
    use store::MemoryStore;

    fn at(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn fires_once_when_crossing_trigger() {
        let schedule = JobSchedule::default();
        assert_eq!(
            schedule.due_between(at(5, 8, 59, 55), at(5, 9, 0, 5)),
            vec![Job::MorningGreeting]
        );
        assert!(schedule.due_between(at(5, 9, 0, 5), at(5, 9, 0, 15)).is_empty());
    }

    #[test]
    fn trigger_boundary_is_inclusive_at_end_only() {
        let schedule = JobSchedule::default();
        assert_eq!(
            schedule.due_between(at(5, 15, 30, 50), at(5, 15, 31, 0)),
            vec![Job::EveningSummary]
        );
        assert!(schedule.due_between(at(5, 15, 31, 0), at(5, 15, 31, 10)).is_empty());
    }

    #[test]
    fn weekly_summary_only_on_saturday() {
        let schedule = JobSchedule::default();
        // 2024-01-05 is a Friday, 2024-01-06 a Saturday.
        assert!(schedule.due_between(at(5, 15, 59, 55), at(5, 16, 0, 5)).is_empty());
        assert_eq!(
            schedule.due_between(at(6, 15, 59, 55), at(6, 16, 0, 5)),
            vec![Job::WeeklySummary]
        );
    }

    #[test]
    fn long_gap_fires_each_job_once_in_order() {
        let schedule = JobSchedule::default();
        let jobs = schedule.due_between(at(1, 8, 0, 0), at(4, 10, 0, 0));
        assert_eq!(
            jobs,
            vec![Job::MorningGreeting, Job::EveningSummary, Job::NightlyBackup]
        );
    }

    fn runner(dir: PathBuf) -> (JobRunner, std::sync::Arc<MemoryStore>) {
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let memory = std::sync::Arc::new(MemoryStore::new(HoldingsTable::new(vec![
            Holding::new("ABC", 100.0, 110.0, 95.0, 10.0, day),
            Holding::new("XYZ", 50.0, 60.0, 45.0, 2.0, day),
        ])));
        let runner = JobRunner::new(SharedStore::new(memory.clone()), dir, AlertDispatcher::default());
        (runner, memory)
    }

    #[tokio::test]
    async fn morning_greeting_counts_open_holdings() {
        let dir = tempfile::tempdir().unwrap();
        let (runner, _) = runner(dir.path().to_path_buf());
        let text = runner.execute(Job::MorningGreeting, at(5, 9, 0, 0)).await;
        assert!(text.contains("Tracking 2 active stocks"), "{text}");
    }

    #[tokio::test]
    async fn backup_message_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let (runner, _) = runner(dir.path().join("backups"));
        let text = runner.execute(Job::NightlyBackup, at(5, 23, 30, 0)).await;
        assert_eq!(text, "💾 Nightly backup saved: holdings_20240105_233000.csv");
        assert!(dir.path().join("backups/holdings_20240105_233000.csv").exists());
    }

    #[tokio::test]
    async fn store_failure_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let (runner, memory) = runner(dir.path().to_path_buf());
        memory.set_fail_load(true);

        let text = runner.execute(Job::NightlyBackup, at(5, 23, 30, 0)).await;
        assert!(text.starts_with("⚠️ Nightly backup failed"));
        let text = runner.execute(Job::EveningSummary, at(5, 15, 31, 0)).await;
        assert!(text.starts_with("⚠️ Evening summary unavailable"));
    }
}
