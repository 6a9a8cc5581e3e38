use crate::config::{SchedulerConfig, TimeOfDay};
use crate::engine::PriorityTier;
use crate::models::format_timestamp;
use crate::services::batch_runner::{BatchReport, BatchRunner};
use crate::services::reports::{daily_summary, weekly_report, write_weekly_report, DailySummary, WeeklyReport};
use anyhow::Context;
use chrono::{DateTime, Datelike, Duration as ChronoDuration, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// The background jobs the tracker knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    HighPriorityTracking,
    RegularTracking,
    DailyMaintenance,
    WeeklyScan,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::HighPriorityTracking,
        JobKind::RegularTracking,
        JobKind::DailyMaintenance,
        JobKind::WeeklyScan,
    ];

    /// Default job id
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::HighPriorityTracking => "high_priority_tracking",
            JobKind::RegularTracking => "regular_tracking",
            JobKind::DailyMaintenance => "daily_maintenance",
            JobKind::WeeklyScan => "weekly_scan",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "Unknown job '{}', expected one of: {}",
                    s,
                    JobKind::ALL.map(|k| k.as_str()).join(", ")
                )
            })
    }
}

/// When a job fires. Wall-clock triggers are in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    Interval { every_secs: u64 },
    Daily { hour: u32, minute: u32 },
    Weekly { weekday: Weekday, hour: u32, minute: u32 },
}

impl Trigger {
    pub fn every(interval: Duration) -> Self {
        Trigger::Interval {
            every_secs: interval.as_secs(),
        }
    }

    pub fn daily(at: TimeOfDay) -> Self {
        Trigger::Daily {
            hour: at.hour,
            minute: at.minute,
        }
    }

    pub fn weekly(weekday: Weekday, at: TimeOfDay) -> Self {
        Trigger::Weekly {
            weekday,
            hour: at.hour,
            minute: at.minute,
        }
    }

    /// First fire time strictly after `after`.
    ///
    /// Interval triggers count from `after`, so the first run of an interval
    /// job is one full interval after it is scheduled.
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match *self {
            Trigger::Interval { every_secs } => {
                if every_secs == 0 {
                    return None;
                }
                let every = ChronoDuration::seconds(i64::try_from(every_secs).ok()?);
                after.checked_add_signed(every)
            }
            Trigger::Daily { hour, minute } => {
                let today = after.date_naive().and_hms_opt(hour, minute, 0)?.and_utc();
                if today > after {
                    Some(today)
                } else {
                    today.checked_add_signed(ChronoDuration::days(1))
                }
            }
            Trigger::Weekly { weekday, hour, minute } => {
                let days_ahead = (7 + weekday.num_days_from_monday() - after.weekday().num_days_from_monday()) % 7;
                let candidate = after
                    .date_naive()
                    .checked_add_signed(ChronoDuration::days(i64::from(days_ahead)))?
                    .and_hms_opt(hour, minute, 0)?
                    .and_utc();
                if candidate > after {
                    Some(candidate)
                } else {
                    candidate.checked_add_signed(ChronoDuration::weeks(1))
                }
            }
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Interval { every_secs } if every_secs % 3600 == 0 => {
                write!(f, "every {}h", every_secs / 3600)
            }
            Trigger::Interval { every_secs } => write!(f, "every {}s", every_secs),
            Trigger::Daily { hour, minute } => write!(f, "daily at {:02}:{:02} UTC", hour, minute),
            Trigger::Weekly { weekday, hour, minute } => {
                write!(f, "weekly on {} at {:02}:{:02} UTC", weekday, hour, minute)
            }
        }
    }
}

/// Jobs enabled by the configuration, with their triggers
pub fn planned_jobs(config: &SchedulerConfig) -> Vec<(JobKind, Trigger)> {
    let mut jobs = Vec::new();

    if config.enable_high_priority {
        jobs.push((
            JobKind::HighPriorityTracking,
            Trigger::every(config.high_priority_interval()),
        ));
    }
    if config.enable_regular {
        jobs.push((JobKind::RegularTracking, Trigger::every(config.regular_interval())));
    }
    if config.enable_daily_maintenance {
        jobs.push((
            JobKind::DailyMaintenance,
            Trigger::daily(config.daily_maintenance_time),
        ));
    }
    if config.enable_weekly_scan {
        jobs.push((
            JobKind::WeeklyScan,
            Trigger::weekly(config.weekly_scan_day, config.weekly_scan_time),
        ));
    }

    jobs
}

/// What a job produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "job", content = "result", rename_all = "snake_case")]
pub enum JobOutcome {
    Batch(BatchReport),
    DailySummary(DailySummary),
    WeeklyReport(WeeklyReport),
}

/// Everything a job body needs. Holds no product data of its own.
#[derive(Clone)]
pub struct JobContext {
    runner: BatchRunner,
    reports_dir: Option<PathBuf>,
    volatility_top_n: usize,
}

impl JobContext {
    /// Create a new JobContext
    pub fn new(runner: BatchRunner) -> Self {
        Self {
            runner,
            reports_dir: None,
            volatility_top_n: 5,
        }
    }

    pub fn with_reports_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.reports_dir = dir;
        self
    }

    pub fn with_volatility_top_n(mut self, top_n: usize) -> Self {
        self.volatility_top_n = top_n;
        self
    }

    /// Run one job body to completion
    pub async fn run(&self, kind: JobKind) -> anyhow::Result<JobOutcome> {
        match kind {
            JobKind::HighPriorityTracking => {
                info!("Starting high-priority product tracking");
                let report = self
                    .runner
                    .run_tier(PriorityTier::High, "High priority")
                    .await
                    .context("high-priority tracking could not read products")?;
                Ok(JobOutcome::Batch(report))
            }
            JobKind::RegularTracking => {
                info!("Starting regular product tracking");
                let report = self
                    .runner
                    .run_tier(PriorityTier::Regular, "Regular")
                    .await
                    .context("regular tracking could not read products")?;
                Ok(JobOutcome::Batch(report))
            }
            JobKind::DailyMaintenance => {
                info!("Starting daily maintenance");
                let products = self
                    .runner
                    .repository()
                    .find_all()
                    .await
                    .context("daily maintenance could not read products")?;
                let summary = daily_summary(&products, Utc::now());
                info!("Daily summary: {}", serde_json::to_string_pretty(&summary)?);
                Ok(JobOutcome::DailySummary(summary))
            }
            JobKind::WeeklyScan => {
                info!("Starting weekly full scan");
                let repo = self.runner.repository();
                let products = repo
                    .find_all()
                    .await
                    .context("weekly scan could not read products")?;
                let scan = self.runner.run(&products, "Weekly full scan").await;

                // Rank on the post-scan state
                let products = repo
                    .find_all()
                    .await
                    .context("weekly scan could not reload products")?;
                let now = Utc::now();
                let mut report = weekly_report(&products, self.volatility_top_n, now);
                report.scan = Some(scan);

                info!("Weekly report: {}", serde_json::to_string_pretty(&report)?);

                if let Some(dir) = &self.reports_dir {
                    write_weekly_report(&report, dir, now)
                        .await
                        .context("weekly report could not be written")?;
                }
                Ok(JobOutcome::WeeklyReport(report))
            }
        }
    }
}

/// Status row for one scheduled job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub id: String,
    pub kind: JobKind,
    pub trigger: Trigger,
    pub next_run: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub jobs: Vec<JobStatus>,
}

struct ScheduledJob {
    kind: JobKind,
    trigger: Trigger,
    next_run: Arc<RwLock<Option<DateTime<Utc>>>>,
    handle: JoinHandle<()>,
}

/// Runs named jobs on independent tokio tasks.
///
/// A job id maps to exactly one task; scheduling an id again aborts the
/// previous task first.
pub struct PriceScheduler {
    context: JobContext,
    config: SchedulerConfig,
    jobs: Mutex<HashMap<String, ScheduledJob>>,
    running: RwLock<bool>,
}

impl PriceScheduler {
    /// Create a new PriceScheduler
    pub fn new(context: JobContext, config: SchedulerConfig) -> Self {
        Self {
            context,
            config,
            jobs: Mutex::new(HashMap::new()),
            running: RwLock::new(false),
        }
    }

    /// Schedule every enabled job. Calling it again while running only warns.
    pub async fn start(&self) {
        {
            let mut running = self.running.write().await;
            if *running {
                warn!("Price scheduler is already running");
                return;
            }
            *running = true;
        }

        for (kind, trigger) in planned_jobs(&self.config) {
            self.add_job(kind.as_str(), kind, trigger).await;
        }

        info!("Price scheduler started with {} jobs", self.jobs.lock().await.len());
    }

    /// Abort every job
    pub async fn stop(&self) {
        let mut jobs = self.jobs.lock().await;
        for (id, job) in jobs.drain() {
            job.handle.abort();
            info!("Stopped job {}", id);
        }
        *self.running.write().await = false;
        info!("Price scheduler stopped");
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Schedule `kind` under `id`, replacing any job already using that id
    pub async fn add_job(&self, id: &str, kind: JobKind, trigger: Trigger) {
        let next_run = Arc::new(RwLock::new(None));
        let handle = tokio::spawn(job_loop(
            id.to_string(),
            kind,
            trigger,
            self.context.clone(),
            next_run.clone(),
        ));

        let previous = self.jobs.lock().await.insert(
            id.to_string(),
            ScheduledJob {
                kind,
                trigger,
                next_run,
                handle,
            },
        );

        if let Some(previous) = previous {
            previous.handle.abort();
            info!("Replaced job {}", id);
        }
        info!("Scheduled job {} ({}, {})", id, kind, trigger);
    }

    /// Abort and forget one job. Returns false when no job has that id.
    pub async fn remove_job(&self, id: &str) -> bool {
        match self.jobs.lock().await.remove(id) {
            Some(job) => {
                job.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Scheduled jobs ordered by id
    pub async fn status(&self) -> SchedulerStatus {
        let jobs = self.jobs.lock().await;
        let mut rows = Vec::with_capacity(jobs.len());

        for (id, job) in jobs.iter() {
            let next_run = *job.next_run.read().await;
            rows.push(JobStatus {
                id: id.clone(),
                kind: job.kind,
                trigger: job.trigger,
                next_run: next_run.map(format_timestamp),
            });
        }
        rows.sort_by(|a, b| a.id.cmp(&b.id));

        SchedulerStatus {
            running: self.is_running().await,
            jobs: rows,
        }
    }

    /// Run a job body now, outside its schedule
    pub async fn run_job(&self, kind: JobKind) -> anyhow::Result<JobOutcome> {
        info!("Running job {} on demand", kind);
        self.context.run(kind).await
    }
}

async fn job_loop(
    id: String,
    kind: JobKind,
    trigger: Trigger,
    context: JobContext,
    next_run: Arc<RwLock<Option<DateTime<Utc>>>>,
) {
    loop {
        let now = Utc::now();
        let next = match trigger.next_fire_after(now) {
            Some(next) => next,
            None => {
                error!("Job {} has a trigger that never fires ({})", id, trigger);
                return;
            }
        };
        *next_run.write().await = Some(next);

        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(wait).await;

        match context.run(kind).await {
            Ok(_) => info!("Job {} finished", id),
            Err(e) => error!("Job {} failed: {:#}", id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_interval_trigger() {
        let trigger = Trigger::every(Duration::from_secs(2 * 3600));
        assert_eq!(
            trigger.next_fire_after(at(2024, 6, 5, 10, 0)),
            Some(at(2024, 6, 5, 12, 0))
        );
        assert_eq!(Trigger::every(Duration::ZERO).next_fire_after(at(2024, 6, 5, 10, 0)), None);
    }

    #[test]
    fn test_daily_trigger() {
        let trigger = Trigger::daily(TimeOfDay { hour: 2, minute: 0 });
        // 2024-06-05 is a Wednesday
        assert_eq!(
            trigger.next_fire_after(at(2024, 6, 5, 1, 30)),
            Some(at(2024, 6, 5, 2, 0))
        );
        assert_eq!(
            trigger.next_fire_after(at(2024, 6, 5, 2, 0)),
            Some(at(2024, 6, 6, 2, 0))
        );
    }

    #[test]
    fn test_weekly_trigger() {
        let trigger = Trigger::weekly(Weekday::Sun, TimeOfDay { hour: 3, minute: 0 });
        assert_eq!(
            trigger.next_fire_after(at(2024, 6, 5, 12, 0)),
            Some(at(2024, 6, 9, 3, 0))
        );
        // Sunday after the slot rolls to next week
        assert_eq!(
            trigger.next_fire_after(at(2024, 6, 9, 4, 0)),
            Some(at(2024, 6, 16, 3, 0))
        );
        // Sunday before the slot fires the same day
        assert_eq!(
            trigger.next_fire_after(at(2024, 6, 9, 2, 59)),
            Some(at(2024, 6, 9, 3, 0))
        );
    }

    #[test]
    fn test_job_kind_parsing() {
        assert_eq!("weekly-scan".parse::<JobKind>(), Ok(JobKind::WeeklyScan));
        assert_eq!(
            "high_priority_tracking".parse::<JobKind>(),
            Ok(JobKind::HighPriorityTracking)
        );
        assert!("hourly".parse::<JobKind>().is_err());
    }

    #[test]
    fn test_planned_jobs_respect_flags() {
        let mut config = SchedulerConfig::default();
        assert_eq!(planned_jobs(&config).len(), 4);

        config.enable_weekly_scan = false;
        config.enable_regular = false;
        let kinds: Vec<JobKind> = planned_jobs(&config).into_iter().map(|(k, _)| k).collect();
        assert_eq!(kinds, vec![JobKind::HighPriorityTracking, JobKind::DailyMaintenance]);
    }
}
