//! Job schedules and job metadata

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::SchedulerError;

/// Callback run when a job fires
pub type JobCallback = Arc<dyn Fn() + Send + Sync>;

/// When a job should run
#[derive(Debug, Clone)]
pub enum JobSchedule {
    /// Fire at a fixed interval, first firing one interval from now
    Interval(Duration),
    /// Fire according to a cron expression (seconds-resolution, 6 fields)
    Cron(Box<cron::Schedule>),
}

impl JobSchedule {
    /// Build an interval schedule
    pub fn interval(every: Duration) -> Self {
        JobSchedule::Interval(every)
    }

    /// Parse a cron expression into a schedule
    pub fn cron(expression: &str) -> Result<Self, SchedulerError> {
        let schedule =
            cron::Schedule::from_str(expression).map_err(|e| SchedulerError::InvalidCron {
                expression: expression.to_string(),
                reason: e.to_string(),
            })?;
        Ok(JobSchedule::Cron(Box::new(schedule)))
    }

    /// Compute the next run strictly after `now`
    pub fn next_run(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            JobSchedule::Interval(every) => {
                let every = chrono::Duration::from_std(*every).ok()?;
                Some(now + every)
            }
            JobSchedule::Cron(schedule) => schedule.after(&now).next(),
        }
    }
}

/// Snapshot of a scheduled job's metadata
#[derive(Debug, Clone)]
pub struct JobInfo {
    /// Job id, unique within the scheduler
    pub id: String,
    /// Next time the job will fire, if any
    pub next_run: Option<DateTime<Utc>>,
    /// Whether the job is currently paused
    pub paused: bool,
}

pub(crate) struct Job {
    pub(crate) callback: JobCallback,
    pub(crate) schedule: JobSchedule,
    pub(crate) next_run: Option<DateTime<Utc>>,
    pub(crate) paused: bool,
}
