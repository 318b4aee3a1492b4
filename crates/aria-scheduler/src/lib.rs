//! Background job scheduler for the Aria automation engine
//!
//! Runs interval and cron jobs on a bounded worker thread pool. A
//! coordinator thread tracks the next due time across all jobs and
//! dispatches fired callbacks to the pool, so callbacks never block the
//! timing loop. Jobs are deduplicated by id: adding a job under an id
//! that already exists is a logged no-op.

mod job;
mod pool;

pub use job::{JobCallback, JobInfo, JobSchedule};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use job::Job;
use pool::WorkerPool;

/// Default number of worker threads
const DEFAULT_WORKERS: usize = 20;

/// How long the coordinator sleeps when no job is scheduled
const IDLE_WAIT: Duration = Duration::from_secs(60);

/// Errors from scheduler operations
#[derive(Debug, Clone, Error)]
pub enum SchedulerError {
    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },

    #[error("job not found: {0}")]
    JobNotFound(String),
}

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

struct Shared {
    jobs: Mutex<HashMap<String, Job>>,
    wakeup: Condvar,
    shutdown: AtomicBool,
}

/// The background scheduler
///
/// Dropping the scheduler stops the coordinator, drains the worker
/// pool, and joins all threads. In-flight callbacks run to completion;
/// they are not interruptible.
pub struct Scheduler {
    shared: Arc<Shared>,
    coordinator: Option<JoinHandle<()>>,
    pool: WorkerPool,
}

impl Scheduler {
    /// Create a scheduler with the default worker pool size
    pub fn new() -> Self {
        Self::with_workers(DEFAULT_WORKERS)
    }

    /// Create a scheduler with a specific worker pool size
    pub fn with_workers(workers: usize) -> Self {
        let shared = Arc::new(Shared {
            jobs: Mutex::new(HashMap::new()),
            wakeup: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });

        let pool = WorkerPool::new(workers.max(1));
        let task_tx = pool.sender();

        let coordinator = {
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("aria-scheduler".to_string())
                .spawn(move || {
                    let mut jobs = shared.jobs.lock().unwrap_or_else(|e| e.into_inner());
                    loop {
                        if shared.shutdown.load(Ordering::SeqCst) {
                            break;
                        }

                        let now = Utc::now();
                        let mut nearest: Option<DateTime<Utc>> = None;
                        for (id, job) in jobs.iter_mut() {
                            if job.paused {
                                continue;
                            }
                            if let Some(due) = job.next_run {
                                if due <= now {
                                    debug!(job_id = %id, "Job due, dispatching to pool");
                                    let callback = Arc::clone(&job.callback);
                                    if task_tx.send(Box::new(move || callback())).is_err() {
                                        warn!(job_id = %id, "Worker pool gone, dropping job run");
                                    }
                                    job.next_run = job.schedule.next_run(now);
                                }
                            }
                            if let Some(next) = job.next_run {
                                nearest = Some(nearest.map_or(next, |n| n.min(next)));
                            }
                        }

                        let wait = nearest
                            .map(|t| (t - Utc::now()).to_std().unwrap_or(Duration::ZERO))
                            .unwrap_or(IDLE_WAIT);
                        let (guard, _) = shared
                            .wakeup
                            .wait_timeout(jobs, wait)
                            .unwrap_or_else(|e| e.into_inner());
                        jobs = guard;
                    }
                })
                .expect("failed to spawn scheduler thread")
        };

        Self {
            shared,
            coordinator: Some(coordinator),
            pool,
        }
    }

    /// Add a job under a unique id
    ///
    /// Returns `false` (and logs) when a job with this id already
    /// exists; the existing job is kept unchanged.
    pub fn add_job(
        &self,
        job_id: impl Into<String>,
        schedule: JobSchedule,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> bool {
        let job_id = job_id.into();
        let mut jobs = self.lock_jobs();
        if jobs.contains_key(&job_id) {
            info!(job_id = %job_id, "Job already exists, keeping existing job");
            return false;
        }

        let next_run = schedule.next_run(Utc::now());
        debug!(job_id = %job_id, next_run = ?next_run, "Adding job");
        jobs.insert(
            job_id,
            Job {
                callback: Arc::new(callback),
                schedule,
                next_run,
                paused: false,
            },
        );
        self.shared.wakeup.notify_all();
        true
    }

    /// Remove a job before it next fires
    ///
    /// In-flight executions are not interrupted. Returns `false` when
    /// no such job exists.
    pub fn remove_job(&self, job_id: &str) -> bool {
        let removed = self.lock_jobs().remove(job_id).is_some();
        if removed {
            debug!(job_id = %job_id, "Removed job");
            self.shared.wakeup.notify_all();
        }
        removed
    }

    /// Get a snapshot of one job's metadata
    pub fn get_job(&self, job_id: &str) -> Option<JobInfo> {
        self.lock_jobs().get(job_id).map(|job| JobInfo {
            id: job_id.to_string(),
            next_run: job.next_run,
            paused: job.paused,
        })
    }

    /// Snapshot all jobs
    pub fn get_jobs(&self) -> Vec<JobInfo> {
        self.lock_jobs()
            .iter()
            .map(|(id, job)| JobInfo {
                id: id.clone(),
                next_run: job.next_run,
                paused: job.paused,
            })
            .collect()
    }

    /// Pause a job; it stays registered but stops firing
    pub fn pause_job(&self, job_id: &str) -> SchedulerResult<()> {
        let mut jobs = self.lock_jobs();
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| SchedulerError::JobNotFound(job_id.to_string()))?;
        job.paused = true;
        debug!(job_id = %job_id, "Paused job");
        Ok(())
    }

    /// Resume a paused job, rescheduling from now
    pub fn resume_job(&self, job_id: &str) -> SchedulerResult<()> {
        let mut jobs = self.lock_jobs();
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| SchedulerError::JobNotFound(job_id.to_string()))?;
        job.paused = false;
        job.next_run = job.schedule.next_run(Utc::now());
        debug!(job_id = %job_id, next_run = ?job.next_run, "Resumed job");
        drop(jobs);
        self.shared.wakeup.notify_all();
        Ok(())
    }

    /// Replace a job's schedule and callback, keeping its id
    pub fn modify_job(
        &self,
        job_id: &str,
        schedule: JobSchedule,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> SchedulerResult<()> {
        let mut jobs = self.lock_jobs();
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| SchedulerError::JobNotFound(job_id.to_string()))?;
        job.next_run = schedule.next_run(Utc::now());
        job.schedule = schedule;
        job.callback = Arc::new(callback);
        debug!(job_id = %job_id, "Modified job");
        drop(jobs);
        self.shared.wakeup.notify_all();
        Ok(())
    }

    /// Number of registered jobs
    pub fn job_count(&self) -> usize {
        self.lock_jobs().len()
    }

    /// Stop the coordinator and drain the worker pool
    ///
    /// In-flight callbacks run to completion; queued firings are still
    /// executed. Idempotent, and also performed on drop.
    pub fn shutdown(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.wakeup.notify_all();
        if let Some(coordinator) = self.coordinator.take() {
            let _ = coordinator.join();
        }
        self.pool.shutdown();
    }

    fn lock_jobs(&self) -> std::sync::MutexGuard<'_, HashMap<String, Job>> {
        self.shared.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Thread-safe wrapper for Scheduler
pub type SharedScheduler = Arc<Scheduler>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_interval_job_fires_repeatedly() {
        let scheduler = Scheduler::with_workers(2);
        let (tx, rx) = mpsc::channel();

        scheduler.add_job(
            "ticker",
            JobSchedule::interval(Duration::from_millis(30)),
            move || {
                let _ = tx.send(());
            },
        );

        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
    }

    #[test]
    fn test_duplicate_job_id_is_noop() {
        let scheduler = Scheduler::with_workers(2);
        let (tx, rx) = mpsc::channel();
        let (tx2, rx2) = mpsc::channel::<()>();

        assert!(scheduler.add_job(
            "report",
            JobSchedule::interval(Duration::from_millis(30)),
            move || {
                let _ = tx.send(());
            },
        ));
        // Same id: must keep the first job
        assert!(!scheduler.add_job(
            "report",
            JobSchedule::interval(Duration::from_millis(30)),
            move || {
                let _ = tx2.send(());
            },
        ));

        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(rx2.try_recv().is_err());
        assert_eq!(scheduler.job_count(), 1);
    }

    #[test]
    fn test_remove_job_stops_firing() {
        let scheduler = Scheduler::with_workers(2);
        let (tx, rx) = mpsc::channel();

        scheduler.add_job(
            "short_lived",
            JobSchedule::interval(Duration::from_millis(30)),
            move || {
                let _ = tx.send(());
            },
        );

        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(scheduler.remove_job("short_lived"));
        assert!(!scheduler.remove_job("short_lived"));

        // Drain anything dispatched before removal, then expect silence
        std::thread::sleep(Duration::from_millis(100));
        while rx.try_recv().is_ok() {}
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn test_pause_and_resume() {
        let scheduler = Scheduler::with_workers(2);
        let (tx, rx) = mpsc::channel();

        scheduler.add_job(
            "pausable",
            JobSchedule::interval(Duration::from_millis(30)),
            move || {
                let _ = tx.send(());
            },
        );

        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        scheduler.pause_job("pausable").unwrap();
        assert!(scheduler.get_job("pausable").unwrap().paused);

        std::thread::sleep(Duration::from_millis(100));
        while rx.try_recv().is_ok() {}
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

        scheduler.resume_job("pausable").unwrap();
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
    }

    #[test]
    fn test_modify_job_replaces_schedule_and_callback() {
        let scheduler = Scheduler::with_workers(2);
        let (tx_old, rx_old) = mpsc::channel();
        let (tx_new, rx_new) = mpsc::channel();

        scheduler.add_job(
            "mutable",
            JobSchedule::interval(Duration::from_secs(3600)),
            move || {
                let _ = tx_old.send(());
            },
        );

        scheduler
            .modify_job(
                "mutable",
                JobSchedule::interval(Duration::from_millis(30)),
                move || {
                    let _ = tx_new.send(());
                },
            )
            .unwrap();

        // The new callback fires on the new schedule; the old one never runs
        rx_new.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(rx_old.try_recv().is_err());
        assert_eq!(scheduler.job_count(), 1);

        assert!(matches!(
            scheduler.modify_job(
                "ghost",
                JobSchedule::interval(Duration::from_millis(30)),
                || {},
            ),
            Err(SchedulerError::JobNotFound(_))
        ));
    }

    #[test]
    fn test_get_job_metadata() {
        let scheduler = Scheduler::with_workers(1);

        scheduler.add_job(
            "meta",
            JobSchedule::interval(Duration::from_secs(3600)),
            || {},
        );

        let info = scheduler.get_job("meta").unwrap();
        assert_eq!(info.id, "meta");
        assert!(!info.paused);
        assert!(info.next_run.is_some());

        assert!(scheduler.get_job("missing").is_none());
        assert_eq!(scheduler.get_jobs().len(), 1);
    }

    #[test]
    fn test_pause_unknown_job_fails() {
        let scheduler = Scheduler::with_workers(1);
        assert!(matches!(
            scheduler.pause_job("ghost"),
            Err(SchedulerError::JobNotFound(_))
        ));
    }
}
