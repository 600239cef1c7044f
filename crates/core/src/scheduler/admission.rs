//! Ceiling-based admission in front of a [`Scheduler`].

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::error::SchedulerError;
use super::traits::Scheduler;
use crate::config::SchedulerConfig;
use crate::stage::Stage;

/// One successful submit call.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionRecord {
    pub unit: String,
    pub stage: Stage,
    pub script: PathBuf,
    pub submitted_at: DateTime<Utc>,
    /// Load reported by the query that admitted this job.
    pub observed_load: usize,
    /// Number of times the controller had to back off first.
    pub queue_waits: u32,
}

/// Submits job scripts once the scheduler reports fewer active jobs than the
/// ceiling.
///
/// One controller is shared by every work unit of a run. It holds no lock
/// between the load query and the submit, so concurrent callers may overshoot
/// the ceiling.
pub struct AdmissionController {
    scheduler: Arc<dyn Scheduler>,
    max_jobs: usize,
    min_backoff: Duration,
    max_backoff: Duration,
    capacity_timeout: Option<Duration>,
}

impl AdmissionController {
    pub fn new(scheduler: Arc<dyn Scheduler>, max_jobs: usize) -> Self {
        let defaults = SchedulerConfig::default();
        Self {
            scheduler,
            max_jobs,
            min_backoff: Duration::from_millis(defaults.min_backoff_ms),
            max_backoff: Duration::from_millis(defaults.max_backoff_ms),
            capacity_timeout: None,
        }
    }

    pub fn from_config(scheduler: Arc<dyn Scheduler>, config: &SchedulerConfig) -> Self {
        Self::new(scheduler, config.max_jobs)
            .with_backoff(
                Duration::from_millis(config.min_backoff_ms),
                Duration::from_millis(config.max_backoff_ms),
            )
            .with_capacity_timeout(config.capacity_timeout_secs.map(Duration::from_secs))
    }

    /// Sets the range the randomized re-poll delay is drawn from.
    pub fn with_backoff(mut self, min: Duration, max: Duration) -> Self {
        self.min_backoff = min;
        self.max_backoff = max.max(min);
        self
    }

    /// Gives up with [`SchedulerError::CapacityTimeout`] after `timeout`.
    /// `None` waits indefinitely.
    pub fn with_capacity_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.capacity_timeout = timeout;
        self
    }

    pub fn max_jobs(&self) -> usize {
        self.max_jobs
    }

    /// Name of the underlying scheduler backend.
    pub fn backend(&self) -> &str {
        self.scheduler.name()
    }

    /// Submits `script` for `unit` as soon as load is below the ceiling.
    ///
    /// Query and submit failures are returned as-is; nothing is retried.
    pub async fn submit(
        &self,
        unit: &str,
        stage: Stage,
        script: &Path,
    ) -> Result<SubmissionRecord, SchedulerError> {
        let started = Instant::now();
        let mut queue_waits = 0u32;

        loop {
            let load = self.scheduler.active_jobs().await?;

            if load < self.max_jobs {
                self.scheduler.submit(script).await?;
                info!(unit, script = %script.display(), "{} : {} job submitted", unit, stage);
                return Ok(SubmissionRecord {
                    unit: unit.to_string(),
                    stage,
                    script: script.to_path_buf(),
                    submitted_at: Utc::now(),
                    observed_load: load,
                    queue_waits,
                });
            }

            if queue_waits == 0 {
                warn!(
                    unit,
                    "Maximum number of scheduler jobs running ({}). Waiting for the queue to go down...",
                    load
                );
            } else {
                debug!(unit, load, "Queue still full");
            }
            queue_waits += 1;

            if let Some(timeout) = self.capacity_timeout {
                let elapsed = started.elapsed();
                if elapsed >= timeout {
                    return Err(SchedulerError::CapacityTimeout {
                        waited_secs: elapsed.as_secs(),
                    });
                }
            }

            tokio::time::sleep(self.backoff()).await;
        }
    }

    fn backoff(&self) -> Duration {
        let min = self.min_backoff.as_millis() as u64;
        let max = self.max_backoff.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}
