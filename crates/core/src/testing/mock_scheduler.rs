//! Mock scheduler for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::scheduler::{Scheduler, SchedulerError};

/// A recorded submit call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedSubmission {
    /// The script that was submitted.
    pub script: PathBuf,
    /// Active jobs as the mock counted them right before this submit.
    pub load_at_submit: usize,
    /// When the submit call happened.
    pub submitted_at: Instant,
}

/// Mock implementation of the Scheduler trait.
///
/// Provides controllable behavior for testing:
/// - A settable background load
/// - Submitted jobs that occupy a queue slot for a configurable duration
/// - Injected query/submit failures
/// - Success markers written when a matching script is submitted
///
/// # Example
///
/// ```rust,ignore
/// use tomoprep_core::testing::MockScheduler;
///
/// let scheduler = MockScheduler::new();
/// scheduler.set_job_duration(Duration::from_millis(200)).await;
///
/// // Pretend motion correction finishes as soon as it is submitted
/// scheduler
///     .create_on_submit("motioncorr_slurm_", unit_dir.join("MotionCorr/job002/RELION_JOB_EXIT_SUCCESS"))
///     .await;
///
/// let submissions = scheduler.recorded_submissions().await;
/// assert_eq!(submissions.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockScheduler {
    /// Jobs owned by someone else, always counted.
    base_load: Arc<RwLock<usize>>,
    /// How long a submitted job keeps counting toward the load.
    job_duration: Arc<RwLock<Duration>>,
    /// End times of jobs submitted through the mock.
    running: Arc<RwLock<Vec<Instant>>>,
    /// Recorded submit calls.
    submissions: Arc<RwLock<Vec<RecordedSubmission>>>,
    /// Number of load queries answered.
    queries: Arc<RwLock<usize>>,
    /// If set, the next query fails with this error.
    next_query_error: Arc<RwLock<Option<SchedulerError>>>,
    /// If set, the next submit fails with this error.
    next_submit_error: Arc<RwLock<Option<SchedulerError>>>,
    /// (script-name fragment, file to create) pairs.
    on_submit: Arc<RwLock<Vec<(String, PathBuf)>>>,
}

impl Default for MockScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl MockScheduler {
    /// Create a new mock scheduler with an empty queue.
    pub fn new() -> Self {
        Self {
            base_load: Arc::new(RwLock::new(0)),
            job_duration: Arc::new(RwLock::new(Duration::ZERO)),
            running: Arc::new(RwLock::new(Vec::new())),
            submissions: Arc::new(RwLock::new(Vec::new())),
            queries: Arc::new(RwLock::new(0)),
            next_query_error: Arc::new(RwLock::new(None)),
            next_submit_error: Arc::new(RwLock::new(None)),
            on_submit: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Set the number of foreign jobs always reported as active.
    pub async fn set_load(&self, load: usize) {
        *self.base_load.write().await = load;
    }

    /// Set how long each submitted job stays in the queue.
    pub async fn set_job_duration(&self, duration: Duration) {
        *self.job_duration.write().await = duration;
    }

    /// Get all recorded submissions.
    pub async fn recorded_submissions(&self) -> Vec<RecordedSubmission> {
        self.submissions.read().await.clone()
    }

    /// Scripts submitted so far, in order.
    pub async fn submitted_scripts(&self) -> Vec<PathBuf> {
        self.submissions
            .read()
            .await
            .iter()
            .map(|s| s.script.clone())
            .collect()
    }

    /// Get the number of submit calls that succeeded.
    pub async fn submission_count(&self) -> usize {
        self.submissions.read().await.len()
    }

    /// Get the number of load queries answered (including failed ones).
    pub async fn query_count(&self) -> usize {
        *self.queries.read().await
    }

    /// Configure the next load query to fail with the given error.
    pub async fn fail_next_query(&self, error: SchedulerError) {
        *self.next_query_error.write().await = Some(error);
    }

    /// Configure the next submit to fail with the given error.
    pub async fn fail_next_submit(&self, error: SchedulerError) {
        *self.next_submit_error.write().await = Some(error);
    }

    /// Create `artifact` (and its parent directories) whenever a script
    /// whose file name contains `fragment` is submitted.
    pub async fn create_on_submit(&self, fragment: impl Into<String>, artifact: impl Into<PathBuf>) {
        self.on_submit
            .write()
            .await
            .push((fragment.into(), artifact.into()));
    }

    async fn current_load(&self) -> usize {
        let now = Instant::now();
        let mut running = self.running.write().await;
        running.retain(|end| *end > now);
        *self.base_load.read().await + running.len()
    }
}

#[async_trait]
impl Scheduler for MockScheduler {
    fn name(&self) -> &str {
        "mock"
    }

    async fn active_jobs(&self) -> Result<usize, SchedulerError> {
        *self.queries.write().await += 1;
        if let Some(err) = self.next_query_error.write().await.take() {
            return Err(err);
        }
        Ok(self.current_load().await)
    }

    async fn submit(&self, script: &Path) -> Result<(), SchedulerError> {
        if let Some(err) = self.next_submit_error.write().await.take() {
            return Err(err);
        }

        let load_at_submit = self.current_load().await;
        let now = Instant::now();
        let duration = *self.job_duration.read().await;
        if !duration.is_zero() {
            self.running.write().await.push(now + duration);
        }

        let file_name = script
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        for (fragment, artifact) in self.on_submit.read().await.iter() {
            if file_name.contains(fragment.as_str()) {
                if let Some(parent) = artifact.parent() {
                    let _ = tokio::fs::create_dir_all(parent).await;
                }
                let _ = tokio::fs::write(artifact, b"").await;
            }
        }

        self.submissions.write().await.push(RecordedSubmission {
            script: script.to_path_buf(),
            load_at_submit,
            submitted_at: now,
        });
        Ok(())
    }
}
