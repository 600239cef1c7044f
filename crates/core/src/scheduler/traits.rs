//! Trait definitions for the scheduler module.

use async_trait::async_trait;
use std::path::Path;

use super::error::SchedulerError;

/// A batch scheduler that accepts job scripts.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Returns the name of this scheduler implementation.
    fn name(&self) -> &str;

    /// Number of this user's jobs currently queued or running.
    async fn active_jobs(&self) -> Result<usize, SchedulerError>;

    /// Submits a job script. Fire-and-forget: no handle is returned and the
    /// job's outcome is only visible through the files it writes.
    async fn submit(&self, script: &Path) -> Result<(), SchedulerError>;
}
