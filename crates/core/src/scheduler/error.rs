//! Error types for the scheduler module.

use thiserror::Error;

/// Errors that can occur while talking to the cluster scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The scheduler command could not be started.
    #[error("Failed to launch '{command}'")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The queue query ran but reported failure.
    #[error("Queue query failed: {reason}")]
    QueryFailed { reason: String },

    /// Queue capacity did not free up within the configured deadline.
    #[error("Gave up after {waited_secs}s waiting for scheduler capacity")]
    CapacityTimeout { waited_secs: u64 },
}

impl SchedulerError {
    /// Creates a launch error for `command`.
    pub fn launch(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::Launch {
            command: command.into(),
            source,
        }
    }

    /// Creates a query failed error.
    pub fn query_failed(reason: impl Into<String>) -> Self {
        Self::QueryFailed {
            reason: reason.into(),
        }
    }
}
