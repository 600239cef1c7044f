//! Readiness gate: block until a stage's output artifact exists.
//!
//! External jobs report completion only by writing files, so stages that
//! depend on them poll the filesystem. Presence is the only signal; a
//! zero-byte or half-written file satisfies the gate.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::GateConfig;

/// Errors that can occur while waiting on an artifact.
#[derive(Debug, Error)]
pub enum GateError {
    /// The artifact did not appear within the configured deadline.
    #[error("Timed out after {waited_secs}s waiting for {artifact}")]
    Timeout { artifact: String, waited_secs: u64 },

    /// Existence check failed.
    #[error("I/O error while checking {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A file, or fixed set of files, a stage is expected to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageArtifact {
    File(PathBuf),
    AllOf(Vec<PathBuf>),
}

impl StageArtifact {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn all_of<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::AllOf(paths.into_iter().map(Into::into).collect())
    }

    pub fn paths(&self) -> &[PathBuf] {
        match self {
            Self::File(path) => std::slice::from_ref(path),
            Self::AllOf(paths) => paths,
        }
    }

    /// Whether every path of the artifact currently exists.
    pub async fn is_present(&self) -> Result<bool, GateError> {
        for path in self.paths() {
            if !exists(path).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl fmt::Display for StageArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::AllOf(paths) => {
                let shown: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
                write!(f, "[{}]", shown.join(", "))
            }
        }
    }
}

async fn exists(path: &Path) -> Result<bool, GateError> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|source| GateError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// How a successful wait went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateOutcome {
    /// False when the artifact was already there on the first check.
    pub waited: bool,
    pub elapsed: Duration,
}

/// Polls for artifacts with a fixed interval and an optional deadline.
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    poll_interval: Duration,
    timeout: Option<Duration>,
}

impl ReadinessGate {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            timeout: None,
        }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(Duration::from_millis(config.poll_interval_ms))
            .with_timeout(config.timeout_secs.map(Duration::from_secs))
    }

    /// Sets the deadline. `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Waits until `artifact` exists.
    ///
    /// Returns as soon as a check finds every path present. The first failed
    /// check logs one "waiting" notice for `unit`; later polls are silent.
    pub async fn wait(
        &self,
        unit: &str,
        waiter: &str,
        artifact: &StageArtifact,
    ) -> Result<GateOutcome, GateError> {
        let started = Instant::now();
        let mut notified = false;

        loop {
            if artifact.is_present().await? {
                if notified {
                    debug!(unit, %artifact, "{} dependency ready", waiter);
                }
                return Ok(GateOutcome {
                    waited: notified,
                    elapsed: started.elapsed(),
                });
            }

            if !notified {
                info!(unit, "{} is waiting for {}", waiter, artifact);
                notified = true;
            }

            let mut pause = self.poll_interval;
            if let Some(timeout) = self.timeout {
                let elapsed = started.elapsed();
                if elapsed >= timeout {
                    return Err(GateError::Timeout {
                        artifact: artifact.to_string(),
                        waited_secs: elapsed.as_secs(),
                    });
                }
                pause = pause.min(timeout - elapsed);
            }
            tokio::time::sleep(pause).await;
        }
    }
}
