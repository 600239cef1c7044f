//! SLURM scheduler backend.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use super::error::SchedulerError;
use super::traits::Scheduler;
use crate::config::SchedulerConfig;

static SUBMITTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Submitted batch job (\d+)").expect("valid regex"));

/// Talks to SLURM through its command-line tools.
pub struct SlurmScheduler {
    config: SchedulerConfig,
}

impl SlurmScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    /// Creates a scheduler using `sbatch` and `squeue` from `PATH`.
    pub fn with_defaults() -> Self {
        Self::new(SchedulerConfig::default())
    }

    /// Arguments for the queue listing: headerless, restricted to our jobs.
    fn queue_args(&self) -> Vec<String> {
        let mut args = vec!["--noheader".to_string()];
        match &self.config.user {
            Some(user) => args.extend(["-u".to_string(), user.clone()]),
            None => args.push("--me".to_string()),
        }
        args
    }

    fn count_jobs(stdout: &str) -> usize {
        stdout.lines().filter(|line| !line.trim().is_empty()).count()
    }
}

#[async_trait]
impl Scheduler for SlurmScheduler {
    fn name(&self) -> &str {
        "slurm"
    }

    async fn active_jobs(&self) -> Result<usize, SchedulerError> {
        let output = Command::new(&self.config.queue_command)
            .args(self.queue_args())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| SchedulerError::launch(&self.config.queue_command, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SchedulerError::query_failed(format!(
                "{} exited with {}: {}",
                self.config.queue_command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(Self::count_jobs(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn submit(&self, script: &Path) -> Result<(), SchedulerError> {
        let output = Command::new(&self.config.submit_command)
            .arg(script)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| SchedulerError::launch(&self.config.submit_command, e))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            warn!(
                script = %script.display(),
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "Submit command reported failure"
            );
        } else if let Some(caps) = SUBMITTED.captures(&stdout) {
            debug!(script = %script.display(), job_id = &caps[1], "Job accepted");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_args_default_to_me() {
        let scheduler = SlurmScheduler::with_defaults();
        assert_eq!(scheduler.queue_args(), vec!["--noheader", "--me"]);
    }

    #[test]
    fn test_queue_args_with_user() {
        let scheduler = SlurmScheduler::new(SchedulerConfig {
            user: Some("fbi12345".to_string()),
            ..Default::default()
        });
        assert_eq!(scheduler.queue_args(), vec!["--noheader", "-u", "fbi12345"]);
    }

    #[test]
    fn test_count_jobs_ignores_blank_lines() {
        let out = "  123 cs05r motioncorr u R 0:01 1 node1\n  124 cs05r aretomo u PD 0:00 1 (Priority)\n\n";
        assert_eq!(SlurmScheduler::count_jobs(out), 2);
        assert_eq!(SlurmScheduler::count_jobs(""), 0);
    }

    #[tokio::test]
    async fn test_missing_submit_command_is_launch_error() {
        let scheduler = SlurmScheduler::new(SchedulerConfig {
            submit_command: "/nonexistent/sbatch".to_string(),
            ..Default::default()
        });
        let err = scheduler.submit(Path::new("job.sh")).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Launch { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_active_jobs_counts_queue_lines() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("squeue");
        std::fs::write(&fake, "#!/bin/sh\nprintf '1 a\\n2 b\\n3 c\\n'\n").unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let scheduler = SlurmScheduler::new(SchedulerConfig {
            queue_command: fake.to_string_lossy().to_string(),
            ..Default::default()
        });
        assert_eq!(scheduler.active_jobs().await.unwrap(), 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_queue_query() {
        let scheduler = SlurmScheduler::new(SchedulerConfig {
            queue_command: "false".to_string(),
            ..Default::default()
        });
        let err = scheduler.active_jobs().await.unwrap_err();
        assert!(matches!(err, SchedulerError::QueryFailed { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_submit_passes_script_path() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("submitted.txt");
        let fake = dir.path().join("sbatch");
        std::fs::write(
            &fake,
            format!(
                "#!/bin/sh\necho \"$1\" >> {}\necho 'Submitted batch job 42'\n",
                log.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let scheduler = SlurmScheduler::new(SchedulerConfig {
            submit_command: fake.to_string_lossy().to_string(),
            ..Default::default()
        });
        scheduler
            .submit(Path::new("/proc/unit/motioncorr_slurm_unit.sh"))
            .await
            .unwrap();
        let logged = std::fs::read_to_string(&log).unwrap();
        assert_eq!(logged.trim(), "/proc/unit/motioncorr_slurm_unit.sh");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rejected_submission_is_not_retried() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("submitted.txt");
        let fake = dir.path().join("sbatch");
        std::fs::write(
            &fake,
            format!(
                "#!/bin/sh\necho \"$1\" >> {}\necho 'sbatch: error: invalid partition' >&2\nexit 1\n",
                log.display()
            ),
        )
        .unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();

        let scheduler = SlurmScheduler::new(SchedulerConfig {
            submit_command: fake.to_string_lossy().to_string(),
            ..Default::default()
        });
        let result = scheduler
            .submit(Path::new("/proc/unit/aretomo_slurm_unit.sh"))
            .await;
        tokio_test::assert_ok!(result);

        let logged = std::fs::read_to_string(&log).unwrap();
        assert_eq!(logged.lines().count(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_submit_exit_is_ok() {
        let scheduler = SlurmScheduler::new(SchedulerConfig {
            submit_command: "false".to_string(),
            ..Default::default()
        });
        tokio_test::assert_ok!(scheduler.submit(Path::new("job.sh")).await);
    }
}
