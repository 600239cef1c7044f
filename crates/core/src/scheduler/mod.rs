//! Cluster scheduler access and admission control.
//!
//! The scheduler is an external service with two operations: submit a job
//! script, and report how many of our jobs are queued or running. The
//! [`Scheduler`] trait models exactly that; [`SlurmScheduler`] implements it
//! with `sbatch`/`squeue`.
//!
//! [`AdmissionController`] sits in front of it and enforces the configured
//! job ceiling. The ceiling is soft: load is a point-in-time snapshot, so
//! units that poll at the same instant may all see capacity and all submit.
//!
//! # Example
//!
//! ```ignore
//! use tomoprep_core::scheduler::{AdmissionController, SlurmScheduler};
//!
//! let scheduler = Arc::new(SlurmScheduler::new(config.scheduler.clone()));
//! let admission = AdmissionController::from_config(scheduler, &config.scheduler);
//!
//! let record = admission
//!     .submit("Position_1_3", Stage::MotionCorrection, &script_path)
//!     .await?;
//! println!("submitted {} at {}", record.script.display(), record.submitted_at);
//! ```

mod admission;
mod error;
mod slurm;
mod traits;

pub use admission::{AdmissionController, SubmissionRecord};
pub use error::SchedulerError;
pub use slurm::SlurmScheduler;
pub use traits::Scheduler;
