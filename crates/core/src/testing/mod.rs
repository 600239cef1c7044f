//! Testing utilities and a mock scheduler for end-to-end tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use tomoprep_core::testing::{fixtures, MockScheduler};
//!
//! let mut config = fixtures::config(root.path());
//! fixtures::install_templates(&mut config, root.path());
//! let scheduler = MockScheduler::new();
//! let pipeline = Pipeline::new(Arc::new(config), Arc::new(scheduler.clone()));
//! ```

mod mock_scheduler;

pub use mock_scheduler::{MockScheduler, RecordedSubmission};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::fmt::Write;
    use std::path::Path;

    use crate::config::{Config, Param};

    /// A configuration rooted at `root` with every stage disabled and fast
    /// timings. Metadata is read from `root/frames`, units land in
    /// `root/proc`.
    pub fn config(root: &Path) -> Config {
        let mut config = Config::default();
        config.paths.mdoc_directory = root.join("frames");
        config.paths.processing_directory = root.join("proc");
        config.acquisition.file_type = "mrc".to_string();

        config.scheduler.max_jobs = 4;
        config.scheduler.min_backoff_ms = 5;
        config.scheduler.max_backoff_ms = 15;
        config.scheduler.launch_stagger_min_ms = 0;
        config.scheduler.launch_stagger_max_ms = 5;
        config.scheduler.capacity_timeout_secs = Some(10);

        config.gate.poll_interval_ms = 10;
        config.gate.settle_ms = 0;
        config.gate.timeout_secs = Some(10);

        config.modules.relion = Some("relion/5.0".to_string());
        config.modules.imod = Some("imod".to_string());
        config.modules.aretomo = Some("aretomo/1.3".to_string());
        config.modules.ctffind = Some("ctffind/4.1".to_string());
        config.cluster.partition = Some("test".to_string());
        config.microscope.pixel_size = Some(Param::Float(1.63));
        config.microscope.voltage = Some(Param::Integer(300));
        config.microscope.cs = Some(Param::Float(2.7));
        config.microscope.q0 = Some(Param::Float(0.1));
        config.microscope.frame_dose = Some(0.25);
        config.ctffind.lowest_defocus_search = Some(-0.5);
        config.ctffind.highest_defocus_search = Some(-8.0);
        config
    }

    /// Mdoc text for `image_file` with one section per `(angle, frames)`
    /// pair, in the given order. Sub-frame names are `<stem>_<z>_Fractions.tiff`.
    pub fn mdoc_text(image_file: &str, tilts: &[(f64, u32)]) -> String {
        let stem = image_file.split('.').next().unwrap_or(image_file);
        let mut text = format!(
            "PixelSpacing = 1.63\nVoltage = 300\nImageFile = {}\nImageSize = 4096 4096\n\n[T = SerialEM: Tilt series]\n\nTiltAxisAngle = 85.3\n",
            image_file
        );
        for (z, (angle, frames)) in tilts.iter().enumerate() {
            let _ = write!(
                text,
                "\n[ZValue = {z}]\nTiltAngle = {angle:.2}\nExposureTime = 1.2\nSubFramePath = X:\\Data\\{stem}_{z}_Fractions.tiff\nNumSubFrames = {frames}\n"
            );
        }
        text
    }

    /// Writes minimal job-script templates under `dir/templates` and points
    /// every stage of `config` at them.
    pub fn install_templates(config: &mut Config, dir: &Path) {
        let templates = dir.join("templates");
        std::fs::create_dir_all(&templates).expect("create template directory");

        let unit_template = "#!/bin/bash\n#SBATCH -p {partition}\ncd {position_directory}\necho {position_prefix}\n";
        let write = |name: &str, body: &str| {
            let path = templates.join(name);
            std::fs::write(&path, body).expect("write template");
            path
        };

        config.templates.motioncorr = Some(write("motioncorr.sh", unit_template));
        config.templates.aretomo = Some(write("aretomo.sh", unit_template));
        config.templates.ctffind = Some(write("ctffind.sh", unit_template));
        config.templates.reconstruct = Some(write("reconstruct.sh", unit_template));
        config.templates.import = Some(write(
            "import.sh",
            "#!/bin/bash\n#SBATCH -p {partition}\ncd {relion_directory}\n",
        ));
    }
}
