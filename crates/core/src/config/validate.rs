use super::{types::Config, ConfigError};

/// Validate configuration
///
/// Serde already enforces the required sections (`paths`, `acquisition`).
/// This checks the cross-field rules and that every enabled stage has the
/// keys its job script needs.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let file_type = &config.acquisition.file_type;
    if file_type.is_empty() {
        return invalid("acquisition.file_type cannot be empty");
    }
    if file_type.starts_with('.') {
        return invalid("acquisition.file_type must not start with a dot");
    }
    if config.acquisition.metadata_extension.is_empty() {
        return invalid("acquisition.metadata_extension cannot be empty");
    }

    let scheduler = &config.scheduler;
    if scheduler.max_jobs == 0 {
        return invalid("scheduler.max_jobs cannot be 0");
    }
    if scheduler.min_backoff_ms > scheduler.max_backoff_ms {
        return invalid("scheduler.min_backoff_ms cannot exceed scheduler.max_backoff_ms");
    }
    if scheduler.launch_stagger_min_ms > scheduler.launch_stagger_max_ms {
        return invalid(
            "scheduler.launch_stagger_min_ms cannot exceed scheduler.launch_stagger_max_ms",
        );
    }
    if config.gate.poll_interval_ms == 0 {
        return invalid("gate.poll_interval_ms cannot be 0");
    }

    let stages = &config.stages;
    if stages.motion_correction {
        require(config.templates.motioncorr.is_some(), "templates.motioncorr")?;
        require(config.modules.relion.is_some(), "modules.relion")?;
        require(config.microscope.pixel_size.is_some(), "microscope.pixel_size")?;
        require(config.microscope.voltage.is_some(), "microscope.voltage")?;
        require(config.microscope.frame_dose.is_some(), "microscope.frame_dose")?;
    }
    if stages.aretomo_alignment {
        require(config.templates.aretomo.is_some(), "templates.aretomo")?;
        require(config.modules.aretomo.is_some(), "modules.aretomo")?;
    }
    if stages.ctf_estimation {
        require(config.templates.ctffind.is_some(), "templates.ctffind")?;
        require(config.modules.ctffind.is_some(), "modules.ctffind")?;
        require(
            config.ctffind.lowest_defocus_search.is_some(),
            "ctffind.lowest_defocus_search",
        )?;
        require(
            config.ctffind.highest_defocus_search.is_some(),
            "ctffind.highest_defocus_search",
        )?;
    }
    if stages.relion_tomo_import {
        require(config.templates.import.is_some(), "templates.import")?;
        require(config.microscope.frame_dose.is_some(), "microscope.frame_dose")?;
    }
    if stages.relion_tomogram_reconstruction {
        require(config.templates.reconstruct.is_some(), "templates.reconstruct")?;
    }

    Ok(())
}

fn require(present: bool, key: &str) -> Result<(), ConfigError> {
    if present {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(format!(
            "{} is required by an enabled stage",
            key
        )))
    }
}

fn invalid(reason: &str) -> Result<(), ConfigError> {
    Err(ConfigError::ValidationError(reason.to_string()))
}
