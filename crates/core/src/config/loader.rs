use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides.
///
/// Nested keys are addressed with a double underscore, e.g.
/// `TOMOPREP_SCHEDULER__MAX_JOBS=40`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("TOMOPREP_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[paths]
mdoc_directory = "/data/frames"
processing_directory = "/data/processing"

[acquisition]
file_type = "mrc"
"#;

    #[test]
    fn test_load_config_from_str_valid() {
        let config = load_config_from_str(MINIMAL).unwrap();
        assert_eq!(config.acquisition.file_type, "mrc");
        assert_eq!(config.scheduler.max_jobs, 20);
    }

    #[test]
    fn test_load_config_from_str_missing_paths() {
        let toml = r#"
[acquisition]
file_type = "mrc"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/tomoprep.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    // Env overrides are process-wide, so every test that reads them from
    // `load_config` runs inside a `Jail`.
    #[test]
    fn test_load_config_from_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "tomoprep.toml",
                &format!("{MINIMAL}\n[scheduler]\nmax_jobs = 5\n"),
            )?;

            let config = load_config(Path::new("tomoprep.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.scheduler.max_jobs, 5);
            assert_eq!(
                config.paths.processing_directory.to_str().unwrap(),
                "/data/processing"
            );
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_nested_keys() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "tomoprep.toml",
                &format!("{MINIMAL}\n[scheduler]\nmax_jobs = 5\n"),
            )?;
            jail.set_env("TOMOPREP_SCHEDULER__MAX_JOBS", "40");
            jail.set_env("TOMOPREP_ACQUISITION__OVERRIDE_MARKER", "_skip");

            let config = load_config(Path::new("tomoprep.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.scheduler.max_jobs, 40);
            assert_eq!(config.acquisition.override_marker, "_skip");
            assert_eq!(config.acquisition.file_type, "mrc");
            Ok(())
        });
    }

    #[test]
    fn test_env_override_with_bad_type_is_parse_error() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("tomoprep.toml", MINIMAL)?;
            jail.set_env("TOMOPREP_SCHEDULER__MAX_JOBS", "many");

            let result = load_config(Path::new("tomoprep.toml"));
            assert!(matches!(result, Err(ConfigError::ParseError(_))));
            Ok(())
        });
    }
}
