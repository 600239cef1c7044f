//! Metadata discovery and run planning.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use super::types::{PipelineError, UnitReport};
use crate::config::Config;
use crate::mdoc::{read_mdoc, ParseOptions, SubframeRename, TiltSeries};
use crate::work_unit::{IdentityResolver, NameRegistry, WorkUnit};

/// Lists the metadata files in `directory`: regular files ending in
/// `.<extension>` whose name does not contain `override_marker`, sorted by
/// name.
pub async fn discover_metadata(
    directory: &Path,
    extension: &str,
    override_marker: &str,
) -> Result<Vec<PathBuf>, PipelineError> {
    let discovery_err = |source: std::io::Error| PipelineError::Discovery {
        path: directory.to_path_buf(),
        source,
    };

    let suffix = format!(".{}", extension);
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(directory).await.map_err(discovery_err)?;
    while let Some(entry) = entries.next_entry().await.map_err(discovery_err)? {
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.ends_with(&suffix) {
            continue;
        }
        if !override_marker.is_empty() && name.contains(override_marker) {
            info!(file = %name, "Skipping override metadata file");
            continue;
        }
        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file() || t.is_symlink())
            .unwrap_or(false);
        if is_file {
            files.push(entry.path());
        }
    }

    files.sort();
    Ok(files)
}

/// A metadata file that parsed and resolved to a unique work unit.
#[derive(Debug, Clone)]
pub struct PlannedUnit {
    pub source: PathBuf,
    pub unit: WorkUnit,
    pub series: Arc<TiltSeries>,
}

/// Result of planning: units ready to run, and files rejected up front.
#[derive(Debug, Default)]
pub struct RunPlan {
    pub units: Vec<PlannedUnit>,
    pub rejected: Vec<UnitReport>,
}

/// Parse options implied by the configuration.
pub fn parse_options(config: &Config) -> ParseOptions {
    let options = ParseOptions::default();
    if config.acquisition.modify_subframe_path {
        options.with_rename(SubframeRename::fractions_casing())
    } else {
        options
    }
}

/// Identity resolver implied by the configuration.
pub fn identity_resolver(config: &Config) -> IdentityResolver {
    IdentityResolver::new(
        config.acquisition.file_type.clone(),
        config.paths.processing_directory.clone(),
    )
    .strict(config.acquisition.strict_suffix)
}

/// Discovers, parses and resolves every metadata file before anything is
/// written. Files that fail, and later files claiming an already-used
/// name, end up in [`RunPlan::rejected`].
pub async fn plan_run(config: &Config) -> Result<RunPlan, PipelineError> {
    let files = discover_metadata(
        &config.paths.mdoc_directory,
        &config.acquisition.metadata_extension,
        &config.acquisition.override_marker,
    )
    .await?;
    info!(count = files.len(), "Discovered metadata files");

    let options = parse_options(config);
    let resolver = identity_resolver(config);
    let mut registry = NameRegistry::new();
    let mut plan = RunPlan::default();

    for source in files {
        match plan_one(&source, &options, &resolver, &mut registry).await {
            Ok(planned) => plan.units.push(planned),
            Err((unit, e)) => {
                warn!(file = %source.display(), error = %e, "Metadata file rejected");
                plan.rejected.push(UnitReport::rejected(source, unit, &e));
            }
        }
    }

    Ok(plan)
}

async fn plan_one(
    source: &Path,
    options: &ParseOptions,
    resolver: &IdentityResolver,
    registry: &mut NameRegistry,
) -> Result<PlannedUnit, (Option<String>, PipelineError)> {
    let series = read_mdoc(source, options)
        .await
        .map_err(|e| (None, e.into()))?;
    let unit = resolver
        .resolve(&series.header)
        .map_err(|e| (None, e.into()))?;
    registry
        .claim(&unit)
        .map_err(|e| (Some(unit.name().to_string()), e.into()))?;

    Ok(PlannedUnit {
        source: source.to_path_buf(),
        unit,
        series: Arc::new(series),
    })
}
