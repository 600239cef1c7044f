use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tomoprep_core::mdoc::ParseOptions;
use tomoprep_core::pipeline::{parse_options, plan_run};
use tomoprep_core::{load_config, read_mdoc, validate_config, Config, Pipeline, SlurmScheduler};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(
    name = "tomoprep",
    about = "Tilt-series preprocessing on a SLURM cluster",
    version,
    propagate_version = true
)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, env = "TOMOPREP_CONFIG", default_value = "tomoprep.toml")]
    config: PathBuf,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every enabled stage for every metadata file
    Run,

    /// Validate the configuration and show which units a run would process
    Check,

    /// Parse one metadata file and print it as JSON
    Parse {
        /// Path to the .mdoc file
        mdoc: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.json);

    match execute(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so command output on stdout stays parseable.
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Returns `Ok(false)` when the command ran but something it processed failed.
async fn execute(cli: Cli) -> Result<bool> {
    match cli.command {
        Commands::Run => run(&cli.config).await,
        Commands::Check => check(&cli.config).await,
        Commands::Parse { mdoc } => parse(&cli.config, &mdoc).await,
    }
}

fn load(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;
    Ok(config)
}

async fn run(config_path: &Path) -> Result<bool> {
    let config = load(config_path)?;
    info!(version = VERSION, "Starting run");
    info!("Metadata directory: {:?}", config.paths.mdoc_directory);
    info!("Processing directory: {:?}", config.paths.processing_directory);

    let scheduler = Arc::new(SlurmScheduler::new(config.scheduler.clone()));
    let pipeline = Pipeline::new(Arc::new(config), scheduler);
    info!(stages = ?pipeline.plan(), "Enabled stages");

    let summary = pipeline.run().await.context("Run failed")?;
    Ok(!summary.has_failures())
}

async fn check(config_path: &Path) -> Result<bool> {
    let config = load(config_path)?;
    let plan = plan_run(&config)
        .await
        .context("Failed to plan the run")?;

    for unit in &plan.units {
        println!("{} -> {}", unit.source.display(), unit.unit.name());
    }
    for rejected in &plan.rejected {
        println!(
            "{} -> error: {}",
            rejected.source.display(),
            rejected.error.as_deref().unwrap_or("rejected")
        );
    }

    info!(
        units = plan.units.len(),
        rejected = plan.rejected.len(),
        "Configuration is valid"
    );
    Ok(plan.rejected.is_empty())
}

async fn parse(config_path: &Path, mdoc: &Path) -> Result<bool> {
    // Without a config file the metadata is parsed as written.
    let options = if config_path.exists() {
        parse_options(&load(config_path)?)
    } else {
        ParseOptions::default()
    };

    let series = read_mdoc(mdoc, &options)
        .await
        .with_context(|| format!("Failed to parse {:?}", mdoc))?;
    let json = serde_json::to_string_pretty(&series).context("Failed to serialize")?;
    println!("{}", json);
    Ok(true)
}
