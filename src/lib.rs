pub mod artifact;
pub mod builder;
pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod phase;
pub mod pipeline;
pub mod sanitize;
pub mod state;
pub mod ui;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{FmtSubscriber, filter::LevelFilter};

use crate::artifact::BuildArtifact;
use crate::builder::Capabilities;

pub fn init_logging(log_level: cli::LogLevel) -> Result<()> {
    let filter = match log_level {
        cli::LogLevel::Trace => LevelFilter::TRACE,
        cli::LogLevel::Debug => LevelFilter::DEBUG,
        cli::LogLevel::Info => LevelFilter::INFO,
        cli::LogLevel::Warn => LevelFilter::WARN,
        cli::LogLevel::Error => LevelFilter::ERROR,
    };

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder().with_max_level(filter).finish(),
    )
    .context("failed to set global default tracing subscriber")
}

/// Loads and validates the build file, then runs the build against `caps`.
///
/// `--force` on the command line overrides `force: false` in the file.
pub fn run_build(opts: &cli::BuildArgs, caps: Capabilities) -> Result<BuildArtifact> {
    let mut config = config::load_config(opts.file.as_path())
        .with_context(|| format!("failed to load build file from {}", opts.file))?;
    config.force |= opts.force;
    config.validate().context("build file validation failed")?;

    info!("starting build of VM {}", config.location.vm_path());
    let artifact = builder::run_pipeline(&config, caps)?;
    Ok(artifact)
}

pub fn run_validate(opts: &cli::ValidateArgs) -> Result<()> {
    let config = config::load_config(opts.file.as_path())?;
    config.validate().context("build file validation failed")?;
    info!("validation successful:\n{:#?}", config);
    Ok(())
}
