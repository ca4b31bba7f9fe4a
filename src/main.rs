mod checker;
mod config;
mod error;
mod logging;
mod metadata;
mod processor;
mod provider;
mod providers;
mod walker;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::processor::Processor;
use crate::providers::mistral::MistralVisionProvider;
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "image_describer")]
#[command(about = "Describe images with a vision model and store the text in their metadata")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override the configured log level
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Do not write a run log under the log folder
    #[arg(long, global = true)]
    no_log_file: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate descriptions and write them into image metadata
    Describe {
        /// Image file or folder; defaults to the configured IMAGE_FOLDER
        path: Option<PathBuf>,
    },

    /// Read back stored descriptions
    Check {
        /// Image file or folder; defaults to the configured IMAGE_FOLDER
        path: Option<PathBuf>,
    },
}

/// Resolves the folder to describe and builds the provider, failing on missing settings.
fn prepare_describe(
    config: &AppConfig,
    path: Option<PathBuf>,
) -> Result<(PathBuf, MistralVisionProvider), AppError> {
    let target = match path {
        Some(path) => path,
        None => config.default_folder()?,
    };
    let provider = MistralVisionProvider::new(config)?;
    Ok((target, provider))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::new()?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    match cli.command {
        Commands::Describe { path } => {
            if cli.no_log_file {
                config.log_to_file = false;
            }
            // Settings are validated before the run log is opened.
            let (target, provider) = prepare_describe(&config, path)?;
            let run_log = logging::init(&config)?;
            info!("Starting image_describer");

            let result = Processor::new(&config, &provider).run(&target).await;

            if let Err(e) = &result {
                log::error!("Error: {}", e);
            }
            logging::finish(run_log.as_deref());
            result?;
        }
        Commands::Check { path } => {
            // Checking is read-only and prints its own report.
            config.log_to_file = false;
            logging::init(&config)?;

            let target = match path {
                Some(path) => path,
                None => {
                    println!("No path specified. Checking default folder...");
                    config.default_folder()?
                }
            };
            checker::run(&target, &config.supported_extensions)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_settings_fail_before_any_run_log() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::for_tests();
        config.log_to_file = true;
        config.log_folder = dir.path().join("logs").to_string_lossy().into_owned();

        let err = prepare_describe(&config, None).err().unwrap();
        assert!(matches!(err, AppError::MissingSetting(_)));

        let err = prepare_describe(&config, Some(dir.path().to_path_buf()))
            .err()
            .unwrap();
        assert!(matches!(err, AppError::MissingSetting(_)));
        assert!(!dir.path().join("logs").exists());
    }

    #[test]
    fn explicit_path_wins_over_configured_folder() {
        let mut config = AppConfig::for_tests();
        config.mistral_api_key = Some("key".into());
        config.image_folder = Some("/configured".into());

        let (target, _) = prepare_describe(&config, Some(PathBuf::from("/given"))).unwrap();
        assert_eq!(target, PathBuf::from("/given"));
        let (target, _) = prepare_describe(&config, None).unwrap();
        assert_eq!(target, PathBuf::from("/configured"));
    }
}
