use crate::error::AppError;
use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;

/// Environment variables read on top of the config files, and the key each one sets.
const ENV_OVERRIDES: [(&str, &str); 8] = [
    ("MISTRAL_API_KEY", "mistral_api_key"),
    ("MISTRAL_MODEL", "mistral_model"),
    ("MISTRAL_API_URL", "mistral_api_url"),
    ("MISTRAL_PROMPT", "mistral_prompt"),
    ("IMAGE_FOLDER", "image_folder"),
    ("LOG_FOLDER", "log_folder"),
    ("LOG_TO_FILE", "log_to_file"),
    ("LOG_LEVEL", "log_level"),
];

pub const DEFAULT_PROMPT: &str = "Describe this image in detail. Do not include 'this image shows' type of words in the beginning. just straight up description.";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub mistral_api_key: Option<String>,
    pub mistral_model: String,
    pub mistral_api_url: String,
    pub mistral_prompt: String,
    pub image_folder: Option<String>,
    pub supported_extensions: HashSet<String>,
    pub log_folder: String,
    pub log_to_file: bool,
    pub log_level: String,
}

impl AppConfig {
    pub fn new() -> Result<Self, AppError> {
        Self::load(|name| std::env::var(name).ok())
    }

    /// Builds the layered config, taking environment values from `lookup`.
    fn load(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let env = lookup("RUN_MODE").unwrap_or_else(|| "development".into());

        let mut builder = Self::defaults()?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false));
        for (var, key) in ENV_OVERRIDES {
            if let Some(value) = lookup(var) {
                builder = builder.set_override(key, value)?;
            }
        }

        let mut config: AppConfig = builder.build()?.try_deserialize()?;
        config.normalize();
        Ok(config)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("mistral_model", "mistral-small-latest")?
            .set_default(
                "mistral_api_url",
                "https://api.mistral.ai/v1/chat/completions",
            )?
            .set_default("mistral_prompt", DEFAULT_PROMPT)?
            .set_default("supported_extensions", vec!["jpg", "jpeg", "png", "webp"])?
            .set_default("log_folder", "logs")?
            .set_default("log_to_file", true)?
            .set_default("log_level", "info")
    }

    // Extensions are matched lowercase and without the leading dot.
    fn normalize(&mut self) {
        self.supported_extensions = self
            .supported_extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .collect();
        if matches!(self.mistral_api_key.as_deref(), Some(key) if key.trim().is_empty()) {
            self.mistral_api_key = None;
        }
    }

    pub fn api_key(&self) -> Result<&str, AppError> {
        self.mistral_api_key.as_deref().ok_or_else(|| {
            AppError::MissingSetting(
                "MISTRAL_API_KEY not found in environment variables or config files".into(),
            )
        })
    }

    /// Folder used when no path is given on the command line.
    pub fn default_folder(&self) -> Result<PathBuf, AppError> {
        self.image_folder
            .as_deref()
            .filter(|folder| !folder.trim().is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| {
                AppError::MissingSetting(
                    "IMAGE_FOLDER not found in environment variables or config files".into(),
                )
            })
    }
}

#[cfg(test)]
impl AppConfig {
    pub fn for_tests() -> Self {
        let mut config: AppConfig = Self::defaults()
            .and_then(|b| b.build())
            .and_then(|s| s.try_deserialize())
            .expect("defaults deserialize");
        config.log_to_file = false;
        config
    }
}
