use crate::config::AppConfig;
use crate::error::AppError;
use crate::metadata;
use crate::provider::DescriptionProvider;
use crate::walker;
use std::path::{Path, PathBuf};

/// Pass/fail tally for one run over a set of images.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn record(&mut self, ok: bool) {
        self.total += 1;
        if ok {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn log(&self) {
        log::info!("Summary:");
        log::info!("  Success: {}/{}", self.succeeded, self.total);
        log::info!("  Failed:  {}/{}", self.failed, self.total);
    }
}

pub struct Processor<'a> {
    config: &'a AppConfig,
    provider: &'a dyn DescriptionProvider,
}

impl<'a> Processor<'a> {
    pub fn new(config: &'a AppConfig, provider: &'a dyn DescriptionProvider) -> Self {
        Self { config, provider }
    }

    /// Describes a single file or every supported image directly inside a folder.
    pub async fn run(&self, path: &Path) -> Result<BatchSummary, AppError> {
        if path.is_file() {
            return Ok(self.process_paths(vec![path.to_path_buf()]).await);
        }
        self.process_folder(path).await
    }

    pub async fn process_folder(&self, folder: &Path) -> Result<BatchSummary, AppError> {
        log::info!("Starting image processing in {:?} with {}", folder, self.provider.name());

        let paths = walker::list_images(folder, &self.config.supported_extensions)?;
        if paths.is_empty() {
            log::info!("No images found in '{}'", folder.display());
            return Ok(BatchSummary::default());
        }

        log::info!("Found {} images to process", paths.len());
        Ok(self.process_paths(paths).await)
    }

    async fn process_paths(&self, paths: Vec<PathBuf>) -> BatchSummary {
        let total = paths.len();
        let mut summary = BatchSummary::default();

        for (idx, path) in paths.iter().enumerate() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            log::info!("[{}/{}] Processing: {}", idx + 1, total, name);

            match self.process_image(path).await {
                Ok(location) => {
                    log::debug!("Stored description for {:?} in {}", path, location);
                    summary.record(true);
                }
                Err(e) => {
                    // One bad file never stops the batch.
                    log::warn!("  Error processing {}: {}", name, e);
                    summary.record(false);
                }
            }
        }

        log::info!("Processing complete!");
        summary.log();
        summary
    }

    async fn process_image(&self, path: &Path) -> Result<metadata::MetadataLocation, AppError> {
        let description = self.provider.describe(path).await?;
        log::info!("  Description: {}", description);
        let location = metadata::write_description(path, &description)?;
        if metadata::read_description(path) != description {
            log::warn!("  Read-back of {:?} does not match what was written", path);
        }
        Ok(location)
    }
}
