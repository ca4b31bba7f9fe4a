use crate::error::AppError;
use async_trait::async_trait;
use std::path::Path;

/// Something that can turn an image into a textual description.
#[async_trait]
pub trait DescriptionProvider: Send + Sync {
    async fn describe(&self, path: &Path) -> Result<String, AppError>;

    fn name(&self) -> &str;
}
