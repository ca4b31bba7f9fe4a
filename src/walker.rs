use crate::error::AppError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Returns true when the file extension is in `allowed_extensions` (lowercase, no dot).
pub fn has_allowed_extension(path: &Path, allowed_extensions: &HashSet<String>) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| allowed_extensions.contains(&ext.to_lowercase()))
        .unwrap_or(false)
}

/// Lists supported images directly inside `folder`, sorted by path.
pub fn list_images(
    folder: &Path,
    allowed_extensions: &HashSet<String>,
) -> Result<Vec<PathBuf>, AppError> {
    log::debug!("Starting file discovery in {:?}", folder);
    log::debug!("Configured allowed extensions: {:?}", allowed_extensions);

    if !folder.is_dir() {
        return Err(AppError::NotFound(format!(
            "Folder '{}' does not exist",
            folder.display()
        )));
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                // e.g. a dangling symlink; the rest of the folder is still listed
                log::warn!("Skipping unreadable entry in {:?}: {}", folder, e);
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() {
            log::trace!("Skipping non-file entry: {:?}", path);
            continue;
        }
        if has_allowed_extension(path, allowed_extensions) {
            log::trace!("Discovered image: {:?}", path);
            images.push(path.to_path_buf());
        } else {
            log::trace!("Skipping file due to unsupported extension: {:?}", path);
        }
    }

    images.sort();
    log::debug!("File discovery complete, {} images found.", images.len());
    Ok(images)
}
