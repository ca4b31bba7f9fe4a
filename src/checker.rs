//! Verifies that descriptions were actually stored.

use crate::error::AppError;
use crate::metadata::{self, png_text, ImageFormat, MetadataLocation};
use crate::processor::BatchSummary;
use crate::walker;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

const RULE_WIDTH: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckReport {
    Found {
        location: MetadataLocation,
        description: String,
        user_comment: Option<String>,
        /// Every PNG text entry, in file order. Empty for other formats.
        text_entries: Vec<(String, String)>,
    },
    Missing {
        location: MetadataLocation,
    },
    NotFound(PathBuf),
    Error(String),
}

impl CheckReport {
    pub fn is_found(&self) -> bool {
        matches!(self, CheckReport::Found { .. })
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckReport::Found {
                location,
                description,
                user_comment,
                text_entries,
            } => {
                write!(f, "FOUND DESCRIPTION ({}):\n   {}", location, description)?;
                if let Some(comment) = user_comment {
                    write!(f, "\nFOUND USER COMMENT (EXIF):\n   {}", comment)?;
                }
                if !text_entries.is_empty() {
                    write!(f, "\nPNG text entries:")?;
                    for (key, value) in text_entries {
                        write!(f, "\n   {}: {}", key, value)?;
                    }
                }
                Ok(())
            }
            CheckReport::Missing {
                location: MetadataLocation::Sidecar(path),
            } => write!(f, "No sidecar file found: {}", path.display()),
            CheckReport::Missing {
                location: MetadataLocation::Exif,
            } => write!(f, "No 'ImageDescription' found in EXIF 0th IFD."),
            CheckReport::Missing {
                location: MetadataLocation::PngText,
            } => write!(f, "No description found in PNG text chunks."),
            CheckReport::NotFound(path) => write!(f, "File not found: {}", path.display()),
            CheckReport::Error(message) => write!(f, "Error reading metadata: {}", message),
        }
    }
}

fn inspect(path: &Path) -> Result<CheckReport, AppError> {
    let location = MetadataLocation::for_path(path);
    let description = match metadata::try_read_description(path)? {
        Some(description) => description,
        None => return Ok(CheckReport::Missing { location }),
    };

    let user_comment = metadata::read_user_comment(path)?;
    let text_entries = if ImageFormat::from_path(path) == ImageFormat::Png {
        png_text::text_entries(path)?
    } else {
        Vec::new()
    };

    Ok(CheckReport::Found {
        location,
        description,
        user_comment,
        text_entries,
    })
}

/// Reads back whatever description is stored for `path`.
pub fn check_image(path: &Path) -> CheckReport {
    if !path.exists() {
        return CheckReport::NotFound(path.to_path_buf());
    }
    inspect(path).unwrap_or_else(|e| CheckReport::Error(e.to_string()))
}

fn print_report(path: &Path, report: &CheckReport) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    println!("\n{}", "=".repeat(RULE_WIDTH));
    println!("Checking: {}", name);
    println!("{}", "=".repeat(RULE_WIDTH));
    println!("{}", report);
}

/// Checks one file and prints its report.
pub fn check_file(path: &Path) -> BatchSummary {
    let report = check_image(path);
    print_report(path, &report);
    let mut summary = BatchSummary::default();
    summary.record(report.is_found());
    summary
}

/// Checks every supported image in `folder` and prints a report per file plus a summary.
pub fn check_folder(
    folder: &Path,
    allowed_extensions: &HashSet<String>,
) -> Result<BatchSummary, AppError> {
    let paths = walker::list_images(folder, allowed_extensions)?;
    let mut summary = BatchSummary::default();
    if paths.is_empty() {
        println!("No images found in '{}'", folder.display());
        return Ok(summary);
    }

    println!("\n{}", "#".repeat(RULE_WIDTH));
    println!("Checking {} images in: {}", paths.len(), folder.display());
    println!("{}", "#".repeat(RULE_WIDTH));

    for path in &paths {
        let report = check_image(path);
        print_report(path, &report);
        summary.record(report.is_found());
    }

    println!("\n{}", "=".repeat(RULE_WIDTH));
    println!("SUMMARY:");
    println!("  Success: {}/{}", summary.succeeded, summary.total);
    println!("  Failed:  {}/{}", summary.failed, summary.total);
    println!("{}\n", "=".repeat(RULE_WIDTH));
    Ok(summary)
}

/// Dispatches to [`check_file`] or [`check_folder`].
pub fn run(path: &Path, allowed_extensions: &HashSet<String>) -> Result<BatchSummary, AppError> {
    if path.is_file() {
        Ok(check_file(path))
    } else if path.is_dir() {
        check_folder(path, allowed_extensions)
    } else {
        Err(AppError::NotFound(format!("Invalid path: {}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::fixtures;
    use std::fs;

    fn extensions() -> HashSet<String> {
        ["jpg", "jpeg", "png", "webp"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn unwritten_other_format_reports_missing_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.tif");
        fs::write(&path, b"II*\0").unwrap();

        let report = check_image(&path);
        assert!(!report.is_found());
        assert!(report.to_string().starts_with("No sidecar file found"));
    }

    #[test]
    fn written_files_are_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixtures::image(dir.path(), "photo.png");
        metadata::write_description(&path, "A pink tile").unwrap();

        match check_image(&path) {
            CheckReport::Found {
                location,
                description,
                text_entries,
                ..
            } => {
                assert_eq!(location, MetadataLocation::PngText);
                assert_eq!(description, "A pink tile");
                assert_eq!(text_entries.len(), 2);
            }
            other => panic!("unexpected report {:?}", other),
        }
    }

    #[test]
    fn missing_and_corrupt_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            check_image(&dir.path().join("gone.jpg")),
            CheckReport::NotFound(_)
        ));

        let broken = dir.path().join("broken.webp");
        fs::write(&broken, b"RIFF").unwrap();
        assert!(matches!(check_image(&broken), CheckReport::Error(_)));
    }

    #[test]
    fn folder_tally_counts_each_image() {
        let dir = tempfile::tempdir().unwrap();
        let described = fixtures::image(dir.path(), "a.jpg");
        fixtures::image(dir.path(), "b.webp");
        metadata::write_description(&described, "A magenta rectangle").unwrap();

        let summary = check_folder(dir.path(), &extensions()).unwrap();
        assert_eq!(
            summary,
            BatchSummary { total: 2, succeeded: 1, failed: 1 }
        );
    }

    #[test]
    fn run_rejects_invalid_paths() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(&dir.path().join("nowhere"), &extensions()).is_err());
    }
}
