// src/metadata/mod.rs

//! Reads and writes the description stored with an image.
//!
//! JPEG and WebP keep it in the EXIF `ImageDescription` tag, PNG in text
//! chunks, and every other format in a `<file>.description.txt` sidecar.

pub mod exif_tag;
pub mod png_text;
pub mod sidecar;

use crate::error::AppError;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    WebP,
    Other,
}

impl ImageFormat {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());
        match ext.as_deref() {
            Some("jpg") | Some("jpeg") => ImageFormat::Jpeg,
            Some("png") => ImageFormat::Png,
            Some("webp") => ImageFormat::WebP,
            _ => ImageFormat::Other,
        }
    }
}

/// Where a description lives for a given file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataLocation {
    Exif,
    PngText,
    Sidecar(PathBuf),
}

impl MetadataLocation {
    pub fn for_path(path: &Path) -> Self {
        match ImageFormat::from_path(path) {
            ImageFormat::Jpeg | ImageFormat::WebP => MetadataLocation::Exif,
            ImageFormat::Png => MetadataLocation::PngText,
            ImageFormat::Other => MetadataLocation::Sidecar(sidecar::sidecar_path(path)),
        }
    }
}

impl fmt::Display for MetadataLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataLocation::Exif => write!(f, "EXIF"),
            MetadataLocation::PngText => write!(f, "PNG text"),
            MetadataLocation::Sidecar(path) => write!(f, "sidecar file {}", path.display()),
        }
    }
}

/// Stores `description` for the image at `path`, replacing any earlier one.
pub fn write_description(path: &Path, description: &str) -> Result<MetadataLocation, AppError> {
    let location = MetadataLocation::for_path(path);
    match ImageFormat::from_path(path) {
        ImageFormat::Jpeg => exif_tag::write_jpeg(path, description)?,
        ImageFormat::WebP => exif_tag::write_webp(path, description)?,
        ImageFormat::Png => png_text::write(path, description)?,
        ImageFormat::Other => sidecar::write(path, description)?,
    }
    log::info!("Updated ({}): {}", location, path.display());
    Ok(location)
}

/// Reads the stored description, `None` when nothing was ever written.
pub fn try_read_description(path: &Path) -> Result<Option<String>, AppError> {
    match ImageFormat::from_path(path) {
        ImageFormat::Jpeg | ImageFormat::WebP => exif_tag::read_description(path),
        ImageFormat::Png => png_text::read_description(path),
        ImageFormat::Other => sidecar::read(path),
    }
}

/// Reads the stored description. Errors are logged and reported as empty.
pub fn read_description(path: &Path) -> String {
    match try_read_description(path) {
        Ok(description) => description.unwrap_or_default(),
        Err(e) => {
            log::warn!("Error reading {}: {}", path.display(), e);
            String::new()
        }
    }
}

/// EXIF `UserComment`, if the format carries EXIF and the tag is set.
pub fn read_user_comment(path: &Path) -> Result<Option<String>, AppError> {
    match ImageFormat::from_path(path) {
        ImageFormat::Jpeg | ImageFormat::WebP => exif_tag::read_user_comment(path),
        _ => Ok(None),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn format_follows_extension_case_insensitively() {
        assert_eq!(ImageFormat::from_path(Path::new("a.JPG")), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_path(Path::new("a.jpeg")), ImageFormat::Jpeg);
        assert_eq!(ImageFormat::from_path(Path::new("a.Png")), ImageFormat::Png);
        assert_eq!(ImageFormat::from_path(Path::new("a.webp")), ImageFormat::WebP);
        assert_eq!(ImageFormat::from_path(Path::new("a.gif")), ImageFormat::Other);
        assert_eq!(ImageFormat::from_path(Path::new("README")), ImageFormat::Other);
    }

    #[test]
    fn round_trips_for_every_format() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["photo.jpg", "photo.png", "photo.webp"] {
            let path = fixtures::image(dir.path(), name);
            let text = format!("A magenta rectangle stored in {}", name);
            write_description(&path, &text).unwrap();
            assert_eq!(read_description(&path), text, "{}", name);
        }

        let other = dir.path().join("scan.gif");
        fs::write(&other, b"GIF89a").unwrap();
        let location = write_description(&other, "A scanned page").unwrap();
        assert_eq!(location, MetadataLocation::Sidecar(dir.path().join("scan.gif.description.txt")));
        assert_eq!(read_description(&other), "A scanned page");
    }

    #[test]
    fn second_write_replaces_the_first() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["photo.jpg", "photo.png", "photo.webp", "photo.bmp"] {
            let path = dir.path().join(name);
            if name.ends_with(".bmp") {
                fs::write(&path, b"BM").unwrap();
            } else {
                fixtures::image(dir.path(), name);
            }
            write_description(&path, "first").unwrap();
            write_description(&path, "second").unwrap();
            assert_eq!(read_description(&path), "second", "{}", name);
        }
    }

    #[test]
    fn unwritten_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["photo.jpg", "photo.png", "photo.webp"] {
            let path = fixtures::image(dir.path(), name);
            assert_eq!(read_description(&path), "", "{}", name);
            assert_eq!(try_read_description(&path).unwrap(), None, "{}", name);
        }
        let other = dir.path().join("scan.tiff");
        fs::write(&other, b"II*\0").unwrap();
        assert_eq!(read_description(&other), "");
    }

    #[test]
    fn unreadable_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("broken.jpg");
        fs::write(&bogus, b"definitely not a jpeg").unwrap();
        assert_eq!(read_description(&bogus), "");
        assert_eq!(read_description(&dir.path().join("missing.png")), "");
    }

    #[test]
    fn write_to_corrupt_image_fails() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("broken.png");
        fs::write(&bogus, b"not a png").unwrap();
        assert!(write_description(&bogus, "text").is_err());
    }

    #[test]
    fn location_display_names_the_store() {
        assert_eq!(MetadataLocation::Exif.to_string(), "EXIF");
        assert_eq!(MetadataLocation::PngText.to_string(), "PNG text");
        assert_eq!(
            MetadataLocation::for_path(Path::new("x.webp")),
            MetadataLocation::Exif
        );
    }
}
