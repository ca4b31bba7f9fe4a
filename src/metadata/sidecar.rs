use crate::error::AppError;
use std::fs;
use std::path::{Path, PathBuf};

pub const SIDECAR_SUFFIX: &str = ".description.txt";

/// `photo.gif` -> `photo.gif.description.txt`
pub fn sidecar_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

pub fn write(path: &Path, description: &str) -> Result<(), AppError> {
    fs::write(sidecar_path(path), description)?;
    Ok(())
}

pub fn read(path: &Path) -> Result<Option<String>, AppError> {
    let sidecar = sidecar_path(path);
    if !sidecar.exists() {
        log::debug!("No sidecar file found: {:?}", sidecar);
        return Ok(None);
    }
    let text = fs::read_to_string(&sidecar)?;
    Ok(Some(text.trim().to_string()))
}
