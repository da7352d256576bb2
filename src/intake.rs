// intake.rs - Turning picked, dropped or crawled paths into a validated selection

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub enum FileSource {
    Path(PathBuf),
    Memory(Arc<[u8]>),
}

#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub size: u64,
    /// Declared content type. Never checked against the actual bytes.
    pub content_type: Option<&'static str>,
    pub source: FileSource,
}

impl SelectedFile {
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        Ok(Self {
            content_type: content_type_for(&name),
            name,
            size: metadata.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let name = name.into();
        let bytes = bytes.into();
        Self {
            content_type: content_type_for(&name),
            size: bytes.len() as u64,
            source: FileSource::Memory(bytes),
            name,
        }
    }

    pub fn is_image(&self) -> bool {
        self.content_type
            .map_or(false, |mime| mime.starts_with("image/"))
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        match &self.source {
            FileSource::Path(path) => fs::read(path).map_err(|source| Error::Read {
                path: path.clone(),
                source,
            }),
            FileSource::Memory(bytes) => Ok(bytes.to_vec()),
        }
    }
}

/// Content type a file manager would declare for this name, judged by extension only.
pub fn content_type_for(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_string_lossy().to_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" | "jfif" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "tif" | "tiff" => "image/tiff",
        "ico" => "image/x-icon",
        "svg" => "image/svg+xml",
        "txt" => "text/plain",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "json" => "application/json",
        _ => return None,
    };
    Some(mime)
}

/// Keeps the image-typed candidates. An empty result is an error and the
/// caller must leave its current selection alone.
pub fn intake(candidates: Vec<SelectedFile>) -> Result<Vec<SelectedFile>> {
    let total = candidates.len();
    let images: Vec<SelectedFile> = candidates.into_iter().filter(SelectedFile::is_image).collect();

    debug!(total, kept = images.len(), "filtered selection");

    if images.is_empty() {
        return Err(Error::NoImages);
    }
    Ok(images)
}

pub fn collect_candidates(paths: &[PathBuf]) -> Vec<SelectedFile> {
    paths.iter().flat_map(|path| collect_images(path)).collect()
}

/// A single file, or every file below a directory sorted by path.
pub fn collect_images(path: &Path) -> Vec<SelectedFile> {
    let mut files: Vec<PathBuf> = Vec::new();

    if path.is_dir() {
        for entry in WalkDir::new(path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
    } else {
        files.push(path.to_path_buf());
    }

    files
        .iter()
        .filter_map(|file| match SelectedFile::from_path(file) {
            Ok(selected) => Some(selected),
            Err(e) => {
                warn!("skipping candidate: {e}");
                None
            }
        })
        .collect()
}
