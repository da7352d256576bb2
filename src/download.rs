// download.rs - Persisting the current result to disk

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;
use crate::transcode::EncodedResult;

pub fn save(result: &EncodedResult, destination: &Path) -> Result<PathBuf> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    fs::write(destination, &result.data)?;
    info!(path = %destination.display(), bytes = result.data.len(), "saved result");
    Ok(destination.to_path_buf())
}

pub fn save_into(result: &EncodedResult, dir: &Path) -> Result<PathBuf> {
    save(result, &dir.join(&result.filename))
}

/// Does nothing when there is no result, like a disabled button.
pub fn save_current(result: Option<&EncodedResult>, destination: &Path) -> Result<Option<PathBuf>> {
    result.map(|result| save(result, destination)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_under_result_filename() {
        let dir = tempfile::tempdir().unwrap();
        let result = EncodedResult {
            data: vec![7; 32],
            filename: String::from("cat-opt.png"),
        };

        let path = save_into(&result, &dir.path().join("nested")).unwrap();
        assert_eq!(path, dir.path().join("nested").join("cat-opt.png"));
        assert_eq!(fs::read(&path).unwrap(), result.data);
    }

    #[test]
    fn missing_result_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.png");
        assert_eq!(save_current(None, &target).unwrap(), None);
        assert!(!target.exists());
    }
}
