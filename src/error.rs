// error.rs - Error type shared by the pipeline stages

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crate::format::OutputFormat;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no image files in the selection")]
    NoImages,

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to decode {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to encode {name} as {format}: {reason}")]
    Encode {
        name: String,
        format: OutputFormat,
        reason: String,
    },

    #[error("{format} encoder produced no data for {name}")]
    EmptyOutput { name: String, format: OutputFormat },

    #[error("{name} did not finish within {limit:?}")]
    Timeout { name: String, limit: Duration },

    #[error("failed to build archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("worker stopped unexpectedly: {0}")]
    Worker(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Worker(err.to_string())
    }
}
