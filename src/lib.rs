//! Batch image re-encoder.
//!
//! Re-encodes a selection of images to AVIF, WebP, JPEG or PNG at a shared
//! quality, bundling multi-file batches into a zip archive and reporting
//! the size savings.

pub mod archive;
pub mod batch;
pub mod config;
pub mod download;
pub mod error;
pub mod format;
pub mod intake;
pub mod report;
pub mod session;
pub mod size;
pub mod transcode;

pub use batch::{BatchEvent, BatchOutcome, JobFailure, Orchestrator};
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use format::{FormatInfo, OutputFormat, Tone};
pub use intake::SelectedFile;
pub use session::{BatchRequest, Phase, Session};
pub use size::format_bytes;
pub use transcode::{EncodedResult, ProcessingJob, Transcoder};
