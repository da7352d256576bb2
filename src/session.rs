// session.rs - Application state, independent of how it is drawn
//
// The GUI owns one `Session`, forwards user actions to it and renders from
// its accessors. Nothing in here touches widgets.

use crate::batch::{BatchEvent, BatchOutcome, JobFailure};
use crate::config::DEFAULT_QUALITY;
use crate::error::Result;
use crate::format::{FormatInfo, OutputFormat};
use crate::intake::{self, SelectedFile};
use crate::report::ResultSummary;
use crate::transcode::{clamp_quality, EncodedResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Empty,
    Ready,
    Processing { processed: usize, total: usize },
    Packaging,
    Finished,
}

/// Inputs for one batch run, cloned out of the session when it starts.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub id: u64,
    pub files: Vec<SelectedFile>,
    pub format: OutputFormat,
    pub quality: f32,
}

#[derive(Debug, Clone)]
pub struct Session {
    selection: Vec<SelectedFile>,
    format: OutputFormat,
    quality: f32,
    phase: Phase,
    results_visible: bool,
    output: Option<EncodedResult>,
    output_is_archive: bool,
    summary: Option<ResultSummary>,
    failures: Vec<JobFailure>,
    status: String,
    batches_started: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            selection: Vec::new(),
            format: OutputFormat::default(),
            quality: DEFAULT_QUALITY,
            phase: Phase::default(),
            results_visible: false,
            output: None,
            output_is_archive: false,
            summary: None,
            failures: Vec::new(),
            status: String::new(),
            batches_started: 0,
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the selection with the image-typed candidates.
    ///
    /// On error the session is left exactly as it was; the caller shows
    /// one alert.
    pub fn select(&mut self, candidates: Vec<SelectedFile>) -> Result<()> {
        let images = intake::intake(candidates)?;
        self.selection = images;
        self.results_visible = false;
        if !self.is_busy() {
            self.phase = Phase::Ready;
        }
        Ok(())
    }

    pub fn set_format(&mut self, format: OutputFormat) {
        self.format = format;
    }

    pub fn set_quality(&mut self, quality: f32) {
        self.quality = clamp_quality(quality);
    }

    pub fn selection(&self) -> &[SelectedFile] {
        &self.selection
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn format_info(&self) -> FormatInfo {
        self.format.info()
    }

    pub fn quality_label(&self) -> String {
        self.format.quality_label(self.quality)
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.phase, Phase::Processing { .. } | Phase::Packaging)
    }

    pub fn controls_visible(&self) -> bool {
        !self.selection.is_empty()
    }

    pub fn results_visible(&self) -> bool {
        self.results_visible
    }

    pub fn selection_label(&self) -> Option<String> {
        match self.selection.as_slice() {
            [] => None,
            [only] => Some(format!("1 file: {}", only.name)),
            many => Some(format!("{} files selected", many.len())),
        }
    }

    pub fn result_label(&self) -> &'static str {
        if self.selection.len() > 1 {
            "ZIP total size"
        } else {
            "Image size"
        }
    }

    /// Locks the controls, drops the previous output and hands back the
    /// work to run. `None` when there is nothing to do or a batch is
    /// already running.
    pub fn begin_batch(&mut self) -> Option<BatchRequest> {
        if self.selection.is_empty() || self.is_busy() {
            return None;
        }

        self.batches_started += 1;
        self.output = None;
        self.summary = None;
        self.failures.clear();
        self.results_visible = true;
        self.status.clear();
        self.phase = Phase::Processing {
            processed: 0,
            total: self.selection.len(),
        };

        Some(BatchRequest {
            id: self.batches_started,
            files: self.selection.clone(),
            format: self.format,
            quality: self.quality,
        })
    }

    pub fn apply_event(&mut self, event: BatchEvent) {
        if !self.is_busy() {
            return;
        }
        self.phase = match event {
            BatchEvent::Progress { processed, total } => Phase::Processing { processed, total },
            BatchEvent::Packaging => Phase::Packaging,
        };
    }

    pub fn finish_batch(&mut self, outcome: BatchOutcome) {
        self.status = outcome.summary();
        // The selection may have changed while the batch ran.
        self.output_is_archive = outcome.is_archive();
        let label = if self.output_is_archive {
            "ZIP total size"
        } else {
            "Image size"
        };
        self.summary = outcome
            .result
            .as_ref()
            .map(|result| ResultSummary::new(label, outcome.original_bytes, result.size()));
        self.output = outcome.result;
        self.failures = outcome.failures;
        self.phase = Phase::Finished;
    }

    pub fn progress(&self) -> Option<f32> {
        match self.phase {
            Phase::Processing { total, .. } if total < 2 => None,
            Phase::Processing { processed, total } => Some(processed as f32 / total as f32),
            Phase::Packaging => Some(1.0),
            _ => None,
        }
    }

    pub fn process_label(&self) -> &'static str {
        match self.phase {
            Phase::Processing { .. } => "⏳ Processing...",
            Phase::Packaging => "📦 Packing ZIP...",
            Phase::Finished => "⚡ Process again",
            _ => "⚡ Process",
        }
    }

    pub fn download_label(&self) -> &'static str {
        match (&self.output, self.output_is_archive) {
            (None, _) if self.is_busy() => "Please wait...",
            (None, _) => "Nothing to download",
            (Some(_), true) => "📥 Download ZIP",
            (Some(_), false) => "📥 Download image",
        }
    }

    pub fn output(&self) -> Option<&EncodedResult> {
        self.output.as_ref()
    }

    pub fn summary(&self) -> Option<&ResultSummary> {
        self.summary.as_ref()
    }

    pub fn failures(&self) -> &[JobFailure] {
        &self.failures
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }
}
