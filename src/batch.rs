// batch.rs - Runs the transcoder over a whole selection
//
// One file goes straight through and yields the image itself. Two or more
// go through a bounded worker pool and end up in a zip archive.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::archive::ArchiveBuilder;
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::format::OutputFormat;
use crate::intake::SelectedFile;
use crate::transcode::{EncodedResult, ProcessingJob, Transcoder};

/// Reported to the UI while a multi-file batch runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchEvent {
    Progress { processed: usize, total: usize },
    Packaging,
}

impl BatchEvent {
    pub fn fraction(&self) -> f32 {
        match *self {
            Self::Progress { processed, total } if total > 0 => processed as f32 / total as f32,
            _ => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub result: Option<EncodedResult>,
    pub total: usize,
    pub succeeded: usize,
    /// Bytes of the source files that made it into `result`.
    pub original_bytes: u64,
    pub failures: Vec<JobFailure>,
}

impl BatchOutcome {
    pub fn is_archive(&self) -> bool {
        self.total > 1
    }

    pub fn summary(&self) -> String {
        if self.failures.is_empty() {
            format!("Processed {} of {} images", self.succeeded, self.total)
        } else {
            format!(
                "Processed {} of {} images, {} failed",
                self.succeeded,
                self.total,
                self.failures.len()
            )
        }
    }
}

pub struct Orchestrator {
    config: PipelineConfig,
    transcoder: Arc<Transcoder>,
}

impl Orchestrator {
    pub fn new(config: PipelineConfig) -> Self {
        let transcoder = Arc::new(Transcoder::new(config.avif_speed));
        Self { config, transcoder }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Processes every file with the same format and quality.
    ///
    /// Progress events are only sent for selections of two or more files.
    pub async fn run(
        &self,
        files: Vec<SelectedFile>,
        format: OutputFormat,
        quality: f32,
        events: Option<mpsc::UnboundedSender<BatchEvent>>,
    ) -> BatchOutcome {
        let jobs: Vec<ProcessingJob> = files
            .into_iter()
            .map(|file| ProcessingJob::new(file, format, quality))
            .collect();

        info!(files = jobs.len(), %format, quality, "starting batch");

        match jobs.len() {
            0 => BatchOutcome::default(),
            1 => self.run_single(jobs.into_iter().next()).await,
            _ => self.run_many(jobs, events).await,
        }
    }

    async fn run_single(&self, job: Option<ProcessingJob>) -> BatchOutcome {
        let Some(job) = job else {
            return BatchOutcome::default();
        };

        let name = job.file.name.clone();
        let size = job.file.size;
        let mut outcome = BatchOutcome {
            total: 1,
            ..BatchOutcome::default()
        };

        match transcode_job(self.transcoder.clone(), job, self.config.job_timeout, None).await {
            Ok(result) => {
                outcome.succeeded = 1;
                outcome.original_bytes = size;
                outcome.result = Some(result);
            }
            Err(e) => {
                warn!("{e}");
                outcome.failures.push(JobFailure {
                    name,
                    reason: e.to_string(),
                });
            }
        }

        outcome
    }

    async fn run_many(
        &self,
        jobs: Vec<ProcessingJob>,
        events: Option<mpsc::UnboundedSender<BatchEvent>>,
    ) -> BatchOutcome {
        let total = jobs.len();
        let permits = Arc::new(Semaphore::new(self.config.max_concurrency.get()));
        let mut tasks = JoinSet::new();

        for job in jobs {
            let permits = permits.clone();
            let transcoder = self.transcoder.clone();
            let timeout = self.config.job_timeout;
            tasks.spawn(async move {
                let name = job.file.name.clone();
                let size = job.file.size;
                let result = match permits.acquire_owned().await {
                    Ok(permit) => transcode_job(transcoder, job, timeout, Some(permit)).await,
                    Err(_) => Err(Error::Worker(String::from("worker pool closed"))),
                };
                (name, size, result)
            });
        }

        let mut outcome = BatchOutcome {
            total,
            ..BatchOutcome::default()
        };
        let mut archive = ArchiveBuilder::new();
        let mut processed = 0;

        // Completion order, not submission order.
        while let Some(joined) = tasks.join_next().await {
            processed += 1;
            match joined {
                Ok((_, size, Ok(result))) => {
                    outcome.succeeded += 1;
                    outcome.original_bytes += size;
                    archive.insert(result.filename, result.data);
                }
                Ok((name, _, Err(e))) => {
                    warn!("{e}");
                    outcome.failures.push(JobFailure {
                        name,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!("transcode task failed: {e}");
                    outcome.failures.push(JobFailure {
                        name: String::from("<unknown>"),
                        reason: e.to_string(),
                    });
                }
            }
            send(&events, BatchEvent::Progress { processed, total });
        }

        if outcome.succeeded == 0 {
            warn!("every image in the batch failed");
            return outcome;
        }

        send(&events, BatchEvent::Packaging);
        let archive_name = self.config.archive_name.clone();
        match tokio::task::spawn_blocking(move || archive.finish()).await {
            Ok(Ok(data)) => {
                info!(entries = outcome.succeeded, bytes = data.len(), "archive ready");
                outcome.result = Some(EncodedResult {
                    data,
                    filename: archive_name,
                });
            }
            Ok(Err(e)) => fail_archive(&mut outcome, &archive_name, e),
            Err(e) => fail_archive(&mut outcome, &archive_name, e.into()),
        }

        outcome
    }
}

async fn transcode_job(
    transcoder: Arc<Transcoder>,
    job: ProcessingJob,
    limit: Option<Duration>,
    permit: Option<OwnedSemaphorePermit>,
) -> Result<EncodedResult> {
    let name = job.file.name.clone();
    run_blocking(name, limit, permit, move || transcoder.transcode(&job)).await
}

// A timed-out job keeps running on its blocking thread, so the permit goes
// with the work and is only released once the work returns.
async fn run_blocking<T, F>(
    name: String,
    limit: Option<Duration>,
    permit: Option<OwnedSemaphorePermit>,
    work: F,
) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let work = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        work()
    });

    let joined = match limit {
        Some(limit) => tokio::time::timeout(limit, work)
            .await
            .map_err(|_| Error::Timeout { name, limit })?,
        None => work.await,
    };

    joined?
}

fn fail_archive(outcome: &mut BatchOutcome, archive_name: &str, e: Error) {
    warn!("{e}");
    outcome.failures.push(JobFailure {
        name: archive_name.to_string(),
        reason: e.to_string(),
    });
}

fn send(events: &Option<mpsc::UnboundedSender<BatchEvent>>, event: BatchEvent) {
    if let Some(tx) = events {
        if tx.send(event).is_err() {
            debug!("batch listener went away");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn timed_out_work_keeps_its_permit() {
        let permits = Arc::new(Semaphore::new(1));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let mut tasks = JoinSet::new();

        for i in 0..3 {
            let permits = permits.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            tasks.spawn(async move {
                let permit = permits.acquire_owned().await.unwrap();
                run_blocking(
                    format!("job{i}"),
                    Some(Duration::from_millis(5)),
                    Some(permit),
                    move || {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(60));
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    },
                )
                .await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            assert!(matches!(joined.unwrap(), Err(Error::Timeout { .. })));
        }

        // The last job is still sleeping; wait for it to let go.
        let _drained = permits.acquire_owned().await.unwrap();
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(in_flight.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unbounded_work_finishes() {
        let value = run_blocking(String::from("quick"), None, None, || Ok(7)).await;
        assert_eq!(value.unwrap(), 7);
    }
}
