// config.rs - Pipeline settings with environment overrides

use std::env;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_ARCHIVE_NAME: &str = "imagenes-optimizadas.zip";
pub const DEFAULT_QUALITY: f32 = 0.8;

const ENV_JOBS: &str = "REENCODER_JOBS";
const ENV_TIMEOUT: &str = "REENCODER_TIMEOUT_SECS";
const ENV_AVIF_SPEED: &str = "REENCODER_AVIF_SPEED";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on transcodes running at the same time.
    pub max_concurrency: NonZeroUsize,
    /// Per-image limit. `None` waits forever.
    pub job_timeout: Option<Duration>,
    /// 1 (slowest, smallest) to 10 (fastest).
    pub avif_speed: u8,
    pub archive_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
            job_timeout: None,
            avif_speed: 6,
            archive_name: String::from(DEFAULT_ARCHIVE_NAME),
        }
    }
}

impl PipelineConfig {
    /// Defaults, overridden by `REENCODER_JOBS`, `REENCODER_TIMEOUT_SECS`
    /// and `REENCODER_AVIF_SPEED` when they parse.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(jobs) = parse::<usize>(&lookup, ENV_JOBS).and_then(NonZeroUsize::new) {
            config.max_concurrency = jobs;
        }
        if let Some(secs) = parse::<u64>(&lookup, ENV_TIMEOUT).filter(|secs| *secs > 0) {
            config.job_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(speed) = parse::<u8>(&lookup, ENV_AVIF_SPEED) {
            config.avif_speed = speed.clamp(1, 10);
        }

        config
    }

    pub fn with_max_concurrency(mut self, jobs: usize) -> Self {
        self.max_concurrency = NonZeroUsize::new(jobs).unwrap_or(NonZeroUsize::MIN);
        self
    }

    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = Some(timeout);
        self
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("ignoring {key}={raw:?}: not a valid value");
            None
        }
    }
}
