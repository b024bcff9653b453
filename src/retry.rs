//! Fixed-schedule retries around artifact resolution

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::artifact::ArtifactResolver;
use crate::error::{RelayError, ResolveError};

/// Waits between attempts, in seconds
pub const DEFAULT_BACKOFF_SECS: [u64; 5] = [10, 15, 20, 30, 60];

/// Ordered wait durations. One attempt is made per step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffSchedule {
    steps: Vec<Duration>,
}

impl BackoffSchedule {
    pub fn new(steps: Vec<Duration>) -> Result<Self, RelayError> {
        if steps.is_empty() {
            return Err(RelayError::ConfigError(
                "Backoff schedule needs at least one step".to_string(),
            ));
        }
        Ok(Self { steps })
    }

    pub fn from_secs(secs: &[u64]) -> Result<Self, RelayError> {
        Self::new(secs.iter().copied().map(Duration::from_secs).collect())
    }

    /// Parse a comma-separated list of seconds, e.g. `"10,15,20,30,60"`
    pub fn parse(s: &str) -> Result<Self, RelayError> {
        let secs = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<u64>().map_err(|e| {
                    RelayError::ConfigError(format!("Invalid backoff step '{}': {}", part, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_secs(&secs)
    }

    pub fn steps(&self) -> &[Duration] {
        &self.steps
    }

    pub fn attempts(&self) -> usize {
        self.steps.len()
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            steps: DEFAULT_BACKOFF_SECS
                .iter()
                .copied()
                .map(Duration::from_secs)
                .collect(),
        }
    }
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

pub struct RetryScheduler {
    schedule: BackoffSchedule,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryScheduler {
    pub fn new(schedule: BackoffSchedule, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { schedule, sleeper }
    }

    /// Calls the resolver once per schedule step until it yields a non-empty
    /// URL, sleeping for the current step after each miss. No sleep follows
    /// the final attempt.
    ///
    /// When every attempt misses, the error from the final attempt is
    /// returned, or [`ResolveError::NoUrl`] if that attempt returned an empty
    /// URL without an error.
    pub async fn resolve_with_retries(
        &self,
        resolver: &dyn ArtifactResolver,
        repository: &str,
        artifact_name: &str,
    ) -> Result<String, ResolveError> {
        let steps = self.schedule.steps();
        let mut last_error = None;

        for (attempt, backoff) in steps.iter().enumerate() {
            debug!(
                "Resolving '{}' in {} (attempt {}/{})",
                artifact_name,
                repository,
                attempt + 1,
                steps.len()
            );
            match resolver.resolve(repository, artifact_name).await {
                Ok(url) if !url.is_empty() => {
                    info!(
                        "Resolved '{}' in {} after {} attempt(s)",
                        artifact_name,
                        repository,
                        attempt + 1
                    );
                    return Ok(url);
                }
                Ok(_) => last_error = None,
                Err(e) => {
                    warn!("Attempt {} for '{}' failed: {}", attempt + 1, artifact_name, e);
                    last_error = Some(e);
                }
            }

            if attempt + 1 < steps.len() {
                info!("Retrying in {:?}", backoff);
                self.sleeper.sleep(*backoff).await;
            }
        }

        Err(last_error.unwrap_or(ResolveError::NoUrl))
    }
}
