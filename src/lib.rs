pub mod api;
pub mod artifact;
pub mod config;
pub mod error;
pub mod logging;
pub mod publisher;
pub mod retry;
pub mod webhook;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use artifact::ArtifactResolver;
use publisher::Publisher;
use retry::RetryScheduler;

/// Delivery counters since process start
#[derive(Debug, Default)]
pub struct RelayStats {
    pub received: AtomicU64,
    pub decode_failures: AtomicU64,
    pub resolve_failures: AtomicU64,
    pub published: AtomicU64,
    pub publish_failures: AtomicU64,
}

impl RelayStats {
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resolve_failure(&self) {
        self.resolve_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct AppState {
    pub resolver: Arc<dyn ArtifactResolver>,
    pub retry: RetryScheduler,
    pub publisher: Arc<dyn Publisher>,
    pub topic: String,
    pub stats: RelayStats,
    pub start_time: Instant,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        resolver: Arc<dyn ArtifactResolver>,
        retry: RetryScheduler,
        publisher: Arc<dyn Publisher>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            retry,
            publisher,
            topic: topic.into(),
            stats: RelayStats::default(),
            start_time: Instant::now(),
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<AppState>;
