use artifact_relay::artifact::ArtifactResolver;
use artifact_relay::error::{RelayError, ResolveError};
use artifact_relay::publisher::{MessageCallback, Publisher, SubscriptionRegistry};
use artifact_relay::retry::{BackoffSchedule, RetryScheduler, Sleeper};
use artifact_relay::{AppState, SharedState, api};
use async_trait::async_trait;
use axum::Router;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TOPIC: &str = "push";

/// Replays queued outcomes, then keeps answering NotFound
pub struct ScriptedResolver {
    outcomes: Mutex<VecDeque<Result<String, ResolveError>>>,
    calls: AtomicUsize,
}

impl ScriptedResolver {
    pub fn new(outcomes: Vec<Result<String, ResolveError>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn never() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactResolver for ScriptedResolver {
    async fn resolve(&self, _: &str, artifact_name: &str) -> Result<String, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcomes.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(ResolveError::NotFound {
                artifact_name: artifact_name.to_string(),
            })
        })
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    pub slept: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

/// Keeps published messages in memory and loops them back to subscribers
#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
    subscriptions: SubscriptionRegistry,
}

impl RecordingPublisher {
    pub fn failing() -> Self {
        let publisher = Self::default();
        publisher.fail.store(true, Ordering::SeqCst);
        publisher
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, topic: &str, message: String) -> Result<(), RelayError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RelayError::PublishError("broker unavailable".to_string()));
        }
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), message.clone()));
        self.subscriptions.dispatch(topic, &message);
        Ok(())
    }

    async fn subscribe(&self, topic: &str, callback: MessageCallback) -> Result<(), RelayError> {
        self.subscriptions.register(topic, callback);
        Ok(())
    }
}

pub struct Harness {
    pub app: Router,
    pub state: SharedState,
    pub resolver: Arc<ScriptedResolver>,
    pub publisher: Arc<RecordingPublisher>,
    pub sleeper: Arc<RecordingSleeper>,
}

pub fn harness(resolver: Arc<ScriptedResolver>, publisher: RecordingPublisher) -> Harness {
    let publisher = Arc::new(publisher);
    let sleeper = Arc::new(RecordingSleeper::default());
    let retry = RetryScheduler::new(BackoffSchedule::default(), sleeper.clone());
    let state = Arc::new(AppState::new(
        resolver.clone(),
        retry,
        publisher.clone(),
        TOPIC,
    ));
    Harness {
        app: api::router(state.clone()),
        state,
        resolver,
        publisher,
        sleeper,
    }
}
