use artifact_relay::artifact::GithubArtifactResolver;
use artifact_relay::config::RelayConfig;
use artifact_relay::logging::{FileLogger, setup_logging};
use artifact_relay::publisher::{MqttPublisher, Publisher};
use artifact_relay::retry::{RetryScheduler, TokioSleeper};
use artifact_relay::{AppState, api};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let config = match RelayConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let file_logger = config.log_dir.as_ref().map(FileLogger::new);
    let _log_guard = match setup_logging(file_logger.as_ref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to set up logging: {}", e);
            std::process::exit(1);
        }
    };

    let publisher = match MqttPublisher::connect(&config.broker).await {
        Ok(publisher) => Arc::new(publisher),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let echo = Arc::new(|topic: &str, message: &str| {
        info!("Received message on '{}': {}", topic, message);
    });
    if let Err(e) = publisher.subscribe(&config.topic, echo).await {
        error!("Failed to subscribe to '{}': {}", config.topic, e);
        std::process::exit(1);
    }

    let resolver =
        match GithubArtifactResolver::new(&config.github_api_url, config.github_token.as_deref()) {
            Ok(resolver) => Arc::new(resolver),
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        };

    let retry = RetryScheduler::new(config.backoff.clone(), Arc::new(TokioSleeper));
    let state = Arc::new(AppState::new(
        resolver,
        retry,
        publisher,
        config.topic.clone(),
    ));
    let app = api::router(state);

    info!("Listening on {}", config.bind_address);
    info!(
        "Publishing to '{}' with backoff {:?}",
        config.topic,
        config.backoff.steps()
    );
    let listener = match tokio::net::TcpListener::bind(&config.bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", config.bind_address, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
