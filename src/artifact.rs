//! Artifact lookup against the GitHub Actions artifacts API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::debug;

use crate::error::{RelayError, ResolveError};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PAGE_SIZE: &str = "100";

/// A single entry of the artifact listing. Missing fields read as empty so
/// one odd entry does not spoil the page.
#[derive(Debug, Clone, Deserialize)]
pub struct Artifact {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub archive_download_url: String,
    #[serde(default)]
    pub expired: bool,
}

/// Listing body. GitHub wraps the list; plain arrays are accepted as well.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ArtifactListing {
    Wrapped {
        #[serde(default)]
        total_count: u64,
        artifacts: Vec<Artifact>,
    },
    Bare(Vec<Artifact>),
}

impl ArtifactListing {
    pub fn artifacts(&self) -> &[Artifact] {
        match self {
            ArtifactListing::Wrapped { artifacts, .. } => artifacts,
            ArtifactListing::Bare(artifacts) => artifacts,
        }
    }

    /// Count reported by the API, which may exceed the returned page.
    pub fn total_count(&self) -> u64 {
        match self {
            ArtifactListing::Wrapped { total_count, .. } => *total_count,
            ArtifactListing::Bare(artifacts) => artifacts.len() as u64,
        }
    }

    /// Download URL of the first unexpired artifact named exactly `name`.
    /// Expired artifacts can no longer be downloaded.
    pub fn find_download_url(&self, name: &str) -> Option<&str> {
        self.artifacts()
            .iter()
            .find(|a| !a.expired && a.name == name)
            .map(|a| a.archive_download_url.as_str())
    }
}

/// Looks up the download URL of a named artifact in a repository
#[async_trait]
pub trait ArtifactResolver: Send + Sync {
    async fn resolve(&self, repository: &str, artifact_name: &str) -> Result<String, ResolveError>;
}

pub struct GithubArtifactResolver {
    client: reqwest::Client,
    api_url: String,
}

impl GithubArtifactResolver {
    pub fn new(api_url: &str, token: Option<&str>) -> Result<Self, RelayError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("artifact_relay/", env!("CARGO_PKG_VERSION"))),
        );
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| RelayError::ConfigError(format!("Invalid GITHUB_TOKEN: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RelayError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    fn artifacts_url(&self, repository: &str) -> String {
        format!("{}/repos/{}/actions/artifacts", self.api_url, repository)
    }

    async fn fetch_listing(
        &self,
        repository: &str,
        artifact_name: &str,
    ) -> reqwest::Result<ArtifactListing> {
        self.client
            .get(self.artifacts_url(repository))
            .query(&[("per_page", PAGE_SIZE), ("name", artifact_name)])
            .send()
            .await?
            .error_for_status()?
            .json::<ArtifactListing>()
            .await
    }
}

#[async_trait]
impl ArtifactResolver for GithubArtifactResolver {
    async fn resolve(&self, repository: &str, artifact_name: &str) -> Result<String, ResolveError> {
        let listing = self
            .fetch_listing(repository, artifact_name)
            .await
            .map_err(|e| ResolveError::Transient(e.to_string()))?;
        debug!(
            "Listing for {} returned {} of {} artifacts",
            repository,
            listing.artifacts().len(),
            listing.total_count()
        );

        listing
            .find_download_url(artifact_name)
            .map(str::to_string)
            .ok_or_else(|| ResolveError::NotFound {
                artifact_name: artifact_name.to_string(),
            })
    }
}
