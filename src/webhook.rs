//! Push payload received on the webhook and republished to the broker

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

/// Build notification. Arrives without a download URL and leaves with one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdaterPayload {
    #[serde(rename = "sha")]
    pub commit_sha: String,
    pub repository: String,
    #[serde(alias = "artifact")]
    pub artifact_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_download_url: Option<String>,
}

impl UpdaterPayload {
    /// Decode an inbound webhook body.
    ///
    /// Any `archive_download_url` sent by the caller is dropped, it is only
    /// ever filled in by resolution.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let mut payload: UpdaterPayload = serde_json::from_slice(body)?;
        payload.validate()?;
        payload.archive_download_url = None;
        Ok(payload)
    }

    fn validate(&self) -> Result<()> {
        match self.repository.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {}
            _ => {
                return Err(RelayError::DecodeError(format!(
                    "repository '{}' is not of the form owner/name",
                    self.repository
                )));
            }
        }
        if self.artifact_name.is_empty() {
            return Err(RelayError::DecodeError(
                "artifact_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Attach the resolved download URL
    pub fn with_download_url(mut self, url: String) -> Self {
        self.archive_download_url = Some(url);
        self
    }

    /// Serialize for publishing. Refuses payloads that were never resolved.
    pub fn to_message(&self) -> Result<String> {
        match self.archive_download_url.as_deref() {
            Some(url) if !url.is_empty() => Ok(serde_json::to_string(self)?),
            _ => Err(RelayError::PublishError(format!(
                "payload for {} ({}) has no resolved download url",
                self.repository, self.artifact_name
            ))),
        }
    }
}
