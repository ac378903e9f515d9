// Artifact publisher - Uploads verified artifacts and derives public URLs

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::domain::errors::*;
use crate::domain::job::{JobId, PublicReference};
use crate::ports::{PutObject, StoragePort};

/// Where published artifacts go and how they are addressed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishSettings {
    pub bucket: String,
    pub public_base_url: String,
    pub key_prefix: String,
}

/// Publishes render artifacts to object storage
pub struct ArtifactPublisher {
    storage: Arc<dyn StoragePort>,
    settings: PublishSettings,
}

impl ArtifactPublisher {
    pub fn new(storage: Arc<dyn StoragePort>, settings: PublishSettings) -> Self {
        Self { storage, settings }
    }

    /// Object key `<prefix>/<job_id>_<unix_millis>_<8 hex>.<ext>`.
    ///
    /// The time component and 32 random bits keep keys unique across
    /// resubmissions of the same job id.
    pub fn object_key(&self, job_id: &JobId, now: DateTime<Utc>, extension: &str) -> String {
        let random = Uuid::new_v4().simple().to_string();
        let name = format!(
            "{}_{}_{}.{}",
            job_id,
            now.timestamp_millis(),
            &random[..8],
            extension
        );
        let prefix = self.settings.key_prefix.trim_matches('/');
        if prefix.is_empty() {
            name
        } else {
            format!("{}/{}", prefix, name)
        }
    }

    /// Public URL with exactly one slash between base and key
    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.settings.public_base_url.trim_end_matches('/'),
            key.trim_start_matches('/')
        )
    }

    /// Stream the artifact to storage and return its public reference.
    ///
    /// Any failure is `PublishFailed`; the artifact is left in place.
    pub async fn publish(&self, job_id: &JobId, artifact: &Path) -> Result<PublicReference, DomainError> {
        let body = tokio::fs::File::open(artifact).await.map_err(|e| {
            DomainError::PublishFailed(format!("cannot open {}: {}", artifact.display(), e))
        })?;
        let content_length = body
            .metadata()
            .await
            .map_err(|e| DomainError::PublishFailed(format!("cannot stat {}: {}", artifact.display(), e)))?
            .len();

        let extension = artifact
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| "mp4".to_string());
        let key = self.object_key(job_id, Utc::now(), &extension);

        let request = PutObject {
            bucket: self.settings.bucket.clone(),
            key: key.clone(),
            body,
            content_length,
            content_type: content_type(artifact).to_string(),
        };
        self.storage.put_object(request).await.map_err(|e| match e {
            DomainError::PublishFailed(msg) => DomainError::PublishFailed(msg),
            other => DomainError::PublishFailed(other.to_string()),
        })?;

        let url = self.public_url(&key);
        info!(job_id = %job_id, key = %key, bytes = content_length, "artifact published");
        Ok(PublicReference { key, url })
    }
}

/// MIME type from the artifact extension
pub fn content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .as_deref()
    {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests;
