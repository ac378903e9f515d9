// HTTP storage adapter - Streamed PUT uploads to an object store endpoint

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client};
use tracing::{debug, info};

use crate::domain::errors::*;
use crate::ports::*;

/// Largest response excerpt kept in an error
const ERROR_BODY_LIMIT: usize = 512;

/// Uploads objects with `PUT <endpoint>/<bucket>/<key>`
pub struct HttpStorage {
    http: Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpStorage {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Result<Self, DomainError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| DomainError::PublishFailed(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            token,
        })
    }

    /// Upload URL of an object
    pub fn object_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            bucket.trim_matches('/'),
            key.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl StoragePort for HttpStorage {
    async fn put_object(&self, request: PutObject) -> Result<(), DomainError> {
        let url = self.object_url(&request.bucket, &request.key);
        debug!(url = %url, bytes = request.content_length, "uploading object");

        let mut builder = self
            .http
            .put(&url)
            .header(CONTENT_TYPE, request.content_type.as_str())
            .header(CONTENT_LENGTH, request.content_length)
            .body(Body::from(request.body));
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DomainError::PublishFailed(format!("upload to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(DomainError::PublishFailed(format!(
                "storage responded {}: {}",
                status,
                excerpt.trim()
            )));
        }

        info!(url = %url, "uploaded object");
        Ok(())
    }
}
