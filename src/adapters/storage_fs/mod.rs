// Local storage adapter - Object store backed by a directory tree

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::domain::errors::*;
use crate::ports::*;

/// Stores objects as `<root>/<bucket>/<key>`
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Filesystem location of an object
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, DomainError> {
        for part in [bucket, key] {
            let path = Path::new(part);
            if part.is_empty()
                || path.is_absolute()
                || path.components().any(|c| c == Component::ParentDir)
            {
                return Err(DomainError::PublishFailed(format!(
                    "invalid object location '{}/{}'",
                    bucket, key
                )));
            }
        }
        Ok(self.root.join(bucket).join(key))
    }
}

fn publish_error(context: &str, error: std::io::Error) -> DomainError {
    DomainError::PublishFailed(format!("{}: {}", context, error))
}

#[async_trait]
impl StoragePort for LocalStorage {
    async fn put_object(&self, mut request: PutObject) -> Result<(), DomainError> {
        let target = self.object_path(&request.bucket, &request.key)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| publish_error("failed to create object directory", e))?;
        }

        let mut file = tokio::fs::File::create(&target)
            .await
            .map_err(|e| publish_error("failed to create object", e))?;
        let copied = tokio::io::copy(&mut request.body, &mut file)
            .await
            .map_err(|e| publish_error("failed to write object", e))?;
        file.flush()
            .await
            .map_err(|e| publish_error("failed to flush object", e))?;

        if copied != request.content_length {
            return Err(DomainError::PublishFailed(format!(
                "stored {} of {} bytes",
                copied, request.content_length
            )));
        }

        info!(path = %target.display(), bytes = copied, "stored object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_object_copies_bytes() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("artifact.mp4");
        std::fs::write(&source, b"mp4 bytes").unwrap();

        let storage = LocalStorage::new(temp.path().join("store"));
        let request = PutObject {
            bucket: "media".to_string(),
            key: "renders/job_1.mp4".to_string(),
            body: tokio::fs::File::open(&source).await.unwrap(),
            content_length: 9,
            content_type: "video/mp4".to_string(),
        };
        storage.put_object(request).await.unwrap();

        let stored = temp.path().join("store/media/renders/job_1.mp4");
        assert_eq!(std::fs::read(stored).unwrap(), b"mp4 bytes");
    }

    #[test]
    fn test_object_path_rejects_traversal() {
        let storage = LocalStorage::new("/srv/objects");
        assert!(storage.object_path("media", "../escape.mp4").is_err());
        assert!(storage.object_path("media", "/abs.mp4").is_err());
        assert_eq!(
            storage.object_path("media", "a/b.mp4").unwrap(),
            PathBuf::from("/srv/objects/media/a/b.mp4")
        );
    }
}
