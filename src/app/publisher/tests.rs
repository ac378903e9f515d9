// Unit tests for the artifact publisher

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::TimeZone;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    use crate::app::publisher::*;
    use crate::domain::errors::*;
    use crate::domain::job::JobId;
    use crate::ports::{PutObject, StoragePort};

    #[derive(Default)]
    struct RecordingStorage {
        objects: Mutex<Vec<(String, String, Vec<u8>, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl StoragePort for RecordingStorage {
        async fn put_object(&self, mut request: PutObject) -> Result<(), DomainError> {
            if self.fail {
                return Err(DomainError::PublishFailed("access denied".to_string()));
            }
            let mut bytes = Vec::new();
            request.body.read_to_end(&mut bytes).await?;
            self.objects.lock().unwrap().push((
                request.bucket,
                request.key,
                bytes,
                request.content_type,
            ));
            Ok(())
        }
    }

    fn settings() -> PublishSettings {
        PublishSettings {
            bucket: "media".to_string(),
            public_base_url: "https://cdn.example.com/".to_string(),
            key_prefix: "/renders/".to_string(),
        }
    }

    #[test]
    fn test_object_key_layout() {
        let publisher = ArtifactPublisher::new(Arc::new(RecordingStorage::default()), settings());
        let id = JobId::parse("job42").unwrap();
        let now = chrono::Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let key = publisher.object_key(&id, now, "mp4");

        assert!(key.starts_with("renders/job42_1700000000123_"), "{}", key);
        assert!(key.ends_with(".mp4"));
        let random = key
            .trim_start_matches("renders/job42_1700000000123_")
            .trim_end_matches(".mp4");
        assert_eq!(random.len(), 8);
        assert!(random.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, publisher.object_key(&id, now, "mp4"));
    }

    #[test]
    fn test_public_url_joins_with_one_slash() {
        let publisher = ArtifactPublisher::new(Arc::new(RecordingStorage::default()), settings());
        assert_eq!(
            publisher.public_url("renders/a.mp4"),
            "https://cdn.example.com/renders/a.mp4"
        );
    }

    #[test]
    fn test_content_types() {
        assert_eq!(content_type(Path::new("a.mp4")), "video/mp4");
        assert_eq!(content_type(Path::new("a.MOV")), "video/quicktime");
        assert_eq!(content_type(Path::new("a.webm")), "video/webm");
    }

    #[tokio::test]
    async fn test_publish_streams_artifact() {
        let temp = TempDir::new().unwrap();
        let artifact = temp.path().join("job42.mp4");
        std::fs::write(&artifact, b"rendered").unwrap();

        let storage = Arc::new(RecordingStorage::default());
        let publisher = ArtifactPublisher::new(storage.clone(), settings());
        let id = JobId::parse("job42").unwrap();
        let reference = publisher.publish(&id, &artifact).await.unwrap();

        assert_eq!(reference.url, format!("https://cdn.example.com/{}", reference.key));
        let objects = storage.objects.lock().unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].0, "media");
        assert_eq!(objects[0].2, b"rendered");
        assert_eq!(objects[0].3, "video/mp4");
    }

    #[tokio::test]
    async fn test_storage_error_is_publish_failed_and_keeps_artifact() {
        let temp = TempDir::new().unwrap();
        let artifact = temp.path().join("job42.mp4");
        std::fs::write(&artifact, b"rendered").unwrap();

        let storage = Arc::new(RecordingStorage {
            fail: true,
            ..Default::default()
        });
        let publisher = ArtifactPublisher::new(storage, settings());
        let result = publisher.publish(&JobId::parse("job42").unwrap(), &artifact).await;

        assert!(matches!(result, Err(DomainError::PublishFailed(_))));
        assert!(artifact.exists());
    }
}
