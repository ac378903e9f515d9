// Ports - Interface definitions (contracts) for external collaborators

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::errors::*;

/// Port for font and media asset resolution.
///
/// Resolution is a lookup against an index built up front, so it is
/// synchronous: validation runs inside `submit` before anything is spawned.
pub trait AssetPort: Send + Sync {
    /// Map a font identifier to a font file location
    fn resolve_font(&self, font_id: &str) -> Result<String, DomainError>;

    /// Map a media identifier to a file path or URI the engine can read
    fn resolve_media(&self, source: &str) -> Result<String, DomainError>;
}

/// One invocation of the external encoding engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineInvocation {
    /// Arguments after the program name
    pub args: Vec<String>,
    /// Artifact the invocation is expected to produce
    pub output_path: PathBuf,
}

/// Result of an engine process that ran to completion
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutcome {
    /// Exit code, `None` when terminated by a signal
    pub exit_code: Option<i32>,
    /// Tail of the diagnostic stream, bounded in size
    pub diagnostics: String,
}

impl EngineOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Port for the external encoding engine
#[async_trait]
pub trait EnginePort: Send + Sync {
    /// Run one invocation to completion.
    ///
    /// Dropping the returned future must terminate the child process; the
    /// runner relies on this for cancellation and timeouts.
    async fn run(&self, invocation: &EngineInvocation) -> Result<EngineOutcome, DomainError>;

    /// Report the engine version banner
    async fn version(&self) -> Result<String, DomainError>;
}

/// Upload request handed to object storage
#[derive(Debug)]
pub struct PutObject {
    pub bucket: String,
    pub key: String,
    /// Open artifact, streamed by the storage adapter
    pub body: tokio::fs::File,
    pub content_length: u64,
    pub content_type: String,
}

/// Port for object storage
#[async_trait]
pub trait StoragePort: Send + Sync {
    /// Store an object; any transport or auth problem is an error
    async fn put_object(&self, request: PutObject) -> Result<(), DomainError>;
}
