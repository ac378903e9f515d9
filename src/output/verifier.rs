//! Output verification implementation

use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, warn};

use crate::domain::errors::*;
use crate::output::{VerifiedArtifact, OUTPUT_NOT_PRODUCED};

/// Checks engine output and removes stale or partial files
pub struct ArtifactVerifier;

impl ArtifactVerifier {
    /// Verify that `path` holds a non-empty file.
    ///
    /// A successful engine exit is not trusted on its own: a missing or
    /// zero-byte file fails with `output not produced`.
    pub async fn verify(path: &Path) -> Result<VerifiedArtifact, DomainError> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => {
                debug!(path = %path.display(), size = meta.len(), "artifact verified");
                Ok(VerifiedArtifact {
                    path: path.to_path_buf(),
                    size: meta.len(),
                })
            }
            _ => Err(DomainError::RenderFailed(OUTPUT_NOT_PRODUCED.to_string())),
        }
    }

    /// Delete a file if it exists. Returns whether something was removed.
    pub async fn remove(path: &Path) -> Result<bool, DomainError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "removed output file");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(DomainError::Io(format!(
                "failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Best-effort removal of partial output after a cancel or timeout
    pub async fn discard_partial(path: &Path) {
        if let Err(e) = Self::remove(path).await {
            warn!(path = %path.display(), error = %e, "could not remove partial output");
        }
    }
}
