//! Render artifact verification and cleanup

use std::path::PathBuf;

use serde::Serialize;

pub mod verifier;

pub use verifier::ArtifactVerifier;

/// Detail recorded when the engine exits cleanly without a usable file
pub const OUTPUT_NOT_PRODUCED: &str = "output not produced";

/// Verified render artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedArtifact {
    pub path: PathBuf,
    /// Size in bytes, always non-zero
    pub size: u64,
}
