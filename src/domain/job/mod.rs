// Render job records - Lifecycle state of one submitted composition

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::model::Composition;

/// Opaque job identifier, unique per submission
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wrap an identifier received from a caller
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let trimmed = value.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(DomainError::JobNotFound(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Stage a job is executing, or the stage that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Render,
    Publish,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStage::Render => f.write_str("render"),
            JobStage::Publish => f.write_str("publish"),
        }
    }
}

/// Durable, retrievable location of a published artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicReference {
    pub key: String,
    pub url: String,
}

/// Human-readable failure cause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub stage: JobStage,
    pub detail: String,
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} stage failed: {}", self.stage, self.detail)
    }
}

/// Tracked unit of work from submission to success or failure.
///
/// Records are never mutated in place: every transition builds a new record
/// which replaces the previous one in the registry.
#[derive(Debug, Clone, Serialize)]
pub struct RenderJob {
    pub id: JobId,
    #[serde(skip)]
    pub composition: Arc<Composition>,
    pub state: JobState,
    pub stage: JobStage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub artifact: Option<PathBuf>,
    pub result: Option<PublicReference>,
    pub failure: Option<JobFailure>,
    pub warnings: Vec<String>,
}

impl RenderJob {
    /// New job in the queued state
    pub fn queued(id: JobId, composition: Arc<Composition>, warnings: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            composition,
            state: JobState::Queued,
            stage: JobStage::Render,
            created_at: now,
            updated_at: now,
            artifact: None,
            result: None,
            failure: None,
            warnings,
        }
    }

    fn touched(&self) -> Self {
        let mut next = self.clone();
        next.updated_at = Utc::now();
        next
    }

    pub fn running(&self) -> Self {
        let mut next = self.touched();
        next.state = JobState::Running;
        next.stage = JobStage::Render;
        next
    }

    /// Render finished with a verified artifact; publishing starts
    pub fn rendered(&self, artifact: PathBuf) -> Self {
        let mut next = self.touched();
        next.state = JobState::Running;
        next.stage = JobStage::Publish;
        next.artifact = Some(artifact);
        next
    }

    pub fn succeeded(&self, reference: PublicReference) -> Self {
        let mut next = self.touched();
        next.state = JobState::Succeeded;
        next.result = Some(reference);
        next
    }

    /// Failure at the job's current stage
    pub fn failed(&self, detail: impl Into<String>) -> Self {
        let mut next = self.touched();
        next.state = JobState::Failed;
        next.failure = Some(JobFailure {
            stage: self.stage,
            detail: detail.into(),
        });
        next
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn public_url(&self) -> Option<&str> {
        self.result.as_ref().map(|r| r.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Background;

    fn job() -> RenderJob {
        let composition = Arc::new(Composition::new(640, 360, 2.0, Background::new("bg.png")));
        RenderJob::queued(JobId::generate(), composition, Vec::new())
    }

    #[test]
    fn test_job_ids_are_unique() {
        let a = JobId::generate();
        let b = JobId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert_eq!(JobId::parse(a.as_str()).unwrap(), a);
        assert!(JobId::parse("../etc").is_err());
    }

    #[test]
    fn test_publish_failure_records_publish_stage() {
        let queued = job();
        let failed = queued
            .running()
            .rendered(PathBuf::from("renders/x.mp4"))
            .failed("connection refused");

        assert_eq!(queued.state, JobState::Queued);
        assert_eq!(failed.state, JobState::Failed);
        let failure = failed.failure.as_ref().unwrap();
        assert_eq!(failure.stage, JobStage::Publish);
        assert_eq!(failure.to_string(), "publish stage failed: connection refused");
        assert_eq!(failed.artifact.as_deref(), Some(std::path::Path::new("renders/x.mp4")));
    }

    #[test]
    fn test_render_failure_records_render_stage() {
        let failed = job().running().failed("output not produced");
        assert_eq!(failed.failure.unwrap().stage, JobStage::Render);
        assert!(failed.state.is_terminal());
    }
}
