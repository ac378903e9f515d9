// Render runner - Job lifecycle from submission to published artifact

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::app::publisher::ArtifactPublisher;
use crate::app::registry::JobRegistry;
use crate::compiler::{self, Compilation, EncoderPresets};
use crate::domain::errors::*;
use crate::domain::job::*;
use crate::domain::model::Composition;
use crate::domain::rules;
use crate::output::{ArtifactVerifier, VerifiedArtifact};
use crate::ports::*;

/// Failure detail of a cancelled job
pub const CANCELLED: &str = "cancelled";
/// Failure detail of a job that exceeded its time limit
pub const TIMED_OUT: &str = "timeout";

/// Runner limits and output placement
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub output_dir: PathBuf,
    pub max_concurrent_jobs: usize,
    /// Wall-clock limit of one engine run
    pub timeout: Option<Duration>,
    pub diagnostic_tail_bytes: usize,
    pub presets: EncoderPresets,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("renders"),
            max_concurrent_jobs: default_concurrency(),
            timeout: None,
            diagnostic_tail_bytes: 4096,
            presets: EncoderPresets::default(),
        }
    }
}

/// Half the CPU count, at least one
pub fn default_concurrency() -> usize {
    (num_cpus::get() / 2).max(1)
}

/// Validated and compiled composition, ready to hand to the engine
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlan {
    pub compilation: Compilation,
    /// Validation and compilation warnings, in that order
    pub warnings: Vec<String>,
}

/// Validate a composition against the asset resolver and compile it
pub fn plan_render(
    composition: &Composition,
    assets: &dyn AssetPort,
    presets: &EncoderPresets,
) -> Result<RenderPlan, DomainError> {
    let validated = rules::validate(composition, assets)?;
    let compilation = compiler::compile(composition, &validated.assets, presets)?;
    let mut warnings = validated.warnings;
    warnings.extend(compilation.warnings.iter().cloned());
    Ok(RenderPlan {
        compilation,
        warnings,
    })
}

/// Runs render jobs in the background with bounded concurrency.
///
/// Cloning is cheap; clones share the same registry and worker pool.
#[derive(Clone)]
pub struct RenderRunner {
    inner: Arc<RunnerInner>,
}

struct RunnerInner {
    assets: Arc<dyn AssetPort>,
    engine: Arc<dyn EnginePort>,
    publisher: Arc<ArtifactPublisher>,
    registry: Arc<JobRegistry>,
    permits: Arc<Semaphore>,
    cancels: Mutex<HashMap<JobId, watch::Sender<bool>>>,
    settings: RunnerSettings,
}

impl RenderRunner {
    pub fn new(
        assets: Arc<dyn AssetPort>,
        engine: Arc<dyn EnginePort>,
        publisher: Arc<ArtifactPublisher>,
        registry: Arc<JobRegistry>,
        settings: RunnerSettings,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent_jobs.max(1)));
        Self {
            inner: Arc::new(RunnerInner {
                assets,
                engine,
                publisher,
                registry,
                permits,
                cancels: Mutex::new(HashMap::new()),
                settings,
            }),
        }
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.inner.settings
    }

    /// Validate, compile and enqueue a composition.
    ///
    /// Invalid compositions fail here, before any process is spawned. On
    /// success the job is queued and its id returned without waiting for the
    /// render. Must be called from within a Tokio runtime.
    pub fn submit(&self, composition: Composition) -> Result<JobId, DomainError> {
        let inner = &self.inner;
        let plan = plan_render(&composition, inner.assets.as_ref(), &inner.settings.presets)?;

        let id = JobId::generate();
        let output_path = inner.settings.output_dir.join(format!("{}.mp4", id));
        let invocation = EngineInvocation {
            args: compiler::engine_args(&plan.compilation.spec, &output_path),
            output_path,
        };

        for warning in &plan.warnings {
            warn!(job_id = %id, "{}", warning);
        }
        inner
            .registry
            .insert(RenderJob::queued(id.clone(), Arc::new(composition), plan.warnings));

        let (cancel_tx, cancel_rx) = watch::channel(false);
        inner.cancel_senders().insert(id.clone(), cancel_tx);

        info!(job_id = %id, "job queued");
        let span = info_span!("job", job_id = %id);
        let worker = Arc::clone(inner);
        tokio::spawn(worker.work(id.clone(), invocation, cancel_rx).instrument(span));
        Ok(id)
    }

    /// Current record of a job
    pub fn status(&self, id: &JobId) -> Result<RenderJob, DomainError> {
        self.inner.registry.get(id)
    }

    /// All known jobs, oldest first
    pub fn jobs(&self) -> Vec<RenderJob> {
        self.inner.registry.list()
    }

    /// Request cancellation of a queued or running job.
    ///
    /// The worker terminates the engine, deletes partial output and records
    /// the failure; cancelling a finished job does nothing.
    pub fn cancel(&self, id: &JobId) -> Result<(), DomainError> {
        let job = self.inner.registry.get(id)?;
        if job.is_terminal() {
            return Ok(());
        }
        match self.inner.cancel_senders().get(id) {
            Some(sender) => {
                let _ = sender.send(true);
                info!(job_id = %id, "cancellation requested");
            }
            None => {
                debug!(job_id = %id, state = ?job.state, "no running worker, nothing to cancel")
            }
        }
        Ok(())
    }

    /// Poll until the job reaches a terminal state
    pub async fn wait(&self, id: &JobId, poll_interval: Duration) -> Result<RenderJob, DomainError> {
        loop {
            let job = self.status(id)?;
            if job.is_terminal() {
                return Ok(job);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

impl RunnerInner {
    fn cancel_senders(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, watch::Sender<bool>>> {
        self.cancels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn work(self: Arc<Self>, id: JobId, invocation: EngineInvocation, mut cancel: watch::Receiver<bool>) {
        self.run_job(&id, &invocation, &mut cancel).await;
        self.cancel_senders().remove(&id);
    }

    async fn run_job(&self, id: &JobId, invocation: &EngineInvocation, cancel: &mut watch::Receiver<bool>) {
        let permit = tokio::select! {
            permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return self.fail(id, "worker pool is closed"),
            },
            _ = cancelled(cancel) => return self.fail(id, CANCELLED),
        };

        self.transition(id, RenderJob::running);
        info!(stage = "render", "render started");

        let artifact = match self.render(invocation, cancel).await {
            Ok(artifact) => artifact,
            Err(detail) => return self.fail(id, detail),
        };
        drop(permit);

        self.transition(id, |job| job.rendered(artifact.path.clone()));
        info!(stage = "publish", bytes = artifact.size, "render finished, publishing");

        let published = tokio::select! {
            result = self.publisher.publish(id, &artifact.path) => result,
            _ = cancelled(cancel) => return self.fail(id, CANCELLED),
        };
        match published {
            Ok(reference) => {
                info!(url = %reference.url, "job succeeded");
                self.transition(id, move |job| job.succeeded(reference));
            }
            Err(e) => self.fail(id, detail(e)),
        }
    }

    /// Run the engine and verify its output; errors are failure details
    async fn render(
        &self,
        invocation: &EngineInvocation,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<VerifiedArtifact, String> {
        let output = invocation.output_path.as_path();
        if let Some(dir) = output.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| format!("cannot create output directory {}: {}", dir.display(), e))?;
        }
        ArtifactVerifier::remove(output).await.map_err(detail)?;

        let limit = self.settings.timeout;
        let run = async {
            match limit {
                Some(limit) => tokio::time::timeout(limit, self.engine.run(invocation))
                    .await
                    .ok(),
                None => Some(self.engine.run(invocation).await),
            }
        };

        // Dropping the run future kills the engine process
        let result = tokio::select! {
            result = run => result,
            _ = cancelled(cancel) => {
                ArtifactVerifier::discard_partial(output).await;
                return Err(CANCELLED.to_string());
            }
        };

        match result {
            None => {
                ArtifactVerifier::discard_partial(output).await;
                Err(TIMED_OUT.to_string())
            }
            Some(Err(e)) => Err(detail(e)),
            Some(Ok(outcome)) if !outcome.success() => {
                ArtifactVerifier::discard_partial(output).await;
                Err(self.exit_detail(&outcome))
            }
            Some(Ok(_)) => ArtifactVerifier::verify(output).await.map_err(detail),
        }
    }

    fn exit_detail(&self, outcome: &EngineOutcome) -> String {
        let status = match outcome.exit_code {
            Some(code) => format!("engine exited with code {}", code),
            None => "engine was terminated by a signal".to_string(),
        };
        let tail = tail(&outcome.diagnostics, self.settings.diagnostic_tail_bytes);
        if tail.is_empty() {
            status
        } else {
            format!("{}: {}", status, tail)
        }
    }

    fn transition<F>(&self, id: &JobId, transition: F)
    where
        F: FnOnce(&RenderJob) -> RenderJob,
    {
        if let Err(e) = self.registry.update(id, transition) {
            warn!(job_id = %id, error = %e, "job record disappeared");
        }
    }

    fn fail(&self, id: &JobId, detail: impl Into<String>) {
        let detail = detail.into();
        match self.registry.update(id, |job| job.failed(detail.clone())) {
            Ok(job) => warn!(stage = %job.stage, detail = %detail, "job failed"),
            Err(e) => warn!(job_id = %id, error = %e, "job record disappeared"),
        }
    }
}

/// Resolves once cancellation has been requested
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            // Sender gone: cancellation can no longer arrive
            std::future::pending::<()>().await;
        }
    }
}

/// Failure detail without the error-kind prefix
fn detail(error: DomainError) -> String {
    match error {
        DomainError::RenderFailed(msg)
        | DomainError::PublishFailed(msg)
        | DomainError::Io(msg)
        | DomainError::Timeout(msg) => msg,
        other => other.to_string(),
    }
}

/// Last `limit` bytes of a diagnostic text, cut on a char boundary
fn tail(text: &str, limit: usize) -> &str {
    let text = text.trim();
    if text.len() <= limit {
        return text;
    }
    let mut start = text.len() - limit;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}
