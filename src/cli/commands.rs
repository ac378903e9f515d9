//! Command implementations

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::app::{plan_render, AppContainer};
use crate::cli::args::{CompileArgs, RenderArgs};
use crate::compiler::{self, serialize::command_line};
use crate::domain::errors::DomainError;
use crate::domain::job::JobState;
use crate::domain::model::{Composition, RenderProfile};
use crate::error::{ReelgenError, ReelgenResult};

/// Read and parse a composition file
pub fn load_composition(path: &Path) -> ReelgenResult<Composition> {
    let parse_error = |message: String| ReelgenError::CompositionParse {
        path: path.display().to_string(),
        message,
    };
    let content = std::fs::read_to_string(path).map_err(|e| parse_error(e.to_string()))?;
    Composition::from_file_content(path, &content).map_err(|e| match e {
        DomainError::CompositionInvalid(message) => parse_error(message),
        other => parse_error(other.to_string()),
    })
}

fn load_with_profile(path: &Path, profile: Option<&str>) -> Result<Composition> {
    let mut composition = load_composition(path)?;
    if let Some(profile) = profile {
        composition.profile = RenderProfile::parse(profile)?;
    }
    Ok(composition)
}

/// Execute the render command
pub async fn render(container: &dyn AppContainer, args: RenderArgs, poll_interval: Duration) -> Result<()> {
    info!("Starting render operation");
    info!("Composition: {}", args.composition.display());

    let composition = load_with_profile(&args.composition, args.profile.as_deref())?;
    let runner = container.runner();
    let id = runner
        .submit(composition)
        .context("Composition rejected")?;
    info!(job_id = %id, "Waiting for job to finish");

    let job = runner.wait(&id, poll_interval).await?;
    match (job.state, job.public_url(), job.failure.as_ref()) {
        (JobState::Succeeded, Some(url), _) => {
            println!("{}", url);
            info!("Render operation completed successfully");
            Ok(())
        }
        (_, _, Some(failure)) => Err(anyhow::anyhow!("Job {} failed: {}", id, failure)),
        (state, _, _) => Err(anyhow::anyhow!("Job {} ended in state {:?} without a result", id, state)),
    }
}

/// Execute the compile command
pub fn compile(container: &dyn AppContainer, engine_binary: &Path, args: CompileArgs) -> Result<()> {
    info!("Starting compile operation");

    let composition = load_with_profile(&args.composition, args.profile.as_deref())?;
    let plan = plan_render(&composition, container.assets().as_ref(), container.presets())
        .context("Composition rejected")?;

    for warning in &plan.warnings {
        warn!("{}", warning);
        eprintln!("warning: {}", warning);
    }

    let spec = &plan.compilation.spec;
    if args.json {
        let json = serde_json::to_string_pretty(spec).context("Failed to serialize pipeline")?;
        println!("{}", json);
    } else {
        let args = compiler::engine_args(spec, &args.output);
        println!("{}", command_line(&engine_binary.to_string_lossy(), &args));
    }
    Ok(())
}

/// Execute the check command
pub async fn check(container: &dyn AppContainer) -> Result<()> {
    let version = container
        .engine()
        .version()
        .await
        .context("Encoding engine check failed")?;
    println!("{}", version);
    Ok(())
}
