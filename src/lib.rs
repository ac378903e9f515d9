//! reelgen Library
//!
//! Compiles declarative video compositions (background, text and overlay
//! layers, audio) into ffmpeg filter graphs, renders them as background jobs
//! and publishes the results to object storage.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod compiler;
pub mod config_initialization;
pub mod domain;
pub mod error;
pub mod output;
pub mod ports;

// Re-export commonly used types
pub use app::{AppContainer, DefaultAppContainer, RenderRunner};
pub use compiler::{compile, Compilation, PipelineSpec};
pub use domain::errors::DomainError;
pub use domain::job::{JobId, JobState, RenderJob};
pub use domain::model::Composition;
pub use error::{ReelgenError, ReelgenResult};
