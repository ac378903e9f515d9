// Application layer - Job orchestration

pub mod container;
pub mod publisher;
pub mod registry;
pub mod render_runner;

// Re-export application services
pub use container::{AppContainer, DefaultAppContainer};
pub use publisher::ArtifactPublisher;
pub use registry::JobRegistry;
pub use render_runner::{plan_render, RenderPlan, RenderRunner, RunnerSettings};
