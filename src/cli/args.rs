//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;

/// Arguments for the render command
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Composition file (.json, .yaml or .yml)
    #[arg(short, long)]
    pub composition: PathBuf,

    /// Encoding profile, overriding the composition's own (preview or final)
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Render time limit in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Arguments for the compile command
#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Composition file (.json, .yaml or .yml)
    #[arg(short, long)]
    pub composition: PathBuf,

    /// Output path written into the command line
    #[arg(short, long, default_value = "out.mp4")]
    pub output: PathBuf,

    /// Encoding profile, overriding the composition's own (preview or final)
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Print the compiled pipeline as JSON instead of a command line
    #[arg(long)]
    pub json: bool,
}
