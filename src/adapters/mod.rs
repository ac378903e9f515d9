// Adapters - External system implementations

pub mod assets_local;
pub mod exec_ffmpeg;
pub mod storage_fs;
pub mod storage_http;
pub mod toml_config;
pub mod tracing_log;

// Re-export adapters
pub use assets_local::LocalAssetResolver;
pub use exec_ffmpeg::FfmpegEngine;
pub use storage_fs::LocalStorage;
pub use storage_http::HttpStorage;
