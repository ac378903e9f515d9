//! FFmpeg execution adapter
//!
//! Runs the encoding engine as a child process. The child is killed when the
//! run future is dropped, and only a bounded tail of its diagnostic stream is
//! kept in memory.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::debug;

use crate::domain::errors::*;
use crate::ports::*;

/// Default number of diagnostic bytes kept per run
pub const DEFAULT_TAIL_BYTES: usize = 4096;

/// FFmpeg-based engine adapter
pub struct FfmpegEngine {
    binary: PathBuf,
    tail_bytes: usize,
}

impl FfmpegEngine {
    /// Create an adapter for the given engine binary
    pub fn new(binary: impl Into<PathBuf>, tail_bytes: usize) -> Self {
        Self {
            binary: binary.into(),
            tail_bytes: tail_bytes.max(1),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn spawn_error(&self, error: std::io::Error) -> DomainError {
        if error.kind() == ErrorKind::NotFound {
            DomainError::EngineUnavailable(format!(
                "engine binary '{}' was not found",
                self.binary.display()
            ))
        } else {
            DomainError::RenderFailed(format!(
                "failed to start '{}': {}",
                self.binary.display(),
                error
            ))
        }
    }
}

#[async_trait]
impl EnginePort for FfmpegEngine {
    async fn run(&self, invocation: &EngineInvocation) -> Result<EngineOutcome, DomainError> {
        debug!(
            binary = %self.binary.display(),
            output = %invocation.output_path.display(),
            "spawning engine"
        );

        let mut child = Command::new(&self.binary)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        // Drain concurrently so a chatty engine cannot fill the pipe and stall
        let limit = self.tail_bytes;
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(drain_tail(stderr, limit)));

        let status = child
            .wait()
            .await
            .map_err(|e| DomainError::RenderFailed(format!("failed to wait for engine: {}", e)))?;

        let diagnostics = match stderr_task {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };

        debug!(code = ?status.code(), "engine exited");
        Ok(EngineOutcome {
            exit_code: status.code(),
            diagnostics,
        })
    }

    async fn version(&self) -> Result<String, DomainError> {
        let output = Command::new(&self.binary)
            .arg("-version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match self.spawn_error(e) {
                DomainError::RenderFailed(msg) => DomainError::EngineUnavailable(msg),
                other => other,
            })?;

        if !output.status.success() {
            return Err(DomainError::EngineUnavailable(format!(
                "'{} -version' exited with {}",
                self.binary.display(),
                output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .lines()
            .next()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .ok_or_else(|| DomainError::EngineUnavailable("engine printed no version".to_string()))
    }
}

/// Ring buffer keeping the last `limit` bytes written to it
pub struct TailBuffer {
    limit: usize,
    bytes: VecDeque<u8>,
}

impl TailBuffer {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            bytes: VecDeque::with_capacity(limit.min(64 * 1024)),
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend(chunk);
        if self.bytes.len() > self.limit {
            let excess = self.bytes.len() - self.limit;
            self.bytes.drain(..excess);
        }
    }

    pub fn into_string(self) -> String {
        let bytes: Vec<u8> = self.bytes.into_iter().collect();
        String::from_utf8_lossy(&bytes).trim().to_string()
    }
}

/// Read a stream to its end, keeping only its tail
pub async fn drain_tail<R>(mut reader: R, limit: usize) -> String
where
    R: AsyncRead + Unpin,
{
    let mut tail = TailBuffer::new(limit);
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => tail.push(&chunk[..n]),
        }
    }
    tail.into_string()
}
