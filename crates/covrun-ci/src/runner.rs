//! Stage execution.

use crate::stage::StageConfig;
use async_trait::async_trait;
use covrun_core::{CoverageError, Result};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

/// Result of a stage execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageResult {
    /// Stage name.
    pub stage_name: String,

    /// Exit code (0 = success, -1 = no code, e.g. killed by a signal).
    pub exit_code: i32,

    /// Captured stdout (empty when output is inherited).
    pub stdout: String,

    /// Captured stderr (empty when output is inherited).
    pub stderr: String,

    /// Duration in milliseconds.
    pub duration_ms: u64,

    /// Whether execution succeeded.
    pub success: bool,
}

impl StageResult {
    /// Whether this stage passed (exit code 0).
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }
}

/// Executes a single stage.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, config: &StageConfig) -> Result<StageResult>;
}

/// Runs stages as child processes.
///
/// Output is inherited by default so test progress streams to the
/// terminal; `capturing()` collects it into the result instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner {
    capture_output: bool,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capturing() -> Self {
        Self {
            capture_output: true,
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, config: &StageConfig) -> Result<StageResult> {
        let start = Instant::now();

        let (exe, args) = config
            .command
            .split_first()
            .ok_or_else(|| CoverageError::EmptyCommand {
                stage: config.name.clone(),
            })?;

        debug!(stage = %config.name, command = ?config.command, env = ?config.env, "Spawning stage");

        let mut command = Command::new(exe);
        command
            .args(args)
            .envs(config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .kill_on_drop(true);

        if let Some(dir) = &config.current_dir {
            command.current_dir(dir);
        }

        if self.capture_output {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        let child = command.spawn().map_err(|source| CoverageError::Spawn {
            stage: config.name.clone(),
            source,
        })?;

        let output = if config.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(config.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| CoverageError::Timeout {
                stage: config.name.clone(),
                secs: config.timeout_secs,
            })??
        } else {
            child.wait_with_output().await?
        };

        let duration_ms = start.elapsed().as_millis() as u64;

        Ok(StageResult {
            stage_name: config.name.clone(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms,
            success: output.status.success(),
        })
    }
}
