//! In-memory fakes for the runner trait (testing only)

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use covrun_core::{CoverageError, Result};

use crate::runner::{CommandRunner, StageResult};
use crate::stage::StageConfig;

/// Runner that records every stage it is asked to run.
///
/// Stages pass unless configured with `failing` (non-zero exit) or
/// `timing_out` (runner error).
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<StageConfig>>,
    exit_codes: HashMap<String, i32>,
    timeouts: HashSet<String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, stage: &str, exit_code: i32) -> Self {
        self.exit_codes.insert(stage.to_string(), exit_code);
        self
    }

    pub fn timing_out(mut self, stage: &str) -> Self {
        self.timeouts.insert(stage.to_string());
        self
    }

    /// Stages run so far, in order.
    pub fn calls(&self) -> Vec<StageConfig> {
        self.calls.lock().unwrap().clone()
    }

    /// Names of the stages run so far, in order.
    pub fn stage_names(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.name).collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, config: &StageConfig) -> Result<StageResult> {
        self.calls.lock().unwrap().push(config.clone());

        if self.timeouts.contains(&config.name) {
            return Err(CoverageError::Timeout {
                stage: config.name.clone(),
                secs: config.timeout_secs,
            });
        }

        let exit_code = self.exit_codes.get(&config.name).copied().unwrap_or(0);
        Ok(StageResult {
            stage_name: config.name.clone(),
            exit_code,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
            success: exit_code == 0,
        })
    }
}
