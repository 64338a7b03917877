//! Coverage pipeline orchestration.

use crate::runner::{CommandRunner, StageResult};
use crate::stage::{coverage_stages, StageConfig};
use chrono::{DateTime, Utc};
use covrun_core::{CoverageConfig, InstrumentationEnv, Preflight, Result, ToolProbe};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Result of a complete coverage pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Unique id for this run.
    pub run_id: String,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Whether every enabled stage passed.
    pub success: bool,

    /// Results of the stages that ran, in order.
    pub stages: Vec<StageResult>,

    /// Stage that stopped the pipeline, if any.
    pub failed_stage: Option<String>,

    /// Report entry page, relative to the caller's directory.
    pub report_index: PathBuf,

    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl PipelineResult {
    /// Number of stages that passed.
    pub fn passed_count(&self) -> usize {
        self.stages.iter().filter(|s| s.passed()).count()
    }

    /// Number of stages that failed.
    pub fn failed_count(&self) -> usize {
        self.stages.iter().filter(|s| !s.passed()).count()
    }

    /// Process exit code for this outcome.
    ///
    /// The failing stage's own code is passed through; stages without a
    /// usable code (signals, spawn errors, timeouts) map to 1.
    pub fn exit_code(&self) -> i32 {
        if self.success {
            return 0;
        }
        self.stages
            .iter()
            .find(|s| !s.passed())
            .map(|s| s.exit_code)
            .filter(|code| *code > 0)
            .unwrap_or(1)
    }
}

/// Coverage pipeline orchestrator.
pub struct CoveragePipeline;

impl CoveragePipeline {
    /// Preflight, then clean, test, report and open.
    ///
    /// A missing dependency is returned as an error before any stage runs.
    /// Stage failures are reported in the `PipelineResult`.
    pub async fn run(
        probe: &dyn ToolProbe,
        runner: &dyn CommandRunner,
        config: &CoverageConfig,
    ) -> Result<PipelineResult> {
        Preflight::check(probe, config).await?;

        let instrumentation = InstrumentationEnv::coverage();
        let stages = coverage_stages(config, &instrumentation);

        Ok(Self::run_stages(runner, config, stages).await)
    }

    /// Run `stages` in order, stopping at the first one that fails.
    pub async fn run_stages(
        runner: &dyn CommandRunner,
        config: &CoverageConfig,
        stages: Vec<StageConfig>,
    ) -> PipelineResult {
        let started_at = Utc::now();
        let start = Instant::now();
        let run_id = Uuid::new_v4().to_string();

        info!(run_id = %run_id, workspace = %config.workspace.display(), "Starting coverage pipeline");

        let mut stage_results = Vec::new();
        let mut failed_stage = None;

        for stage in stages {
            if !stage.enabled {
                info!(stage = %stage.name, "Skipping disabled stage");
                continue;
            }

            info!(stage = %stage.name, "Executing stage");

            let result = match runner.run(&stage).await {
                Ok(r) => r,
                Err(e) => {
                    // Spawn errors and timeouts stop the pipeline like a non-zero exit.
                    warn!(stage = %stage.name, error = %e, "Stage could not complete");
                    StageResult {
                        stage_name: stage.name.clone(),
                        exit_code: -1,
                        stdout: String::new(),
                        stderr: e.to_string(),
                        duration_ms: 0,
                        success: false,
                    }
                }
            };

            let passed = result.passed();
            if passed {
                info!(stage = %stage.name, duration_ms = result.duration_ms, "Stage passed");
            } else {
                warn!(stage = %stage.name, exit_code = result.exit_code, "Stage failed");
            }
            stage_results.push(result);

            if !passed {
                failed_stage = Some(stage.name);
                break;
            }
        }

        let success = failed_stage.is_none();
        let duration_ms = start.elapsed().as_millis() as u64;

        if success {
            info!(run_id = %run_id, duration_ms, "Coverage pipeline completed successfully");
        } else {
            info!(run_id = %run_id, duration_ms, "Coverage pipeline failed");
        }

        PipelineResult {
            run_id,
            started_at,
            finished_at: Utc::now(),
            success,
            stages: stage_results,
            failed_stage,
            report_index: config.report_index_in_workspace(),
            duration_ms,
        }
    }
}
