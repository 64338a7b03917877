//! covrun CI - coverage pipeline execution
//!
//! Provides the pipeline that turns a passing preflight into a report:
//! - Builds the clean, test, report and open stages
//! - Runs them one at a time, stopping at the first failure
//! - Returns a serializable summary of the run

pub mod fakes;
pub mod pipeline;
pub mod runner;
pub mod stage;

// Re-export key types
pub use pipeline::{CoveragePipeline, PipelineResult};
pub use runner::{CommandRunner, ProcessRunner, StageResult};
pub use stage::{coverage_stages, BuiltinStage, StageConfig};
