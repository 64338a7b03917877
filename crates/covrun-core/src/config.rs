//! Run configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Toolchain channel that provides `-Zprofile`.
pub const DEFAULT_CHANNEL: &str = "nightly";

/// Default cargo target directory, relative to the workspace.
pub const DEFAULT_TARGET_DIR: &str = "target";

/// Configuration for a single coverage run.
///
/// `CoverageConfig::default()` reproduces the plain `covrun` invocation:
/// current directory, nightly channel, `target/` output, report opened
/// at the end, no stage timeout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CoverageConfig {
    /// Project root; every stage runs with this as its working directory.
    pub workspace: PathBuf,

    /// Toolchain channel the test stage runs under.
    pub channel: String,

    /// Cargo target directory, relative to `workspace` unless absolute.
    pub target_dir: PathBuf,

    /// Whether to open the report once it is generated.
    pub open_report: bool,

    /// Per-stage timeout in seconds (0 = none).
    pub stage_timeout_secs: u64,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("."),
            channel: DEFAULT_CHANNEL.to_string(),
            target_dir: PathBuf::from(DEFAULT_TARGET_DIR),
            open_report: true,
            stage_timeout_secs: 0,
        }
    }
}

impl CoverageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = workspace.into();
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_target_dir(mut self, target_dir: impl Into<PathBuf>) -> Self {
        self.target_dir = target_dir.into();
        self
    }

    pub fn with_open_report(mut self, open_report: bool) -> Self {
        self.open_report = open_report;
        self
    }

    pub fn with_stage_timeout(mut self, secs: u64) -> Self {
        self.stage_timeout_secs = secs;
        self
    }

    /// Debug build output, where the profiling data lands.
    ///
    /// Stays relative when `target_dir` is relative; stages run inside
    /// `workspace`.
    pub fn debug_dir(&self) -> PathBuf {
        self.target_dir.join("debug")
    }

    /// Directory grcov writes the HTML report into.
    pub fn report_dir(&self) -> PathBuf {
        self.debug_dir().join("coverage")
    }

    /// Entry page of the HTML report, relative to `workspace`.
    pub fn report_index(&self) -> PathBuf {
        self.report_dir().join("index.html")
    }

    /// Entry page of the HTML report as seen from the caller's directory.
    pub fn report_index_in_workspace(&self) -> PathBuf {
        self.workspace.join(self.report_index())
    }
}
