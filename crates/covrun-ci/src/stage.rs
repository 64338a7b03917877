//! Coverage stage definitions and configuration.

use covrun_core::{CoverageConfig, InstrumentationEnv};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Builtin coverage stages, in the order they run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinStage {
    /// cargo clean
    Clean,

    /// cargo +<channel> test -- --test-threads=1
    Test,

    /// grcov <target>/debug/ ... -o <target>/debug/coverage/
    Report,

    /// open <target>/debug/coverage/index.html
    Open,
}

impl BuiltinStage {
    /// Every builtin stage in pipeline order.
    pub const ALL: [BuiltinStage; 4] = [
        BuiltinStage::Clean,
        BuiltinStage::Test,
        BuiltinStage::Report,
        BuiltinStage::Open,
    ];

    /// Get the stage name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinStage::Clean => "clean",
            BuiltinStage::Test => "test",
            BuiltinStage::Report => "report",
            BuiltinStage::Open => "open",
        }
    }

    /// Whether the stage is a cargo invocation that needs the
    /// instrumentation env and the configured target directory.
    pub fn instrumented(&self) -> bool {
        matches!(self, BuiltinStage::Clean | BuiltinStage::Test)
    }

    /// Get the stage's command line.
    pub fn command(&self, config: &CoverageConfig) -> Vec<String> {
        match self {
            BuiltinStage::Clean => vec!["cargo".to_string(), "clean".to_string()],
            BuiltinStage::Test => vec![
                "cargo".to_string(),
                format!("+{}", config.channel),
                "test".to_string(),
                "--".to_string(),
                "--test-threads=1".to_string(),
            ],
            BuiltinStage::Report => vec![
                "grcov".to_string(),
                dir_arg(&config.debug_dir()),
                "-s".to_string(),
                ".".to_string(),
                "-t".to_string(),
                "html".to_string(),
                "--llvm".to_string(),
                "--branch".to_string(),
                "--ignore-not-existing".to_string(),
                "-o".to_string(),
                dir_arg(&config.report_dir()),
            ],
            BuiltinStage::Open => opener_command(&config.report_index()),
        }
    }
}

/// Directory argument with a trailing separator, as grcov is usually given.
fn dir_arg(path: &Path) -> String {
    let mut arg = path.display().to_string();
    if !arg.ends_with('/') {
        arg.push('/');
    }
    arg
}

/// Command that opens `target` in the platform's default viewer.
pub fn opener_command(target: &Path) -> Vec<String> {
    let target = target.display().to_string();
    if cfg!(target_os = "macos") {
        vec!["open".to_string(), target]
    } else if cfg!(target_os = "windows") {
        vec![
            "cmd".to_string(),
            "/C".to_string(),
            "start".to_string(),
            String::new(),
            target,
        ]
    } else {
        vec!["xdg-open".to_string(), target]
    }
}

/// Configuration for a coverage stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageConfig {
    /// Human-readable stage name.
    pub name: String,

    /// Command to execute (first element is executable).
    pub command: Vec<String>,

    /// Extra environment for the child process only.
    pub env: Vec<(String, String)>,

    /// Working directory; inherited when `None`.
    pub current_dir: Option<PathBuf>,

    /// Timeout in seconds (0 = none).
    pub timeout_secs: u64,

    /// Whether this stage is enabled.
    pub enabled: bool,
}

impl StageConfig {
    /// Create a stage configuration from a builtin stage.
    pub fn from_builtin(
        stage: BuiltinStage,
        config: &CoverageConfig,
        instrumentation: &InstrumentationEnv,
    ) -> Self {
        let mut env = Vec::new();
        if stage.instrumented() {
            env.extend(instrumentation.vars());
            // Relative paths resolve against `current_dir`, same as grcov's input.
            env.push((
                "CARGO_TARGET_DIR".to_string(),
                config.target_dir.display().to_string(),
            ));
        }

        Self {
            name: stage.name().to_string(),
            command: stage.command(config),
            env,
            current_dir: Some(config.workspace.clone()),
            timeout_secs: config.stage_timeout_secs,
            enabled: true,
        }
    }

    /// Create a custom stage configuration.
    pub fn custom(name: String, command: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            name,
            command,
            env: Vec::new(),
            current_dir: None,
            timeout_secs,
            enabled: true,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Disable this stage.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Look up an env var set for this stage.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// The full coverage stage list for `config`.
///
/// The open stage is present but disabled when the report should not be
/// opened, so the plan always lists all four stages.
pub fn coverage_stages(
    config: &CoverageConfig,
    instrumentation: &InstrumentationEnv,
) -> Vec<StageConfig> {
    BuiltinStage::ALL
        .iter()
        .map(|stage| {
            let stage_config = StageConfig::from_builtin(*stage, config, instrumentation);
            if *stage == BuiltinStage::Open && !config.open_report {
                stage_config.disabled()
            } else {
                stage_config
            }
        })
        .collect()
}
