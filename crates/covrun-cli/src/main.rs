//! covrun - coverage report runner
//!
//! Running `covrun` with no arguments in a project root:
//!
//! 1. checks for `rustup`, `cargo`, `grcov` and an installed nightly toolchain
//! 2. runs `cargo clean`
//! 3. runs `cargo +nightly test -- --test-threads=1` with `-Zprofile` instrumentation
//! 4. renders `target/debug/coverage/` with grcov
//! 5. opens `target/debug/coverage/index.html`
//!
//! Exit codes: 0 on success, 1 on a missing dependency, otherwise the exit
//! code of the stage that failed.

use anyhow::{Context, Result};
use clap::Parser;
use covrun_ci::{CommandRunner, CoveragePipeline, PipelineResult, ProcessRunner};
use covrun_core::config::{DEFAULT_CHANNEL, DEFAULT_TARGET_DIR};
use covrun_core::{
    init_tracing, CoverageConfig, CoverageError, Dependency, SystemProbe, ToolProbe,
};
use crossterm::style::Stylize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(name = "covrun")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate and open an HTML coverage report with grcov", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Project root (default: current directory)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Toolchain channel to run the tests under
    #[arg(long, env = "COVRUN_CHANNEL", default_value = DEFAULT_CHANNEL)]
    channel: String,

    /// Cargo target directory
    #[arg(long, env = "CARGO_TARGET_DIR", default_value = DEFAULT_TARGET_DIR)]
    target_dir: PathBuf,

    /// Generate the report without opening it
    #[arg(long)]
    no_open: bool,

    /// Per-stage timeout in seconds (0 = none)
    #[arg(long, default_value = "0")]
    timeout: u64,

    /// Write the run summary as JSON to this file
    #[arg(long)]
    summary: Option<PathBuf>,
}

impl Cli {
    fn config(&self) -> CoverageConfig {
        CoverageConfig::new()
            .with_workspace(&self.workspace)
            .with_channel(&self.channel)
            .with_target_dir(&self.target_dir)
            .with_open_report(!self.no_open)
            .with_stage_timeout(self.timeout)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    match run(&cli, &SystemProbe, &ProcessRunner::new()).await {
        Ok(status) => ExitCode::from(status),
        Err(err) => {
            eprintln!("{} {:#}", "error:".bold(), err);
            ExitCode::FAILURE
        }
    }
}

/// Run the pipeline and return the process exit status.
async fn run(cli: &Cli, probe: &dyn ToolProbe, runner: &dyn CommandRunner) -> Result<u8> {
    let config = cli.config();
    info!(channel = %config.channel, workspace = %config.workspace.display(), "Generating coverage report");

    let result = match CoveragePipeline::run(probe, runner, &config).await {
        Ok(result) => result,
        Err(CoverageError::MissingDependency(dep)) => {
            eprintln!("{}", missing_dependency_message(&dep));
            return Ok(1);
        }
        Err(err) => return Err(err).context("Coverage pipeline failed to run"),
    };

    print_summary(&result);

    if let Some(path) = &cli.summary {
        write_summary(&result, path)?;
    }

    Ok(exit_status(result.exit_code()))
}

/// Diagnostic printed for a missing tool or toolchain.
fn missing_dependency_message(dep: &Dependency) -> String {
    format!(
        "{} {}\n\nRead the Docs:\n    {}",
        "error:".bold(),
        dep.message(),
        dep.docs_url()
    )
}

fn print_summary(result: &PipelineResult) {
    println!();
    for stage in &result.stages {
        let status = if stage.passed() { "✓" } else { "✗" };
        println!(
            "  {} {} ({}ms, exit code: {})",
            status, stage.stage_name, stage.duration_ms, stage.exit_code
        );
    }
    println!();

    if result.success {
        println!("Coverage report: {}", result.report_index.display());
    } else if let Some(stage) = &result.failed_stage {
        println!("✗ Stage '{}' failed, later stages were skipped", stage);
    }
}

fn write_summary(result: &PipelineResult, path: &Path) -> Result<()> {
    let json = serde_json::to_vec_pretty(result).context("Failed to serialize run summary")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write run summary to {}", path.display()))?;
    info!(path = %path.display(), "Wrote run summary");
    Ok(())
}

/// Clamp a stage exit code into the range a process can return.
fn exit_status(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use covrun_ci::fakes::RecordingRunner;
    use covrun_ci::StageResult;
    use covrun_core::fakes::StaticProbe;

    fn installed_nightly() -> Vec<String> {
        vec!["nightly-x86_64-unknown-linux-gnu".to_string()]
    }

    fn plain_cli() -> Cli {
        Cli::try_parse_from(["covrun", "--channel", "nightly", "--target-dir", "target"]).unwrap()
    }

    #[tokio::test]
    async fn test_missing_rustup_exits_one_without_running_stages() {
        let probe = StaticProbe::with_all_tools(installed_nightly()).without("rustup");
        let runner = RecordingRunner::new();

        let status = run(&plain_cli(), &probe, &runner).await.unwrap();

        assert_eq!(status, 1);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_channel_exits_one() {
        let probe = StaticProbe::with_all_tools(vec!["stable-x86_64-unknown-linux-gnu".to_string()]);
        let runner = RecordingRunner::new();

        let status = run(&plain_cli(), &probe, &runner).await.unwrap();

        assert_eq!(status, 1);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_successful_run_exits_zero() {
        let probe = StaticProbe::with_all_tools(installed_nightly());
        let runner = RecordingRunner::new();

        let status = run(&plain_cli(), &probe, &runner).await.unwrap();

        assert_eq!(status, 0);
        assert_eq!(runner.stage_names(), vec!["clean", "test", "report", "open"]);
    }

    #[tokio::test]
    async fn test_failed_stage_exit_code_passes_through() {
        let probe = StaticProbe::with_all_tools(installed_nightly());
        let runner = RecordingRunner::new().failing("test", 101);

        let status = run(&plain_cli(), &probe, &runner).await.unwrap();

        assert_eq!(status, 101);
        assert_eq!(runner.stage_names(), vec!["clean", "test"]);
    }

    #[test]
    fn test_no_arguments_is_plain_run() {
        let cli = Cli::try_parse_from(["covrun"]).unwrap();
        let config = cli.config();

        assert_eq!(config.workspace, PathBuf::from("."));
        assert!(config.open_report);
        assert_eq!(config.stage_timeout_secs, 0);
        assert!(cli.summary.is_none());
    }

    #[test]
    fn test_flags_map_to_config() {
        let cli = Cli::try_parse_from([
            "covrun",
            "--workspace",
            "/work/project",
            "--channel",
            "nightly-2024-05-01",
            "--target-dir",
            "build",
            "--no-open",
            "--timeout",
            "900",
        ])
        .unwrap();
        let config = cli.config();

        assert_eq!(config.workspace, PathBuf::from("/work/project"));
        assert_eq!(config.channel, "nightly-2024-05-01");
        assert_eq!(config.report_index(), PathBuf::from("build/debug/coverage/index.html"));
        assert!(!config.open_report);
        assert_eq!(config.stage_timeout_secs, 900);
    }

    #[test]
    fn test_rejects_positional_arguments() {
        assert!(Cli::try_parse_from(["covrun", "extra"]).is_err());
    }

    #[test]
    fn test_missing_rustup_message() {
        let message = missing_dependency_message(&Dependency::Rustup);
        assert!(message.contains("error:"));
        assert!(message.contains("rustup is not installed."));
        assert!(message.contains("\n\nRead the Docs:\n    https://rustup.rs/"));
    }

    #[test]
    fn test_missing_toolchain_message() {
        let message = missing_dependency_message(&Dependency::Toolchain {
            channel: "nightly".to_string(),
        });
        assert!(message.contains("rustup toolchain install nightly"));
        assert!(!message.contains("nightly is not installed."));
    }

    #[test]
    fn test_exit_status_clamps() {
        assert_eq!(exit_status(0), 0);
        assert_eq!(exit_status(101), 101);
        assert_eq!(exit_status(-1), 1);
        assert_eq!(exit_status(300), 1);
    }

    #[test]
    fn test_write_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let result = PipelineResult {
            run_id: "run123".to_string(),
            started_at: chrono::Utc::now(),
            finished_at: chrono::Utc::now(),
            success: true,
            stages: vec![StageResult {
                stage_name: "clean".to_string(),
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
                duration_ms: 5,
                success: true,
            }],
            failed_stage: None,
            report_index: PathBuf::from("target/debug/coverage/index.html"),
            duration_ms: 5,
        };

        write_summary(&result, &path).unwrap();

        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["run_id"], "run123");
        assert_eq!(written["stages"][0]["stage_name"], "clean");
    }
}
