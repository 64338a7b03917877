//! Preflight checks for the coverage toolchain.
//!
//! Checks run in a fixed order and stop at the first failure:
//! 1. `rustup` on PATH
//! 2. `cargo` on PATH
//! 3. `grcov` on PATH
//! 4. the configured channel listed by `rustup toolchain list`
//!
//! Probing goes through [`ToolProbe`] so the same sequence can run against
//! a fake in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::CoverageConfig;
use crate::error::{CoverageError, Result};

/// A required tool or toolchain channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dependency {
    /// Toolchain manager
    Rustup,

    /// Build and test tool
    Cargo,

    /// Coverage aggregation tool
    Grcov,

    /// Toolchain channel that must be installed through rustup
    Toolchain { channel: String },
}

impl Dependency {
    /// Executable looked up on PATH, if this dependency is a program.
    pub fn program(&self) -> Option<&'static str> {
        match self {
            Dependency::Rustup => Some("rustup"),
            Dependency::Cargo => Some("cargo"),
            Dependency::Grcov => Some("grcov"),
            Dependency::Toolchain { .. } => None,
        }
    }

    /// Human-readable description of what is missing.
    pub fn message(&self) -> String {
        match self {
            Dependency::Toolchain { channel } => format!(
                "{} toolchain is not installed. Run \"{}\".",
                channel,
                self.remediation().unwrap_or_default()
            ),
            _ => format!("{} is not installed.", self.program().unwrap_or_default()),
        }
    }

    /// Command that installs the dependency, where one exists.
    pub fn remediation(&self) -> Option<String> {
        match self {
            Dependency::Toolchain { channel } => {
                Some(format!("rustup toolchain install {}", channel))
            }
            _ => None,
        }
    }

    /// Installation documentation.
    pub fn docs_url(&self) -> &'static str {
        match self {
            Dependency::Rustup => "https://rustup.rs/",
            Dependency::Cargo => {
                "https://doc.rust-lang.org/cargo/getting-started/installation.html"
            }
            Dependency::Grcov => "https://github.com/mozilla/grcov#how-to-get-grcov",
            Dependency::Toolchain { .. } => {
                "https://rust-lang.github.io/rustup/concepts/channels.html"
            }
        }
    }
}

/// Source of tool availability information.
#[async_trait]
pub trait ToolProbe: Send + Sync {
    /// Resolve an executable on PATH.
    fn resolve(&self, program: &str) -> Option<PathBuf>;

    /// Toolchain names as printed by `rustup toolchain list`, one per entry.
    async fn installed_toolchains(&self, rustup: &Path) -> Result<Vec<String>>;
}

/// Probe backed by the real PATH and a real `rustup`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

#[async_trait]
impl ToolProbe for SystemProbe {
    fn resolve(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }

    async fn installed_toolchains(&self, rustup: &Path) -> Result<Vec<String>> {
        let output = Command::new(rustup)
            .args(["toolchain", "list"])
            .output()
            .await
            .map_err(|e| CoverageError::Probe(format!("{}: {}", rustup.display(), e)))?;

        if !output.status.success() {
            return Err(CoverageError::Probe(format!(
                "rustup toolchain list exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// Resolved locations of everything the pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreflightReport {
    pub rustup: PathBuf,
    pub cargo: PathBuf,
    pub grcov: PathBuf,

    /// Full name of the matching installed toolchain.
    pub toolchain: String,
}

/// Preflight check sequence.
pub struct Preflight;

impl Preflight {
    /// Run every check in order, stopping at the first missing dependency.
    pub async fn check(probe: &dyn ToolProbe, config: &CoverageConfig) -> Result<PreflightReport> {
        let rustup = Self::require(probe, Dependency::Rustup)?;
        let cargo = Self::require(probe, Dependency::Cargo)?;
        let grcov = Self::require(probe, Dependency::Grcov)?;

        let toolchains = probe.installed_toolchains(&rustup).await?;
        let toolchain = toolchains
            .iter()
            .find_map(|line| toolchain_matches(line, &config.channel))
            .ok_or_else(|| {
                CoverageError::MissingDependency(Dependency::Toolchain {
                    channel: config.channel.clone(),
                })
            })?;

        info!(toolchain = %toolchain, "Preflight checks passed");

        Ok(PreflightReport {
            rustup,
            cargo,
            grcov,
            toolchain,
        })
    }

    fn require(probe: &dyn ToolProbe, dep: Dependency) -> Result<PathBuf> {
        let program = dep.program().unwrap_or_default();
        match probe.resolve(program) {
            Some(path) => {
                debug!(program, path = %path.display(), "Resolved tool");
                Ok(path)
            }
            None => Err(CoverageError::MissingDependency(dep)),
        }
    }
}

/// Return the toolchain name on `line` if it belongs to `channel`.
///
/// `nightly-x86_64-unknown-linux-gnu (default)` belongs to `nightly`;
/// `stable-x86_64-unknown-linux-gnu` does not, and neither does the dated
/// `nightly-2024-05-01-x86_64-unknown-linux-gnu`, since `cargo +nightly`
/// cannot select it.
fn toolchain_matches(line: &str, channel: &str) -> Option<String> {
    let name = line.split_whitespace().next()?;
    let belongs = match name.strip_prefix(channel) {
        Some("") => true,
        Some(rest) => rest
            .strip_prefix('-')
            .map(|host| !host.is_empty() && !starts_with_date(host))
            .unwrap_or(false),
        None => false,
    };
    belongs.then(|| name.to_string())
}

/// Whether `s` begins with a `YYYY-MM-DD` archive date.
fn starts_with_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 10
        && bytes[..10].iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::StaticProbe;

    fn nightly_list() -> Vec<String> {
        vec![
            "stable-x86_64-unknown-linux-gnu (default)".to_string(),
            "nightly-x86_64-unknown-linux-gnu".to_string(),
        ]
    }

    #[test]
    fn test_toolchain_matches_host_suffix() {
        assert_eq!(
            toolchain_matches("nightly-x86_64-unknown-linux-gnu (default)", "nightly"),
            Some("nightly-x86_64-unknown-linux-gnu".to_string())
        );
    }

    #[test]
    fn test_toolchain_matches_exact_name() {
        assert_eq!(
            toolchain_matches("nightly", "nightly"),
            Some("nightly".to_string())
        );
    }

    #[test]
    fn test_toolchain_does_not_match_other_channel() {
        assert!(toolchain_matches("stable-x86_64-unknown-linux-gnu", "nightly").is_none());
        assert!(toolchain_matches("nightlyish", "nightly").is_none());
        assert!(toolchain_matches("", "nightly").is_none());
    }

    #[test]
    fn test_dated_toolchain_does_not_satisfy_rolling_channel() {
        assert!(toolchain_matches("nightly-2024-05-01-x86_64-unknown-linux-gnu", "nightly").is_none());
        assert_eq!(
            toolchain_matches("nightly-2024-05-01-x86_64-unknown-linux-gnu", "nightly-2024-05-01"),
            Some("nightly-2024-05-01-x86_64-unknown-linux-gnu".to_string())
        );
    }

    #[test]
    fn test_starts_with_date() {
        assert!(starts_with_date("2024-05-01-x86_64-unknown-linux-gnu"));
        assert!(starts_with_date("2024-05-01"));
        assert!(!starts_with_date("x86_64-unknown-linux-gnu"));
        assert!(!starts_with_date("2024-05"));
    }

    #[test]
    fn test_dependency_urls() {
        assert_eq!(Dependency::Rustup.docs_url(), "https://rustup.rs/");
        assert!(Dependency::Grcov.docs_url().contains("grcov"));
        assert!(Dependency::Cargo.docs_url().contains("cargo"));
    }

    #[test]
    fn test_toolchain_message_has_install_command() {
        let dep = Dependency::Toolchain {
            channel: "nightly".to_string(),
        };
        assert!(dep.message().contains("rustup toolchain install nightly"));
        assert!(dep.program().is_none());
    }

    #[tokio::test]
    async fn test_all_present_passes() {
        let probe = StaticProbe::with_all_tools(nightly_list());
        let report = Preflight::check(&probe, &CoverageConfig::default())
            .await
            .expect("preflight failed");

        assert_eq!(report.toolchain, "nightly-x86_64-unknown-linux-gnu");
        assert_eq!(report.rustup, PathBuf::from("/usr/bin/rustup"));
    }

    #[tokio::test]
    async fn test_each_missing_tool_is_reported() {
        for (program, expected) in [
            ("rustup", Dependency::Rustup),
            ("cargo", Dependency::Cargo),
            ("grcov", Dependency::Grcov),
        ] {
            let probe = StaticProbe::with_all_tools(nightly_list()).without(program);
            let err = Preflight::check(&probe, &CoverageConfig::default())
                .await
                .unwrap_err();
            assert_eq!(err.missing_dependency(), Some(&expected));
        }
    }

    #[tokio::test]
    async fn test_first_failure_stops_probing() {
        let probe = StaticProbe::with_all_tools(nightly_list()).without("rustup");
        let _ = Preflight::check(&probe, &CoverageConfig::default()).await;

        assert_eq!(probe.resolved(), vec!["rustup".to_string()]);
        assert!(!probe.toolchains_listed());
    }

    #[tokio::test]
    async fn test_missing_channel_with_tools_present() {
        let probe =
            StaticProbe::with_all_tools(vec!["stable-x86_64-unknown-linux-gnu".to_string()]);
        let err = Preflight::check(&probe, &CoverageConfig::default())
            .await
            .unwrap_err();

        assert_eq!(
            err.missing_dependency(),
            Some(&Dependency::Toolchain {
                channel: "nightly".to_string()
            })
        );
        assert!(err.to_string().contains("rustup toolchain install nightly"));
    }

    #[tokio::test]
    async fn test_only_dated_nightly_installed_reports_missing_channel() {
        let probe = StaticProbe::with_all_tools(vec![
            "stable-x86_64-unknown-linux-gnu (default)".to_string(),
            "nightly-2024-05-01-x86_64-unknown-linux-gnu".to_string(),
        ]);
        let err = Preflight::check(&probe, &CoverageConfig::default())
            .await
            .unwrap_err();

        assert_eq!(
            err.missing_dependency(),
            Some(&Dependency::Toolchain {
                channel: "nightly".to_string()
            })
        );
        assert!(err.to_string().contains("rustup toolchain install nightly"));
    }

    #[tokio::test]
    async fn test_custom_channel() {
        let probe = StaticProbe::with_all_tools(vec![
            "nightly-2024-05-01-x86_64-unknown-linux-gnu".to_string(),
        ]);
        let config = CoverageConfig::new().with_channel("nightly-2024-05-01");
        let report = Preflight::check(&probe, &config).await.expect("preflight failed");
        assert!(report.toolchain.starts_with("nightly-2024-05-01"));
    }
}
