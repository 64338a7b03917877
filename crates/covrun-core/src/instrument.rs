//! Instrumentation environment for coverage builds.
//!
//! The variables are handed to each cargo child process explicitly; the
//! orchestrator's own environment is never modified.

use serde::{Deserialize, Serialize};

/// Compiler flags for `-Zprofile` based coverage.
pub const COVERAGE_RUSTFLAGS: &[&str] = &[
    "-Zprofile",
    "-Ccodegen-units=1",
    "-Copt-level=0",
    "-Clink-dead-code",
    "-Coverflow-checks=off",
    "-Zpanic_abort_tests",
    "-Cpanic=abort",
];

/// Flags for rustdoc so doc-tests abort on panic like the unit tests.
pub const COVERAGE_RUSTDOCFLAGS: &[&str] = &["-Cpanic=abort"];

/// Environment passed to instrumented build and test processes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstrumentationEnv {
    /// Whether incremental compilation stays on.
    pub incremental: bool,

    /// Flags for `RUSTFLAGS`.
    pub rustflags: Vec<String>,

    /// Flags for `RUSTDOCFLAGS`.
    pub rustdocflags: Vec<String>,
}

impl InstrumentationEnv {
    /// The coverage-profiling environment.
    pub fn coverage() -> Self {
        Self {
            incremental: false,
            rustflags: COVERAGE_RUSTFLAGS.iter().map(|f| f.to_string()).collect(),
            rustdocflags: COVERAGE_RUSTDOCFLAGS
                .iter()
                .map(|f| f.to_string())
                .collect(),
        }
    }

    /// Variable/value pairs in the order they are applied.
    pub fn vars(&self) -> Vec<(String, String)> {
        vec![
            (
                "CARGO_INCREMENTAL".to_string(),
                if self.incremental { "1" } else { "0" }.to_string(),
            ),
            ("RUSTFLAGS".to_string(), self.rustflags.join(" ")),
            ("RUSTDOCFLAGS".to_string(), self.rustdocflags.join(" ")),
        ]
    }

    /// Look up a single variable.
    pub fn get(&self, name: &str) -> Option<String> {
        self.vars()
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

impl Default for InstrumentationEnv {
    fn default() -> Self {
        Self::coverage()
    }
}
