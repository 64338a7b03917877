//! In-memory fakes for probe traits (testing only)
//!
//! `StaticProbe` answers PATH lookups and toolchain listings from fixed
//! data and records every query so tests can assert what was probed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::preflight::ToolProbe;

/// Probe with a fixed set of executables and installed toolchains.
#[derive(Debug, Default)]
pub struct StaticProbe {
    tools: HashMap<String, PathBuf>,
    toolchains: Vec<String>,
    resolved: Mutex<Vec<String>>,
    listed: AtomicBool,
}

impl StaticProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// `rustup`, `cargo` and `grcov` under `/usr/bin`, plus the given toolchains.
    pub fn with_all_tools(toolchains: Vec<String>) -> Self {
        let mut probe = Self::new();
        for program in ["rustup", "cargo", "grcov"] {
            probe = probe.with_tool(program);
        }
        probe.toolchains = toolchains;
        probe
    }

    pub fn with_tool(mut self, program: &str) -> Self {
        self.tools
            .insert(program.to_string(), PathBuf::from("/usr/bin").join(program));
        self
    }

    pub fn without(mut self, program: &str) -> Self {
        self.tools.remove(program);
        self
    }

    /// Programs looked up so far, in order.
    pub fn resolved(&self) -> Vec<String> {
        self.resolved.lock().unwrap().clone()
    }

    /// Whether the toolchain listing was requested.
    pub fn toolchains_listed(&self) -> bool {
        self.listed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolProbe for StaticProbe {
    fn resolve(&self, program: &str) -> Option<PathBuf> {
        self.resolved.lock().unwrap().push(program.to_string());
        self.tools.get(program).cloned()
    }

    async fn installed_toolchains(&self, _rustup: &Path) -> Result<Vec<String>> {
        self.listed.store(true, Ordering::SeqCst);
        Ok(self.toolchains.clone())
    }
}
