//! covrun core
//!
//! Everything that has to hold before a coverage build is allowed to start:
//! - Preflight probing of `rustup`, `cargo`, `grcov` and the toolchain channel
//! - The instrumentation environment handed to cargo child processes
//! - Run configuration and tracing setup shared by the binaries

pub mod config;
pub mod error;
pub mod fakes;
pub mod instrument;
pub mod preflight;
pub mod telemetry;

pub use config::CoverageConfig;
pub use error::{CoverageError, Result};
pub use instrument::InstrumentationEnv;
pub use preflight::{Dependency, Preflight, SystemProbe, ToolProbe};
pub use telemetry::init_tracing;
