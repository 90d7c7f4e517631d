//! Autopatch CI - build and test oracles backed by real commands
//!
//! Provides:
//! - Builtin build/test commands per repository kind
//! - A stage runner with working directory, timeout and captured output
//! - `Toolchain`, pairing a `Builder` with a `Tester` for the repair loop

pub mod runner;
pub mod stage;
pub mod toolchain;

// Re-export key types
pub use runner::{CiRunner, StageResult};
pub use stage::{KindStage, StageConfig};
pub use toolchain::{CommandOracle, Toolchain};
