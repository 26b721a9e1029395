//! Gilt - golden-output regression harness for a multi-stage compiler
//!
//! Drives an external compiler and IR interpreter as black boxes, captures
//! what they print, and compares it with stored baseline files. Three stages
//! are covered: parsing, semantic analysis, and emission plus execution.

pub mod case;
pub mod compare;
pub mod config;
pub mod error;
pub mod generate;
pub mod harness;
pub mod runner;
pub mod stage;
pub mod store;
pub mod suite;

// Re-export commonly used types
pub use case::{ArtifactKind, Expectation, Stage, TestCase};
pub use compare::{CheckFailure, Verdict};
pub use config::HarnessConfig;
pub use error::HarnessError;
pub use harness::Harness;
pub use runner::{Outcome, ProcessRunner, Runner};
pub use store::{BaselineStore, FsBaselineStore, MemoryBaselineStore};
