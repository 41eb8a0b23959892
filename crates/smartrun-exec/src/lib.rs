//! smartrun exec — script execution for classified package groups
//!
//! This crate runs the three-phase sequence computed by `smartrun-core`:
//! a process-based script executor bounded by a concurrency semaphore, and
//! the orchestrator enforcing run-first / other / run-last ordering.

pub mod executor;
pub mod orchestrator;
pub mod reporter;

pub use executor::{default_concurrency, ExecutionResult, ProcessExecutor, ScriptExecutor};
pub use orchestrator::{Orchestrator, Phase};
pub use reporter::{CollectingReporter, RunEvent, RunReporter, TracingReporter};
