//! Run progress reporting

use std::time::Duration;

use crate::orchestrator::Phase;

/// Events emitted while a run progresses
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// A phase is starting
    PhaseStarted { phase: Phase, groups: usize },
    /// One group within a phase is starting
    GroupStarted {
        phase: Phase,
        group: String,
        packages: usize,
    },
    /// A group finished successfully
    GroupCompleted {
        phase: Phase,
        group: String,
        duration: Duration,
    },
    /// A package's script is starting
    PackageStarted { package: String, command: String },
    /// A package's script produced a line of output
    PackageOutput {
        package: String,
        line: String,
        is_stderr: bool,
    },
    /// A package's script completed successfully
    PackageCompleted { package: String, duration: Duration },
    /// A package's script failed
    PackageFailed {
        package: String,
        duration: Duration,
        exit_code: i32,
    },
    /// The whole run finished (successfully or not)
    RunCompleted {
        succeeded: bool,
        duration: Duration,
    },
}

/// Trait for reporting run progress
pub trait RunReporter: Send + Sync {
    /// Handle a run event
    fn report(&self, event: &RunEvent);
}

/// Reporter that logs to tracing
#[derive(Debug, Default)]
pub struct TracingReporter;

impl RunReporter for TracingReporter {
    fn report(&self, event: &RunEvent) {
        match event {
            RunEvent::PhaseStarted { phase, groups } => {
                tracing::info!("Phase {} starting ({} groups)", phase, groups);
            }
            RunEvent::GroupStarted {
                phase,
                group,
                packages,
            } => {
                tracing::info!("[{}] group '{}' starting ({} packages)", phase, group, packages);
            }
            RunEvent::GroupCompleted {
                phase,
                group,
                duration,
            } => {
                tracing::info!(
                    "[{}] group '{}' completed in {:.1}s",
                    phase,
                    group,
                    duration.as_secs_f64()
                );
            }
            RunEvent::PackageStarted { package, command } => {
                tracing::info!("{}: {}", package, command);
            }
            RunEvent::PackageOutput {
                package,
                line,
                is_stderr,
            } => {
                if *is_stderr {
                    tracing::warn!("[{}] {}", package, line);
                } else {
                    tracing::debug!("[{}] {}", package, line);
                }
            }
            RunEvent::PackageCompleted { package, duration } => {
                tracing::info!("{} completed in {:.1}s", package, duration.as_secs_f64());
            }
            RunEvent::PackageFailed {
                package,
                duration,
                exit_code,
            } => {
                tracing::error!(
                    "{} failed after {:.1}s with exit code {}",
                    package,
                    duration.as_secs_f64(),
                    exit_code
                );
            }
            RunEvent::RunCompleted { succeeded, duration } => {
                if *succeeded {
                    tracing::info!("run completed in {:.1}s", duration.as_secs_f64());
                } else {
                    tracing::error!("run failed after {:.1}s", duration.as_secs_f64());
                }
            }
        }
    }
}

/// Reporter that collects events for later inspection (useful for testing)
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: std::sync::Mutex<Vec<RunEvent>>,
}

impl CollectingReporter {
    /// Get all collected events
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl RunReporter for CollectingReporter {
    fn report(&self, event: &RunEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
