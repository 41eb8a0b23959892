//! Three-phase execution orchestration
//!
//! Phases run in a fixed sequence: all run-first groups (sequentially, in
//! declaration order), then the remaining packages as one concurrent
//! batch, then all run-last groups. The first failure aborts the run;
//! later phases never start. Completed phases are not rolled back.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use smartrun_core::classify::{Classification, PatternGroup};
use smartrun_core::error::ExecError;

use crate::executor::ScriptExecutor;
use crate::reporter::{RunEvent, RunReporter};

/// One phase of the run sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Run-first groups, sequential by pattern
    RunFirst,
    /// Everything unclaimed, one concurrent batch
    Other,
    /// Run-last groups, sequential by pattern
    RunLast,
}

impl Phase {
    /// The fixed phase order
    pub const SEQUENCE: [Phase; 3] = [Phase::RunFirst, Phase::Other, Phase::RunLast];
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RunFirst => write!(f, "run-first"),
            Self::Other => write!(f, "other"),
            Self::RunLast => write!(f, "run-last"),
        }
    }
}

/// Label used for the unclaimed batch in events and errors
const OTHER_GROUP_LABEL: &str = "*";

/// Drives the three-phase run over a script executor
pub struct Orchestrator {
    executor: Arc<dyn ScriptExecutor>,
    reporter: Arc<dyn RunReporter>,
}

impl Orchestrator {
    /// Create a new orchestrator
    pub fn new(executor: Arc<dyn ScriptExecutor>, reporter: Arc<dyn RunReporter>) -> Self {
        Self { executor, reporter }
    }

    /// Run the classification's groups against `script`.
    ///
    /// Returns whether the OTHER phase actually executed any packages,
    /// letting the caller distinguish "nothing (re)ran in bulk" from a
    /// full run. An empty OTHER set is skipped as a no-op, not a failure.
    pub async fn run(
        &self,
        classification: &Classification,
        script: &str,
        args: &[String],
        concurrency: usize,
    ) -> Result<bool, ExecError> {
        let start = Instant::now();
        let mut other_executed = false;

        let outcome = async {
            for phase in Phase::SEQUENCE {
                match phase {
                    Phase::RunFirst => {
                        self.run_groups(
                            phase,
                            &classification.run_first_groups,
                            script,
                            args,
                            concurrency,
                        )
                        .await?;
                    }
                    Phase::Other => {
                        other_executed = self
                            .run_other(classification, script, args, concurrency)
                            .await?;
                    }
                    Phase::RunLast => {
                        self.run_groups(
                            phase,
                            &classification.run_last_groups,
                            script,
                            args,
                            concurrency,
                        )
                        .await?;
                    }
                }
            }
            Ok(())
        }
        .await;

        self.reporter.report(&RunEvent::RunCompleted {
            succeeded: outcome.is_ok(),
            duration: start.elapsed(),
        });

        outcome.map(|()| other_executed)
    }

    /// Run the groups of one sequential phase, in declaration order,
    /// awaiting each before starting the next
    async fn run_groups(
        &self,
        phase: Phase,
        groups: &[PatternGroup],
        script: &str,
        args: &[String],
        concurrency: usize,
    ) -> Result<(), ExecError> {
        if groups.is_empty() {
            debug!(%phase, "phase has no groups, skipping");
            return Ok(());
        }

        self.reporter.report(&RunEvent::PhaseStarted {
            phase,
            groups: groups.len(),
        });

        for group in groups {
            self.run_group(phase, &group.pattern, &group.packages, script, args, concurrency)
                .await?;
        }

        Ok(())
    }

    /// Run the unclaimed batch; skipped entirely when empty
    async fn run_other(
        &self,
        classification: &Classification,
        script: &str,
        args: &[String],
        concurrency: usize,
    ) -> Result<bool, ExecError> {
        if classification.other_packages.is_empty() {
            debug!("no unclaimed packages, skipping other phase");
            return Ok(false);
        }

        self.reporter.report(&RunEvent::PhaseStarted {
            phase: Phase::Other,
            groups: 1,
        });

        let packages: Vec<String> = classification.other_packages.iter().cloned().collect();
        self.run_group(
            Phase::Other,
            OTHER_GROUP_LABEL,
            &packages,
            script,
            args,
            concurrency,
        )
        .await?;

        Ok(true)
    }

    /// Run one group through the executor, converting a failed result into
    /// an error carrying the phase and group context
    async fn run_group(
        &self,
        phase: Phase,
        group: &str,
        packages: &[String],
        script: &str,
        args: &[String],
        concurrency: usize,
    ) -> Result<(), ExecError> {
        let start = Instant::now();
        self.reporter.report(&RunEvent::GroupStarted {
            phase,
            group: group.to_string(),
            packages: packages.len(),
        });

        let result = self
            .executor
            .execute(packages, script, args, concurrency)
            .await?;

        if !result.success {
            return Err(ExecError::ScriptFailed {
                phase: phase.to_string(),
                group: group.to_string(),
                script: script.to_string(),
                exit_code: result.exit_code,
            });
        }

        info!(%phase, group, packages = packages.len(), "group completed");
        self.reporter.report(&RunEvent::GroupCompleted {
            phase,
            group: group.to_string(),
            duration: start.elapsed(),
        });
        Ok(())
    }
}
