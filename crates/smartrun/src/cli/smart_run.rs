//! The smart-run flow: resolve, classify, execute, checkpoint

use std::sync::Arc;

use anyhow::Context;
use console::style;
use tracing::info;

use smartrun_core::changes::{ChangeResolver, PackageFilter};
use smartrun_core::classify::classify;
use smartrun_core::config::load_config_or_default;
use smartrun_core::error::ConfigError;
use smartrun_core::monorepo::{PackageDiscovery, PackageGraph, Workspace};
use smartrun_core::vcs::CheckpointVcs;
use smartrun_exec::{
    default_concurrency, Orchestrator, ProcessExecutor, RunEvent, RunReporter, TracingReporter,
};
use smartrun_git::{GitCheckpoints, GitRepo};

use super::Cli;

pub async fn execute(cli: &Cli) -> anyhow::Result<()> {
    let root = match &cli.directory {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };

    // Conflicting flags are a configuration error, caught before any
    // package work begins
    if cli.tag_on_success && cli.delete_tag_on_success {
        return Err(ConfigError::ConflictingOptions(
            "a new checkpoint supersedes the previous one; \
             --tag-on-success and --delete-tag-on-success cannot both be set"
                .to_string(),
        )
        .into());
    }

    let (config, config_path) = load_config_or_default(&root)?;
    if let Some(path) = &config_path {
        info!(path = %path.display(), "using config file");
    }

    let repo = GitRepo::discover(&root)?;
    let checkpoints = GitCheckpoints::new(repo, config.checkpoint.prefix.clone());
    let previous = checkpoints.latest_checkpoint()?;

    match &previous {
        Some(name) => info!(checkpoint = %name, "found previous checkpoint"),
        None => info!("no previous checkpoint"),
    }

    if cli.delete_tag {
        if let Some(name) = &previous {
            checkpoints.delete_checkpoint(name)?;
            if !cli.quiet {
                println!("{} Deleted checkpoint {}", style("✓").green(), style(name).cyan());
            }
        } else if !cli.quiet {
            println!("{} No checkpoint to delete", style("○").yellow());
        }
        return Ok(());
    }

    let script = cli
        .script
        .clone()
        .ok_or(ConfigError::MissingScript)
        .context("the first argument must specify a package script to run")?;

    // CLI flags override config file values
    let run_first = if cli.run_first.is_empty() {
        config.run.first.clone()
    } else {
        cli.run_first.clone()
    };
    let run_last = if cli.run_last.is_empty() {
        config.run.last.clone()
    } else {
        cli.run_last.clone()
    };
    let args = if cli.args.is_empty() {
        config.run.args.clone()
    } else {
        cli.args.clone()
    };
    let concurrency = cli
        .concurrency
        .or(config.run.concurrency)
        .unwrap_or_else(default_concurrency);

    // Load the workspace and build the dependency graph
    let workspace = Workspace::detect(&root)?;
    let workspace_type = workspace.workspace_type;
    let packages = PackageDiscovery::new(workspace).discover()?;
    let graph = PackageGraph::build(&packages)?;
    graph.validate()?;

    // Resolve what changed since the checkpoint
    let resolver = ChangeResolver::new(&root, &packages, &graph)
        .with_dependents(!cli.exclude_dependents);
    let changed = resolver.resolve(previous.as_deref(), &checkpoints)?;

    let filter = PackageFilter::new(cli.scope.clone(), cli.ignore.clone());
    let names = if filter.is_empty() {
        changed.names(&graph)
    } else {
        filter.apply(&changed.names(&graph))?
    };

    if names.is_empty() {
        if !cli.quiet {
            println!("{} No packages changed", style("✓").green());
        }
        return Ok(());
    }

    if !cli.quiet {
        match &previous {
            Some(name) => println!(
                "{} Checkpoint {} found, running smart {} across {} package{}",
                style("→").blue(),
                style(name).cyan(),
                style(&script).bold(),
                names.len(),
                if names.len() == 1 { "" } else { "s" },
            ),
            None => println!(
                "{} No checkpoint found, running full {} across {} package{}",
                style("→").blue(),
                style(&script).bold(),
                names.len(),
                if names.len() == 1 { "" } else { "s" },
            ),
        }
    }

    let classification = classify(&names, &run_first, &run_last)?;

    let reporter: Arc<dyn RunReporter> = if cli.quiet {
        Arc::new(TracingReporter)
    } else {
        Arc::new(ConsoleReporter::new(cli.verbose))
    };

    let executor = Arc::new(ProcessExecutor::new(
        workspace_type,
        &packages,
        &graph,
        reporter.clone(),
    ));
    let orchestrator = Orchestrator::new(executor, reporter);

    let other_ran = orchestrator
        .run(&classification, &script, &args, concurrency)
        .await?;

    if !cli.quiet && !other_ran {
        println!(
            "{} Only pattern groups ran; no other packages had changes",
            style("○").yellow()
        );
    }

    if cli.tag_on_success {
        let name = checkpoints.create_checkpoint()?;
        if !cli.quiet {
            println!("{} Created checkpoint {}", style("✓").green(), style(&name).cyan());
        }
        if let Some(old) = &previous {
            checkpoints.delete_checkpoint(old)?;
        }
    } else if cli.delete_tag_on_success {
        if let Some(old) = &previous {
            checkpoints.delete_checkpoint(old)?;
            if !cli.quiet {
                println!("{} Deleted checkpoint {}", style("✓").green(), style(old).cyan());
            }
        }
    }

    Ok(())
}

/// Console reporter with live output
struct ConsoleReporter {
    verbose: bool,
}

impl ConsoleReporter {
    fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl RunReporter for ConsoleReporter {
    fn report(&self, event: &RunEvent) {
        match event {
            RunEvent::PhaseStarted { phase, groups } => {
                if self.verbose {
                    println!(
                        "  {} phase {} ({} group{})",
                        style("─").dim(),
                        style(phase).bold(),
                        groups,
                        if *groups == 1 { "" } else { "s" },
                    );
                }
            }
            RunEvent::GroupStarted {
                phase,
                group,
                packages,
            } => {
                println!(
                    "  {} [{}] {} ({} package{})",
                    style("▸").dim(),
                    phase,
                    style(group).bold(),
                    packages,
                    if *packages == 1 { "" } else { "s" },
                );
            }
            RunEvent::GroupCompleted {
                phase,
                group,
                duration,
            } => {
                println!(
                    "  {} [{}] {} {}",
                    style("✓").green(),
                    phase,
                    style(group).green(),
                    style(format!("{:.1}s", duration.as_secs_f64())).dim()
                );
            }
            RunEvent::PackageStarted { package, command } => {
                if self.verbose {
                    println!(
                        "    {} {} {}",
                        style("▸").dim(),
                        package,
                        style(format!("({})", command)).dim()
                    );
                }
            }
            RunEvent::PackageOutput {
                package,
                line,
                is_stderr,
            } => {
                if self.verbose {
                    if *is_stderr {
                        println!("    {} {}", style(format!("[{}]", package)).red().dim(), line);
                    } else {
                        println!("    {} {}", style(format!("[{}]", package)).dim(), line);
                    }
                }
            }
            RunEvent::PackageCompleted { package, duration } => {
                println!(
                    "    {} {} {}",
                    style("✓").green(),
                    package,
                    style(format!("{:.1}s", duration.as_secs_f64())).dim()
                );
            }
            RunEvent::PackageFailed {
                package,
                duration,
                exit_code,
            } => {
                println!(
                    "    {} {} {} {}",
                    style("✗").red(),
                    style(package).red(),
                    style(format!("{:.1}s", duration.as_secs_f64())).dim(),
                    style(format!("exit code {}", exit_code)).red().dim()
                );
            }
            RunEvent::RunCompleted { succeeded, duration } => {
                println!();
                println!(
                    "  {} run {} in {}",
                    if *succeeded {
                        style("✓").green().bold()
                    } else {
                        style("✗").red().bold()
                    },
                    if *succeeded { "completed" } else { "failed" },
                    style(format!("{:.1}s", duration.as_secs_f64())).dim()
                );
            }
        }
    }
}
