//! CLI definition

mod smart_run;

use clap::Parser;

/// Run a script against the packages that changed since the last
/// checkpoint, honoring run-first/run-last ordering patterns
#[derive(Debug, Parser)]
#[command(name = "smartrun")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The package script to run (e.g. build, test)
    pub script: Option<String>,

    /// Arguments passed through to the script (after --)
    #[arg(last = true)]
    pub args: Vec<String>,

    /// Create a new checkpoint when the script finishes successfully
    /// (supersedes the previous one)
    #[arg(short = 't', long)]
    pub tag_on_success: bool,

    /// Delete the previous checkpoint when the script finishes successfully
    #[arg(short = 'd', long)]
    pub delete_tag_on_success: bool,

    /// Only delete the previous checkpoint, if it exists, and exit
    #[arg(short = 'D', long)]
    pub delete_tag: bool,

    /// Glob for packages to run before everything else (repeatable,
    /// declaration order is execution order)
    #[arg(short = 'f', long = "run-first", value_name = "GLOB")]
    pub run_first: Vec<String>,

    /// Glob for packages to run after everything else (repeatable)
    #[arg(short = 'l', long = "run-last", value_name = "GLOB")]
    pub run_last: Vec<String>,

    /// Maximum concurrent package scripts (default: available CPUs)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Only include packages matching this glob (repeatable)
    #[arg(long, value_name = "GLOB")]
    pub scope: Vec<String>,

    /// Exclude packages matching this glob (repeatable)
    #[arg(long, value_name = "GLOB")]
    pub ignore: Vec<String>,

    /// Do not include packages that depend on changed packages
    #[arg(long)]
    pub exclude_dependents: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress output except errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Working directory
    #[arg(short = 'C', long)]
    pub directory: Option<std::path::PathBuf>,
}

impl Cli {
    /// Execute the command
    pub fn execute(&self) -> anyhow::Result<()> {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(smart_run::execute(self))
    }
}
