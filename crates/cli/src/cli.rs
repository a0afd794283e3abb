use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};
use stampede_core::Config;

/// Timed HTTP load tests.
///
/// Schedules probes at fixed offsets from start, runs them on a bounded
/// worker pool and reports every result.
#[derive(Parser, Debug)]
#[command(name = "stampede", version, about = "Timed HTTP load tests")]
pub struct CliArgs {
    /// Log at debug level, including per-worker activity bars
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a load test from a plan file or a single URL
    Run(RunArgs),
    /// Parse and validate a plan file without running it
    CheckPlan(CheckPlanArgs),
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("source").required(true).args(["plan", "url"])))]
pub struct RunArgs {
    /// TOML plan with [[event]] entries
    #[arg(long, conflicts_with_all = ["url", "expect"])]
    pub plan: Option<PathBuf>,

    /// URL to probe repeatedly
    #[arg(long, requires = "expect")]
    pub url: Option<String>,

    /// Regex the response body must match
    #[arg(long, requires = "url")]
    pub expect: Option<String>,

    /// First offset in milliseconds (with --url)
    #[arg(long, default_value_t = 500)]
    pub from: u64,

    /// Last offset in milliseconds, inclusive (with --url)
    #[arg(long, default_value_t = 5000)]
    pub to: u64,

    /// Spacing between offsets in milliseconds (with --url)
    #[arg(long, default_value_t = 100)]
    pub step: u64,

    /// Upper bound on concurrent workers
    #[arg(long)]
    pub max_workers: Option<usize>,

    /// Duration assumed for the last task when estimating progress
    #[arg(long)]
    pub assumed_task_ms: Option<u64>,

    /// Cookie header sent with every request (empty clears it)
    #[arg(long)]
    pub cookie: Option<String>,

    /// Print results and the summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    /// Apply command-line overrides on top of env and plan config.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(max_workers) = self.max_workers {
            config.run.max_workers = max_workers;
        }
        if let Some(assumed) = self.assumed_task_ms {
            config.run.assumed_task_ms = assumed;
        }
        if let Some(cookie) = &self.cookie {
            config.http.set_cookie(cookie);
        }
    }
}

#[derive(Args, Debug)]
pub struct CheckPlanArgs {
    /// Plan file to check
    pub plan: PathBuf,
}
