mod cli;
mod console;
mod plan;

use std::process::ExitCode;
use std::sync::{mpsc, Arc};

use anyhow::{Context, Result};
use clap::Parser;
use stampede_core::Config;
use stampede_probe::ProbeClient;
use stampede_runner::{Collaborators, LoadTest, ProbeTask, SummaryReporter};
use tracing::{debug, error, info};

use crate::cli::{CheckPlanArgs, CliArgs, Command, RunArgs};
use crate::console::{
    render_summary, ChannelCompletion, ConsoleDisplay, ConsoleProgress, ConsoleReporter,
};
use crate::plan::Plan;

fn main() -> ExitCode {
    stampede_core::config::load_dotenv();
    let args = CliArgs::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match args.command {
        Command::Run(run) => run_load_test(run),
        Command::CheckPlan(check) => check_plan(check),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{e:#}"), "stampede failed");
            ExitCode::from(2)
        }
    }
}

/// Env config, then plan overrides, then command-line flags.
fn resolve_config(plan: &Plan, args: Option<&RunArgs>) -> Result<Config> {
    let mut config = Config::from_env();
    plan.apply_overrides(&mut config);
    if let Some(args) = args {
        args.apply_overrides(&mut config);
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn run_load_test(args: RunArgs) -> Result<ExitCode> {
    let plan = match (&args.plan, &args.url, &args.expect) {
        (Some(path), _, _) => Plan::load(path)
            .with_context(|| format!("failed to load plan {}", path.display()))?,
        (None, Some(url), Some(expect)) => {
            Plan::from_range(url, expect, args.from, args.to, args.step)?
        }
        _ => anyhow::bail!("either --plan or --url with --expect is required"),
    };
    let config = resolve_config(&plan, Some(&args))?;
    config.log_summary();

    let client = ProbeClient::new(&config.http).context("failed to build HTTP client")?;
    let probes = plan.build_probes(&client)?;
    let labels = probes.iter().map(|(_, p)| p.name().to_string()).collect();

    let (done_tx, done_rx) = mpsc::channel();
    let summary = Arc::new(SummaryReporter::new(Arc::new(ConsoleReporter::new(
        labels, args.json,
    ))));
    let collaborators = Collaborators::new(summary.clone(), Arc::new(ChannelCompletion::new(done_tx)))
        .with_progress(Arc::new(ConsoleProgress::new()))
        .with_display(Arc::new(ConsoleDisplay::new(config.run.display_scale_ms)));

    let load_test = LoadTest::new(config.run.clone(), collaborators)?;
    for (offset_ms, probe) in probes {
        load_test.add_task(offset_ms, Arc::new(probe))?;
    }
    info!(events = plan.events.len(), span_ms = plan.span_ms(), "plan scheduled");

    load_test.start()?;
    done_rx
        .recv()
        .context("run ended without signalling completion")?;
    load_test.stop();

    let summary = summary.summary();
    println!("{}", render_summary(&summary, args.json)?);
    Ok(if summary.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn check_plan(args: CheckPlanArgs) -> Result<ExitCode> {
    let plan = Plan::load(&args.plan)
        .with_context(|| format!("failed to load plan {}", args.plan.display()))?;
    let config = resolve_config(&plan, None)?;
    debug!(config = %config.redacted_summary(), "effective config");
    let client = ProbeClient::new(&config.http).context("failed to build HTTP client")?;
    plan.build_probes(&client)?;

    println!(
        "{}: {} events over {} ms, max_workers={}",
        args.plan.display(),
        plan.events.len(),
        plan.span_ms(),
        config.run.max_workers
    );
    Ok(ExitCode::SUCCESS)
}
