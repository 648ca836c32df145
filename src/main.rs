//! sitepipe - static asset pipeline: compile, optimize, assemble and publish.

mod asset;
mod cli;
mod compiler;
mod config;
mod core;
mod error;
mod logger;
mod page;
mod pipeline;
mod publish;
mod serve;
mod utils;

use std::process::ExitCode;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::{Config, Credentials};
use owo_colors::OwoColorize;
use pipeline::{PipelineRun, RunReport, StageGraph, StoreChoice, stage_graph};

fn main() -> Result<ExitCode> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();
    logger::set_verbose(cli.verbose);

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    match &cli.command {
        Commands::Stages => {
            list_stages(&stage_graph(StoreChoice::Aws)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Serve { .. } => {
            let config = Config::load(&cli)?;
            serve::serve(&config)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run { .. } | Commands::Build | Commands::Deploy { .. } => {
            let mut config = Config::load(&cli)?;
            config.resolve_asset_version()?;
            run_targets(&cli, &config)
        }
    }
}

// =============================================================================
// Run / Build / Deploy
// =============================================================================

/// Plan the requested targets and execute them.
fn run_targets(cli: &Cli, config: &Config) -> Result<ExitCode> {
    let graph = stage_graph(StoreChoice::Aws)?;
    let targets = cli.targets();
    let plan = graph.plan(targets.as_slice())?;
    debug!("run"; "plan: {}", plan);

    let credentials = Credentials::load(&config.root)?;
    let report = PipelineRun::new(&graph, plan, config, &credentials)
        .dry_run(cli.dry_run())
        .execute()?;

    Ok(summarize(&report))
}

/// Print the per-stage summary; non-zero exit names the failing stage.
fn summarize(report: &RunReport) -> ExitCode {
    for outcome in &report.outcomes {
        debug!("run"; "{:<16} {:<8} {:.2?}", outcome.stage.as_str(), outcome.status.to_string(), outcome.duration);
    }

    match report.first_failure() {
        None if report.is_success() => {
            log!("run"; "{} stage(s) done", report.outcomes.len());
            ExitCode::SUCCESS
        }
        None => {
            log!("run"; "interrupted");
            ExitCode::from(core::INTERRUPTED_EXIT)
        }
        Some(failed) => {
            let cause = failed
                .error
                .as_ref()
                .map(|e| format!("{e:#}"))
                .unwrap_or_default();
            eprintln!("{} stage `{}` failed: {}", "error:".red().bold(), failed.stage, cause);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Stages Command
// =============================================================================

fn list_stages(graph: &StageGraph) {
    for stage in graph.stages() {
        let mut line = stage.id().to_string().bold().to_string();
        if !stage.deps().is_empty() {
            line.push_str(&format!("  deps: {}", join(stage.deps().iter().map(|d| d.as_str()))));
        }
        if !stage.after().is_empty() {
            let after = join(stage.after().iter().map(|d| d.as_str()));
            line.push_str(&format!("  after: {}", after.dimmed()));
        }
        println!("{line}");
    }

    println!();
    for (name, members) in graph.composites() {
        println!("{} = {}", name.cyan(), join(members.iter().copied()));
    }
}

fn join<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}
