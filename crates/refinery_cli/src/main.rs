use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use refinery_core::{scenario_catalog, ScenarioId};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod overrides;
mod runner;
mod summary;

use runner::{RunOptions, Span};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "refinery_cli", about = "Refinery operations simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one plant for a fixed number of ticks or simulated hours.
    Run {
        /// One-minute ticks to run. Mutually exclusive with --hours.
        #[arg(long, conflicts_with = "hours", required_unless_present = "hours")]
        ticks: Option<u64>,
        /// Simulated hours, driven through the real-time clock.
        #[arg(long)]
        hours: Option<u64>,
        /// Random seed. Drawn at random when omitted.
        #[arg(long)]
        seed: Option<u64>,
        /// Resume from a snapshot JSON file.
        #[arg(long)]
        state: Option<PathBuf>,
        /// Write the final snapshot to this file.
        #[arg(long)]
        save: Option<PathBuf>,
        /// Scenario key, applied after any loaded state.
        #[arg(long)]
        scenario: Option<String>,
        /// JSON file of `{ "at_minute", "command" }` entries.
        #[arg(long)]
        commands: Option<PathBuf>,
        #[command(flatten)]
        constants: ConstantsArgs,
        /// Simulated minutes between status lines (0 = silent).
        #[arg(long, default_value_t = 240)]
        print_every: u64,
        /// Sample metrics every N simulated minutes.
        #[arg(long, default_value_t = 60)]
        metrics_every: u64,
        /// Disable metrics collection to the runs/ directory.
        #[arg(long)]
        no_metrics: bool,
    },
    /// Run scenarios across many seeds in parallel and summarize the outcomes.
    Sweep {
        /// Comma-separated scenario keys. Every scenario when omitted.
        #[arg(long, value_delimiter = ',')]
        scenarios: Vec<String>,
        #[arg(long, value_delimiter = ',', default_value = "1,2,3,4,5,6,7,8")]
        seeds: Vec<u64>,
        #[arg(long, default_value_t = 72)]
        hours: u64,
        #[command(flatten)]
        constants: ConstantsArgs,
        /// Write summary.json into a timestamped directory under this path.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// List the scenario catalog.
    Scenarios,
}

#[derive(clap::Args)]
struct ConstantsArgs {
    /// Engine constants JSON file. Missing keys keep their defaults.
    #[arg(long = "constants")]
    constants_file: Option<PathBuf>,
    /// Override one constant, e.g. `--set log_capacity=200`. Repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    sets: Vec<String>,
}

impl ConstantsArgs {
    fn build(&self) -> Result<refinery_core::Constants> {
        overrides::build_constants(self.constants_file.as_deref(), &self.sets)
    }
}

fn parse_scenario(key: &str) -> Result<ScenarioId> {
    ScenarioId::parse(key).with_context(|| {
        let valid: Vec<&str> = ScenarioId::ALL.into_iter().map(ScenarioId::as_str).collect();
        format!("unknown scenario '{key}'. Valid scenarios: {}", valid.join(", "))
    })
}

fn create_run_dir(base: &Path, name: &str) -> Result<PathBuf> {
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let dir = base.join(format!("{timestamp}_{name}"));
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating run directory: {}", dir.display()))?;
    Ok(dir)
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

struct RunArgs {
    span: Span,
    seed: Option<u64>,
    state: Option<PathBuf>,
    save: Option<PathBuf>,
    scenario: Option<String>,
    commands: Option<PathBuf>,
    constants: ConstantsArgs,
    print_every: u64,
    metrics_every: u64,
    no_metrics: bool,
}

fn run(args: RunArgs) -> Result<()> {
    let seed = args.seed.unwrap_or_else(rand::random);
    let scenario = args.scenario.as_deref().map(parse_scenario).transpose()?;
    let run_dir = if args.no_metrics {
        None
    } else {
        let dir = create_run_dir(Path::new("runs"), &format!("seed{seed}"))?;
        println!("Run directory: {}", dir.display());
        Some(dir)
    };

    let options = RunOptions {
        seed,
        span: args.span,
        scenario,
        constants: args.constants.build()?,
        state: args.state,
        save: args.save,
        commands: args.commands,
        print_every: args.print_every,
        metrics_every: args.metrics_every,
        run_dir,
    };
    let metrics = runner::run_plant(&options)?;
    tracing::info!(
        minute = metrics.minute,
        score = metrics.score,
        grade = %metrics.grade,
        "run complete"
    );
    Ok(())
}

fn sweep(
    scenario_keys: &[String],
    seeds: &[u64],
    hours: u64,
    constants: &ConstantsArgs,
    output_dir: Option<&Path>,
) -> Result<()> {
    let constants = constants.build()?;
    let scenarios = if scenario_keys.is_empty() {
        ScenarioId::ALL.to_vec()
    } else {
        scenario_keys
            .iter()
            .map(|key| parse_scenario(key))
            .collect::<Result<Vec<_>>>()?
    };
    if seeds.is_empty() {
        anyhow::bail!("sweep needs at least one seed");
    }

    let jobs: Vec<(ScenarioId, u64)> = scenarios
        .iter()
        .flat_map(|&scenario| seeds.iter().map(move |&seed| (scenario, seed)))
        .collect();
    println!(
        "Running {} scenarios x {} seeds ({} h each) in parallel...",
        scenarios.len(),
        seeds.len(),
        hours
    );

    let results: Vec<runner::SeedResult> = jobs
        .par_iter()
        .map(|&(scenario, seed)| runner::run_seed(&constants, scenario, seed, hours))
        .collect();

    let summaries = summary::compute_summary(&results);
    summary::print_summary(hours, &summaries);

    if let Some(base) = output_dir {
        let dir = create_run_dir(base, "sweep")?;
        let path = dir.join("summary.json");
        let report = serde_json::json!({
            "runner": "refinery_cli",
            "hours": hours,
            "seeds": seeds,
            "constants": constants,
            "scenarios": summaries,
        });
        let json = serde_json::to_string_pretty(&report).context("serializing summary")?;
        std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("Summary written to {}", path.display());
    }
    Ok(())
}

fn list_scenarios() {
    for def in scenario_catalog() {
        println!("{:<22} {:<24} {}", def.key.as_str(), def.name, def.description);
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            ticks,
            hours,
            seed,
            state,
            save,
            scenario,
            commands,
            constants,
            print_every,
            metrics_every,
            no_metrics,
        } => {
            let span = match (ticks, hours) {
                (Some(ticks), _) => Span::Ticks(ticks),
                (None, Some(hours)) => Span::Hours(hours),
                (None, None) => anyhow::bail!("either --ticks or --hours is required"),
            };
            run(RunArgs {
                span,
                seed,
                state,
                save,
                scenario,
                commands,
                constants,
                print_every,
                metrics_every,
                no_metrics,
            })?;
        }
        Commands::Sweep {
            scenarios,
            seeds,
            hours,
            constants,
            output_dir,
        } => sweep(&scenarios, &seeds, hours, &constants, output_dir.as_deref())?,
        Commands::Scenarios => list_scenarios(),
    }
    Ok(())
}
