//! CLI for stratbench - benchmark inference strategies across models and tasks.

mod progress;

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use console::style;
use progress::ProgressDisplay;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use stratbench_core::config::ConfigOverrides;
use stratbench_core::persistence::RunStore;
use stratbench_core::reporter::{NullReporter, ProgressReporter};
use stratbench_core::{load_run, BenchConfig, Benchmark, TemperatureSchedule};
use tracing::{debug, info};

#[derive(Debug, Parser)]
#[command(
    name = "stratbench",
    version,
    about = "Benchmark inference strategies across models and tasks"
)]
struct Cli {
    /// Path to a YAML configuration file. Built-in registries are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run every (strategy, model, task) cell and print the report (default).
    Run(RunArgs),

    /// Re-render the report of a stored run.
    Show {
        /// Run ID (directory name under the runs dir).
        run_id: String,
        #[arg(long)]
        runs_dir: Option<PathBuf>,
        /// Print the report document as JSON instead of markdown.
        #[arg(long)]
        json: bool,
    },

    /// Print the strategy policy table.
    Policies,

    /// Print the resolved configuration as YAML.
    ShowConfig,
}

#[derive(Debug, Default, Args)]
struct RunArgs {
    /// Number of cells to run in parallel.
    #[arg(long)]
    concurrency: Option<usize>,
    /// Per-call timeout in seconds.
    #[arg(long)]
    timeout: Option<f64>,
    /// Comma-separated strategies to run, in order (e.g. --strategies baseline,reread).
    #[arg(long, value_delimiter = ',')]
    strategies: Option<Vec<String>>,
    /// Directory that receives the per-run output directories.
    #[arg(long)]
    output: Option<String>,
    /// Where to write the markdown report.
    #[arg(long)]
    report: Option<String>,
    #[arg(long)]
    run_id: Option<String>,
    /// Suppress per-cell progress output.
    #[arg(short, long)]
    quiet: bool,
}

impl RunArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            concurrency: self.concurrency,
            call_timeout_seconds: self.timeout,
            strategies: self.strategies.as_ref().map(|s| {
                s.iter()
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .collect()
            }),
            runs_dir: self.output.clone(),
            report_file: self.report.clone(),
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let command = cli.command.unwrap_or_else(|| Command::Run(RunArgs::default()));

    let overrides = match &command {
        Command::Run(args) => args.overrides(),
        _ => ConfigOverrides::default(),
    };
    let config = BenchConfig::from_file(cli.config.as_deref(), overrides)?;
    debug!(name = %config.name, "Loaded configuration");

    match command {
        Command::Run(args) => run(config, args),
        Command::Show {
            run_id,
            runs_dir,
            json,
        } => show(&config, &run_id, runs_dir, json),
        Command::Policies => {
            print_policies(&config)?;
            Ok(())
        }
        Command::ShowConfig => {
            println!(
                "Loaded benchmark '{}': {} strategies, {} model(s), {} task(s).",
                config.name,
                config.strategies.len(),
                config.models.len(),
                config.tasks.len()
            );
            println!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
    }
}

fn run(config: BenchConfig, args: RunArgs) -> Result<()> {
    let report_path = config.report_path();
    let reporter: Arc<dyn ProgressReporter> = if args.quiet {
        Arc::new(NullReporter)
    } else {
        print_header(&config);
        Arc::new(ProgressDisplay::new())
    };

    let bench = Benchmark::new(config).with_reporter(reporter);
    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(bench.run(args.run_id))?;

    let markdown = outcome.report.to_markdown();
    fs::write(&report_path, &markdown)?;
    info!(path = %report_path.display(), "Report written");

    println!("{markdown}");
    println!(
        "{} Results saved to {} (run data in {})",
        style("✓").green().bold(),
        report_path.display(),
        outcome.run_dir.display()
    );
    Ok(())
}

fn print_header(config: &BenchConfig) {
    println!("{}", style("Strategy Benchmark").bold());
    println!(
        "Strategies: {}",
        style(config.strategies.join(", ")).cyan()
    );
    let models: Vec<String> = config.models.iter().map(|m| m.label()).collect();
    println!("Models: {}", style(models.join(", ")).cyan());
    let tasks: Vec<&str> = config.tasks.iter().map(|t| t.id.as_str()).collect();
    println!("Tasks: {}", style(tasks.join(", ")).cyan());
    println!();
}

fn show(config: &BenchConfig, run_id: &str, runs_dir: Option<PathBuf>, json: bool) -> Result<()> {
    let runs_dir = runs_dir.unwrap_or_else(|| config.runs_dir());
    let run_dir = runs_dir.join(run_id);
    if !RunStore::open(&run_dir).exists() {
        return Err(anyhow!(
            "run '{run_id}' not found in {}",
            runs_dir.display()
        ));
    }

    let (metadata, report) = load_run(&run_dir)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if let Some(meta) = metadata {
        println!(
            "Run {} ({:?}): {}/{} cells",
            style(&meta.run_id).bold(),
            meta.status,
            meta.completed_cells,
            meta.total_cells
        );
        if !meta.status.is_terminal() {
            println!("{}", style("Run did not finish; showing partial results.").yellow());
        }
        println!();
    }
    println!("{}", report.to_markdown());
    Ok(())
}

fn describe_schedule(schedule: &TemperatureSchedule, runs: u32) -> String {
    match schedule {
        TemperatureSchedule::Base => format!("model default x{runs}"),
        TemperatureSchedule::Repeat(t) => format!("{t} x{runs}"),
        TemperatureSchedule::Fixed(ts) => ts
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn print_policies(config: &BenchConfig) -> Result<()> {
    let table = config.policy_table()?;
    println!(
        "{:<20} {:>4}  {:<22} {:>6}",
        "Strategy", "Runs", "Temperatures", "Cost"
    );
    println!("{}", "-".repeat(56));
    for policy in table.iter() {
        println!(
            "{:<20} {:>4}  {:<22} {:>5.1}x",
            policy.name,
            policy.run_count,
            describe_schedule(&policy.temperatures, policy.run_count),
            policy.cost_multiplier
        );
    }
    Ok(())
}
