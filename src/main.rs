//! Gibbs state preparation runner
//!
//! # Usage
//!
//! ```bash
//! # Train one (system, ancilla) cell
//! gibbs-qsim run --system 3 --ancilla 1
//!
//! # Train the configured grid and write results
//! gibbs-qsim sweep --config gibbs.yaml --json results.json --plot-dir plots
//!
//! # Inspect the target Hamiltonian and Gibbs state
//! gibbs-qsim target --system 2
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gibbs_qsim::ansatz::Ansatz;
use gibbs_qsim::config::Config;
use gibbs_qsim::optimizer::OptimizerKind;
use gibbs_qsim::report;
use gibbs_qsim::trainer::{sweep, ThermalTarget};

/// Variational quantum Gibbs state preparation
#[derive(Parser)]
#[command(name = "gibbs-qsim")]
#[command(version)]
#[command(about = "Train layered circuits to prepare thermal states")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Inverse temperature
    #[arg(long, global = true)]
    beta: Option<f64>,

    #[arg(long, global = true)]
    iterations: Option<usize>,

    #[arg(long, global = true)]
    learning_rate: Option<f64>,

    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Number of entangling + rotation layers
    #[arg(long, global = true)]
    depth: Option<usize>,

    #[arg(long, global = true, value_parser = parse_ansatz)]
    ansatz: Option<Ansatz>,

    #[arg(long, global = true, value_parser = parse_optimizer)]
    optimizer: Option<OptimizerKind>,

    /// Write results as JSON
    #[arg(long, global = true)]
    json: Option<PathBuf>,

    /// Write loss/fidelity curves into this directory
    #[arg(long, global = true)]
    plot_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a single (system, ancilla) cell
    Run {
        #[arg(long, default_value_t = 3)]
        system: usize,

        #[arg(long, default_value_t = 1)]
        ancilla: usize,
    },

    /// Train every cell of the configured grid
    Sweep,

    /// Show the Hamiltonian and its exact Gibbs state
    Target {
        #[arg(long, default_value_t = 3)]
        system: usize,
    },

    /// Show effective configuration
    Config,
}

fn parse_ansatz(value: &str) -> Result<Ansatz, String> {
    match value {
        "real" => Ok(Ansatz::Real),
        "complex" => Ok(Ansatz::Complex),
        other => Err(format!("unknown ansatz '{}', expected real or complex", other)),
    }
}

fn parse_optimizer(value: &str) -> Result<OptimizerKind, String> {
    match value {
        "adam" => Ok(OptimizerKind::Adam),
        "nelder_mead" | "nelder-mead" => Ok(OptimizerKind::NelderMead),
        other => Err(format!(
            "unknown optimizer '{}', expected adam or nelder_mead",
            other
        )),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    let mut config = Config::load(cli.config.as_deref())?;
    apply_cli_overrides(&mut config, &cli);

    match cli.command {
        Commands::Run { system, ancilla } => {
            config.sweep.system_qubits = vec![system];
            config.sweep.ancilla_qubits = vec![ancilla];
            run_sweep(&config)?;
        }
        Commands::Sweep => run_sweep(&config)?,
        Commands::Target { system } => {
            config.sweep.system_qubits = vec![system];
            config.validate()?;
            let target = ThermalTarget::prepare(&config.problem, system, config.sweep.seed)?;

            println!("H =\n{}", target.observable);
            println!("beta = {}", config.problem.beta);
            println!("ln Z = {:.6}", target.log_partition_function);
            println!("F = {:.6}", target.free_energy);
            println!("diag(rho_G):");
            for (i, p) in target.state.matrix().diagonal().iter().enumerate() {
                println!("  |{:0width$b}>: {:.6}", i, p.re, width = system);
            }
        }
        Commands::Config => {
            print!("{}", config.to_yaml()?);
        }
    }

    Ok(())
}

fn apply_cli_overrides(config: &mut Config, cli: &Cli) {
    if let Some(beta) = cli.beta {
        config.problem.beta = beta;
    }
    if let Some(iterations) = cli.iterations {
        config.training.iterations = iterations;
    }
    if let Some(lr) = cli.learning_rate {
        config.training.learning_rate = lr;
    }
    if let Some(seed) = cli.seed {
        config.sweep.seed = seed;
    }
    if let Some(depth) = cli.depth {
        config.ansatz.depth = depth;
    }
    if let Some(ansatz) = cli.ansatz {
        config.ansatz.kind = ansatz;
    }
    if let Some(optimizer) = cli.optimizer {
        config.training.optimizer = optimizer;
    }
    if let Some(json) = &cli.json {
        config.output.json = Some(json.clone());
    }
    if let Some(dir) = &cli.plot_dir {
        config.output.plot_dir = Some(dir.clone());
    }
}

fn run_sweep(config: &Config) -> Result<()> {
    info!(
        beta = config.problem.beta,
        ansatz = %config.ansatz.kind,
        depth = config.ansatz.depth,
        iterations = config.training.iterations,
        "starting sweep"
    );

    let results = sweep(config)?;
    report::print_summary(&results)?;

    if let Some(path) = &config.output.json {
        report::write_json(path, &results)?;
    }
    if let Some(dir) = &config.output.plot_dir {
        report::plot_curves(dir, &results)?;
    }

    Ok(())
}

/// Initialize logging.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}
