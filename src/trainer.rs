use std::f64::consts::TAU;

use anyhow::Result;
use nalgebra::DMatrix;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{Config, ProblemConfig, TrainingConfig};
use crate::density::DensityMatrix;
use crate::gibbs::{free_energy, gibbs_state, log_partition_function, variational_free_energy};
use crate::loss::{GibbsProblem, LossTerms};
use crate::observable::Observable;
use crate::optimizer::{nelder_mead, Adam, OptimizerKind};
use crate::Qbit;

#[derive(Clone, Copy, Debug, Serialize)]
pub struct TrainingRecord {
    pub iteration: usize,
    pub loss: f64,
    pub fidelity: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct TrainingReport {
    pub records: Vec<TrainingRecord>,
    pub final_theta: Vec<f64>,
    #[serde(skip)]
    pub final_state: DensityMatrix,
    pub final_loss: LossTerms,
    pub final_fidelity: f64,
    pub best_fidelity: f64,
}

/// The Hamiltonian of one system size and its exact thermal quantities.
pub struct ThermalTarget {
    pub observable: Observable,
    pub hamiltonian: DMatrix<Qbit>,
    pub state: DensityMatrix,
    pub log_partition_function: f64,
    pub free_energy: f64,
}

impl ThermalTarget {
    pub fn prepare(problem: &ProblemConfig, num_system: usize, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let observable = problem.hamiltonian.build(num_system, &mut rng)?;
        let hamiltonian = observable.to_matrix(num_system)?;
        let state = gibbs_state(&hamiltonian, problem.beta)?;
        let log_partition_function = log_partition_function(&hamiltonian, problem.beta)?;
        let free_energy = free_energy(&hamiltonian, problem.beta)?;

        info!(
            num_system,
            terms = observable.num_of_terms(),
            free_energy,
            "prepared thermal target"
        );

        Ok(Self {
            observable,
            hamiltonian,
            state,
            log_partition_function,
            free_energy,
        })
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SweepResult {
    pub num_system: usize,
    pub num_ancilla: usize,
    pub num_parameters: usize,
    pub exact_free_energy: f64,
    /// `tr(Hρ_B) - S(ρ_B)/β` of the trained state
    pub variational_free_energy: f64,
    pub report: TrainingReport,
}

/// Trains from parameters drawn uniformly from `[0, 2π)`.
pub fn train<R: Rng + ?Sized>(
    problem: &GibbsProblem,
    target: &DensityMatrix,
    config: &TrainingConfig,
    rng: &mut R,
) -> Result<TrainingReport> {
    let theta = (0..problem.num_parameters())
        .map(|_| rng.random::<f64>() * TAU)
        .collect();
    train_from(problem, target, config, theta)
}

pub fn train_from(
    problem: &GibbsProblem,
    target: &DensityMatrix,
    config: &TrainingConfig,
    theta: Vec<f64>,
) -> Result<TrainingReport> {
    if config.log_every == 0 {
        return Err(anyhow::anyhow!("log_every must be at least 1"));
    }
    if theta.len() != problem.num_parameters() {
        return Err(anyhow::anyhow!(
            "Expected {} initial parameters, got {}",
            problem.num_parameters(),
            theta.len()
        ));
    }

    debug!(
        parameters = theta.len(),
        iterations = config.iterations,
        optimizer = ?config.optimizer,
        "starting training"
    );

    let mut records = Vec::new();
    let theta = match config.optimizer {
        OptimizerKind::Adam => run_adam(problem, target, config, theta, &mut records)?,
        OptimizerKind::NelderMead => {
            run_nelder_mead(problem, target, config, theta, &mut records)?
        }
    };

    let final_state = problem.reduced_state(&theta)?;
    let final_loss = LossTerms::evaluate(problem.hamiltonian(), problem.beta(), &final_state)?;
    let final_record = record(config.iterations, &final_loss, &final_state, target)?;
    records.push(final_record);

    let best_fidelity = records
        .iter()
        .map(|r| r.fidelity)
        .fold(f64::NEG_INFINITY, f64::max);

    Ok(TrainingReport {
        records,
        final_theta: theta,
        final_state,
        final_loss,
        final_fidelity: final_record.fidelity,
        best_fidelity,
    })
}

fn run_adam(
    problem: &GibbsProblem,
    target: &DensityMatrix,
    config: &TrainingConfig,
    mut theta: Vec<f64>,
    records: &mut Vec<TrainingRecord>,
) -> Result<Vec<f64>> {
    let mut adam = Adam::new(config.learning_rate);

    for iteration in 0..config.iterations {
        let (terms, state, gradient) = problem.evaluate(&theta)?;
        if iteration % config.log_every == 0 {
            records.push(record(iteration, &terms, &state, target)?);
        }
        adam.step(&mut theta, &gradient)?;
    }

    Ok(theta)
}

/// Restarts the simplex every `log_every` iterations around the best point
/// so far; the edge length is the learning rate.
fn run_nelder_mead(
    problem: &GibbsProblem,
    target: &DensityMatrix,
    config: &TrainingConfig,
    mut theta: Vec<f64>,
    records: &mut Vec<TrainingRecord>,
) -> Result<Vec<f64>> {
    let mut iteration = 0;
    while iteration < config.iterations {
        let state = problem.reduced_state(&theta)?;
        let terms = LossTerms::evaluate(problem.hamiltonian(), problem.beta(), &state)?;
        records.push(record(iteration, &terms, &state, target)?);

        let chunk = config.log_every.min(config.iterations - iteration);
        theta = nelder_mead(problem.clone(), &theta, config.learning_rate, chunk as u64)?;
        iteration += chunk;
    }

    Ok(theta)
}

fn record(
    iteration: usize,
    terms: &LossTerms,
    state: &DensityMatrix,
    target: &DensityMatrix,
) -> Result<TrainingRecord> {
    let fidelity = state.fidelity(target)?;
    info!(iteration, loss = terms.total, fidelity, "training progress");
    Ok(TrainingRecord {
        iteration,
        loss: terms.total,
        fidelity,
    })
}

/// Trains every `(system, ancilla)` cell of the grid in `config.sweep`.
pub fn sweep(config: &Config) -> Result<Vec<SweepResult>> {
    config.validate()?;
    let beta = config.problem.beta;
    let seed = config.sweep.seed;

    let mut results = Vec::new();
    let mut cell = 0u64;
    for (i, &num_system) in config.sweep.system_qubits.iter().enumerate() {
        let target =
            ThermalTarget::prepare(&config.problem, num_system, seed.wrapping_add(i as u64))?;

        for &num_ancilla in &config.sweep.ancilla_qubits {
            let problem = GibbsProblem::new(
                target.hamiltonian.clone(),
                beta,
                num_system,
                num_ancilla,
                config.ansatz.kind,
                config.ansatz.depth,
            )?;
            info!(
                num_system,
                num_ancilla,
                parameters = problem.num_parameters(),
                "training cell"
            );
            debug!("circuit layout:\n{}", problem.circuit());

            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(cell));
            let report = train(&problem, &target.state, &config.training, &mut rng)?;
            let variational =
                variational_free_energy(&report.final_state, &target.hamiltonian, beta)?;

            results.push(SweepResult {
                num_system: problem.num_system(),
                num_ancilla: problem.num_ancilla(),
                num_parameters: problem.num_parameters(),
                exact_free_energy: target.free_energy,
                variational_free_energy: variational,
                report,
            });
            cell += 1;
        }
    }

    Ok(results)
}
