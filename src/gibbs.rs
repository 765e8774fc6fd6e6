use anyhow::{bail, Result};
use nalgebra::{DMatrix, SymmetricEigen};
use num_complex::Complex;
use tracing::debug;

use crate::density::{hermitian_part, DensityMatrix};
use crate::Qbit;

fn check_beta(beta: f64) -> Result<()> {
    if !beta.is_finite() || beta <= 0.0 {
        bail!("Inverse temperature must be positive and finite, got {}", beta);
    }
    Ok(())
}

fn check_hamiltonian(hamiltonian: &DMatrix<Qbit>) -> Result<()> {
    let dim = hamiltonian.nrows();
    if dim != hamiltonian.ncols() || dim == 0 || (dim & (dim - 1)) != 0 {
        bail!(
            "Hamiltonian must be square with a power-of-2 dimension, got {}x{}",
            dim,
            hamiltonian.ncols()
        );
    }
    let asymmetry = (hamiltonian - hamiltonian.adjoint()).norm();
    if asymmetry > 1e-9 {
        bail!("Hamiltonian is not Hermitian (deviation {:e})", asymmetry);
    }
    Ok(())
}

fn spectrum(hamiltonian: &DMatrix<Qbit>) -> SymmetricEigen<Qbit, nalgebra::Dyn> {
    hermitian_part(hamiltonian).symmetric_eigen()
}

/// Gibbs state through the dense matrix exponential of `-β(H - E₀)`.
///
/// Shifting by the ground energy `E₀` keeps every Boltzmann weight in
/// `(0, 1]`, so large `β` does not overflow.
pub fn gibbs_state(hamiltonian: &DMatrix<Qbit>, beta: f64) -> Result<DensityMatrix> {
    check_beta(beta)?;
    check_hamiltonian(hamiltonian)?;

    let dim = hamiltonian.nrows();
    let ground = spectrum(hamiltonian).eigenvalues.min();
    let shifted = hamiltonian - DMatrix::<Qbit>::identity(dim, dim) * Complex::new(ground, 0.0);

    let boltzmann = (shifted * Complex::new(-beta, 0.0)).exp();
    let weight = boltzmann.trace().re;
    if !weight.is_finite() || weight <= 0.0 {
        bail!(
            "Shifted partition function is {} at beta = {}",
            weight,
            beta
        );
    }
    debug!(beta, dim, ground, weight, "computed Gibbs state");

    DensityMatrix::from_matrix(boltzmann * Complex::new(1.0 / weight, 0.0))
}

/// Gibbs state from the eigendecomposition of `H`, with the ground energy
/// shifted out so the Boltzmann weights never overflow.
pub fn gibbs_state_spectral(hamiltonian: &DMatrix<Qbit>, beta: f64) -> Result<DensityMatrix> {
    check_beta(beta)?;
    check_hamiltonian(hamiltonian)?;

    let eigen = spectrum(hamiltonian);
    let ground = eigen.eigenvalues.min();
    let weights = eigen.eigenvalues.map(|e| (-beta * (e - ground)).exp());
    let total = weights.sum();
    let populations = weights.map(|w| Complex::new(w / total, 0.0));

    let matrix =
        &eigen.eigenvectors * DMatrix::from_diagonal(&populations) * eigen.eigenvectors.adjoint();
    DensityMatrix::from_matrix(matrix)
}

/// `ln Z = -βE₀ + ln Σ exp(-β(E - E₀))`, finite even where `Z` itself overflows.
pub fn log_partition_function(hamiltonian: &DMatrix<Qbit>, beta: f64) -> Result<f64> {
    check_beta(beta)?;
    check_hamiltonian(hamiltonian)?;

    let eigenvalues = spectrum(hamiltonian).eigenvalues;
    let ground = eigenvalues.min();
    let shifted = eigenvalues
        .iter()
        .map(|e| (-beta * (e - ground)).exp())
        .sum::<f64>();
    Ok(-beta * ground + shifted.ln())
}

/// `Z = tr exp(-βH)`
pub fn partition_function(hamiltonian: &DMatrix<Qbit>, beta: f64) -> Result<f64> {
    Ok(log_partition_function(hamiltonian, beta)?.exp())
}

/// Helmholtz free energy `F = -ln Z / β`.
pub fn free_energy(hamiltonian: &DMatrix<Qbit>, beta: f64) -> Result<f64> {
    Ok(-log_partition_function(hamiltonian, beta)? / beta)
}

/// `tr(Hρ) - S(ρ)/β`, bounded below by the free energy with equality at the Gibbs state.
pub fn variational_free_energy(
    state: &DensityMatrix,
    hamiltonian: &DMatrix<Qbit>,
    beta: f64,
) -> Result<f64> {
    check_beta(beta)?;
    Ok(state.expectation(hamiltonian)? - state.von_neumann_entropy() / beta)
}
