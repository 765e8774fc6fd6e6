use std::f64::consts::FRAC_PI_2;

use anyhow::Result;
use argmin::core::{CostFunction, Gradient};
use nalgebra::DMatrix;
use num_complex::Complex;
use serde::Serialize;

use crate::ansatz::Ansatz;
use crate::circuit::Circuit;
use crate::density::{trace_of_product, DensityMatrix};
use crate::qstate::QState;
use crate::Qbit;

/// The parts of the truncated free-energy loss at one parameter point.
///
/// The entropy in `F(ρ) = tr(Hρ) - S(ρ)/β` is replaced by `-tr(ρ ln ρ)`
/// with `ln ρ` expanded to second order around the identity, giving
///
/// ```text
/// L = tr(Hρ) + (2/β)·tr(ρ²) − (1/β)·(tr(ρ³) + 3)/2
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LossTerms {
    /// tr(Hρ)
    pub energy: f64,
    /// tr(ρ²)
    pub purity: f64,
    /// tr(ρ³)
    pub cubic: f64,
    pub total: f64,
}

impl LossTerms {
    pub fn evaluate(hamiltonian: &DMatrix<Qbit>, beta: f64, state: &DensityMatrix) -> Result<Self> {
        let energy = state.expectation(hamiltonian)?;
        let purity = state.purity();
        let cubic = state.trace_power(3);
        let total = energy + 2.0 / beta * purity - (cubic + 3.0) / (2.0 * beta);
        Ok(Self {
            energy,
            purity,
            cubic,
            total,
        })
    }
}

#[derive(Clone)]
pub struct GibbsProblem {
    hamiltonian: DMatrix<Qbit>,
    beta: f64,
    num_system: usize,
    num_ancilla: usize,
    circuit: Circuit,
}

impl GibbsProblem {
    /// `hamiltonian` acts on the `num_system` low qubits of the register.
    pub fn new(
        hamiltonian: DMatrix<Qbit>,
        beta: f64,
        num_system: usize,
        num_ancilla: usize,
        ansatz: Ansatz,
        depth: usize,
    ) -> Result<Self> {
        if !beta.is_finite() || beta <= 0.0 {
            return Err(anyhow::anyhow!(
                "Inverse temperature must be positive and finite, got {}",
                beta
            ));
        }
        if num_system == 0 {
            return Err(anyhow::anyhow!("System register needs at least one qubit"));
        }
        let dim = 1 << num_system;
        if hamiltonian.nrows() != dim || hamiltonian.ncols() != dim {
            return Err(anyhow::anyhow!(
                "Hamiltonian is {}x{} but {} system qubits need {}x{}",
                hamiltonian.nrows(),
                hamiltonian.ncols(),
                num_system,
                dim,
                dim
            ));
        }

        let width = num_system + num_ancilla;
        let theta = vec![0.0; ansatz.num_parameters(width, depth)];
        let circuit = ansatz.build(width, depth, &theta)?;

        Ok(Self {
            hamiltonian,
            beta,
            num_system,
            num_ancilla,
            circuit,
        })
    }

    pub fn num_parameters(&self) -> usize {
        self.circuit.num_of_parameters()
    }

    pub fn num_system(&self) -> usize {
        self.num_system
    }

    pub fn num_ancilla(&self) -> usize {
        self.num_ancilla
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn hamiltonian(&self) -> &DMatrix<Qbit> {
        &self.hamiltonian
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    /// ρ_B(θ): the circuit applied to `|0…0⟩` with the ancilla traced out.
    pub fn reduced_state(&self, theta: &[f64]) -> Result<DensityMatrix> {
        let mut circuit = self.circuit.clone();
        circuit.set_parameters(theta)?;
        let state = circuit.apply(&QState::zero_state(circuit.num_of_qbits()))?;
        state.reduced_density_matrix(self.num_system)
    }

    pub fn loss(&self, theta: &[f64]) -> Result<LossTerms> {
        let state = self.reduced_state(theta)?;
        LossTerms::evaluate(&self.hamiltonian, self.beta, &state)
    }

    /// Loss, reduced state and gradient at `theta` in one pass.
    pub fn evaluate(&self, theta: &[f64]) -> Result<(LossTerms, DensityMatrix, Vec<f64>)> {
        let state = self.reduced_state(theta)?;
        let terms = LossTerms::evaluate(&self.hamiltonian, self.beta, &state)?;
        let gradient = self.parameter_shift_gradient(theta, &state)?;
        Ok((terms, state, gradient))
    }

    /// dL/dρ_B = H + (4/β)ρ_B − (3/(2β))ρ_B²
    fn loss_derivative(&self, state: &DensityMatrix) -> DMatrix<Qbit> {
        let rho = state.matrix();
        let rho2 = rho * rho;
        &self.hamiltonian + rho * Complex::new(4.0 / self.beta, 0.0)
            - rho2 * Complex::new(3.0 / (2.0 * self.beta), 0.0)
    }

    /// Every parameter sits in a single `exp(-iθP/2)` rotation, so ρ_B is a
    /// first-order trigonometric polynomial in each θ_k and
    /// `∂ρ_B/∂θ_k = (ρ_B(θ + π/2·e_k) − ρ_B(θ − π/2·e_k)) / 2` holds exactly.
    /// The chain rule through `L(ρ_B)` then gives `Re tr(G ∂ρ_B/∂θ_k)`.
    pub fn parameter_shift_gradient(
        &self,
        theta: &[f64],
        state: &DensityMatrix,
    ) -> Result<Vec<f64>> {
        let derivative = self.loss_derivative(state);
        let mut shifted = theta.to_vec();

        let mut gradient = Vec::with_capacity(theta.len());
        for k in 0..theta.len() {
            shifted[k] = theta[k] + FRAC_PI_2;
            let plus = self.reduced_state(&shifted)?;
            shifted[k] = theta[k] - FRAC_PI_2;
            let minus = self.reduced_state(&shifted)?;
            shifted[k] = theta[k];

            let d_rho = (plus.matrix() - minus.matrix()) * Complex::new(0.5, 0.0);
            gradient.push(trace_of_product(&derivative, &d_rho).re);
        }

        Ok(gradient)
    }
}

impl CostFunction for GibbsProblem {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, theta: &Self::Param) -> Result<Self::Output> {
        Ok(self.loss(theta)?.total)
    }
}

impl Gradient for GibbsProblem {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, theta: &Self::Param) -> Result<Self::Gradient> {
        let state = self.reduced_state(theta)?;
        self.parameter_shift_gradient(theta, &state)
    }
}
