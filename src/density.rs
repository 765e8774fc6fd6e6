use anyhow::Result;
use nalgebra::{DMatrix, DVector};
use num_complex::Complex;

use crate::qstate::QState;
use crate::Qbit;

/// Eigenvalues below this are treated as zero in entropies and square roots.
const EIGEN_CUTOFF: f64 = 1e-12;

#[derive(Clone, Debug)]
pub struct DensityMatrix {
    matrix: DMatrix<Qbit>,
}

impl DensityMatrix {
    pub fn from_pure(state: &QState) -> Self {
        let psi = &state.state;
        Self {
            matrix: psi * psi.adjoint(),
        }
    }

    pub fn from_matrix(matrix: DMatrix<Qbit>) -> Result<Self> {
        let dim = matrix.nrows();
        if dim != matrix.ncols() {
            return Err(anyhow::anyhow!(
                "Density matrix must be square, got {}x{}",
                dim,
                matrix.ncols()
            ));
        }
        if dim == 0 || (dim & (dim - 1)) != 0 {
            return Err(anyhow::anyhow!(
                "Density matrix dimension must be a non-zero power of 2, got {}",
                dim
            ));
        }
        Ok(Self { matrix })
    }

    /// The maximally mixed state `I / 2^n`.
    pub fn maximally_mixed(num_of_qbits: usize) -> Self {
        let dim = 1 << num_of_qbits;
        let weight = Complex::new(1.0 / dim as f64, 0.0);
        Self {
            matrix: DMatrix::identity(dim, dim) * weight,
        }
    }

    pub fn matrix(&self) -> &DMatrix<Qbit> {
        &self.matrix
    }

    pub fn dim(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn num_of_qbits(&self) -> usize {
        self.dim().ilog2() as usize
    }

    /// Traces out every qubit above the lowest `keep`.
    pub fn partial_trace(&self, keep: usize) -> Result<Self> {
        let n = self.num_of_qbits();
        if keep == 0 || keep > n {
            return Err(anyhow::anyhow!(
                "Cannot keep {} qubits of a {}-qubit density matrix",
                keep,
                n
            ));
        }

        let dim_keep = 1 << keep;
        let dim_traced = 1 << (n - keep);
        let reduced = DMatrix::from_fn(dim_keep, dim_keep, |i, j| {
            (0..dim_traced)
                .map(|a| self.matrix[(a * dim_keep + i, a * dim_keep + j)])
                .sum::<Qbit>()
        });

        Ok(Self { matrix: reduced })
    }

    pub fn trace(&self) -> f64 {
        self.matrix.trace().re
    }

    /// tr(ρᵏ)
    pub fn trace_power(&self, k: u32) -> f64 {
        match k {
            0 => self.dim() as f64,
            1 => self.trace(),
            _ => {
                let mut power = self.matrix.clone();
                for _ in 1..k - 1 {
                    power = &power * &self.matrix;
                }
                trace_of_product(&power, &self.matrix).re
            }
        }
    }

    pub fn purity(&self) -> f64 {
        self.trace_power(2)
    }

    /// Re tr(Hρ)
    pub fn expectation(&self, hamiltonian: &DMatrix<Qbit>) -> Result<f64> {
        if hamiltonian.shape() != self.matrix.shape() {
            return Err(anyhow::anyhow!(
                "Operator is {}x{} but the state is {}x{}",
                hamiltonian.nrows(),
                hamiltonian.ncols(),
                self.dim(),
                self.dim()
            ));
        }
        Ok(trace_of_product(hamiltonian, &self.matrix).re)
    }

    /// Eigenvalues of the Hermitian part, ascending.
    pub fn eigenvalues(&self) -> DVector<f64> {
        let mut values = hermitian_part(&self.matrix).symmetric_eigenvalues();
        values.as_mut_slice().sort_by(|a, b| a.total_cmp(b));
        values
    }

    /// Von Neumann entropy `-tr(ρ ln ρ)` in nats.
    pub fn von_neumann_entropy(&self) -> f64 {
        self.eigenvalues()
            .iter()
            .filter(|&&p| p > EIGEN_CUTOFF)
            .map(|&p| -p * p.ln())
            .sum()
    }

    /// Uhlmann fidelity `tr √(√ρ σ √ρ)`, not squared, clamped to `[0, 1]`.
    pub fn fidelity(&self, other: &DensityMatrix) -> Result<f64> {
        if self.dim() != other.dim() {
            return Err(anyhow::anyhow!(
                "Dimension mismatch: {} vs {}",
                self.dim(),
                other.dim()
            ));
        }

        let sqrt_rho = hermitian_sqrt(&self.matrix);
        let product = &sqrt_rho * &other.matrix * &sqrt_rho;
        let fidelity = hermitian_part(&product)
            .symmetric_eigenvalues()
            .iter()
            .filter(|&&v| v > EIGEN_CUTOFF)
            .map(|v| v.sqrt())
            .sum::<f64>();

        Ok(fidelity.min(1.0))
    }

    /// Checks the matrix is Hermitian, has unit trace and is positive semi-definite.
    pub fn validate(&self, tol: f64) -> Result<()> {
        let asymmetry = (&self.matrix - self.matrix.adjoint()).norm();
        if asymmetry > tol {
            return Err(anyhow::anyhow!(
                "Density matrix is not Hermitian (deviation {:e})",
                asymmetry
            ));
        }

        let trace = self.matrix.trace();
        if (trace.re - 1.0).abs() > tol || trace.im.abs() > tol {
            return Err(anyhow::anyhow!(
                "Density matrix trace is {} instead of 1",
                trace
            ));
        }

        let min = self.eigenvalues().iter().copied().fold(f64::INFINITY, f64::min);
        if min < -tol {
            return Err(anyhow::anyhow!(
                "Density matrix is not positive semi-definite (min eigenvalue {:e})",
                min
            ));
        }

        Ok(())
    }
}

/// tr(AB) without forming the product.
pub(crate) fn trace_of_product(a: &DMatrix<Qbit>, b: &DMatrix<Qbit>) -> Qbit {
    a.transpose().component_mul(b).sum()
}

pub(crate) fn hermitian_part(matrix: &DMatrix<Qbit>) -> DMatrix<Qbit> {
    (matrix + matrix.adjoint()) * Complex::new(0.5, 0.0)
}

/// Principal square root of a Hermitian PSD matrix, tiny and negative eigenvalues clamped to zero.
fn hermitian_sqrt(matrix: &DMatrix<Qbit>) -> DMatrix<Qbit> {
    let eigen = hermitian_part(matrix).symmetric_eigen();
    let roots = eigen
        .eigenvalues
        .map(|v| Complex::new(if v > EIGEN_CUTOFF { v.sqrt() } else { 0.0 }, 0.0));
    &eigen.eigenvectors * DMatrix::from_diagonal(&roots) * eigen.eigenvectors.adjoint()
}
