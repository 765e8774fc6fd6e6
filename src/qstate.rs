use std::fmt::Display;

use anyhow::Result;
use nalgebra::{DMatrix, DVector};
use num_complex::Complex;

use crate::density::DensityMatrix;
use crate::Qbit;

#[derive(Clone, Debug)]
pub struct QState {
    pub(crate) state: DVector<Qbit>,
}

impl QState {
    pub fn new(state: &[Qbit]) -> Result<Self> {
        let len = state.len();
        if len == 0 || (len & (len - 1)) != 0 {
            return Err(anyhow::anyhow!(
                "State vector length must be a non-zero power of 2"
            ));
        }

        let state = DVector::from_row_slice(state);
        Ok(Self { state })
    }

    pub fn zero_state(num_of_qbits: usize) -> Self {
        let size = 2_usize.pow(num_of_qbits as u32);
        let mut state = DVector::zeros(size);
        state[0] = Complex::new(1.0, 0.0); // |0...0> state
        Self { state }
    }

    pub fn from_str(qbits: &str) -> Result<Self> {
        let index = usize::from_str_radix(qbits, 2)?;
        let mut state = DVector::zeros(2_usize.pow(qbits.len() as u32));
        state[index] = Complex::new(1.0, 0.0);

        Ok(Self { state })
    }

    pub fn num_of_qbits(&self) -> usize {
        self.state.len().ilog2() as usize
    }

    pub fn amplitudes(&self) -> &DVector<Qbit> {
        &self.state
    }

    pub fn density_matrix(&self) -> DensityMatrix {
        DensityMatrix::from_pure(self)
    }

    /// Reduced state of the lowest `keep` qubits, tracing out the rest.
    ///
    /// The basis index splits as `high * 2^keep + low`, so the amplitudes
    /// reshape into a `2^(n-keep) x 2^keep` matrix `Ψ` and the reduced
    /// state is `Ψᵀ Ψ̄`.
    pub fn reduced_density_matrix(&self, keep: usize) -> Result<DensityMatrix> {
        let n = self.num_of_qbits();
        if keep == 0 || keep > n {
            return Err(anyhow::anyhow!(
                "Cannot keep {} qubits of a {}-qubit state",
                keep,
                n
            ));
        }

        let dim_keep = 1 << keep;
        let dim_traced = 1 << (n - keep);
        let psi = DMatrix::from_fn(dim_traced, dim_keep, |high, low| {
            self.state[high * dim_keep + low]
        });
        let reduced = psi.transpose() * psi.map(|z| z.conj());

        DensityMatrix::from_matrix(reduced)
    }
}

impl Display for QState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bin_width = self.num_of_qbits();

        for (i, value) in self.state.iter().enumerate() {
            writeln!(f, "|{:0width$b}>: {}", i, value, width = bin_width)?;
        }

        Ok(())
    }
}

impl From<QState> for DVector<Qbit> {
    fn from(qstate: QState) -> Self {
        qstate.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assert_approx_complex_eq, assert_approx_eq, Circuit};

    #[test]
    fn test_qstate_from_2bit_str() {
        let qstate = QState::from_str("00").unwrap();

        assert_eq!(qstate.num_of_qbits(), 2);
        assert_eq!(qstate.state.len(), 4);

        assert_approx_complex_eq!(1.0, 0.0, qstate.state[0]);
        assert_approx_complex_eq!(0.0, 0.0, qstate.state[1]);
        assert_approx_complex_eq!(0.0, 0.0, qstate.state[2]);
        assert_approx_complex_eq!(0.0, 0.0, qstate.state[3]);

        let qstate = QState::from_str("11").unwrap();
        assert_approx_complex_eq!(0.0, 0.0, qstate.state[0]);
        assert_approx_complex_eq!(1.0, 0.0, qstate.state[3]);
    }

    #[test]
    fn test_qstate_rejects_bad_length() {
        let amplitudes = [Complex::new(1.0, 0.0); 3];
        assert!(QState::new(&amplitudes).is_err());
        assert!(QState::new(&[]).is_err());
    }

    #[test]
    fn test_reduced_state_of_bell_pair_is_maximally_mixed() -> Result<()> {
        let bell = Circuit::new(2)
            .H(0)?
            .cnot(0, 1)?
            .apply(&QState::zero_state(2))?;

        let reduced = bell.reduced_density_matrix(1)?;
        assert_approx_eq!(1.0, reduced.trace());
        assert_approx_eq!(0.5, reduced.purity());
        assert_approx_complex_eq!(0.5, 0.0, reduced.matrix()[(0, 0)]);
        assert_approx_complex_eq!(0.0, 0.0, reduced.matrix()[(0, 1)]);

        Ok(())
    }

    #[test]
    fn test_reduced_state_keeps_low_qubits() -> Result<()> {
        // qubit 0 = |1>, qubit 1 = |0>  ->  index 0b01
        let state = QState::from_str("01")?;
        let reduced = state.reduced_density_matrix(1)?;
        assert_approx_complex_eq!(0.0, 0.0, reduced.matrix()[(0, 0)]);
        assert_approx_complex_eq!(1.0, 0.0, reduced.matrix()[(1, 1)]);

        assert!(state.reduced_density_matrix(3).is_err());
        assert!(state.reduced_density_matrix(0).is_err());

        Ok(())
    }

    #[test]
    fn test_density_matrix_of_pure_state_is_pure() -> Result<()> {
        let state = Circuit::new(2).H(0)?.H(1)?.apply(&QState::zero_state(2))?;
        let rho = state.density_matrix();
        assert_approx_eq!(1.0, rho.purity());
        assert_approx_eq!(1.0, rho.trace());
        Ok(())
    }
}
