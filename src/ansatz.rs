use std::fmt::Display;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::circuit::{Circuit, ParameterizedGate};

/// Layered circuit templates acting on an `ancilla + system` register.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ansatz {
    /// CNOT ring followed by RY on every qubit.
    Real,
    /// CNOT ring followed by RZ, RY, RZ on every qubit.
    #[default]
    Complex,
}

impl Ansatz {
    fn rotations(&self) -> &'static [ParameterizedGate] {
        match self {
            Ansatz::Real => &[ParameterizedGate::RY],
            Ansatz::Complex => &[
                ParameterizedGate::RZ,
                ParameterizedGate::RY,
                ParameterizedGate::RZ,
            ],
        }
    }

    /// `depth` rotation layers plus the closing RY column.
    pub fn num_parameters(&self, width: usize, depth: usize) -> usize {
        depth * width * self.rotations().len() + width
    }

    pub fn build(&self, width: usize, depth: usize, theta: &[f64]) -> Result<Circuit> {
        if width == 0 {
            return Err(anyhow::anyhow!("Ansatz needs at least one qubit"));
        }
        let expected = self.num_parameters(width, depth);
        if theta.len() != expected {
            return Err(anyhow::anyhow!(
                "{} ansatz on {} qubits with depth {} takes {} parameters, got {}",
                self,
                width,
                depth,
                expected,
                theta.len()
            ));
        }

        let mut circuit = Circuit::new(width);
        let mut values = theta.iter().copied();
        let mut next = || values.next().unwrap_or_default();

        for _ in 0..depth {
            add_cnot_ring(&mut circuit, width)?;
            for qubit in 0..width {
                for &gate in self.rotations() {
                    circuit.add_parametric_gate_at(qubit, gate, next())?;
                }
            }
        }
        for qubit in 0..width {
            circuit.add_parametric_gate_at(qubit, ParameterizedGate::RY, next())?;
        }

        Ok(circuit)
    }
}

impl Display for Ansatz {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ansatz::Real => write!(f, "real"),
            Ansatz::Complex => write!(f, "complex"),
        }
    }
}

fn add_cnot_ring(circuit: &mut Circuit, width: usize) -> Result<()> {
    for qubit in 0..width.saturating_sub(1) {
        circuit.add_cnot(qubit, qubit + 1)?;
    }
    if width > 2 {
        circuit.add_cnot(width - 1, 0)?;
    }
    Ok(())
}
