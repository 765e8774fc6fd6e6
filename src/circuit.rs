use std::fmt::Display;

use anyhow::Result;
use nalgebra_sparse::{coo::CooMatrix, csr::CsrMatrix};
use num_complex::Complex;

use crate::gates::{h_matrix, rx_matrix, ry_matrix, rz_matrix, x_matrix};
use crate::qstate::QState;
use crate::Qbit;

#[derive(Clone)]
struct Gate {
    label: String,
    matrix: CsrMatrix<Qbit>,
    index: GateIndex,
}

#[derive(Clone, Debug)]
enum GateIndex {
    One(usize),
    Control { control: usize, target: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParameterizedGate {
    RX,
    RY,
    RZ,
}

impl ParameterizedGate {
    fn matrix(&self, value: f64) -> CsrMatrix<Qbit> {
        match self {
            ParameterizedGate::RX => rx_matrix(value),
            ParameterizedGate::RY => ry_matrix(value),
            ParameterizedGate::RZ => rz_matrix(value),
        }
    }

    fn label(&self, value: f64) -> String {
        match self {
            ParameterizedGate::RX => format!("RX({:.4})", value),
            ParameterizedGate::RY => format!("RY({:.4})", value),
            ParameterizedGate::RZ => format!("RZ({:.4})", value),
        }
    }
}

#[derive(Clone)]
struct Parameter {
    gate_index: usize,
    qbit_index: usize,
    gate: ParameterizedGate,
    value: f64,
}

#[derive(Clone)]
pub struct Circuit {
    gates: Vec<Gate>,
    num_of_qbits: usize,

    parameters: Vec<Parameter>,
}

impl Circuit {
    pub fn new(num_of_qbits: usize) -> Self {
        Self {
            gates: Vec::new(),
            num_of_qbits,
            parameters: Vec::new(),
        }
    }

    pub fn num_of_qbits(&self) -> usize {
        self.num_of_qbits
    }

    pub fn num_of_gates(&self) -> usize {
        self.gates.len()
    }

    fn check_and_reverse_index(&self, index: usize) -> Result<usize> {
        if index >= self.num_of_qbits {
            return Err(anyhow::anyhow!(
                "Index {} out of bounds for the number of qubits {}",
                index,
                self.num_of_qbits
            ));
        }
        Ok(self.num_of_qbits - 1 - index)
    }

    fn create_gate_for_index(
        &self,
        index: usize,
        gate: &CsrMatrix<Qbit>,
    ) -> Result<CsrMatrix<Qbit>> {
        let index = self.check_and_reverse_index(index)?;

        let mut matrix = CsrMatrix::identity(1);
        for i in 0..self.num_of_qbits {
            if i == index {
                matrix = kronecker_product(&matrix, gate);
            } else {
                matrix = kronecker_product(&matrix, &CsrMatrix::identity(2));
            }
        }

        Ok(matrix)
    }

    pub fn add_sparse_gate_at(
        &mut self,
        index: usize,
        label: &str,
        gate: CsrMatrix<Qbit>,
    ) -> Result<()> {
        let matrix = self.create_gate_for_index(index, &gate)?;
        self.add_gate(label.to_string(), matrix, GateIndex::One(index));
        Ok(())
    }

    pub fn add_parametric_gate_at(
        &mut self,
        index: usize,
        gate: ParameterizedGate,
        value: f64,
    ) -> Result<()> {
        let param = Parameter {
            gate_index: self.gates.len(),
            qbit_index: index,
            gate,
            value,
        };
        let matrix = self.create_gate_for_index(index, &gate.matrix(value))?;

        self.parameters.push(param);
        self.add_gate(gate.label(value), matrix, GateIndex::One(index));

        Ok(())
    }

    pub fn num_of_parameters(&self) -> usize {
        self.parameters.len()
    }

    pub fn get_parameters(&self) -> Vec<f64> {
        self.parameters.iter().map(|param| param.value).collect()
    }

    pub fn set_parameter(&mut self, param_index: usize, value: f64) -> Result<()> {
        let Some(param) = self.parameters.get_mut(param_index) else {
            return Err(anyhow::anyhow!("Parameter index out of bounds"));
        };
        param.value = value;

        let param = self.parameters[param_index].clone();
        let matrix = self.create_gate_for_index(param.qbit_index, &param.gate.matrix(value))?;
        self.gates[param.gate_index] = Gate {
            label: param.gate.label(value),
            matrix,
            index: GateIndex::One(param.qbit_index),
        };

        Ok(())
    }

    pub fn set_parameters(&mut self, values: &[f64]) -> Result<()> {
        if values.len() != self.parameters.len() {
            return Err(anyhow::anyhow!(
                "Number of values ({}) does not match number of parameters ({})",
                values.len(),
                self.parameters.len()
            ));
        }

        for (i, &value) in values.iter().enumerate() {
            self.set_parameter(i, value)?;
        }

        Ok(())
    }

    #[allow(non_snake_case)]
    pub fn H(mut self, index: usize) -> Result<Self> {
        self.add_sparse_gate_at(index, "H", h_matrix())?;
        Ok(self)
    }

    pub fn control(
        mut self,
        control: usize,
        target: usize,
        gate: &CsrMatrix<Qbit>,
    ) -> Result<Self> {
        self.add_control(control, target, "CU", gate)?;
        Ok(self)
    }

    pub fn add_control(
        &mut self,
        control: usize,
        target: usize,
        label: &str,
        gate: &CsrMatrix<Qbit>,
    ) -> Result<()> {
        let matrix = self.build_control_matrix(control, target, gate)?;
        self.add_gate(
            label.to_string(),
            matrix,
            GateIndex::Control { control, target },
        );
        Ok(())
    }

    fn build_control_matrix(
        &self,
        control: usize,
        target: usize,
        gate: &CsrMatrix<Qbit>,
    ) -> Result<CsrMatrix<Qbit>> {
        let control = self.check_and_reverse_index(control)?;
        let target = self.check_and_reverse_index(target)?;

        if control == target {
            return Err(anyhow::anyhow!(
                "Control and target qubits cannot be the same"
            ));
        }

        // |0><0|
        let mut zero_zero = CooMatrix::new(2, 2);
        zero_zero.push(0, 0, Complex::new(1.0, 0.0));
        let zero_zero = CsrMatrix::from(&zero_zero);

        // |1><1|
        let mut one_one = CooMatrix::new(2, 2);
        one_one.push(1, 1, Complex::new(1.0, 0.0));
        let one_one = CsrMatrix::from(&one_one);

        let id = CsrMatrix::identity(2);

        let mut zero_matrix = CsrMatrix::identity(1);
        let mut one_matrix = CsrMatrix::identity(1);
        for i in 0..self.num_of_qbits {
            if i == control {
                zero_matrix = kronecker_product(&zero_matrix, &zero_zero);
                one_matrix = kronecker_product(&one_matrix, &one_one);
            } else if i == target {
                zero_matrix = kronecker_product(&zero_matrix, &id);
                one_matrix = kronecker_product(&one_matrix, gate);
            } else {
                zero_matrix = kronecker_product(&zero_matrix, &id);
                one_matrix = kronecker_product(&one_matrix, &id);
            }
        }

        Ok(zero_matrix + one_matrix)
    }

    pub fn cnot(mut self, control: usize, target: usize) -> Result<Self> {
        self.add_cnot(control, target)?;
        Ok(self)
    }

    pub fn add_cnot(&mut self, control: usize, target: usize) -> Result<()> {
        self.add_control(control, target, "CNOT", &x_matrix())
    }

    pub fn swap(self, index1: usize, index2: usize) -> Result<Self> {
        if index1 == index2 {
            return Err(anyhow::anyhow!("Cannot swap a qubit with itself"));
        }

        self.cnot(index1, index2)?
            .cnot(index2, index1)?
            .cnot(index1, index2)
    }

    fn add_gate(&mut self, label: String, matrix: CsrMatrix<Qbit>, index: GateIndex) {
        self.gates.push(Gate {
            label,
            matrix,
            index,
        });
    }

    pub fn apply(&self, state: &QState) -> Result<QState> {
        if state.num_of_qbits() != self.num_of_qbits {
            return Err(anyhow::anyhow!(
                "State has {} qubits but the circuit acts on {}",
                state.num_of_qbits(),
                self.num_of_qbits
            ));
        }

        let mut result = state.state.clone();
        for gate in &self.gates {
            result = &gate.matrix * result;
        }
        Ok(QState { state: result })
    }
}

impl Display for Circuit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for Gate { label, index, .. } in &self.gates {
            match index {
                GateIndex::One(i) => writeln!(f, "{} q{}", label, i)?,
                GateIndex::Control { control, target } => {
                    writeln!(f, "{} q{} -> q{}", label, control, target)?
                }
            }
        }
        Ok(())
    }
}

pub fn kronecker_product(x: &CsrMatrix<Qbit>, y: &CsrMatrix<Qbit>) -> CsrMatrix<Qbit> {
    let mut result = CooMatrix::new(x.nrows() * y.nrows(), x.ncols() * y.ncols());

    for (rx, cx, value_x) in x.triplet_iter() {
        for (ry, cy, value_y) in y.triplet_iter() {
            let new_row = rx * y.nrows() + ry;
            let new_col = cx * y.ncols() + cy;
            let new_value = value_x * value_y;
            result.push(new_row, new_col, new_value);
        }
    }

    CsrMatrix::from(&result)
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use crate::{assert_approx_complex_eq, gates::z_matrix};

    use super::*;

    #[test]
    fn test_entangled_pair_across_registers() -> Result<()> {
        // system qubit 0, ancilla qubit 1
        let pair = Circuit::new(2)
            .H(0)?
            .cnot(0, 1)?
            .apply(&QState::zero_state(2))?;

        let amplitude = 1.0 / 2f64.sqrt();
        assert_approx_complex_eq!(amplitude, 0.0, pair.state[0b00]);
        assert_approx_complex_eq!(0.0, 0.0, pair.state[0b01]);
        assert_approx_complex_eq!(0.0, 0.0, pair.state[0b10]);
        assert_approx_complex_eq!(amplitude, 0.0, pair.state[0b11]);

        Ok(())
    }

    #[test]
    fn test_controlled_phase_kickback() -> Result<()> {
        // CZ with the target in |1> flips the phase of the control's |1> branch,
        // so H·CZ·H sends the control from |0> to |1>
        let result = Circuit::new(2)
            .H(0)?
            .control(0, 1, &z_matrix())?
            .H(0)?
            .apply(&QState::from_str("10")?)?;

        assert_approx_complex_eq!(1.0, 0.0, result.state[0b11]);
        assert_approx_complex_eq!(0.0, 0.0, result.state[0b10]);

        Ok(())
    }

    #[test]
    fn test_swap_moves_excitation() -> Result<()> {
        // qubit 0 set; after swapping with qubit 2 only qubit 2 is set
        let result = Circuit::new(3)
            .swap(0, 2)?
            .apply(&QState::from_str("001")?)?;
        assert_approx_complex_eq!(1.0, 0.0, result.state[0b100]);

        // neighbouring swap leaves the third qubit alone
        let result = Circuit::new(3)
            .swap(1, 0)?
            .apply(&QState::from_str("110")?)?;
        assert_approx_complex_eq!(1.0, 0.0, result.state[0b101]);

        Ok(())
    }

    #[test]
    fn test_rebinding_rotation_parameters() -> Result<()> {
        let mut circuit = Circuit::new(2);
        circuit.add_parametric_gate_at(1, ParameterizedGate::RY, PI)?;
        circuit.add_parametric_gate_at(0, ParameterizedGate::RX, 0.0)?;
        assert_eq!(vec![PI, 0.0], circuit.get_parameters());

        // RY(π) on qubit 1 maps |00> to |10>
        let result = circuit.apply(&QState::zero_state(2))?;
        assert_approx_complex_eq!(1.0, 0.0, result.state[0b10]);

        // RY(0), RX(π/2): qubit 0 in (|0> - i|1>)/√2
        circuit.set_parameters(&[0.0, PI / 2.0])?;
        assert_eq!(vec![0.0, PI / 2.0], circuit.get_parameters());
        let result = circuit.apply(&QState::zero_state(2))?;
        assert_approx_complex_eq!(1.0 / 2f64.sqrt(), 0.0, result.state[0b00]);
        assert_approx_complex_eq!(0.0, -1.0 / 2f64.sqrt(), result.state[0b01]);

        Ok(())
    }

    #[test]
    fn test_parameter_count_mismatch() -> Result<()> {
        let mut circuit = Circuit::new(1);
        circuit.add_parametric_gate_at(0, ParameterizedGate::RY, 0.1)?;
        assert!(circuit.set_parameters(&[0.1, 0.2]).is_err());
        assert!(circuit.set_parameter(3, 0.1).is_err());
        Ok(())
    }

    #[test]
    fn test_invalid_indices() {
        assert!(Circuit::new(2).H(2).is_err());
        assert!(Circuit::new(2).cnot(1, 1).is_err());
        assert!(Circuit::new(2).swap(0, 0).is_err());
    }

    #[test]
    fn test_width_mismatch() -> Result<()> {
        let circuit = Circuit::new(2).H(0)?;
        assert!(circuit.apply(&QState::zero_state(3)).is_err());
        Ok(())
    }

    #[test]
    fn test_display_lists_gates() -> Result<()> {
        let mut circuit = Circuit::new(2).H(0)?;
        circuit.add_cnot(0, 1)?;
        circuit.add_parametric_gate_at(1, ParameterizedGate::RY, 0.5)?;

        let text = circuit.to_string();
        assert_eq!("H q0\nCNOT q0 -> q1\nRY(0.5000) q1\n", text);
        Ok(())
    }
}
