use std::fmt::Display;

use anyhow::Result;
use nalgebra::DMatrix;
use nalgebra_sparse::{convert::serial::convert_csr_dense, CsrMatrix};
use num_complex::Complex;
use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};
use serde::{Deserialize, Serialize};

use crate::{
    circuit::kronecker_product,
    gates::{x_matrix, y_matrix, z_matrix},
    qstate::QState,
    Qbit,
};

/// A real-weighted sum of Pauli strings.
#[derive(Clone, Debug, Default)]
pub struct Observable {
    operators: Vec<PauliOperator>,
}

impl Observable {
    pub fn new() -> Self {
        Self {
            operators: Vec::new(),
        }
    }

    pub fn add_pauli_operator(&mut self, coefficient: f64, ops: &[(Pauli, usize)]) {
        let operator = PauliOperator {
            coefficient,
            ops: ops
                .iter()
                .filter(|(kind, _)| *kind != Pauli::I)
                .map(|&(kind, index)| PauliMatrix { index, kind })
                .collect(),
        };
        self.operators.push(operator);
    }

    /// Builds an observable from terms written as `(coefficient, "z0,x1")`.
    pub fn from_pauli_str<S: AsRef<str>>(terms: &[(f64, S)]) -> Result<Self> {
        let mut observable = Self::new();
        for (coefficient, term) in terms {
            let ops = parse_pauli_term(term.as_ref())?;
            observable.add_pauli_operator(*coefficient, &ops);
        }
        Ok(observable)
    }

    /// `-Z0Z1 - Z1Z2 - Z0Z2`, the ferromagnetic Ising triangle on 3 qubits.
    pub fn ising_triangle() -> Self {
        let mut observable = Self::new();
        observable.add_pauli_operator(-1.0, &[(Pauli::Z, 0), (Pauli::Z, 1)]);
        observable.add_pauli_operator(-1.0, &[(Pauli::Z, 1), (Pauli::Z, 2)]);
        observable.add_pauli_operator(-1.0, &[(Pauli::Z, 0), (Pauli::Z, 2)]);
        observable
    }

    /// Random Pauli sum with `terms` terms on `num_of_qbits` qubits.
    ///
    /// Each term acts on a random subset of distinct qubits whose size is
    /// uniform in `1..=num_of_qbits`, with letters drawn from `alphabet`.
    pub fn random<R: Rng + ?Sized>(
        num_of_qbits: usize,
        terms: usize,
        alphabet: &[Pauli],
        coefficients: &CoefficientDistribution,
        rng: &mut R,
    ) -> Result<Self> {
        if num_of_qbits == 0 {
            return Err(anyhow::anyhow!(
                "Cannot build a Hamiltonian on zero qubits"
            ));
        }
        let alphabet = alphabet
            .iter()
            .copied()
            .filter(|kind| *kind != Pauli::I)
            .collect::<Vec<_>>();
        if alphabet.is_empty() {
            return Err(anyhow::anyhow!(
                "Pauli alphabet must contain at least one of X, Y, Z"
            ));
        }

        let mut observable = Self::new();
        for _ in 0..terms {
            let coefficient = coefficients.sample(rng)?;
            let support = rng.random_range(1..=num_of_qbits);
            let ops = rand::seq::index::sample(rng, num_of_qbits, support)
                .into_iter()
                .map(|index| (alphabet[rng.random_range(0..alphabet.len())], index))
                .collect::<Vec<_>>();
            observable.add_pauli_operator(coefficient, &ops);
        }

        Ok(observable)
    }

    pub fn num_of_terms(&self) -> usize {
        self.operators.len()
    }

    /// Smallest register the observable fits on.
    pub fn min_num_of_qbits(&self) -> usize {
        self.operators
            .iter()
            .flat_map(|op| op.ops.iter().map(|m| m.index + 1))
            .max()
            .unwrap_or(0)
    }

    fn term_matrix(&self, operator: &PauliOperator, num_of_qbits: usize) -> Result<CsrMatrix<Qbit>> {
        let mut kinds = vec![Pauli::I; num_of_qbits];
        for op in &operator.ops {
            if op.index >= num_of_qbits {
                return Err(anyhow::anyhow!(
                    "Pauli operator on qubit {} does not fit in {} qubits",
                    op.index,
                    num_of_qbits
                ));
            }
            if kinds[op.index] != Pauli::I {
                return Err(anyhow::anyhow!(
                    "Qubit {} appears twice in one Pauli term",
                    op.index
                ));
            }
            kinds[op.index] = op.kind;
        }

        let mut matrix = CsrMatrix::identity(1);
        for kind in kinds.iter().rev() {
            matrix = kronecker_product(&matrix, &kind.matrix());
        }
        Ok(matrix)
    }

    /// Dense Hermitian matrix of the observable on `num_of_qbits` qubits.
    pub fn to_matrix(&self, num_of_qbits: usize) -> Result<DMatrix<Qbit>> {
        let dim = 1 << num_of_qbits;
        let mut total = DMatrix::zeros(dim, dim);
        for operator in &self.operators {
            let term = convert_csr_dense(&self.term_matrix(operator, num_of_qbits)?);
            total += term * Complex::new(operator.coefficient, 0.0);
        }
        Ok(total)
    }

    pub fn expectation_value(&self, qstate: &QState) -> Result<f64> {
        let mut expectation = 0.0;

        for operator in &self.operators {
            let op = self.term_matrix(operator, qstate.num_of_qbits())?;
            let exp = qstate.state.dotc(&(&op * &qstate.state)).re;
            expectation += operator.coefficient * exp;
        }

        Ok(expectation)
    }
}

impl Display for Observable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, operator) in self.operators.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            let term = if operator.ops.is_empty() {
                "i".to_string()
            } else {
                operator
                    .ops
                    .iter()
                    .map(|m| format!("{}{}", m.kind.letter(), m.index))
                    .collect::<Vec<_>>()
                    .join(",")
            };
            write!(f, "{:+.4} {}", operator.coefficient, term)?;
        }
        Ok(())
    }
}

fn parse_pauli_term(term: &str) -> Result<Vec<(Pauli, usize)>> {
    let mut ops = Vec::new();
    for token in term.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let mut chars = token.chars();
        let letter = chars
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty Pauli token in '{}'", term))?;
        let kind = Pauli::from_letter(letter)?;
        let rest = chars.as_str();
        if kind == Pauli::I && rest.is_empty() {
            continue;
        }
        let index = rest.parse::<usize>().map_err(|_| {
            anyhow::anyhow!("Invalid qubit index in Pauli token '{}'", token)
        })?;
        ops.push((kind, index));
    }
    Ok(ops)
}

#[derive(Clone, Debug)]
struct PauliOperator {
    coefficient: f64,
    ops: Vec<PauliMatrix>,
}

#[derive(Clone, Debug)]
struct PauliMatrix {
    index: usize,
    kind: Pauli,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pauli {
    I,
    X,
    Y,
    Z,
}

impl Pauli {
    fn matrix(&self) -> CsrMatrix<Qbit> {
        match self {
            Pauli::I => CsrMatrix::identity(2),
            Pauli::X => x_matrix(),
            Pauli::Y => y_matrix(),
            Pauli::Z => z_matrix(),
        }
    }

    pub fn letter(&self) -> char {
        match self {
            Pauli::I => 'i',
            Pauli::X => 'x',
            Pauli::Y => 'y',
            Pauli::Z => 'z',
        }
    }

    pub fn from_letter(letter: char) -> Result<Self> {
        match letter.to_ascii_lowercase() {
            'i' => Ok(Pauli::I),
            'x' => Ok(Pauli::X),
            'y' => Ok(Pauli::Y),
            'z' => Ok(Pauli::Z),
            other => Err(anyhow::anyhow!("Unknown Pauli letter '{}'", other)),
        }
    }

    /// Parses an alphabet such as `"xz"` into its Pauli letters.
    pub fn parse_alphabet(alphabet: &str) -> Result<Vec<Self>> {
        alphabet.chars().map(Self::from_letter).collect()
    }
}

/// Distribution of the random term coefficients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoefficientDistribution {
    Uniform { low: f64, high: f64 },
    Normal { mean: f64, std_dev: f64 },
}

impl Default for CoefficientDistribution {
    fn default() -> Self {
        Self::Uniform {
            low: -1.0,
            high: 1.0,
        }
    }
}

impl CoefficientDistribution {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64> {
        let value = match *self {
            Self::Uniform { low, high } => Uniform::new(low, high)?.sample(rng),
            Self::Normal { mean, std_dev } => Normal::new(mean, std_dev)?.sample(rng),
        };
        Ok(value)
    }
}
