use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ansatz::Ansatz;
use crate::observable::{CoefficientDistribution, Observable, Pauli};
use crate::optimizer::OptimizerKind;

/// Registers wider than this make the dense simulation impractical.
pub const MAX_QUBITS: usize = 10;

/// Run configuration.
///
/// Values are resolved with the following priority (later sources
/// override earlier ones):
///
/// 1. Built-in defaults
/// 2. YAML file (`--config`, or `gibbs.yaml` in the working directory)
/// 3. Environment variables (`GIBBS_*`)
/// 4. CLI arguments
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub problem: ProblemConfig,

    #[serde(default)]
    pub ansatz: AnsatzConfig,

    #[serde(default)]
    pub training: TrainingConfig,

    #[serde(default)]
    pub sweep: SweepConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from file and environment.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default = ["gibbs.yaml", "gibbs.yml"]
                    .iter()
                    .map(Path::new)
                    .find(|path| path.exists());
                match default {
                    Some(path) => Self::from_file(path)?,
                    None => Config::default(),
                }
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Applies `GIBBS_*` overrides from `lookup`; unparsable values are skipped.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, value: Option<String>) -> Option<T> {
            let value = value?;
            match value.trim().parse() {
                Ok(parsed) => Some(parsed),
                Err(_) => {
                    warn!(key, value = %value, "ignoring unparsable override");
                    None
                }
            }
        }

        if let Some(beta) = parse("GIBBS_BETA", lookup("GIBBS_BETA")) {
            self.problem.beta = beta;
        }
        if let Some(iterations) = parse("GIBBS_ITERATIONS", lookup("GIBBS_ITERATIONS")) {
            self.training.iterations = iterations;
        }
        if let Some(lr) = parse("GIBBS_LEARNING_RATE", lookup("GIBBS_LEARNING_RATE")) {
            self.training.learning_rate = lr;
        }
        if let Some(seed) = parse("GIBBS_SEED", lookup("GIBBS_SEED")) {
            self.sweep.seed = seed;
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if !self.problem.beta.is_finite() || self.problem.beta <= 0.0 {
            bail!("beta must be positive and finite, got {}", self.problem.beta);
        }
        if self.training.iterations == 0 {
            bail!("iterations must be at least 1");
        }
        if self.training.log_every == 0 {
            bail!("log_every must be at least 1");
        }
        if !self.training.learning_rate.is_finite() || self.training.learning_rate <= 0.0 {
            bail!(
                "learning_rate must be positive, got {}",
                self.training.learning_rate
            );
        }
        if self.sweep.system_qubits.is_empty() || self.sweep.ancilla_qubits.is_empty() {
            bail!("sweep grid must name at least one system and one ancilla size");
        }
        if self.sweep.system_qubits.contains(&0) {
            bail!("system registers need at least one qubit");
        }

        let widest = self.sweep.system_qubits.iter().max().copied().unwrap_or(0)
            + self.sweep.ancilla_qubits.iter().max().copied().unwrap_or(0);
        if widest > MAX_QUBITS {
            bail!(
                "register of {} qubits exceeds the limit of {}",
                widest,
                MAX_QUBITS
            );
        }

        if let HamiltonianSpec::Random { alphabet, .. } = &self.problem.hamiltonian {
            Pauli::parse_alphabet(alphabet)?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProblemConfig {
    /// Inverse temperature
    pub beta: f64,
    pub hamiltonian: HamiltonianSpec,
}

impl Default for ProblemConfig {
    fn default() -> Self {
        Self {
            beta: 1.5,
            hamiltonian: HamiltonianSpec::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauliTerm {
    pub coefficient: f64,
    /// Pauli string such as `"z0,x1"`
    pub ops: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HamiltonianSpec {
    Random {
        #[serde(default = "default_terms")]
        terms: usize,
        #[serde(default = "default_alphabet")]
        alphabet: String,
        #[serde(default)]
        coefficients: CoefficientDistribution,
    },
    IsingTriangle,
    Pauli {
        terms: Vec<PauliTerm>,
    },
}

fn default_terms() -> usize {
    5
}

fn default_alphabet() -> String {
    "xz".to_string()
}

impl Default for HamiltonianSpec {
    fn default() -> Self {
        Self::Random {
            terms: default_terms(),
            alphabet: default_alphabet(),
            coefficients: CoefficientDistribution::default(),
        }
    }
}

impl HamiltonianSpec {
    pub fn build<R: Rng + ?Sized>(&self, num_system: usize, rng: &mut R) -> Result<Observable> {
        let observable = match self {
            Self::Random {
                terms,
                alphabet,
                coefficients,
            } => {
                let alphabet = Pauli::parse_alphabet(alphabet)?;
                Observable::random(num_system, *terms, &alphabet, coefficients, rng)?
            }
            Self::IsingTriangle => Observable::ising_triangle(),
            Self::Pauli { terms } => Observable::from_pauli_str(
                &terms
                    .iter()
                    .map(|term| (term.coefficient, term.ops.as_str()))
                    .collect::<Vec<_>>(),
            )?,
        };

        if observable.min_num_of_qbits() > num_system {
            bail!(
                "Hamiltonian acts on {} qubits but the system has {}",
                observable.min_num_of_qbits(),
                num_system
            );
        }
        Ok(observable)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnsatzConfig {
    pub kind: Ansatz,
    pub depth: usize,
}

impl Default for AnsatzConfig {
    fn default() -> Self {
        Self {
            kind: Ansatz::Complex,
            depth: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub iterations: usize,
    pub learning_rate: f64,
    /// Record loss and fidelity every this many iterations
    pub log_every: usize,
    pub optimizer: OptimizerKind,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            iterations: 50,
            learning_rate: 0.5,
            log_every: 10,
            optimizer: OptimizerKind::Adam,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub system_qubits: Vec<usize>,
    pub ancilla_qubits: Vec<usize>,
    pub seed: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            system_qubits: vec![3],
            ancilla_qubits: vec![1],
            seed: 16,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Write all sweep results as JSON
    pub json: Option<PathBuf>,
    /// Write one loss/fidelity PNG per sweep cell
    pub plot_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn test_default_config_is_valid() -> Result<()> {
        let config = Config::default();
        config.validate()?;
        assert_eq!(1.5, config.problem.beta);
        assert_eq!(50, config.training.iterations);
        assert_eq!(0.5, config.training.learning_rate);
        assert_eq!(Ansatz::Complex, config.ansatz.kind);
        assert_eq!(vec![3], config.sweep.system_qubits);
        Ok(())
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() -> Result<()> {
        let config = Config::from_yaml(
            r#"
problem:
  beta: 2.0
  hamiltonian:
    kind: pauli
    terms:
      - { coefficient: -1.0, ops: "z0,z1" }
ansatz:
  kind: real
sweep:
  ancilla_qubits: [1, 2]
"#,
        )?;

        assert_eq!(2.0, config.problem.beta);
        assert_eq!(Ansatz::Real, config.ansatz.kind);
        assert_eq!(1, config.ansatz.depth);
        assert_eq!(vec![1, 2], config.sweep.ancilla_qubits);
        assert_eq!(vec![3], config.sweep.system_qubits);
        assert_eq!(
            HamiltonianSpec::Pauli {
                terms: vec![PauliTerm {
                    coefficient: -1.0,
                    ops: "z0,z1".to_string()
                }]
            },
            config.problem.hamiltonian
        );
        config.validate()?;
        Ok(())
    }

    #[test]
    fn test_random_hamiltonian_fields_default() -> Result<()> {
        let config = Config::from_yaml("problem:\n  hamiltonian:\n    kind: random\n    terms: 2\n")?;
        assert_eq!(
            HamiltonianSpec::Random {
                terms: 2,
                alphabet: "xz".to_string(),
                coefficients: CoefficientDistribution::default(),
            },
            config.problem.hamiltonian
        );
        Ok(())
    }

    #[test]
    fn test_yaml_round_trip() -> Result<()> {
        let config = Config::default();
        let parsed = Config::from_yaml(&config.to_yaml()?)?;
        assert_eq!(config.problem.hamiltonian, parsed.problem.hamiltonian);
        assert_eq!(config.sweep.seed, parsed.sweep.seed);
        Ok(())
    }

    #[test]
    fn test_load_from_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("gibbs.yaml");
        std::fs::write(
            &path,
            "ansatz:\n  depth: 3\nsweep:\n  system_qubits: [2, 4]\n  ancilla_qubits: [0]\n",
        )?;

        let config = Config::load(Some(path.as_path()))?;
        assert_eq!(3, config.ansatz.depth);
        assert_eq!(vec![2, 4], config.sweep.system_qubits);
        assert_eq!(vec![0], config.sweep.ancilla_qubits);
        config.validate()?;

        Ok(())
    }

    #[test]
    fn test_load_reports_file_errors() -> Result<()> {
        let dir = tempfile::tempdir()?;

        let missing = dir.path().join("missing.yaml");
        let err = Config::load(Some(missing.as_path())).unwrap_err();
        assert!(format!("{:#}", err).contains("failed to read config file"));

        let bad = dir.path().join("bad.yaml");
        std::fs::write(&bad, "training:\n  iterations: many\n")?;
        let err = Config::load(Some(bad.as_path())).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.contains("failed to parse config file"));
        assert!(message.contains("bad.yaml"));

        Ok(())
    }

    #[test]
    fn test_overrides() {
        let vars = HashMap::from([
            ("GIBBS_BETA", "3.0"),
            ("GIBBS_ITERATIONS", "not-a-number"),
            ("GIBBS_SEED", "99"),
        ]);
        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(3.0, config.problem.beta);
        assert_eq!(50, config.training.iterations);
        assert_eq!(99, config.sweep.seed);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = Config::default();
        config.problem.beta = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.training.iterations = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.training.log_every = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sweep.ancilla_qubits.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sweep.system_qubits = vec![0];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.sweep.system_qubits = vec![6];
        config.sweep.ancilla_qubits = vec![5];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.problem.hamiltonian = HamiltonianSpec::Random {
            terms: 3,
            alphabet: "xq".to_string(),
            coefficients: CoefficientDistribution::default(),
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_hamiltonian_spec_checks_width() -> Result<()> {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(HamiltonianSpec::IsingTriangle.build(2, &mut rng).is_err());
        assert_eq!(3, HamiltonianSpec::IsingTriangle.build(3, &mut rng)?.num_of_terms());
        assert_eq!(5, HamiltonianSpec::default().build(2, &mut rng)?.num_of_terms());
        Ok(())
    }
}
