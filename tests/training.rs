use anyhow::Result;

use gibbs_qsim::config::{Config, HamiltonianSpec, PauliTerm};
use gibbs_qsim::report;
use gibbs_qsim::trainer::sweep;

fn z_config() -> Config {
    let mut config = Config::default();
    config.problem.hamiltonian = HamiltonianSpec::Pauli {
        terms: vec![PauliTerm {
            coefficient: 1.0,
            ops: "z0".to_string(),
        }],
    };
    config.sweep.system_qubits = vec![1];
    config.sweep.ancilla_qubits = vec![1];
    config.training.iterations = 20;
    config.training.learning_rate = 0.1;
    config
}

#[test]
fn test_short_training_run() -> Result<()> {
    let config = z_config();
    let results = sweep(&config)?;
    assert_eq!(1, results.len());

    let report = &results[0].report;
    assert_eq!(3, report.records.len());
    for record in &report.records {
        assert!(record.fidelity >= 0.0 && record.fidelity <= 1.0);
    }
    report.final_state.validate(1e-9)?;
    assert!(results[0].variational_free_energy >= results[0].exact_free_energy - 1e-9);

    let mut table = Vec::new();
    report::write_summary(&mut table, &results)?;
    let table = String::from_utf8(table)?;
    assert_eq!(2, table.lines().count());

    Ok(())
}

#[test]
fn test_results_written_as_json() -> Result<()> {
    let mut config = z_config();
    config.training.iterations = 4;

    let results = sweep(&config)?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("results.json");
    report::write_json(&path, &results)?;

    let value: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    let cell = &value[0];
    assert_eq!(1, cell["num_system"]);
    assert_eq!(1, cell["num_ancilla"]);
    assert!(cell["report"]["final_state"].is_null());
    assert_eq!(
        results[0].report.final_theta.len(),
        cell["report"]["final_theta"].as_array().map(Vec::len).unwrap_or(0)
    );

    Ok(())
}
