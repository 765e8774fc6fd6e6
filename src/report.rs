use std::fs::File;
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use plotters::prelude::*;
use tracing::info;

use crate::trainer::{SweepResult, TrainingRecord};

pub fn write_summary<W: Write>(out: &mut W, results: &[SweepResult]) -> Result<()> {
    writeln!(
        out,
        "{:>6} {:>7} {:>6} {:>11} {:>9} {:>9} {:>11} {:>11}",
        "system", "ancilla", "params", "loss", "fidelity", "best", "F_exact", "F_var"
    )?;
    for result in results {
        writeln!(
            out,
            "{:>6} {:>7} {:>6} {:>11.6} {:>9.6} {:>9.6} {:>11.6} {:>11.6}",
            result.num_system,
            result.num_ancilla,
            result.num_parameters,
            result.report.final_loss.total,
            result.report.final_fidelity,
            result.report.best_fidelity,
            result.exact_free_energy,
            result.variational_free_energy,
        )?;
    }
    Ok(())
}

pub fn print_summary(results: &[SweepResult]) -> Result<()> {
    let stdout = std::io::stdout();
    write_summary(&mut stdout.lock(), results)
}

pub fn write_json(path: &Path, results: &[SweepResult]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), results)?;
    info!(path = %path.display(), "wrote results");
    Ok(())
}

/// Writes `curves_s{system}_a{ancilla}.png` for every result into `dir`.
pub fn plot_curves(dir: &Path, results: &[SweepResult]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let mut written = Vec::new();
    for result in results {
        let path = dir.join(format!(
            "curves_s{}_a{}.png",
            result.num_system, result.num_ancilla
        ));
        plot_records(&path, &result.report.records)?;
        info!(path = %path.display(), "wrote plot");
        written.push(path);
    }
    Ok(written)
}

fn plot_records(path: &Path, records: &[TrainingRecord]) -> Result<()> {
    let root = BitMapBackend::new(path, (640, 640)).into_drawing_area();
    root.fill(&WHITE)?;
    let (upper, lower) = root.split_vertically(320);

    let last = records.last().map(|r| r.iteration).unwrap_or(0).max(1) as f64;
    let losses: Vec<(f64, f64)> = records
        .iter()
        .map(|r| (r.iteration as f64, r.loss))
        .collect();
    let fidelities: Vec<(f64, f64)> = records
        .iter()
        .map(|r| (r.iteration as f64, r.fidelity))
        .collect();

    for (area, caption, points, colour) in [
        (&upper, "loss", &losses, RED),
        (&lower, "fidelity", &fidelities, BLUE),
    ] {
        let mut chart = ChartBuilder::on(area)
            .caption(caption, ("sans-serif", 20))
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(50)
            .build_cartesian_2d(0.0..last, value_range(points))?;

        chart.configure_mesh().draw()?;
        chart.draw_series(LineSeries::new(points.iter().copied(), &colour))?;
        chart.draw_series(
            points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 3, colour.filled())),
        )?;
    }

    root.present()?;
    Ok(())
}

/// Padded y range; a flat curve still gets a non-empty axis.
fn value_range(points: &[(f64, f64)]) -> Range<f64> {
    let (min, max) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, y)| {
            (lo.min(y), hi.max(y))
        });
    if !min.is_finite() || !max.is_finite() {
        return 0.0..1.0;
    }
    let pad = ((max - min) * 0.05).max(1e-3);
    (min - pad)..(max + pad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_approx_eq;
    use crate::config::{Config, HamiltonianSpec, PauliTerm};
    use crate::trainer::sweep;

    fn small_sweep() -> Result<Vec<SweepResult>> {
        let mut config = Config::default();
        config.problem.hamiltonian = HamiltonianSpec::Pauli {
            terms: vec![PauliTerm {
                coefficient: 0.8,
                ops: "x0".to_string(),
            }],
        };
        config.sweep.system_qubits = vec![1];
        config.sweep.ancilla_qubits = vec![0, 1];
        config.training.iterations = 3;
        config.training.log_every = 1;
        sweep(&config)
    }

    #[test]
    fn test_plot_per_cell() -> Result<()> {
        let results = small_sweep()?;
        let dir = tempfile::tempdir()?;
        let plot_dir = dir.path().join("plots");

        let written = plot_curves(&plot_dir, &results)?;
        assert_eq!(
            vec![
                plot_dir.join("curves_s1_a0.png"),
                plot_dir.join("curves_s1_a1.png")
            ],
            written
        );
        for path in &written {
            assert!(std::fs::metadata(path)?.len() > 0);
        }

        Ok(())
    }

    #[test]
    fn test_summary_has_a_row_per_cell() -> Result<()> {
        let results = small_sweep()?;
        let mut out = Vec::new();
        write_summary(&mut out, &results)?;

        let text = String::from_utf8(out)?;
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(3, lines.len());
        assert!(lines[0].contains("fidelity"));
        assert!(lines[2].trim_start().starts_with('1'));

        Ok(())
    }

    #[test]
    fn test_value_range_pads_flat_curves() {
        let range = value_range(&[(0.0, 2.0), (1.0, 2.0)]);
        assert!(range.start < 2.0 && range.end > 2.0);

        let range = value_range(&[(0.0, 0.0), (1.0, 1.0)]);
        assert_approx_eq!(-0.05, range.start);
        assert_approx_eq!(1.05, range.end);

        assert_eq!(0.0..1.0, value_range(&[]));
    }
}
