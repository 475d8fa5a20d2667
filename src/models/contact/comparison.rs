//! Simulated-versus-experimental force series for post-calibration reporting.

use std::io::Write;

use anyhow::Result;
use serde::Serialize;
use statrs::statistics::Statistics;

/// One sample of the comparison series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub time: f64,
    /// Summed vertical contact force of the model, N
    pub simulation: f64,
    /// Reference force at the same time, N
    pub experiment: f64,
}

impl ComparisonRow {
    pub fn residual(&self) -> f64 {
        self.simulation - self.experiment
    }
}

/// Destination for comparison rows (a table writer, an in-memory buffer, ...).
pub trait ComparisonSink {
    fn record(&mut self, row: &ComparisonRow) -> Result<()>;

    /// Called once after the last row.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl ComparisonSink for Vec<ComparisonRow> {
    fn record(&mut self, row: &ComparisonRow) -> Result<()> {
        self.push(*row);
        Ok(())
    }
}

/// Writes rows as CSV with a `time,simulation,experiment` header.
pub struct CsvComparisonWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl CsvComparisonWriter<std::fs::File> {
    pub fn create(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Ok(Self {
            writer: csv::Writer::from_path(path)?,
        })
    }
}

impl<W: Write> CsvComparisonWriter<W> {
    pub fn from_writer(inner: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(inner),
        }
    }

    /// Flush and hand back the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("failed to flush comparison table: {}", e.error()))
    }
}

impl<W: Write> ComparisonSink for CsvComparisonWriter<W> {
    fn record(&mut self, row: &ComparisonRow) -> Result<()> {
        self.writer.serialize(row)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Fit statistics of a comparison series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComparisonSummary {
    pub samples: usize,
    /// Root mean square of `simulation - experiment`
    pub rmse: f64,
    pub mean_residual: f64,
    /// Sample standard deviation of the residual (NaN with fewer than 2 rows)
    pub residual_std_dev: f64,
    pub peak_simulation: f64,
    pub peak_experiment: f64,
}

impl ComparisonSummary {
    pub fn from_rows(rows: &[ComparisonRow]) -> Self {
        let residuals: Vec<f64> = rows.iter().map(ComparisonRow::residual).collect();
        Self {
            samples: rows.len(),
            rmse: residuals.iter().quadratic_mean(),
            mean_residual: residuals.iter().mean(),
            residual_std_dev: residuals.iter().std_dev(),
            peak_simulation: rows.iter().map(|r| r.simulation).fold(f64::NAN, f64::max),
            peak_experiment: rows.iter().map(|r| r.experiment).fold(f64::NAN, f64::max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<ComparisonRow> {
        vec![
            ComparisonRow {
                time: 0.0,
                simulation: 10.0,
                experiment: 8.0,
            },
            ComparisonRow {
                time: 0.1,
                simulation: 20.0,
                experiment: 22.0,
            },
            ComparisonRow {
                time: 0.2,
                simulation: 5.0,
                experiment: 5.0,
            },
        ]
    }

    #[test]
    fn csv_writer_emits_header_and_rows() {
        let mut writer = CsvComparisonWriter::from_writer(Vec::new());
        for row in rows() {
            writer.record(&row).unwrap();
        }
        writer.finish().unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("time,simulation,experiment"));
        assert_eq!(lines.next(), Some("0.0,10.0,8.0"));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn summary_statistics() {
        let summary = ComparisonSummary::from_rows(&rows());
        assert_eq!(summary.samples, 3);
        assert!((summary.rmse - (8.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!(summary.mean_residual.abs() < 1e-12);
        assert_eq!(summary.peak_simulation, 20.0);
        assert_eq!(summary.peak_experiment, 22.0);
    }
}
