pub mod html;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::metrics::{ConfusionMatrixRecord, EvaluationRecord, MetricsRecord};

pub use html::{Report, ReportSection};

/// Report lines in their fixed order: train metrics, test metrics, train
/// confusion matrix, test confusion matrix.
pub fn evaluation_records(
    metrics: (MetricsRecord, MetricsRecord),
    confusion: (ConfusionMatrixRecord, ConfusionMatrixRecord),
) -> Vec<EvaluationRecord> {
    vec![
        EvaluationRecord::Metrics(metrics.0),
        EvaluationRecord::Metrics(metrics.1),
        EvaluationRecord::ConfusionMatrix(confusion.0),
        EvaluationRecord::ConfusionMatrix(confusion.1),
    ]
}

/// Write one JSON object per line, creating the parent directory.
pub fn write_metrics<P: AsRef<Path>>(path: P, records: &[EvaluationRecord]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
        }
    }

    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    log::info!("Wrote {} metric records to {}", records.len(), path.display());
    Ok(())
}

/// Read a report written by [`write_metrics`].
pub fn read_metrics<P: AsRef<Path>>(path: P) -> Result<Vec<EvaluationRecord>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("Invalid record on line {} of {}", i + 1, path.display()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_metrics_reports_physical_line_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        fs::write(
            &path,
            "{\"type\":\"cm_matrix\",\"dataset\":\"test\",\"true_0\":{\"predicted_0\":1,\"predicted_1\":0},\"true_1\":{\"predicted_0\":0,\"predicted_1\":1}}\n\n\nnot json\n",
        )
        .unwrap();

        let err = read_metrics(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("line 4"), "unexpected error {:#}", err);
    }
}
