use anyhow::Result;
use std::path::{Path, PathBuf};

/// Check that an input table exists and is a `.csv` or zip-compressed file.
pub fn validate_csv_or_zip_file(path: &str) -> Result<()> {
    let pb = PathBuf::from(path);

    let ext = pb
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase());
    match ext.as_deref() {
        Some("csv") | Some("zip") => {}
        _ => anyhow::bail!("File must have a .csv or .zip extension: {}", path),
    }

    if !pb.exists() {
        anyhow::bail!("File does not exist: {}", path);
    }

    Ok(())
}

/// The HTML summary lives next to the metrics report as `metrics.html`.
pub fn html_report_path<P: AsRef<Path>>(metrics_output: P) -> PathBuf {
    match metrics_output.as_ref().parent() {
        Some(parent) => parent.join("metrics.html"),
        None => PathBuf::from("metrics.html"),
    }
}
