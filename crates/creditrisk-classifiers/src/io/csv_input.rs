//! CSV reader producing numeric `Dataset`s.
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use ndarray::Array2;
use zip::ZipArchive;

use crate::data_handling::Dataset;

/// Cell contents that are read as a missing value.
const MISSING_TOKENS: [&str; 4] = ["", "NA", "NaN", "nan"];

/// Read a `.csv` or `.csv.zip` file into a `Dataset`.
///
/// For zip archives the first entry ending in `.csv` is read, falling back to
/// the first entry of the archive.
pub fn read_dataset<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let path = path.as_ref();
    let is_zip = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.eq_ignore_ascii_case("zip"))
        .unwrap_or(false);

    let file = File::open(path)
        .with_context(|| format!("Failed to open input file: {}", path.display()))?;

    if !is_zip {
        return read_dataset_from_reader(file)
            .with_context(|| format!("Failed to parse CSV: {}", path.display()));
    }

    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("Failed to open zip archive: {}", path.display()))?;
    if archive.len() == 0 {
        bail!("Zip archive contains no entries: {}", path.display());
    }

    let mut entry_idx = 0;
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        if entry.name().to_lowercase().ends_with(".csv") {
            entry_idx = i;
            break;
        }
    }

    let entry = archive.by_index(entry_idx)?;
    let entry_name = entry.name().to_string();
    log::debug!("Reading '{}' from {}", entry_name, path.display());
    read_dataset_from_reader(entry)
        .with_context(|| format!("Failed to parse CSV entry '{}' in {}", entry_name, path.display()))
}

/// Read comma-separated data with a header row from any reader.
pub fn read_dataset_from_reader<R: Read>(reader: R) -> Result<Dataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read header row")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.is_empty() {
        bail!("Header row is empty");
    }

    let mut values = Vec::new();
    let mut n_rows = 0;
    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;
        for (col_idx, cell) in record.iter().enumerate() {
            values.push(parse_cell(cell).with_context(|| {
                format!("Invalid value at row {}, column '{}'", row_idx + 1, headers[col_idx])
            })?);
        }
        n_rows += 1;
    }

    let x = Array2::from_shape_vec((n_rows, headers.len()), values)
        .map_err(|e| anyhow!("Failed to build data matrix: {}", e))?;
    Ok(Dataset::new(headers, x)?)
}

fn parse_cell(cell: &str) -> Result<f64> {
    let cell = cell.trim();
    if MISSING_TOKENS.contains(&cell) {
        return Ok(f64::NAN);
    }
    cell.parse::<f64>()
        .map_err(|_| anyhow!("'{}' is not a number", cell))
}
