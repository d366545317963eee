#![allow(dead_code)]

use creditrisk_classifiers::data_handling::Dataset;
use ndarray::Array2;

pub const RAW_COLUMNS: [&str; 10] = [
    "ID",
    "LIMIT_BAL",
    "SEX",
    "EDUCATION",
    "MARRIAGE",
    "AGE",
    "PAY_0",
    "BILL_AMT1",
    "PAY_AMT1",
    "default payment next month",
];

/// Deterministic raw table in the layout of the credit-card files. Clients
/// with a payment delay of two or more months (PAY_0 >= 2) default.
pub fn synthetic_raw(n_rows: usize, offset: usize) -> Dataset {
    let mut values = Vec::with_capacity(n_rows * RAW_COLUMNS.len());
    for r in 0..n_rows {
        let i = r + offset;
        let pay_0 = (i % 5) as f64 - 1.0;
        values.extend_from_slice(&[
            (i + 1) as f64,
            10_000.0 * (1 + i % 7) as f64,
            (1 + i % 2) as f64,
            (1 + i % 4) as f64,
            (1 + (i / 2) % 2) as f64,
            (21 + i % 30) as f64,
            pay_0,
            1_000.0 * (i % 11) as f64,
            500.0 * (i % 13) as f64,
            if pay_0 >= 2.0 { 1.0 } else { 0.0 },
        ]);
    }
    let x = Array2::from_shape_vec((n_rows, RAW_COLUMNS.len()), values).unwrap();
    Dataset::new(RAW_COLUMNS.iter().map(|c| c.to_string()).collect(), x).unwrap()
}

pub fn to_csv(data: &Dataset) -> String {
    let mut out = data.columns().join(",");
    out.push('\n');
    for row in data.values().rows() {
        let cells: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}
