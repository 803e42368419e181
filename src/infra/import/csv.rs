use anyhow::{Context, Result};
use csv::StringRecord;
use serde_json::Value;

use crate::infra::import::TabularData;

pub fn read_csv(bytes: &[u8]) -> Result<TabularData> {
    let mut reader = csv::Reader::from_reader(bytes);
    let headers = reader
        .headers()
        .context("failed to read headers from csv")?
        .clone();

    if headers.is_empty() {
        anyhow::bail!("csv header is required")
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context("failed to parse csv record")?;
        rows.push(record_to_row(&record, headers.len()));
    }

    Ok(TabularData {
        columns: headers.iter().map(str::to_string).collect(),
        rows,
    })
}

fn record_to_row(record: &StringRecord, width: usize) -> Vec<Value> {
    (0..width)
        .map(|col_idx| infer_cell(record.get(col_idx).unwrap_or("")))
        .collect()
}

/// Reads a text cell the way a dataframe loader would: integers, floats and
/// booleans become typed, blanks become null.
pub fn infer_cell(raw: &str) -> Value {
    let text = raw.trim();
    if text.is_empty() {
        return Value::Null;
    }
    if let Ok(int) = text.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = text.parse::<f64>() {
        if float.is_finite() {
            return Value::from(float);
        }
    }
    match text {
        "true" | "True" | "TRUE" => Value::Bool(true),
        "false" | "False" | "FALSE" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}
