use std::io::Cursor;

use anyhow::{Context, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde_json::Value;

use crate::infra::import::TabularData;

pub fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::String(v) => Value::String(v.to_string()),
        Data::Float(v) => serde_json::Number::from_f64(*v)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Data::Int(v) => Value::from(*v),
        Data::Bool(v) => Value::Bool(*v),
        Data::DateTime(v) => Value::String(v.to_string()),
        Data::DateTimeIso(v) => Value::String(v.to_string()),
        Data::DurationIso(v) => Value::String(v.to_string()),
        Data::Error(v) => Value::String(format!("{v:?}")),
        Data::Empty => Value::Null,
    }
}

fn header_name(cell: &Data, col_idx: usize) -> String {
    match cell_to_value(cell) {
        Value::String(name) if !name.trim().is_empty() => name,
        Value::Null => format!("Unnamed: {col_idx}"),
        other => other.to_string(),
    }
}

/// Reads the first worksheet; its first row is the header.
pub fn read_workbook(bytes: &[u8]) -> Result<TabularData> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .context("failed to open workbook")?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .context("workbook has no sheets")?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .with_context(|| format!("failed to read sheet: {sheet_name}"))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        anyhow::bail!("sheet {sheet_name} is empty")
    };
    let columns: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(col_idx, cell)| header_name(cell, col_idx))
        .collect();

    let rows = rows
        .map(|row| {
            (0..columns.len())
                .map(|col_idx| row.get(col_idx).map(cell_to_value).unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    Ok(TabularData { columns, rows })
}
