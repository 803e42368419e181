use anyhow::{Context, Result};
use serde_json::{Map, Value};

use crate::infra::import::TabularData;

/// Accepts a list of records or a column-oriented object whose values are
/// either arrays or index-keyed objects.
pub fn read_json(bytes: &[u8]) -> Result<TabularData> {
    let document: Value = serde_json::from_slice(bytes).context("failed to parse json")?;
    match document {
        Value::Array(records) => from_records(records),
        Value::Object(columns) => from_columns(columns),
        _ => anyhow::bail!("json must be an array of records or an object of columns"),
    }
}

fn from_records(records: Vec<Value>) -> Result<TabularData> {
    let mut columns: Vec<String> = Vec::new();
    let mut objects = Vec::with_capacity(records.len());
    for (idx, record) in records.into_iter().enumerate() {
        let Value::Object(object) = record else {
            anyhow::bail!("record {idx} is not an object")
        };
        for key in object.keys() {
            if !columns.contains(key) {
                columns.push(key.clone());
            }
        }
        objects.push(object);
    }

    let rows = objects
        .into_iter()
        .map(|mut object| {
            columns
                .iter()
                .map(|column| object.remove(column).unwrap_or(Value::Null))
                .collect()
        })
        .collect();
    Ok(TabularData { columns, rows })
}

fn from_columns(columns: Map<String, Value>) -> Result<TabularData> {
    let mut names = Vec::with_capacity(columns.len());
    let mut values: Vec<Vec<Value>> = Vec::with_capacity(columns.len());
    for (name, column) in columns {
        let cells = match column {
            Value::Array(cells) => cells,
            Value::Object(indexed) => indexed.into_iter().map(|(_, cell)| cell).collect(),
            _ => anyhow::bail!("column {name} is neither an array nor an object"),
        };
        names.push(name);
        values.push(cells);
    }

    let height = values.iter().map(Vec::len).max().unwrap_or(0);
    let rows = (0..height)
        .map(|row_idx| {
            values
                .iter()
                .map(|cells| cells.get(row_idx).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();
    Ok(TabularData {
        columns: names,
        rows,
    })
}
