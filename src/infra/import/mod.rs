//! Local reading and profiling of uploaded files, used by the offline backend.

pub mod csv;
pub mod json;
pub mod xlsx;

use std::collections::BTreeMap;

use anyhow::Result;
use serde_json::Value;

use crate::domain::entities::dataset::{DatasetMetadata, FileType, Row};

/// Rows sampled into dataset metadata.
pub const SAMPLE_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct TabularData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

pub fn read_table(file_type: FileType, bytes: &[u8]) -> Result<TabularData> {
    match file_type {
        FileType::Csv => csv::read_csv(bytes),
        FileType::Json => json::read_json(bytes),
        FileType::Xlsx | FileType::Xls => xlsx::read_workbook(bytes),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int,
    Float,
    Bool,
    Object,
}

impl ColumnKind {
    fn dtype(self) -> &'static str {
        match self {
            ColumnKind::Int => "int64",
            ColumnKind::Float => "float64",
            ColumnKind::Bool => "bool",
            ColumnKind::Object => "object",
        }
    }
}

/// Dataframe-style dtype of one column. Integer columns with gaps widen to
/// float; all-null columns are `object`.
fn infer_kind<'a>(cells: impl Iterator<Item = &'a Value>) -> ColumnKind {
    let mut kind: Option<ColumnKind> = None;
    let mut has_null = false;
    for cell in cells {
        let cell_kind = match cell {
            Value::Null => {
                has_null = true;
                continue;
            }
            Value::Number(number) if number.is_i64() || number.is_u64() => ColumnKind::Int,
            Value::Number(_) => ColumnKind::Float,
            Value::Bool(_) => ColumnKind::Bool,
            _ => ColumnKind::Object,
        };
        kind = Some(match (kind, cell_kind) {
            (None, next) => next,
            (Some(current), next) if current == next => current,
            (Some(ColumnKind::Int), ColumnKind::Float) | (Some(ColumnKind::Float), ColumnKind::Int) => {
                ColumnKind::Float
            }
            _ => ColumnKind::Object,
        });
    }
    match kind {
        Some(ColumnKind::Int) if has_null => ColumnKind::Float,
        Some(ColumnKind::Bool) if has_null => ColumnKind::Object,
        Some(kind) => kind,
        None => ColumnKind::Object,
    }
}

pub fn profile(table: &TabularData, file_size_bytes: u64) -> DatasetMetadata {
    let mut column_types = BTreeMap::new();
    let mut missing_values = BTreeMap::new();
    let mut numeric_columns = Vec::new();
    let mut categorical_columns = Vec::new();

    for (col_idx, name) in table.columns.iter().enumerate() {
        let cells = || table.rows.iter().filter_map(move |row| row.get(col_idx));
        let kind = infer_kind(cells());
        let missing = cells().filter(|cell| cell.is_null()).count() as u64;

        match kind {
            ColumnKind::Int | ColumnKind::Float => numeric_columns.push(name.clone()),
            ColumnKind::Object => categorical_columns.push(name.clone()),
            ColumnKind::Bool => {}
        }
        column_types.insert(name.clone(), kind.dtype().to_string());
        missing_values.insert(name.clone(), missing);
    }

    let sample_rows = table
        .rows
        .iter()
        .take(SAMPLE_ROWS)
        .map(|row| {
            table
                .columns
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect::<Row>()
        })
        .collect();

    DatasetMetadata {
        row_count: table.rows.len() as u64,
        column_count: table.columns.len() as u64,
        file_size_bytes,
        column_names: table.columns.clone(),
        column_types,
        sample_rows,
        missing_values,
        numeric_columns,
        categorical_columns,
        date_columns: Vec::new(),
    }
}
