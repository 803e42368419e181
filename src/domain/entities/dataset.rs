use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of tabular data keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetId(pub String);

impl DatasetId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DatasetId {
    fn from(value: &str) -> Self {
        DatasetId(value.to_string())
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Csv,
    Json,
    Xlsx,
    Xls,
}

impl FileType {
    pub const ALL: [FileType; 4] = [FileType::Csv, FileType::Json, FileType::Xlsx, FileType::Xls];

    pub fn extension(self) -> &'static str {
        match self {
            FileType::Csv => "csv",
            FileType::Json => "json",
            FileType::Xlsx => "xlsx",
            FileType::Xls => "xls",
        }
    }

    /// Case-insensitive lookup by bare extension (no leading dot).
    pub fn from_extension(ext: &str) -> Option<FileType> {
        let ext = ext.to_ascii_lowercase();
        FileType::ALL
            .into_iter()
            .find(|file_type| file_type.extension() == ext)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub row_count: u64,
    pub column_count: u64,
    pub file_size_bytes: u64,
    pub column_names: Vec<String>,
    pub column_types: BTreeMap<String, String>,
    pub sample_rows: Vec<Row>,
    #[serde(default)]
    pub missing_values: BTreeMap<String, u64>,
    #[serde(default)]
    pub numeric_columns: Vec<String>,
    #[serde(default)]
    pub categorical_columns: Vec<String>,
    #[serde(default)]
    pub date_columns: Vec<String>,
}

/// Cached copy of a server-owned dataset. Replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub original_name: String,
    pub file_type: FileType,
    pub metadata: DatasetMetadata,
    pub upload_time: DateTime<Utc>,
}

impl Dataset {
    pub fn summary_label(&self) -> String {
        format!(
            "{} ({} rows × {} columns)",
            self.original_name, self.metadata.row_count, self.metadata.column_count
        )
    }
}
