//! JSON shapes spoken by the remote service and their conversion into domain
//! types. Field names follow the server, not the domain.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::domain::entities::dataset::{Dataset, DatasetId, DatasetMetadata, FileType, Row};
use crate::domain::entities::query::{EngineVerdict, QueryId, QueryRecord};
use crate::domain::entities::tutorial::ExampleCategory;
use crate::usecase::ports::remote::{QueryOutcome, GENERIC_SERVER_MESSAGE};

#[derive(Debug, Default, Deserialize)]
pub struct WireMetadata {
    #[serde(default)]
    pub rows: u64,
    #[serde(default)]
    pub columns: u64,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub column_names: Vec<String>,
    #[serde(default)]
    pub column_types: BTreeMap<String, String>,
    #[serde(default)]
    pub sample_data: Vec<Row>,
    #[serde(default)]
    pub missing_values: BTreeMap<String, u64>,
    #[serde(default)]
    pub numeric_columns: Vec<String>,
    #[serde(default)]
    pub categorical_columns: Vec<String>,
    #[serde(default)]
    pub date_columns: Vec<String>,
}

impl From<WireMetadata> for DatasetMetadata {
    fn from(wire: WireMetadata) -> Self {
        DatasetMetadata {
            row_count: wire.rows,
            column_count: wire.columns,
            file_size_bytes: wire.file_size,
            column_names: wire.column_names,
            column_types: wire.column_types,
            sample_rows: wire.sample_data,
            missing_values: wire.missing_values,
            numeric_columns: wire.numeric_columns,
            categorical_columns: wire.categorical_columns,
            date_columns: wire.date_columns,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WireDataset {
    pub id: String,
    pub original_name: String,
    pub file_type: String,
    #[serde(default)]
    pub upload_time: Option<String>,
    #[serde(default)]
    pub metadata: WireMetadata,
}

impl WireDataset {
    /// `None` when the server reports a file type the client does not know.
    pub fn into_dataset(self) -> Option<Dataset> {
        let Some(file_type) = FileType::from_extension(&self.file_type) else {
            warn!(dataset_id = %self.id, file_type = %self.file_type, "skipping dataset with unknown file type");
            return None;
        };
        Some(Dataset {
            id: DatasetId(self.id),
            original_name: self.original_name,
            file_type,
            metadata: self.metadata.into(),
            upload_time: parse_timestamp(self.upload_time.as_deref()),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct DatasetsEnvelope {
    #[serde(default)]
    pub datasets: Vec<WireDataset>,
}

#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub file_id: String,
    pub filename: String,
    #[serde(default)]
    pub metadata: WireMetadata,
}

impl UploadResponse {
    /// The upload reply carries neither type nor time; both come from the
    /// client side of the exchange.
    pub fn into_dataset(self, file_type: FileType, uploaded_at: DateTime<Utc>) -> Dataset {
        Dataset {
            id: DatasetId(self.file_id),
            original_name: self.filename,
            file_type,
            metadata: self.metadata.into(),
            upload_time: uploaded_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QueryRequest<'a> {
    pub query: &'a str,
    pub dataset_id: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub struct EngineResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub execution_time: f64,
}

impl From<EngineResponse> for QueryOutcome {
    fn from(wire: EngineResponse) -> Self {
        QueryOutcome {
            success: wire.success,
            payload: wire.result,
            error: wire.error,
            execution_time_seconds: wire.execution_time,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WireQuery {
    #[serde(default)]
    pub id: Option<String>,
    pub query: String,
    #[serde(default)]
    pub dataset_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub result: EngineResponse,
    #[serde(default)]
    pub execution_time: Option<f64>,
}

impl From<WireQuery> for QueryRecord {
    fn from(wire: WireQuery) -> Self {
        let engine = wire.result;
        let verdict = EngineVerdict::judge(
            engine.success,
            engine.result,
            engine.error,
            GENERIC_SERVER_MESSAGE,
        );
        QueryRecord {
            id: wire.id.map(QueryId).unwrap_or_else(QueryId::generate),
            query_text: wire.query,
            dataset_id: wire.dataset_id.map(DatasetId),
            success: verdict.success,
            result: verdict.result,
            error: verdict.error,
            execution_time_seconds: wire.execution_time.unwrap_or(engine.execution_time),
            timestamp: parse_timestamp(wire.timestamp.as_deref()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QueriesEnvelope {
    #[serde(default)]
    pub queries: Vec<WireQuery>,
}

#[derive(Debug, Deserialize)]
pub struct ExamplesEnvelope {
    #[serde(default)]
    pub examples: Vec<ExampleCategory>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

/// Pulls a human-readable detail out of an error body. Plain strings pass
/// through verbatim; structured details are re-encoded.
pub fn error_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail? {
        Value::String(detail) => Some(detail),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Accepts RFC 3339 as well as the naive ISO timestamps the server writes.
/// Unparseable or missing values collapse to the Unix epoch so they sort last.
pub fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    let Some(raw) = raw else {
        return DateTime::<Utc>::default();
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.with_timezone(&Utc);
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .unwrap_or_default()
}
