use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::entities::dataset::{DatasetId, Row};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryId(pub String);

impl QueryId {
    pub fn generate() -> Self {
        QueryId(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result payload of a successful query, tagged but otherwise uninterpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryResult {
    Table {
        columns: Vec<String>,
        rows: Vec<Row>,
        total_row_count: u64,
    },
    Metric {
        value: Value,
        message: String,
    },
    Visualization {
        title: String,
        chart_type: String,
        payload: Value,
    },
    Raw {
        payload: Value,
    },
}

impl QueryResult {
    /// Tags an engine payload by its `type` field. Shapes that do not carry the
    /// fields of a known variant fall back to `Raw`.
    pub fn from_payload(payload: Value) -> QueryResult {
        match payload.get("type").and_then(Value::as_str) {
            Some("table") => table_from(&payload).unwrap_or(QueryResult::Raw { payload }),
            Some("metric") => match payload.get("value") {
                Some(value) => QueryResult::Metric {
                    value: value.clone(),
                    message: string_field(&payload, "message")
                        .or_else(|| string_field(&payload, "label"))
                        .unwrap_or_default(),
                },
                None => QueryResult::Raw { payload },
            },
            Some("visualization") => {
                let config = payload.get("config").cloned().unwrap_or(Value::Null);
                let title = config
                    .get("title")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or_else(|| string_field(&payload, "message"))
                    .unwrap_or_default();
                QueryResult::Visualization {
                    title,
                    chart_type: string_field(&payload, "chart_type")
                        .unwrap_or_else(|| "unknown".to_string()),
                    payload: config,
                }
            }
            _ => QueryResult::Raw { payload },
        }
    }
}

fn string_field(payload: &Value, key: &str) -> Option<String> {
    payload.get(key).and_then(Value::as_str).map(str::to_string)
}

fn table_from(payload: &Value) -> Option<QueryResult> {
    let columns = payload
        .get("columns")?
        .as_array()?
        .iter()
        .map(|column| column.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()?;
    let rows = payload
        .get("data")?
        .as_array()?
        .iter()
        .map(|row| row.as_object().cloned())
        .collect::<Option<Vec<_>>>()?;
    let total_row_count = payload
        .get("total_rows")
        .and_then(Value::as_u64)
        .unwrap_or(rows.len() as u64);
    Some(QueryResult::Table {
        columns,
        rows,
        total_row_count,
    })
}

/// How one engine reply lands in history. The engine reports interpretation
/// failures (unknown query, missing column) inside a successful response as a
/// `{"type": "error", "message": ...}` payload; those count as failed attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineVerdict {
    pub success: bool,
    pub result: Option<QueryResult>,
    pub error: Option<QueryError>,
}

impl EngineVerdict {
    pub fn judge(
        success: bool,
        payload: Option<Value>,
        error: Option<String>,
        fallback_message: &str,
    ) -> Self {
        let payload_error = payload
            .as_ref()
            .filter(|_| success)
            .filter(|payload| payload.get("type").and_then(Value::as_str) == Some("error"))
            .map(|payload| string_field(payload, "message"));

        if success && payload_error.is_none() {
            return EngineVerdict {
                success: true,
                result: payload.map(QueryResult::from_payload),
                error: None,
            };
        }

        let message = payload_error
            .unwrap_or(error)
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| fallback_message.to_string());
        EngineVerdict {
            success: false,
            result: None,
            error: Some(QueryError {
                kind: ErrorKind::Server,
                message,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Network,
    Server,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryError {
    pub kind: ErrorKind,
    pub message: String,
}

/// One natural-language query attempt. Never edited after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: QueryId,
    pub query_text: String,
    /// Snapshot of the target dataset; may outlive the dataset itself.
    pub dataset_id: Option<DatasetId>,
    pub success: bool,
    pub result: Option<QueryResult>,
    pub error: Option<QueryError>,
    pub execution_time_seconds: f64,
    pub timestamp: DateTime<Utc>,
}

impl QueryRecord {
    pub fn failed(
        query_text: &str,
        dataset_id: Option<DatasetId>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: QueryId::generate(),
            query_text: query_text.to_string(),
            dataset_id,
            success: false,
            result: None,
            error: Some(QueryError {
                kind,
                message: message.into(),
            }),
            execution_time_seconds: 0.0,
            timestamp: Utc::now(),
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|error| error.message.as_str())
    }
}
