use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::entities::config::ServiceConfig;
use crate::domain::entities::dataset::{Dataset, DatasetId};
use crate::domain::entities::query::{ErrorKind, QueryRecord};
use crate::domain::entities::tutorial::ExampleCategory;

pub const GENERIC_SERVER_MESSAGE: &str = "the server could not complete the request";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Detected locally before anything was sent.
    #[error("{0}")]
    Validation(String),

    /// The request never reached the server or no response came back.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a failure status.
    #[error("{}", .detail.as_deref().unwrap_or(GENERIC_SERVER_MESSAGE))]
    Server {
        status: Option<u16>,
        detail: Option<String>,
    },
}

impl RemoteError {
    pub fn validation(message: impl Into<String>) -> Self {
        RemoteError::Validation(message.into())
    }

    pub fn server(status: Option<u16>, detail: Option<String>) -> Self {
        RemoteError::Server {
            status,
            detail: detail.filter(|detail| !detail.trim().is_empty()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RemoteError::Validation(_) => ErrorKind::Validation,
            RemoteError::Network(_) => ErrorKind::Network,
            RemoteError::Server { .. } => ErrorKind::Server,
        }
    }
}

/// A file picked by the user, fully read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Text after the last dot, if any.
    pub fn extension(&self) -> Option<&str> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext)
    }
}

/// Raw engine answer for one query; tagging and record building happen in the
/// query service.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub success: bool,
    pub payload: Option<serde_json::Value>,
    pub error: Option<String>,
    pub execution_time_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub status: String,
    #[serde(default)]
    pub database: String,
}

/// Everything the session core needs from the remote service.
#[async_trait(?Send)]
pub trait RemoteService {
    async fn fetch_config(&self) -> Result<ServiceConfig, RemoteError>;
    async fn list_datasets(&self) -> Result<Vec<Dataset>, RemoteError>;
    async fn upload_dataset(
        &self,
        file: &UploadFile,
        on_progress: &dyn Fn(u8),
    ) -> Result<Dataset, RemoteError>;
    async fn delete_dataset(&self, id: &DatasetId) -> Result<(), RemoteError>;
    async fn execute_query(
        &self,
        query_text: &str,
        dataset_id: &DatasetId,
    ) -> Result<QueryOutcome, RemoteError>;
    async fn list_query_history(&self) -> Result<Vec<QueryRecord>, RemoteError>;
    async fn fetch_tutorial_examples(&self) -> Result<Vec<ExampleCategory>, RemoteError>;
    async fn health(&self) -> Result<ServiceHealth, RemoteError>;
}
