use std::rc::Rc;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::entities::dataset::DatasetId;
use crate::domain::entities::query::{EngineVerdict, ErrorKind, QueryId, QueryRecord};
use crate::usecase::ports::remote::{QueryOutcome, RemoteError, RemoteService, GENERIC_SERVER_MESSAGE};
use crate::usecase::services::in_flight::InFlight;

pub struct QueryService {
    remote: Rc<dyn RemoteService>,
    query_slot: InFlight,
}

impl QueryService {
    pub fn new(remote: Rc<dyn RemoteService>) -> Self {
        Self {
            remote,
            query_slot: InFlight::default(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.query_slot.is_busy()
    }

    /// Runs one query attempt and returns the record to append to history.
    ///
    /// `Err` only when another query is still running; that call is not an
    /// attempt and leaves no record behind. Every other outcome, including
    /// local validation failures, comes back as a record.
    pub async fn execute(
        &self,
        query_text: &str,
        dataset_id: Option<&DatasetId>,
    ) -> Result<QueryRecord, RemoteError> {
        let trimmed = query_text.trim();
        if trimmed.is_empty() {
            return Ok(QueryRecord::failed(
                query_text,
                dataset_id.cloned(),
                ErrorKind::Validation,
                "please enter a query",
            ));
        }
        let Some(dataset_id) = dataset_id else {
            return Ok(QueryRecord::failed(
                trimmed,
                None,
                ErrorKind::Validation,
                "please select a dataset first",
            ));
        };

        let _guard = self
            .query_slot
            .try_acquire()
            .ok_or_else(|| RemoteError::validation("a query is already running"))?;

        info!(dataset_id = %dataset_id, query = trimmed, "executing query");
        let record = match self.remote.execute_query(trimmed, dataset_id).await {
            Ok(outcome) => record_from_outcome(trimmed, dataset_id, outcome),
            Err(err) => {
                warn!(dataset_id = %dataset_id, error = %err, "query request failed");
                QueryRecord::failed(trimmed, Some(dataset_id.clone()), err.kind(), err.to_string())
            }
        };
        Ok(record)
    }

    pub async fn history(&self) -> Result<Vec<QueryRecord>, RemoteError> {
        self.remote.list_query_history().await
    }
}

fn record_from_outcome(query_text: &str, dataset_id: &DatasetId, outcome: QueryOutcome) -> QueryRecord {
    let verdict = EngineVerdict::judge(
        outcome.success,
        outcome.payload,
        outcome.error,
        GENERIC_SERVER_MESSAGE,
    );

    QueryRecord {
        id: QueryId::generate(),
        query_text: query_text.to_string(),
        dataset_id: Some(dataset_id.clone()),
        success: verdict.success,
        result: verdict.result,
        error: verdict.error,
        execution_time_seconds: outcome.execution_time_seconds,
        timestamp: Utc::now(),
    }
}
