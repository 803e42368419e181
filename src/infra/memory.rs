//! In-process backend used when the remote service is not configured. It
//! stores uploads in memory and profiles them locally, but cannot interpret
//! queries.

use std::cell::RefCell;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use crate::domain::entities::config::ServiceConfig;
use crate::domain::entities::dataset::{Dataset, DatasetId, FileType};
use crate::domain::entities::query::QueryRecord;
use crate::domain::entities::tutorial::ExampleCategory;
use crate::infra::import::{profile, read_table};
use crate::usecase::ports::remote::{
    QueryOutcome, RemoteError, RemoteService, ServiceHealth, UploadFile,
};

const PARSED_PROGRESS: u8 = 60;

#[derive(Default)]
pub struct MemoryRemoteService {
    config: ServiceConfig,
    datasets: RefCell<Vec<Dataset>>,
}

impl MemoryRemoteService {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            config,
            datasets: RefCell::new(Vec::new()),
        }
    }

    fn not_found() -> RemoteError {
        RemoteError::server(Some(404), Some("Dataset not found".to_string()))
    }
}

#[async_trait(?Send)]
impl RemoteService for MemoryRemoteService {
    async fn fetch_config(&self) -> Result<ServiceConfig, RemoteError> {
        Ok(self.config.clone())
    }

    async fn list_datasets(&self) -> Result<Vec<Dataset>, RemoteError> {
        Ok(self.datasets.borrow().clone())
    }

    async fn upload_dataset(
        &self,
        file: &UploadFile,
        on_progress: &dyn Fn(u8),
    ) -> Result<Dataset, RemoteError> {
        let ext = file.extension().unwrap_or_default().to_ascii_lowercase();
        let file_type = FileType::from_extension(&ext)
            .filter(|_| self.config.allows_extension(&ext))
            .ok_or_else(|| {
                RemoteError::server(Some(400), Some(format!("Unsupported file format: {ext}")))
            })?;

        let table = read_table(file_type, &file.bytes).map_err(|err| {
            RemoteError::server(Some(500), Some(format!("Error processing file: {err:#}")))
        })?;
        on_progress(PARSED_PROGRESS);

        let dataset = Dataset {
            id: DatasetId(uuid::Uuid::new_v4().to_string()),
            original_name: file.name.clone(),
            file_type,
            metadata: profile(&table, file.bytes.len() as u64),
            upload_time: Utc::now(),
        };
        info!(dataset_id = %dataset.id, rows = dataset.metadata.row_count, "stored dataset in memory");
        self.datasets.borrow_mut().push(dataset.clone());
        Ok(dataset)
    }

    async fn delete_dataset(&self, id: &DatasetId) -> Result<(), RemoteError> {
        let mut datasets = self.datasets.borrow_mut();
        let before = datasets.len();
        datasets.retain(|dataset| &dataset.id != id);
        if datasets.len() == before {
            return Err(Self::not_found());
        }
        Ok(())
    }

    async fn execute_query(
        &self,
        query_text: &str,
        dataset_id: &DatasetId,
    ) -> Result<QueryOutcome, RemoteError> {
        if !self.datasets.borrow().iter().any(|dataset| &dataset.id == dataset_id) {
            return Err(Self::not_found());
        }
        debug!(query = query_text, "offline backend cannot run queries");
        Err(RemoteError::server(
            Some(503),
            Some("The query engine is not available in offline mode".to_string()),
        ))
    }

    async fn list_query_history(&self) -> Result<Vec<QueryRecord>, RemoteError> {
        Ok(Vec::new())
    }

    async fn fetch_tutorial_examples(&self) -> Result<Vec<ExampleCategory>, RemoteError> {
        Ok(builtin_examples())
    }

    async fn health(&self) -> Result<ServiceHealth, RemoteError> {
        Ok(ServiceHealth {
            status: "healthy".to_string(),
            database: "fallback".to_string(),
        })
    }
}

fn builtin_examples() -> Vec<ExampleCategory> {
    let groups: [(&str, [&str; 4]); 4] = [
        (
            "Basic Queries",
            [
                "Show me all data",
                "Display first 10 rows",
                "Count total records",
                "Show column names",
            ],
        ),
        (
            "Filtering",
            [
                "Show records where age is greater than 25",
                "Filter data for New York city",
                "Find all products with price below 100",
                "Show data where status equals active",
            ],
        ),
        (
            "Aggregation",
            [
                "Calculate average sales by region",
                "Sum total revenue by month",
                "Count customers by category",
                "Find maximum price in each category",
            ],
        ),
        (
            "Visualization",
            [
                "Create bar chart of sales by region",
                "Show line chart of monthly trends",
                "Generate pie chart of category distribution",
                "Create scatter plot of price vs quantity",
            ],
        ),
    ];
    groups
        .into_iter()
        .map(|(category, queries)| ExampleCategory {
            category: category.to_string(),
            queries: queries.into_iter().map(str::to_string).collect(),
        })
        .collect()
}
