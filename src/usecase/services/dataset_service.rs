use std::cell::Cell;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::domain::entities::config::ServiceConfig;
use crate::domain::entities::dataset::{Dataset, DatasetId};
use crate::usecase::ports::remote::{RemoteError, RemoteService, UploadFile};
use crate::usecase::services::in_flight::InFlight;

/// Highest value a transport may report; 100 is reserved for confirmed success.
const TRANSPORT_PROGRESS_CEILING: u8 = 99;

pub struct DatasetService {
    remote: Rc<dyn RemoteService>,
    upload_slot: InFlight,
}

impl DatasetService {
    pub fn new(remote: Rc<dyn RemoteService>) -> Self {
        Self {
            remote,
            upload_slot: InFlight::default(),
        }
    }

    pub fn is_uploading(&self) -> bool {
        self.upload_slot.is_busy()
    }

    /// Uploads `file` after checking its extension against the configured
    /// allow-list. No size ceiling is enforced.
    pub async fn upload(
        &self,
        file: &UploadFile,
        config: &ServiceConfig,
        on_progress: &dyn Fn(u8),
    ) -> Result<Dataset, RemoteError> {
        validate_extension(file, config)?;
        let _guard = self
            .upload_slot
            .try_acquire()
            .ok_or_else(|| RemoteError::validation("another upload is already in progress"))?;

        info!(file = %file.name, bytes = file.bytes.len(), "uploading dataset");
        let progress = ProgressReporter::new(on_progress);
        progress.report(0);
        let dataset = self
            .remote
            .upload_dataset(file, &|value| progress.report(value))
            .await
            .inspect_err(|err| warn!(file = %file.name, error = %err, "dataset upload failed"))?;
        progress.finish();

        info!(dataset_id = %dataset.id, rows = dataset.metadata.row_count, "dataset uploaded");
        Ok(dataset)
    }

    /// Asks the remote to delete the dataset. Callers remove it locally only
    /// when this returns `Ok`.
    pub async fn delete(&self, dataset_id: &DatasetId) -> Result<(), RemoteError> {
        debug!(dataset_id = %dataset_id, "deleting dataset");
        self.remote
            .delete_dataset(dataset_id)
            .await
            .inspect_err(|err| warn!(dataset_id = %dataset_id, error = %err, "dataset delete failed"))
    }

    pub async fn list(&self) -> Result<Vec<Dataset>, RemoteError> {
        self.remote.list_datasets().await
    }
}

fn validate_extension(file: &UploadFile, config: &ServiceConfig) -> Result<(), RemoteError> {
    match file.extension() {
        Some(ext) if config.allows_extension(ext) => Ok(()),
        Some(ext) => Err(RemoteError::validation(format!(
            "unsupported file format: {}",
            ext.to_ascii_lowercase()
        ))),
        None => Err(RemoteError::validation(format!(
            "file has no extension: {}",
            file.name
        ))),
    }
}

/// Forwards progress values, dropping regressions and holding back 100 until
/// the upload is confirmed.
struct ProgressReporter<'a> {
    sink: &'a dyn Fn(u8),
    last: Cell<Option<u8>>,
}

impl<'a> ProgressReporter<'a> {
    fn new(sink: &'a dyn Fn(u8)) -> Self {
        Self {
            sink,
            last: Cell::new(None),
        }
    }

    fn report(&self, value: u8) {
        self.emit(value.min(TRANSPORT_PROGRESS_CEILING));
    }

    fn finish(&self) {
        self.emit(100);
    }

    fn emit(&self, value: u8) {
        if self.last.get().is_some_and(|last| value <= last) {
            return;
        }
        self.last.set(Some(value));
        (self.sink)(value);
    }
}
