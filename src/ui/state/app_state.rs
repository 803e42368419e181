use std::cell::{Ref, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::entities::config::ServiceConfig;
use crate::domain::entities::dataset::{Dataset, DatasetId};
use crate::domain::entities::query::{QueryId, QueryRecord};
use crate::domain::entities::tutorial::{ExampleCategory, LessonId, LevelId, TutorialCatalog};
use crate::usecase::ports::remote::{RemoteError, RemoteService, ServiceHealth, UploadFile};
use crate::usecase::services::dataset_service::DatasetService;
use crate::usecase::services::in_flight::InFlight;
use crate::usecase::services::query_service::QueryService;
use crate::usecase::services::tutorial_service::{TutorialError, TutorialService};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurrentView {
    #[default]
    Dashboard,
    Upload,
    Query,
    History,
    Tutorial,
    Datasets,
}

impl CurrentView {
    pub const ALL: [CurrentView; 6] = [
        CurrentView::Dashboard,
        CurrentView::Upload,
        CurrentView::Query,
        CurrentView::History,
        CurrentView::Tutorial,
        CurrentView::Datasets,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CurrentView::Dashboard => "Dashboard",
            CurrentView::Upload => "Upload",
            CurrentView::Query => "Query",
            CurrentView::History => "History",
            CurrentView::Tutorial => "Tutorial",
            CurrentView::Datasets => "Datasets",
        }
    }
}

/// Notices kept on screen at once.
pub const MAX_NOTICES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("dataset {0} is not loaded")]
    UnknownDataset(DatasetId),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Tutorial(#[from] TutorialError),
}

/// Everything the view layer renders. Only `SessionStore` mutates it.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Most recent first.
    pub datasets: Vec<Dataset>,
    pub selected_dataset_id: Option<DatasetId>,
    /// Most recent first.
    pub history: Vec<QueryRecord>,
    pub selected_history: BTreeSet<QueryId>,
    pub tutorial: TutorialService,
    pub examples: Vec<ExampleCategory>,
    pub config: ServiceConfig,
    pub current_view: CurrentView,
    pub onboarding: bool,
    pub ready: bool,
    pub upload_progress: Option<u8>,
    pub health: Option<ServiceHealth>,
    pub notices: Vec<Notice>,
}

impl SessionState {
    fn new(catalog: TutorialCatalog) -> Self {
        Self {
            datasets: Vec::new(),
            selected_dataset_id: None,
            history: Vec::new(),
            selected_history: BTreeSet::new(),
            tutorial: TutorialService::new(catalog),
            examples: Vec::new(),
            config: ServiceConfig::default(),
            current_view: CurrentView::default(),
            onboarding: false,
            ready: false,
            upload_progress: None,
            health: None,
            notices: Vec::new(),
        }
    }

    pub fn selected_dataset(&self) -> Option<&Dataset> {
        let id = self.selected_dataset_id.as_ref()?;
        self.datasets.iter().find(|dataset| &dataset.id == id)
    }

    pub fn dataset(&self, id: &DatasetId) -> Option<&Dataset> {
        self.datasets.iter().find(|dataset| &dataset.id == id)
    }

    /// Appends a notice, dropping the oldest ones beyond `MAX_NOTICES`.
    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice {
            level,
            message: message.into(),
        });
        let overflow = self.notices.len().saturating_sub(MAX_NOTICES);
        self.notices.drain(..overflow);
    }

    fn prepend_dataset(&mut self, dataset: Dataset) {
        self.datasets.retain(|existing| existing.id != dataset.id);
        if self.selected_dataset_id.is_none() {
            self.selected_dataset_id = Some(dataset.id.clone());
        }
        self.datasets.insert(0, dataset);
    }

    fn drop_dataset(&mut self, id: &DatasetId) {
        self.datasets.retain(|dataset| &dataset.id != id);
        if self.selected_dataset_id.as_ref() == Some(id) {
            self.selected_dataset_id = None;
        }
    }

    fn replace_datasets(&mut self, mut datasets: Vec<Dataset>) {
        sort_newest_first(&mut datasets, |dataset| dataset.upload_time);
        let selection_survives = self
            .selected_dataset_id
            .as_ref()
            .is_some_and(|id| datasets.iter().any(|dataset| &dataset.id == id));
        if !selection_survives {
            self.selected_dataset_id = None;
        }
        self.datasets = datasets;
    }
}

fn sort_newest_first<T, K: Ord>(items: &mut [T], key: impl Fn(&T) -> K) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

type Listener = Box<dyn Fn()>;

/// Owner of the session aggregate. All remote traffic goes through the
/// services; state is only touched between awaits, never across one.
pub struct SessionStore {
    state: RefCell<SessionState>,
    remote: Rc<dyn RemoteService>,
    datasets: DatasetService,
    queries: QueryService,
    init_slot: InFlight,
    listeners: RefCell<Vec<Listener>>,
}

impl SessionStore {
    pub fn new(remote: Rc<dyn RemoteService>) -> Self {
        Self::with_catalog(remote, TutorialCatalog::builtin())
    }

    pub fn with_catalog(remote: Rc<dyn RemoteService>, catalog: TutorialCatalog) -> Self {
        Self {
            state: RefCell::new(SessionState::new(catalog)),
            datasets: DatasetService::new(remote.clone()),
            queries: QueryService::new(remote.clone()),
            init_slot: InFlight::default(),
            remote,
            listeners: RefCell::new(Vec::new()),
        }
    }

    pub fn state(&self) -> Ref<'_, SessionState> {
        self.state.borrow()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn is_uploading(&self) -> bool {
        self.datasets.is_uploading()
    }

    pub fn is_querying(&self) -> bool {
        self.queries.is_running()
    }

    /// Registers a callback run after every state change.
    pub fn subscribe(&self, listener: impl Fn() + 'static) {
        self.listeners.borrow_mut().push(Box::new(listener));
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let out = f(&mut self.state.borrow_mut());
        for listener in self.listeners.borrow().iter() {
            listener();
        }
        out
    }

    /// Loads config, datasets and history concurrently. Each fetch falls back
    /// on its own; none of them can keep the others from landing.
    pub async fn initialize(&self) {
        if self.state.borrow().ready {
            debug!("session already initialized");
            return;
        }
        let Some(_initializing) = self.init_slot.try_acquire() else {
            debug!("session initialization already running");
            return;
        };
        info!("initializing session");

        let (config, datasets, history) = futures::join!(
            self.remote.fetch_config(),
            self.datasets.list(),
            self.queries.history(),
        );

        self.mutate(|state| {
            state.config = match config {
                Ok(config) => config,
                Err(err) => {
                    warn!(error = %err, "config fetch failed, using defaults");
                    state.notify(
                        NoticeLevel::Warning,
                        format!("Could not load server configuration ({err}); using defaults."),
                    );
                    ServiceConfig::default()
                }
            };

            let mut datasets = match datasets {
                Ok(datasets) => datasets,
                Err(err) => {
                    warn!(error = %err, "dataset list fetch failed");
                    state.notify(NoticeLevel::Warning, format!("Could not load datasets ({err})."));
                    Vec::new()
                }
            };
            sort_newest_first(&mut datasets, |dataset| dataset.upload_time);

            let mut history = match history {
                Ok(history) => history,
                Err(err) => {
                    warn!(error = %err, "query history fetch failed");
                    state.notify(
                        NoticeLevel::Warning,
                        format!("Could not load query history ({err})."),
                    );
                    Vec::new()
                }
            };
            sort_newest_first(&mut history, |record| record.timestamp);

            state.onboarding = datasets.is_empty() && history.is_empty();
            state.selected_dataset_id = datasets.first().map(|dataset| dataset.id.clone());
            state.datasets = datasets;
            state.history = history;
            state.ready = true;
            info!(
                datasets = state.datasets.len(),
                queries = state.history.len(),
                onboarding = state.onboarding,
                "session ready"
            );
        });
    }

    pub fn select_dataset(&self, id: &DatasetId) -> Result<(), SessionError> {
        if self.state.borrow().dataset(id).is_none() {
            return Err(SessionError::UnknownDataset(id.clone()));
        }
        self.mutate(|state| state.selected_dataset_id = Some(id.clone()));
        Ok(())
    }

    /// Prepends the dataset and selects it when nothing is selected yet.
    pub fn add_dataset(&self, dataset: Dataset) {
        self.mutate(|state| state.prepend_dataset(dataset));
    }

    /// Removes the dataset only after the remote confirms the delete.
    pub async fn remove_dataset(&self, id: &DatasetId) -> Result<(), SessionError> {
        if self.state.borrow().dataset(id).is_none() {
            return Err(SessionError::UnknownDataset(id.clone()));
        }
        match self.datasets.delete(id).await {
            Ok(()) => {
                self.mutate(|state| {
                    state.drop_dataset(id);
                    state.notify(NoticeLevel::Info, "Dataset deleted.");
                });
                Ok(())
            }
            Err(err) => {
                self.mutate(|state| {
                    state.notify(
                        NoticeLevel::Error,
                        format!("Could not delete dataset: {err}"),
                    )
                });
                Err(err.into())
            }
        }
    }

    pub fn record_query_result(&self, record: QueryRecord) {
        self.mutate(|state| state.history.insert(0, record));
    }

    /// Replaces the cached config; later uploads use the new allow-list.
    pub fn update_config(&self, config: ServiceConfig) {
        self.mutate(|state| state.config = config);
    }

    pub fn set_view(&self, view: CurrentView) {
        self.mutate(|state| state.current_view = view);
    }

    pub fn dismiss_onboarding(&self) {
        self.mutate(|state| state.onboarding = false);
    }

    pub fn dismiss_notice(&self, index: usize) {
        self.mutate(|state| {
            if index < state.notices.len() {
                state.notices.remove(index);
            }
        });
    }

    pub async fn upload_dataset(&self, file: UploadFile) -> Result<DatasetId, SessionError> {
        let config = self.state.borrow().config.clone();
        let on_progress = |value: u8| self.mutate(|state| state.upload_progress = Some(value));

        match self.datasets.upload(&file, &config, &on_progress).await {
            Ok(dataset) => {
                let id = dataset.id.clone();
                let name = dataset.original_name.clone();
                self.mutate(|state| {
                    state.upload_progress = None;
                    state.prepend_dataset(dataset);
                    state.notify(NoticeLevel::Info, format!("Uploaded {name}."));
                });
                Ok(id)
            }
            Err(err) => {
                self.mutate(|state| {
                    if !self.datasets.is_uploading() {
                        state.upload_progress = None;
                    }
                    state.notify(NoticeLevel::Error, format!("Upload failed: {err}"));
                });
                Err(err.into())
            }
        }
    }

    /// Runs `query_text` against the selected dataset and records the attempt.
    pub async fn execute_query(&self, query_text: &str) -> Result<QueryRecord, SessionError> {
        let dataset_id = self.state.borrow().selected_dataset_id.clone();
        match self.queries.execute(query_text, dataset_id.as_ref()).await {
            Ok(record) => {
                self.record_query_result(record.clone());
                Ok(record)
            }
            Err(err) => {
                self.mutate(|state| state.notify(NoticeLevel::Warning, err.to_string()));
                Err(err.into())
            }
        }
    }

    /// Replaces the dataset list wholesale. On failure the prior list stays.
    pub async fn refresh_datasets(&self) -> Result<(), SessionError> {
        match self.datasets.list().await {
            Ok(datasets) => {
                self.mutate(|state| state.replace_datasets(datasets));
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "dataset refresh failed");
                self.mutate(|state| {
                    state.notify(
                        NoticeLevel::Warning,
                        format!("Could not refresh datasets ({err})."),
                    )
                });
                Err(err.into())
            }
        }
    }

    pub async fn load_tutorial_examples(&self) {
        let examples = self.remote.fetch_tutorial_examples().await;
        self.mutate(|state| match examples {
            Ok(examples) => state.examples = examples,
            Err(err) => {
                warn!(error = %err, "tutorial examples fetch failed");
                state.examples = Vec::new();
                state.notify(
                    NoticeLevel::Warning,
                    format!("Could not load query examples ({err})."),
                );
            }
        });
    }

    pub async fn check_health(&self) -> Result<ServiceHealth, SessionError> {
        let health = self.remote.health().await;
        self.mutate(|state| match &health {
            Ok(health) => state.health = Some(health.clone()),
            Err(err) => {
                state.health = None;
                state.notify(
                    NoticeLevel::Warning,
                    format!("Remote service unreachable ({err})."),
                );
            }
        });
        Ok(health?)
    }

    pub fn complete_current_lesson(&self) {
        self.mutate(|state| state.tutorial.complete_current_lesson());
    }

    pub fn select_lesson(&self, level: LevelId, lesson: LessonId) -> Result<(), SessionError> {
        self.mutate(|state| state.tutorial.select_lesson(level, lesson))?;
        Ok(())
    }

    pub fn toggle_history_selection(&self, id: &QueryId) {
        self.mutate(|state| {
            if !state.selected_history.remove(id) {
                state.selected_history.insert(id.clone());
            }
        });
    }

    pub fn clear_history_selection(&self) {
        self.mutate(|state| state.selected_history.clear());
    }
}
