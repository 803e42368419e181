use std::cell::{Cell, RefCell};
use std::rc::Rc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::domain::entities::config::ServiceConfig;
use crate::domain::entities::dataset::{Dataset, DatasetId, DatasetMetadata, FileType};
use crate::domain::entities::query::{ErrorKind, QueryRecord, QueryResult};
use crate::domain::entities::tutorial::{
    ExampleCategory, Lesson, LessonId, Level, LevelId, TutorialCatalog,
};
use crate::ui::state::app_state::{NoticeLevel, SessionError, SessionStore, MAX_NOTICES};
use crate::usecase::ports::remote::{
    QueryOutcome, RemoteError, RemoteService, ServiceHealth, UploadFile,
};

fn dataset(id: &str, name: &str, day: u32) -> Dataset {
    Dataset {
        id: DatasetId::from(id),
        original_name: name.to_string(),
        file_type: FileType::Csv,
        metadata: DatasetMetadata {
            row_count: 3,
            column_count: 2,
            column_names: vec!["name".to_string(), "age".to_string()],
            ..DatasetMetadata::default()
        },
        upload_time: Utc
            .with_ymd_and_hms(2024, 1, day, 9, 0, 0)
            .single()
            .expect("valid timestamp"),
    }
}

fn network_down() -> RemoteError {
    RemoteError::Network("connection refused".to_string())
}

/// Scripted remote: every answer is configured up front and every call is
/// counted. Uploads and queries yield once so concurrent callers interleave.
/// With `config_waits_for_lists`, the config fetch only answers once both
/// list fetches have started, and fails if they never do.
struct FakeRemote {
    config: RefCell<Result<ServiceConfig, RemoteError>>,
    datasets: RefCell<Result<Vec<Dataset>, RemoteError>>,
    history: RefCell<Result<Vec<QueryRecord>, RemoteError>>,
    delete_result: RefCell<Result<(), RemoteError>>,
    query_result: RefCell<Result<QueryOutcome, RemoteError>>,
    transport_progress: Vec<u8>,
    config_waits_for_lists: bool,
    list_fetches: Cell<usize>,
    upload_calls: Cell<usize>,
    delete_calls: Cell<usize>,
    query_calls: Cell<usize>,
}

impl Default for FakeRemote {
    fn default() -> Self {
        Self {
            config: RefCell::new(Ok(ServiceConfig::default())),
            datasets: RefCell::new(Ok(Vec::new())),
            history: RefCell::new(Ok(Vec::new())),
            delete_result: RefCell::new(Ok(())),
            query_result: RefCell::new(Ok(QueryOutcome {
                success: true,
                payload: Some(json!({
                    "type": "table",
                    "columns": ["name"],
                    "data": [{"name": "Alice"}],
                    "total_rows": 1
                })),
                error: None,
                execution_time_seconds: 0.12,
            })),
            transport_progress: vec![35, 20, 120],
            config_waits_for_lists: false,
            list_fetches: Cell::new(0),
            upload_calls: Cell::new(0),
            delete_calls: Cell::new(0),
            query_calls: Cell::new(0),
        }
    }
}

impl FakeRemote {
    fn with_datasets(datasets: Vec<Dataset>) -> Self {
        Self {
            datasets: RefCell::new(Ok(datasets)),
            ..Self::default()
        }
    }
}

#[async_trait(?Send)]
impl RemoteService for FakeRemote {
    async fn fetch_config(&self) -> Result<ServiceConfig, RemoteError> {
        if self.config_waits_for_lists {
            for _ in 0..16 {
                if self.list_fetches.get() >= 2 {
                    break;
                }
                tokio::task::yield_now().await;
            }
            if self.list_fetches.get() < 2 {
                return Err(RemoteError::server(
                    Some(500),
                    Some("list fetches never started".to_string()),
                ));
            }
        }
        self.config.borrow().clone()
    }

    async fn list_datasets(&self) -> Result<Vec<Dataset>, RemoteError> {
        self.list_fetches.set(self.list_fetches.get() + 1);
        self.datasets.borrow().clone()
    }

    async fn upload_dataset(
        &self,
        file: &UploadFile,
        on_progress: &dyn Fn(u8),
    ) -> Result<Dataset, RemoteError> {
        let call = self.upload_calls.get() + 1;
        self.upload_calls.set(call);
        for value in &self.transport_progress {
            on_progress(*value);
        }
        tokio::task::yield_now().await;
        Ok(dataset(&format!("uploaded-{call}"), &file.name, 20))
    }

    async fn delete_dataset(&self, _id: &DatasetId) -> Result<(), RemoteError> {
        self.delete_calls.set(self.delete_calls.get() + 1);
        self.delete_result.borrow().clone()
    }

    async fn execute_query(
        &self,
        _query_text: &str,
        _dataset_id: &DatasetId,
    ) -> Result<QueryOutcome, RemoteError> {
        self.query_calls.set(self.query_calls.get() + 1);
        tokio::task::yield_now().await;
        self.query_result.borrow().clone()
    }

    async fn list_query_history(&self) -> Result<Vec<QueryRecord>, RemoteError> {
        self.list_fetches.set(self.list_fetches.get() + 1);
        self.history.borrow().clone()
    }

    async fn fetch_tutorial_examples(&self) -> Result<Vec<ExampleCategory>, RemoteError> {
        Ok(vec![ExampleCategory {
            category: "Basic Queries".to_string(),
            queries: vec!["Show me all data".to_string()],
        }])
    }

    async fn health(&self) -> Result<ServiceHealth, RemoteError> {
        Err(network_down())
    }
}

async fn ready_store(remote: FakeRemote) -> (Rc<FakeRemote>, SessionStore) {
    let remote = Rc::new(remote);
    let store = SessionStore::new(remote.clone());
    store.initialize().await;
    (remote, store)
}

#[tokio::test]
async fn config_failure_falls_back_to_defaults_and_starts_onboarding() {
    let remote = FakeRemote {
        config: RefCell::new(Err(network_down())),
        ..FakeRemote::default()
    };

    let (_, store) = ready_store(remote).await;

    let state = store.state();
    assert!(state.ready, "session should be ready after a partial failure");
    assert_eq!(state.config, ServiceConfig::default());
    assert!(state.datasets.is_empty());
    assert!(state.history.is_empty());
    assert!(state.onboarding, "empty session should show onboarding");
    assert_eq!(state.notices.len(), 1);
    assert_eq!(state.notices[0].level, NoticeLevel::Warning);
}

#[tokio::test]
async fn every_fetch_failing_still_reaches_ready() {
    let remote = FakeRemote {
        config: RefCell::new(Err(network_down())),
        datasets: RefCell::new(Err(RemoteError::server(Some(500), None))),
        history: RefCell::new(Err(network_down())),
        ..FakeRemote::default()
    };

    let (_, store) = ready_store(remote).await;

    let state = store.state();
    assert!(state.ready);
    assert_eq!(state.notices.len(), 3, "each failed fetch should leave a notice");
    assert_eq!(state.selected_dataset_id, None);
}

#[tokio::test]
async fn initialize_sorts_newest_first_and_selects_latest() {
    let remote = FakeRemote::with_datasets(vec![
        dataset("old", "old.csv", 1),
        dataset("new", "new.csv", 9),
        dataset("mid", "mid.csv", 5),
    ]);

    let (_, store) = ready_store(remote).await;

    let state = store.state();
    let ids: Vec<&str> = state.datasets.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["new", "mid", "old"]);
    assert_eq!(state.selected_dataset_id, Some(DatasetId::from("new")));
    assert!(!state.onboarding);
}

#[tokio::test]
async fn initialize_runs_once() {
    let remote = FakeRemote::with_datasets(vec![dataset("a", "a.csv", 1)]);
    let (remote, store) = ready_store(remote).await;
    store
        .select_dataset(&DatasetId::from("a"))
        .expect("loaded dataset should be selectable");
    *remote.datasets.borrow_mut() = Ok(Vec::new());

    store.initialize().await;

    assert_eq!(store.state().datasets.len(), 1, "second initialize should be a no-op");
}

fn versioned_config(version: &str) -> ServiceConfig {
    ServiceConfig {
        version: version.to_string(),
        ..ServiceConfig::default()
    }
}

#[tokio::test]
async fn initialize_fetches_config_and_lists_concurrently() {
    let remote = FakeRemote {
        config: RefCell::new(Ok(versioned_config("2.1.0"))),
        config_waits_for_lists: true,
        ..FakeRemote::with_datasets(vec![dataset("a", "a.csv", 1)])
    };

    let (remote, store) = ready_store(remote).await;

    let state = store.state();
    assert!(state.ready);
    assert_eq!(remote.list_fetches.get(), 2);
    assert_eq!(
        state.config.version, "2.1.0",
        "config should load while the list fetches are in flight"
    );
    assert!(state.notices.is_empty(), "no fetch should have failed: {:?}", state.notices);
    assert_eq!(state.datasets.len(), 1);
}

#[tokio::test]
async fn overlapping_initialize_fetches_once() {
    let remote = Rc::new(FakeRemote {
        config: RefCell::new(Ok(versioned_config("2.1.0"))),
        config_waits_for_lists: true,
        ..FakeRemote::default()
    });
    let store = SessionStore::new(remote.clone());

    futures::join!(store.initialize(), store.initialize());

    let state = store.state();
    assert!(state.ready);
    assert_eq!(remote.list_fetches.get(), 2, "second initialize should not fetch again");
    assert!(state.onboarding);
    assert!(state.notices.is_empty());
}

#[tokio::test]
async fn notices_are_capped_to_the_most_recent() {
    let remote = FakeRemote::with_datasets(vec![dataset("a", "a.csv", 1)]);
    let (remote, store) = ready_store(remote).await;
    *remote.datasets.borrow_mut() = Err(network_down());

    for _ in 0..MAX_NOTICES + 2 {
        let _ = store.refresh_datasets().await;
    }
    store
        .upload_dataset(UploadFile::new("fresh.csv", Vec::new()))
        .await
        .expect("upload should succeed");

    let state = store.state();
    assert_eq!(state.notices.len(), MAX_NOTICES);
    assert_eq!(
        state.notices.last().map(|n| n.message.as_str()),
        Some("Uploaded fresh.csv.")
    );
}

#[tokio::test]
async fn allowed_upload_is_prepended_and_selected() {
    let remote = FakeRemote {
        config: RefCell::new(Ok(ServiceConfig {
            supported_formats: vec!["csv".to_string(), "json".to_string()],
            ..ServiceConfig::default()
        })),
        ..FakeRemote::default()
    };
    let (remote, store) = ready_store(remote).await;

    let id = store
        .upload_dataset(UploadFile::new("data.csv", b"a,b\n1,2\n".to_vec()))
        .await
        .expect("csv upload should succeed");

    let state = store.state();
    assert_eq!(remote.upload_calls.get(), 1);
    assert_eq!(state.datasets[0].id, id);
    assert_eq!(state.datasets[0].original_name, "data.csv");
    assert_eq!(state.selected_dataset_id, Some(id));
    assert_eq!(state.upload_progress, None, "progress should reset after success");
    assert_eq!(state.notices.last().map(|n| n.level), Some(NoticeLevel::Info));
}

#[tokio::test]
async fn upload_keeps_existing_selection() {
    let remote = FakeRemote::with_datasets(vec![dataset("first", "first.csv", 1)]);
    let (_, store) = ready_store(remote).await;

    store
        .upload_dataset(UploadFile::new("second.json", b"[]".to_vec()))
        .await
        .expect("upload should succeed");

    let state = store.state();
    assert_eq!(state.datasets.len(), 2);
    assert_eq!(state.datasets[0].original_name, "second.json");
    assert_eq!(state.selected_dataset_id, Some(DatasetId::from("first")));
}

#[tokio::test]
async fn disallowed_extension_is_rejected_without_network() {
    let remote = FakeRemote {
        config: RefCell::new(Ok(ServiceConfig {
            supported_formats: vec!["csv".to_string(), "json".to_string()],
            ..ServiceConfig::default()
        })),
        ..FakeRemote::with_datasets(vec![dataset("kept", "kept.csv", 1)])
    };
    let (remote, store) = ready_store(remote).await;
    let before = store.state().datasets.clone();

    let err = store
        .upload_dataset(UploadFile::new("data.txt", b"hello".to_vec()))
        .await
        .expect_err("txt should be rejected");

    assert!(
        matches!(err, SessionError::Remote(RemoteError::Validation(_))),
        "expected validation error, got {err:?}"
    );
    assert_eq!(remote.upload_calls.get(), 0, "no request should be sent");
    assert_eq!(store.state().datasets, before);
    assert_eq!(store.state().upload_progress, None);
}

#[tokio::test]
async fn upload_progress_is_monotonic_and_ends_at_100() {
    let remote = Rc::new(FakeRemote::default());
    let store = Rc::new(SessionStore::new(remote.clone()));
    store.initialize().await;

    let seen = Rc::new(RefCell::new(Vec::new()));
    {
        let seen = seen.clone();
        let observed = store.clone();
        store.subscribe(move || {
            if let Some(value) = observed.state().upload_progress {
                let mut seen = seen.borrow_mut();
                if seen.last() != Some(&value) {
                    seen.push(value);
                }
            }
        });
    }

    store
        .upload_dataset(UploadFile::new("data.csv", Vec::new()))
        .await
        .expect("upload should succeed");

    assert_eq!(*seen.borrow(), vec![0, 35, 99, 100]);
}

#[tokio::test]
async fn second_upload_is_rejected_while_first_runs() {
    let (remote, store) = ready_store(FakeRemote::default()).await;

    let (first, second) = futures::join!(
        store.upload_dataset(UploadFile::new("a.csv", Vec::new())),
        store.upload_dataset(UploadFile::new("b.csv", Vec::new())),
    );

    first.expect("first upload should succeed");
    let err = second.expect_err("second upload should be rejected");
    assert!(matches!(err, SessionError::Remote(RemoteError::Validation(_))));
    assert_eq!(remote.upload_calls.get(), 1);
    assert_eq!(store.state().datasets.len(), 1);
    assert!(!store.is_uploading());
}

#[tokio::test]
async fn query_without_dataset_is_recorded_as_validation_failure() {
    let (remote, store) = ready_store(FakeRemote::default()).await;

    let record = store
        .execute_query("Show me all data")
        .await
        .expect("validation failures are still records");

    assert!(!record.success);
    assert_eq!(record.error.as_ref().map(|e| e.kind), Some(ErrorKind::Validation));
    assert_eq!(remote.query_calls.get(), 0, "no request should be sent");
    assert_eq!(store.state().history[0], record);
}

#[tokio::test]
async fn blank_query_is_recorded_without_network() {
    let remote = FakeRemote::with_datasets(vec![dataset("a", "a.csv", 1)]);
    let (remote, store) = ready_store(remote).await;

    let record = store.execute_query("   ").await.expect("record expected");

    assert_eq!(record.error_message(), Some("please enter a query"));
    assert_eq!(remote.query_calls.get(), 0);
    assert_eq!(store.state().history.len(), 1);
}

#[tokio::test]
async fn successful_query_is_tagged_and_prepended() {
    let remote = FakeRemote::with_datasets(vec![dataset("a", "a.csv", 1)]);
    let (_, store) = ready_store(remote).await;

    let first = store.execute_query("Show me all data").await.expect("record");
    let second = store.execute_query("Count total records").await.expect("record");

    assert!(first.success);
    assert!(matches!(
        first.result,
        Some(QueryResult::Table { total_row_count: 1, .. })
    ));
    assert_eq!(first.dataset_id, Some(DatasetId::from("a")));
    let state = store.state();
    let history: Vec<&str> = state
        .history
        .iter()
        .map(|record| record.query_text.as_str())
        .collect();
    assert_eq!(history, vec![second.query_text.as_str(), "Show me all data"]);
}

#[tokio::test]
async fn server_error_detail_is_kept_verbatim() {
    let remote = FakeRemote {
        query_result: RefCell::new(Err(RemoteError::server(
            Some(404),
            Some("Dataset not found".to_string()),
        ))),
        ..FakeRemote::with_datasets(vec![dataset("a", "a.csv", 1)])
    };
    let (_, store) = ready_store(remote).await;

    let record = store.execute_query("Show me all data").await.expect("record");

    assert!(!record.success);
    assert_eq!(record.error_message(), Some("Dataset not found"));
    assert_eq!(record.error.as_ref().map(|e| e.kind), Some(ErrorKind::Server));
}

#[tokio::test]
async fn overlapping_query_is_rejected_and_not_recorded() {
    let remote = FakeRemote::with_datasets(vec![dataset("a", "a.csv", 1)]);
    let (remote, store) = ready_store(remote).await;

    let (first, second) = futures::join!(
        store.execute_query("Show me all data"),
        store.execute_query("Count total records"),
    );

    first.expect("first query should run");
    second.expect_err("second query should be rejected while the first runs");
    assert_eq!(remote.query_calls.get(), 1);
    assert_eq!(store.state().history.len(), 1);
    assert_eq!(
        store.state().notices.last().map(|n| n.level),
        Some(NoticeLevel::Warning)
    );
    assert!(!store.is_querying());
}

#[tokio::test]
async fn deleting_selected_dataset_clears_selection_and_keeps_history() {
    let remote = FakeRemote::with_datasets(vec![dataset("a", "a.csv", 1)]);
    let (remote, store) = ready_store(remote).await;
    let record = store.execute_query("Show me all data").await.expect("record");

    store
        .remove_dataset(&DatasetId::from("a"))
        .await
        .expect("delete should succeed");

    let state = store.state();
    assert_eq!(remote.delete_calls.get(), 1);
    assert!(state.datasets.is_empty());
    assert_eq!(state.selected_dataset_id, None);
    assert_eq!(state.history, vec![record], "history should be untouched");
    assert_eq!(state.history[0].dataset_id, Some(DatasetId::from("a")));
}

#[tokio::test]
async fn failed_delete_leaves_state_unchanged() {
    let remote = FakeRemote {
        delete_result: RefCell::new(Err(RemoteError::server(
            Some(404),
            Some("Dataset not found".to_string()),
        ))),
        ..FakeRemote::with_datasets(vec![dataset("a", "a.csv", 1)])
    };
    let (_, store) = ready_store(remote).await;

    let err = store
        .remove_dataset(&DatasetId::from("a"))
        .await
        .expect_err("delete should fail");

    assert_eq!(err.to_string(), "Dataset not found");
    let state = store.state();
    assert_eq!(state.datasets.len(), 1);
    assert_eq!(state.selected_dataset_id, Some(DatasetId::from("a")));
    assert_eq!(state.notices.last().map(|n| n.level), Some(NoticeLevel::Error));
}

#[tokio::test]
async fn selection_always_points_at_a_loaded_dataset() {
    let remote = FakeRemote::with_datasets(vec![dataset("a", "a.csv", 1), dataset("b", "b.csv", 2)]);
    let (_, store) = ready_store(remote).await;

    let err = store
        .select_dataset(&DatasetId::from("ghost"))
        .expect_err("unknown id should be rejected");
    assert!(matches!(err, SessionError::UnknownDataset(_)));

    store.select_dataset(&DatasetId::from("a")).expect("a is loaded");
    store.remove_dataset(&DatasetId::from("b")).await.expect("delete b");
    store.add_dataset(dataset("c", "c.csv", 3));
    store.remove_dataset(&DatasetId::from("a")).await.expect("delete a");

    let state = store.state();
    if let Some(id) = &state.selected_dataset_id {
        assert!(state.dataset(id).is_some(), "selection {id} should be loaded");
    }
    assert_eq!(state.selected_dataset_id, None);
    assert_eq!(state.datasets.len(), 1);
}

#[tokio::test]
async fn refresh_drops_selection_of_vanished_dataset() {
    let remote = FakeRemote::with_datasets(vec![dataset("a", "a.csv", 1), dataset("b", "b.csv", 2)]);
    let (remote, store) = ready_store(remote).await;
    store.select_dataset(&DatasetId::from("a")).expect("a is loaded");

    *remote.datasets.borrow_mut() = Ok(vec![dataset("b", "b.csv", 2)]);
    store.refresh_datasets().await.expect("refresh should succeed");

    assert_eq!(store.state().selected_dataset_id, None);
    assert_eq!(store.state().datasets.len(), 1);
}

#[tokio::test]
async fn failed_refresh_keeps_previous_list() {
    let remote = FakeRemote::with_datasets(vec![dataset("a", "a.csv", 1)]);
    let (remote, store) = ready_store(remote).await;

    *remote.datasets.borrow_mut() = Err(network_down());
    store
        .refresh_datasets()
        .await
        .expect_err("refresh should report the failure");

    assert_eq!(store.state().datasets.len(), 1);
    assert_eq!(store.state().selected_dataset_id, Some(DatasetId::from("a")));
}

#[test]
fn completing_a_level_unlocks_the_next_one() {
    let lesson = |id: u32| Lesson {
        id: LessonId(id),
        title: format!("Lesson {id}"),
    };
    let catalog = TutorialCatalog::new(vec![
        Level {
            id: LevelId(1),
            title: "Basics".to_string(),
            description: String::new(),
            lessons: vec![lesson(1), lesson(2)],
        },
        Level {
            id: LevelId(2),
            title: "Filtering".to_string(),
            description: String::new(),
            lessons: vec![lesson(1), lesson(2)],
        },
    ]);
    let store = SessionStore::with_catalog(Rc::new(FakeRemote::default()), catalog);

    assert!(!store.state().tutorial.is_level_unlocked(LevelId(2)));
    store.complete_current_lesson();
    assert!(!store.state().tutorial.is_level_unlocked(LevelId(2)));
    store.complete_current_lesson();

    let state = store.state();
    assert!(state.tutorial.is_level_unlocked(LevelId(2)));
    assert_eq!(state.tutorial.current(), (LevelId(2), LessonId(1)));
    assert_eq!(state.tutorial.level_progress(LevelId(1)), 100.0);
}

#[test]
fn selecting_a_locked_lesson_is_an_error() {
    let store = SessionStore::new(Rc::new(FakeRemote::default()));

    let err = store
        .select_lesson(LevelId(3), LessonId(1))
        .expect_err("level 3 is locked");

    assert!(matches!(err, SessionError::Tutorial(_)));
    assert_eq!(store.state().tutorial.current(), (LevelId(1), LessonId(1)));
}

#[tokio::test]
async fn examples_and_health_land_in_state() {
    let (_, store) = ready_store(FakeRemote::default()).await;

    store.load_tutorial_examples().await;
    store.check_health().await.expect_err("fake service is unreachable");

    let state = store.state();
    assert_eq!(state.examples.len(), 1);
    assert_eq!(state.health, None);
    assert_eq!(state.notices.last().map(|n| n.level), Some(NoticeLevel::Warning));
}

#[tokio::test]
async fn history_selection_toggles() {
    let remote = FakeRemote::with_datasets(vec![dataset("a", "a.csv", 1)]);
    let (_, store) = ready_store(remote).await;
    let record = store.execute_query("Show me all data").await.expect("record");

    store.toggle_history_selection(&record.id);
    assert!(store.state().selected_history.contains(&record.id));
    store.toggle_history_selection(&record.id);
    assert!(store.state().selected_history.is_empty());

    store.toggle_history_selection(&record.id);
    store.clear_history_selection();
    assert!(store.state().selected_history.is_empty());
}

#[tokio::test]
async fn onboarding_stays_until_dismissed() {
    let (_, store) = ready_store(FakeRemote::default()).await;

    store
        .upload_dataset(UploadFile::new("data.csv", Vec::new()))
        .await
        .expect("upload should succeed");
    assert!(store.state().onboarding, "uploading should not dismiss onboarding");

    store.dismiss_onboarding();
    assert!(!store.state().onboarding);
}

#[tokio::test]
async fn listeners_fire_on_every_change() {
    let store = SessionStore::new(Rc::new(FakeRemote::default()));
    let hits = Rc::new(Cell::new(0));
    {
        let hits = hits.clone();
        store.subscribe(move || hits.set(hits.get() + 1));
    }

    store.initialize().await;
    store.dismiss_onboarding();
    store.dismiss_notice(7);

    assert_eq!(hits.get(), 3);
}

#[tokio::test]
async fn updated_allow_list_applies_to_later_uploads() {
    let (remote, store) = ready_store(FakeRemote::default()).await;

    store.update_config(ServiceConfig {
        supported_formats: vec!["json".to_string()],
        ..ServiceConfig::default()
    });
    let err = store
        .upload_dataset(UploadFile::new("data.csv", Vec::new()))
        .await
        .expect_err("csv is no longer allowed");

    assert_eq!(err.to_string(), "unsupported file format: csv");
    assert_eq!(remote.upload_calls.get(), 0);
}
