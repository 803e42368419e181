use std::rc::Rc;

use dioxus::prelude::*;
use rfd::AsyncFileDialog;
use tracing::{error, warn};

use crate::config::ClientSettings;
use crate::domain::entities::dataset::DatasetId;
use crate::domain::entities::query::{QueryRecord, QueryResult};
use crate::infra::http::client::HttpRemoteService;
use crate::infra::memory::MemoryRemoteService;
use crate::ui::state::app_state::{CurrentView, NoticeLevel, SessionState, SessionStore};
use crate::usecase::ports::remote::{RemoteService, UploadFile};

const NONE_OPTION_VALUE: &str = "__none__";

fn build_remote() -> Rc<dyn RemoteService> {
    let settings = ClientSettings::load().unwrap_or_else(|err| {
        warn!(error = %err, "falling back to default client settings");
        ClientSettings::default()
    });
    if settings.offline {
        return Rc::new(MemoryRemoteService::default());
    }
    match HttpRemoteService::new(settings) {
        Ok(remote) => Rc::new(remote),
        Err(err) => {
            error!(error = %format!("{err:#}"), "http client unavailable, running offline");
            Rc::new(MemoryRemoteService::default())
        }
    }
}

async fn pick_and_upload(store: Rc<SessionStore>) {
    let formats = store.state().config.supported_formats.clone();
    let Some(handle) = AsyncFileDialog::new()
        .add_filter("Datasets", formats.as_slice())
        .pick_file()
        .await
    else {
        return;
    };
    let file = UploadFile::new(handle.file_name(), handle.read().await);
    if store.upload_dataset(file).await.is_ok() {
        store.set_view(CurrentView::Datasets);
    }
}

#[component]
pub fn App() -> Element {
    let store = use_hook(|| Rc::new(SessionStore::new(build_remote())));
    let revision = use_signal(|| 0_u64);
    let query_text = use_signal(String::new);

    let store_for_listener = store.clone();
    use_hook(move || {
        store_for_listener.subscribe(move || {
            let mut revision = revision;
            *revision.write() += 1;
        })
    });

    let store_for_init = store.clone();
    use_future(move || {
        let store = store_for_init.clone();
        async move {
            store.initialize().await;
            store.load_tutorial_examples().await;
            let _ = store.check_health().await;
        }
    });

    let _ = revision();
    let state = store.snapshot();
    if !state.ready {
        return rsx! {
            div { class: "loading", "Connecting to Sankalp…" }
        };
    }

    let body = match state.current_view {
        CurrentView::Dashboard => dashboard_view(&state),
        CurrentView::Upload => upload_view(&store, &state),
        CurrentView::Query => query_view(&store, &state, query_text),
        CurrentView::History => history_view(&store, &state),
        CurrentView::Tutorial => tutorial_view(&store, &state),
        CurrentView::Datasets => datasets_view(&store, &state),
    };

    rsx! {
        div { class: "app",
            nav { class: "nav",
                for view in CurrentView::ALL {
                    button {
                        key: "{view.label()}",
                        class: if state.current_view == view { "active" } else { "" },
                        onclick: {
                            let store = store.clone();
                            move |_| store.set_view(view)
                        },
                        "{view.label()}"
                    }
                }
            }
            if state.onboarding {
                div { class: "onboarding",
                    p { "Welcome! Upload a dataset, then ask questions about it in plain English." }
                    button {
                        onclick: {
                            let store = store.clone();
                            move |_| store.dismiss_onboarding()
                        },
                        "Got it"
                    }
                }
            }
            for (idx, notice) in state.notices.iter().enumerate() {
                div {
                    key: "{idx}-{notice.message}",
                    class: match notice.level {
                        NoticeLevel::Info => "notice info",
                        NoticeLevel::Warning => "notice warning",
                        NoticeLevel::Error => "notice error",
                    },
                    span { "{notice.message}" }
                    button {
                        onclick: {
                            let store = store.clone();
                            move |_| store.dismiss_notice(idx)
                        },
                        "×"
                    }
                }
            }
            main { {body} }
        }
    }
}

fn dashboard_view(state: &SessionState) -> Element {
    let health = state
        .health
        .as_ref()
        .map(|health| format!("{} ({})", health.status, health.database))
        .unwrap_or_else(|| "unreachable".to_string());
    let tutorial = format!("{:.0}%", state.tutorial.overall_progress());
    let selected = state
        .selected_dataset()
        .map(|dataset| dataset.summary_label())
        .unwrap_or_else(|| "none".to_string());
    rsx! {
        section { class: "dashboard",
            h2 { "Overview" }
            p { "Datasets: {state.datasets.len()}" }
            p { "Selected: {selected}" }
            p { "Queries run: {state.history.len()}" }
            p { "Tutorial progress: {tutorial}" }
            p { "Service: {health} · version {state.config.version}" }
        }
    }
}

fn upload_view(store: &Rc<SessionStore>, state: &SessionState) -> Element {
    let formats = state.config.supported_formats.join(", ");
    let uploading = store.is_uploading();
    rsx! {
        section { class: "upload",
            h2 { "Upload a dataset" }
            p { "Supported formats: {formats} · max {state.config.max_file_size}" }
            button {
                disabled: uploading,
                onclick: {
                    let store = store.clone();
                    move |_| {
                        spawn(pick_and_upload(store.clone()));
                    }
                },
                "Choose file"
            }
            if let Some(percent) = state.upload_progress {
                progress { max: "100", value: "{percent}" }
                span { "{percent}%" }
            }
        }
    }
}

fn query_view(store: &Rc<SessionStore>, state: &SessionState, mut query_text: Signal<String>) -> Element {
    let selected = state
        .selected_dataset_id
        .as_ref()
        .map(|id| id.as_str().to_string())
        .unwrap_or_else(|| NONE_OPTION_VALUE.to_string());
    let running = store.is_querying();
    let latest = state.history.first().cloned();
    rsx! {
        section { class: "query",
            h2 { "Ask a question" }
            select {
                value: "{selected}",
                onchange: {
                    let store = store.clone();
                    move |evt: FormEvent| {
                        let value = evt.value();
                        if value != NONE_OPTION_VALUE {
                            let _ = store.select_dataset(&DatasetId(value));
                        }
                    }
                },
                option { value: NONE_OPTION_VALUE, "(no dataset selected)" }
                for dataset in state.datasets.iter() {
                    option {
                        key: "{dataset.id}",
                        value: "{dataset.id}",
                        "{dataset.summary_label()}"
                    }
                }
            }
            textarea {
                value: "{query_text}",
                placeholder: "Show me all data",
                oninput: move |evt| query_text.set(evt.value()),
            }
            button {
                disabled: running,
                onclick: {
                    let store = store.clone();
                    move |_| {
                        let store = store.clone();
                        let text = query_text();
                        spawn(async move {
                            let _ = store.execute_query(&text).await;
                        });
                    }
                },
                if running { "Running…" } else { "Run query" }
            }
            if let Some(record) = latest {
                {record_view(&record)}
            }
        }
    }
}

fn record_view(record: &QueryRecord) -> Element {
    let status = if record.success { "ok" } else { "failed" };
    let body = match (&record.result, record.error_message()) {
        (_, Some(message)) => rsx! { p { class: "error", "{message}" } },
        (Some(result), None) => result_view(result),
        (None, None) => rsx! { p { "No result" } },
    };
    rsx! {
        article { class: "record {status}",
            header {
                strong { "{record.query_text}" }
                span { " · {record.execution_time_seconds:.3}s" }
            }
            {body}
        }
    }
}

fn result_view(result: &QueryResult) -> Element {
    match result {
        QueryResult::Table {
            columns,
            rows,
            total_row_count,
        } => rsx! {
            p { "{total_row_count} rows" }
            table {
                thead {
                    tr {
                        for column in columns.iter() {
                            th { key: "{column}", "{column}" }
                        }
                    }
                }
                tbody {
                    for (idx, row) in rows.iter().enumerate() {
                        tr { key: "{idx}",
                            for column in columns.iter() {
                                td {
                                    key: "{column}",
                                    {row.get(column).map(|value| value.to_string()).unwrap_or_default()}
                                }
                            }
                        }
                    }
                }
            }
        },
        QueryResult::Metric { value, message } => rsx! {
            div { class: "metric",
                span { class: "value", "{value}" }
                p { "{message}" }
            }
        },
        QueryResult::Visualization {
            title, chart_type, ..
        } => rsx! {
            div { class: "visualization",
                h3 { "{title}" }
                p { "Chart type: {chart_type}" }
            }
        },
        QueryResult::Raw { payload } => {
            let pretty = serde_json::to_string_pretty(payload).unwrap_or_default();
            rsx! {
                pre { "{pretty}" }
            }
        }
    }
}

fn history_view(store: &Rc<SessionStore>, state: &SessionState) -> Element {
    let selected_count = state.selected_history.len();
    rsx! {
        section { class: "history",
            h2 { "Query history" }
            if selected_count > 0 {
                p {
                    "{selected_count} selected "
                    button {
                        onclick: {
                            let store = store.clone();
                            move |_| store.clear_history_selection()
                        },
                        "Clear selection"
                    }
                }
            }
            for record in state.history.iter() {
                div { key: "{record.id}", class: "history-row",
                    input {
                        r#type: "checkbox",
                        checked: state.selected_history.contains(&record.id),
                        onchange: {
                            let store = store.clone();
                            let id = record.id.clone();
                            move |_| store.toggle_history_selection(&id)
                        },
                    }
                    {record_view(record)}
                }
            }
        }
    }
}

fn tutorial_view(store: &Rc<SessionStore>, state: &SessionState) -> Element {
    let tutorial = &state.tutorial;
    let (current_level, current_lesson) = tutorial.current();
    rsx! {
        section { class: "tutorial",
            h2 { "Learn the query language" }
            for level in tutorial.catalog().levels.iter() {
                div {
                    key: "{level.id.0}",
                    class: if tutorial.is_level_unlocked(level.id) { "level" } else { "level locked" },
                    h3 { "Level {level.id.0}: {level.title}" }
                    p { "{level.description} · {tutorial.level_progress(level.id):.0}%" }
                    ul {
                        for lesson in level.lessons.iter() {
                            li {
                                key: "{lesson.id.0}",
                                class: if (level.id, lesson.id) == (current_level, current_lesson) { "current" } else { "" },
                                onclick: {
                                    let store = store.clone();
                                    let (level_id, lesson_id) = (level.id, lesson.id);
                                    move |_| {
                                        let _ = store.select_lesson(level_id, lesson_id);
                                    }
                                },
                                if tutorial.is_lesson_completed(level.id, lesson.id) { "✓ " }
                                "{lesson.title}"
                            }
                        }
                    }
                }
            }
            button {
                onclick: {
                    let store = store.clone();
                    move |_| store.complete_current_lesson()
                },
                "Mark current lesson complete"
            }
            h3 { "Example queries" }
            for category in state.examples.iter() {
                div { key: "{category.category}",
                    h4 { "{category.category}" }
                    ul {
                        for query in category.queries.iter() {
                            li { key: "{query}", "{query}" }
                        }
                    }
                }
            }
        }
    }
}

fn datasets_view(store: &Rc<SessionStore>, state: &SessionState) -> Element {
    rsx! {
        section { class: "datasets",
            h2 { "Datasets" }
            button {
                onclick: {
                    let store = store.clone();
                    move |_| {
                        let store = store.clone();
                        spawn(async move {
                            let _ = store.refresh_datasets().await;
                        });
                    }
                },
                "Refresh"
            }
            for dataset in state.datasets.iter() {
                div {
                    key: "{dataset.id}",
                    class: if state.selected_dataset_id.as_ref() == Some(&dataset.id) { "dataset selected" } else { "dataset" },
                    span { "{dataset.summary_label()} · {dataset.file_type} · {dataset.upload_time}" }
                    button {
                        onclick: {
                            let store = store.clone();
                            let id = dataset.id.clone();
                            move |_| {
                                let _ = store.select_dataset(&id);
                            }
                        },
                        "Select"
                    }
                    button {
                        onclick: {
                            let store = store.clone();
                            let id = dataset.id.clone();
                            move |_| {
                                let store = store.clone();
                                let id = id.clone();
                                spawn(async move {
                                    let _ = store.remove_dataset(&id).await;
                                });
                            }
                        },
                        "Delete"
                    }
                }
            }
        }
    }
}
