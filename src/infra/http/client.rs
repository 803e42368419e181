use std::future::Future;
#[cfg(any(target_arch = "wasm32", test))]
use std::pin::pin;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::ClientSettings;
use crate::domain::entities::config::ServiceConfig;
use crate::domain::entities::dataset::{Dataset, DatasetId, FileType};
use crate::domain::entities::query::QueryRecord;
use crate::domain::entities::tutorial::ExampleCategory;
use crate::infra::http::wire::{
    error_detail, DatasetsEnvelope, EngineResponse, ExamplesEnvelope, QueriesEnvelope,
    QueryRequest, UploadResponse, WireDataset,
};
use crate::usecase::ports::remote::{
    QueryOutcome, RemoteError, RemoteService, ServiceHealth, UploadFile,
};

/// Progress reported once the server has answered an upload but before the
/// body is decoded.
const UPLOAD_RESPONSE_PROGRESS: u8 = 90;

pub struct HttpRemoteService {
    client: reqwest::Client,
    settings: ClientSettings,
}

impl HttpRemoteService {
    pub fn new(settings: ClientSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("failed to build http client")?;
        Ok(Self { client, settings })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url(), path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(self.settings.request_timeout());
        match &self.settings.api_token {
            Some(token) => builder.header(AUTHORIZATION, format!("Bearer {token}")),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, RemoteError> {
        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), "remote service returned failure status");
        Err(RemoteError::server(Some(status.as_u16()), error_detail(&body)))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, RemoteError> {
        self.within_timeout(async {
            let response = self.send(builder).await?;
            decode(response).await
        })
        .await
    }

    /// Bounds a whole exchange, body included, by the configured timeout.
    /// Native builds rely on reqwest's per-request timeout; the browser
    /// transport has none, so the exchange races a timer there.
    async fn within_timeout<T>(
        &self,
        exchange: impl Future<Output = Result<T, RemoteError>>,
    ) -> Result<T, RemoteError> {
        #[cfg(target_arch = "wasm32")]
        {
            let millis = u32::try_from(self.settings.request_timeout().as_millis())
                .unwrap_or(u32::MAX);
            race_deadline(exchange, gloo_timers::future::TimeoutFuture::new(millis)).await
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            exchange.await
        }
    }
}

fn timed_out() -> RemoteError {
    RemoteError::Network("request timed out".to_string())
}

/// Resolves to a timeout error when `deadline` fires before `exchange`.
#[cfg(any(target_arch = "wasm32", test))]
async fn race_deadline<T>(
    exchange: impl Future<Output = Result<T, RemoteError>>,
    deadline: impl Future<Output = ()>,
) -> Result<T, RemoteError> {
    use futures::future::{select, Either};

    match select(pin!(exchange), pin!(deadline)).await {
        Either::Left((outcome, _)) => outcome,
        Either::Right(((), _)) => {
            warn!("request timed out");
            Err(timed_out())
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let status = response.status().as_u16();
    response.json::<T>().await.map_err(|err| {
        if err.is_decode() {
            RemoteError::server(Some(status), Some(format!("unexpected response: {err}")))
        } else {
            transport_error(err)
        }
    })
}

fn transport_error(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        return timed_out();
    }
    RemoteError::Network(err.to_string())
}

#[async_trait(?Send)]
impl RemoteService for HttpRemoteService {
    async fn fetch_config(&self) -> Result<ServiceConfig, RemoteError> {
        self.send_json(self.request(Method::GET, "/api/config")).await
    }

    async fn list_datasets(&self) -> Result<Vec<Dataset>, RemoteError> {
        let envelope: DatasetsEnvelope =
            self.send_json(self.request(Method::GET, "/api/datasets")).await?;
        Ok(envelope
            .datasets
            .into_iter()
            .filter_map(WireDataset::into_dataset)
            .collect())
    }

    async fn upload_dataset(
        &self,
        file: &UploadFile,
        on_progress: &dyn Fn(u8),
    ) -> Result<Dataset, RemoteError> {
        let file_type = file
            .extension()
            .and_then(FileType::from_extension)
            .ok_or_else(|| RemoteError::validation(format!("unsupported file: {}", file.name)))?;

        let part = Part::bytes(file.bytes.clone()).file_name(file.name.clone());
        let form = Form::new().part("file", part);
        debug!(file = %file.name, "sending upload");
        let uploaded: UploadResponse = self
            .within_timeout(async {
                let response = self
                    .send(self.request(Method::POST, "/api/upload").multipart(form))
                    .await?;
                on_progress(UPLOAD_RESPONSE_PROGRESS);
                decode(response).await
            })
            .await?;
        Ok(uploaded.into_dataset(file_type, Utc::now()))
    }

    async fn delete_dataset(&self, id: &DatasetId) -> Result<(), RemoteError> {
        let path = format!("/api/datasets/{}", id.as_str());
        self.within_timeout(self.send(self.request(Method::DELETE, &path)))
            .await?;
        Ok(())
    }

    async fn execute_query(
        &self,
        query_text: &str,
        dataset_id: &DatasetId,
    ) -> Result<QueryOutcome, RemoteError> {
        let body = QueryRequest {
            query: query_text,
            dataset_id: dataset_id.as_str(),
        };
        let engine: EngineResponse = self
            .send_json(self.request(Method::POST, "/api/query").json(&body))
            .await?;
        Ok(engine.into())
    }

    async fn list_query_history(&self) -> Result<Vec<QueryRecord>, RemoteError> {
        let envelope: QueriesEnvelope =
            self.send_json(self.request(Method::GET, "/api/queries")).await?;
        Ok(envelope.queries.into_iter().map(Into::into).collect())
    }

    async fn fetch_tutorial_examples(&self) -> Result<Vec<ExampleCategory>, RemoteError> {
        let envelope: ExamplesEnvelope = self
            .send_json(self.request(Method::GET, "/api/tutorial/examples"))
            .await?;
        Ok(envelope.examples)
    }

    async fn health(&self) -> Result<ServiceHealth, RemoteError> {
        self.send_json(self.request(Method::GET, "/api/health")).await
    }
}
