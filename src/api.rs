//! Wire types and client for the supervisor's REST / event-stream API.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;
use crate::sse::SseDecoder;

/// Identifier of a managed program (`1..=4` on the stock backend).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgramId(pub u32);

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProgramId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ProgramId)
    }
}

/// Opaque "last seen" token returned with log snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(pub String);

impl Cursor {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogsResponse {
    pub logs: Vec<String>,
    #[serde(default)]
    pub timestamp: Option<Cursor>,
}

/// Status of one program as last reported by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProgramSnapshot {
    pub status: String,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub last_update: Option<String>,
}

pub type StatusMap = BTreeMap<ProgramId, ProgramSnapshot>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActionResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

impl ActionResponse {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Write operations exposed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Start,
    Stop,
    ClearLogs,
}

impl Action {
    pub fn path_segment(self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Stop => "stop",
            Action::ClearLogs => "clear_logs",
        }
    }
}

/// Log lines pushed by the server, in arrival order.
pub type LogStream = Pin<Box<dyn Stream<Item = Result<String, ApiError>> + Send>>;

/// The supervisor API as seen by the dashboard.
pub trait Backend: Send + Sync + 'static {
    fn fetch_logs(
        &self,
        program: ProgramId,
        since: Option<Cursor>,
    ) -> impl Future<Output = Result<LogsResponse, ApiError>> + Send;

    fn fetch_status(&self) -> impl Future<Output = Result<StatusMap, ApiError>> + Send;

    fn send_action(
        &self,
        program: ProgramId,
        action: Action,
    ) -> impl Future<Output = Result<ActionResponse, ApiError>> + Send;

    fn open_log_stream(
        &self,
        program: ProgramId,
    ) -> impl Future<Output = Result<LogStream, ApiError>> + Send;
}

/// `Backend` over HTTP. No per-request timeout: a stalled request only
/// delays its own cycle.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .build()
            .map_err(|source| ApiError::Transport {
                url: base_url.clone(),
                source,
            })?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        url: &str,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let body = response.bytes().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;
        serde_json::from_slice(&body).map_err(|source| ApiError::Malformed {
            url: url.to_string(),
            source,
        })
    }

    async fn get(&self, url: &str, query: Option<(&str, &str)>) -> Result<reqwest::Response, ApiError> {
        let mut request = self.client.get(url);
        if let Some(pair) = query {
            request = request.query(&[pair]);
        }
        let response = request.send().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;
        if !response.status().is_success() {
            return Err(ApiError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }
}

impl Backend for HttpBackend {
    async fn fetch_logs(
        &self,
        program: ProgramId,
        since: Option<Cursor>,
    ) -> Result<LogsResponse, ApiError> {
        let url = self.url(&format!("/api/programs/{program}/logs"));
        debug!(%program, since = ?since, "fetching logs");
        let query = since.as_ref().map(|cursor| ("since", cursor.as_str()));
        let response = self.get(&url, query).await?;
        Self::read_json(&url, response).await
    }

    async fn fetch_status(&self) -> Result<StatusMap, ApiError> {
        let url = self.url("/api/programs/status");
        let response = self.get(&url, None).await?;
        Self::read_json(&url, response).await
    }

    async fn send_action(
        &self,
        program: ProgramId,
        action: Action,
    ) -> Result<ActionResponse, ApiError> {
        let url = self.url(&format!("/api/programs/{program}/{}", action.path_segment()));
        debug!(%program, ?action, "sending action");
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;
        // Failures come back as 400/500 with the same JSON shape.
        Self::read_json(&url, response).await
    }

    async fn open_log_stream(&self, program: ProgramId) -> Result<LogStream, ApiError> {
        let url = self.url(&format!("/api/programs/{program}/logs/stream"));
        let response = self.get(&url, None).await?;
        debug!(%program, "log stream opened");

        let mut decoder = SseDecoder::new();
        let lines = response.bytes_stream().flat_map(move |chunk| {
            let items: Vec<Result<String, ApiError>> = match chunk {
                Ok(bytes) => match decoder.feed(&bytes) {
                    Ok(events) => events.into_iter().map(Ok).collect(),
                    Err(source) => vec![Err(ApiError::EventStream {
                        url: url.clone(),
                        source,
                    })],
                },
                Err(source) => vec![Err(ApiError::Transport {
                    url: url.clone(),
                    source,
                })],
            };
            futures::stream::iter(items)
        });
        Ok(Box::pin(lines))
    }
}
