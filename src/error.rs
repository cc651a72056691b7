//! Error types for backend calls and configuration.

use crate::api::ProgramId;
use crate::sse::EventTooLarge;

/// Failure talking to the supervisor API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("malformed response from {url}: {source}")]
    Malformed {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid event stream from {url}: {source}")]
    EventStream {
        url: String,
        #[source]
        source: EventTooLarge,
    },

    #[error("log stream for program {program} closed by server")]
    StreamClosed { program: ProgramId },
}

impl ApiError {
    /// Short code used in log fields.
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Transport { .. } => "TRANSPORT",
            ApiError::Status { .. } => "HTTP_STATUS",
            ApiError::Malformed { .. } => "MALFORMED_RESPONSE",
            ApiError::EventStream { .. } => "EVENT_STREAM",
            ApiError::StreamClosed { .. } => "STREAM_CLOSED",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading config: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {source}")]
    Parse {
        #[from]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}
