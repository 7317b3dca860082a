use thiserror::Error;
use tracing::error;

use crate::source::SourceKind;
use crate::workflow::WorkflowValidationError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("{method} {url} failed with status {status}")]
    Status {
        status: u16,
        url: String,
        method: String,
        body: String,
    },

    /// The request went out but nothing usable came back (timeout, refused
    /// connection, dropped body).
    #[error("no response from {method} {url}: {reason}")]
    NoResponse {
        url: String,
        method: String,
        reason: String,
    },

    /// The request could not be built.
    #[error("request setup failed: {0}")]
    Setup(String),

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    InvalidUpload(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    InvalidWorkflow(#[from] WorkflowValidationError),

    #[error("{operation} is not available from the {kind} data source")]
    Unsupported {
        operation: &'static str,
        kind: SourceKind,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("script still not parsed after {attempts} status checks")]
    PollExhausted { attempts: u32 },

    #[error("{action} is already running for scene {scene_id}")]
    Busy {
        action: &'static str,
        scene_id: String,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Model(#[from] scenes::ModelError),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Sorts a transport failure into one of the three categories the client
    /// reports: a server response, no response, or a request that never left.
    pub fn from_reqwest(err: reqwest::Error, method: &str, url: &str) -> Self {
        if let Some(status) = err.status() {
            ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                method: method.to_string(),
                body: String::new(),
            }
        } else if err.is_builder() {
            ApiError::Setup(err.to_string())
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::NoResponse {
                url: url.to_string(),
                method: method.to_string(),
                reason: err.to_string(),
            }
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ApiError::Status { .. } | ApiError::NoResponse { .. } | ApiError::Setup(_)
        )
    }

    /// Human-readable message from an error body, when the server sent one
    /// as `{"message": ...}` or `{"error": ...}`.
    pub fn server_message(&self) -> Option<String> {
        let ApiError::Status { body, .. } = self else {
            return None;
        };
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        ["message", "error"]
            .iter()
            .find_map(|key| value.get(key)?.as_str().map(str::to_string))
    }

    /// Emits the one log line for a failed request.
    pub(crate) fn log(&self) {
        match self {
            ApiError::Status {
                status,
                url,
                method,
                body,
            } => error!(target: "previz::api", status, %method, %url, %body, "API error response"),
            ApiError::NoResponse {
                url,
                method,
                reason,
            } => error!(target: "previz::api", %method, %url, %reason, "API error: no response received"),
            ApiError::Setup(msg) => error!(target: "previz::api", %msg, "API error: request setup failed"),
            other => error!(target: "previz::api", error = %other, "API error"),
        }
    }
}
