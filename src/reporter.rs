//! Result delivery: exactly one response per save request.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::SaveError;
use crate::request::{RequestId, SaveResult};

/// Response to a method-channel call, in host wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MethodResponse {
    Success {
        result: Value,
    },
    Error {
        code: String,
        message: String,
        details: Option<Value>,
    },
    NotImplemented,
}

impl MethodResponse {
    pub fn success(result: impl Into<Value>) -> Self {
        Self::Success {
            result: result.into(),
        }
    }

    pub fn error(err: &SaveError) -> Self {
        Self::Error {
            code: err.code().to_string(),
            message: err.message().to_string(),
            details: err.details().map(|d| Value::String(d.to_string())),
        }
    }

    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Error { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Process exit status for a CLI host relaying this response.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Success { .. } => 0,
            Self::Error { code, .. } => match code.as_str() {
                "INVALID_PATH" => 2,
                "PERMISSION_DENIED" => 3,
                _ => 4,
            },
            Self::NotImplemented => 5,
        }
    }
}

impl From<&SaveResult> for MethodResponse {
    fn from(result: &SaveResult) -> Self {
        match result {
            Ok(_) => Self::success(true),
            Err(err) => Self::error(err),
        }
    }
}

const ABANDONED: &str = "request abandoned before completion";

/// One-shot reply handle for a save request.
///
/// `deliver` consumes the responder, so a second delivery cannot be
/// written. A responder dropped without delivering sends a `SaveFailed`.
pub struct Responder {
    id: RequestId,
    tx: Option<oneshot::Sender<SaveResult>>,
}

impl Responder {
    pub fn channel(id: RequestId) -> (Self, oneshot::Receiver<SaveResult>) {
        let (tx, rx) = oneshot::channel();
        (Self { id, tx: Some(tx) }, rx)
    }

    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Send the final result. Returns false if the caller stopped listening.
    pub fn deliver(mut self, result: SaveResult) -> bool {
        match &result {
            Ok(_) => debug!(request_id = %self.id, "Delivering success"),
            Err(err) => debug!(request_id = %self.id, code = err.code(), "Delivering error"),
        }
        let Some(tx) = self.tx.take() else {
            return false;
        };
        let delivered = tx.send(result).is_ok();
        if !delivered {
            warn!(request_id = %self.id, "Caller went away before the result arrived");
        }
        delivered
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            warn!(request_id = %self.id, "Responder dropped without a result");
            let _ = tx.send(Err(SaveError::save_failed(ABANDONED)));
        }
    }
}

/// Await a responder's result, treating a vanished sender as a failure.
pub async fn receive(rx: oneshot::Receiver<SaveResult>) -> SaveResult {
    rx.await
        .unwrap_or_else(|_| Err(SaveError::save_failed(ABANDONED)))
}
