//! Host boundary: a method channel carrying `saveImage` calls.
//!
//! Calls arrive as `{ "method": ..., "arguments": {...} }` and every call
//! gets exactly one [`MethodResponse`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::{Result, SaverError};
use crate::reporter::MethodResponse;
use crate::saver::ImageSaver;

/// Name the host registers the channel under.
pub const CHANNEL_NAME: &str = "my_app/image_saver";

/// The one method this channel implements.
pub const SAVE_IMAGE: &str = "saveImage";

/// A method invocation from the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: Value) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }

    /// A `saveImage` call for `path`.
    pub fn save_image(path: impl Into<String>) -> Self {
        Self::new(SAVE_IMAGE, serde_json::json!({ "path": path.into() }))
    }

    /// String argument `key`; missing, null, and non-string values are `None`.
    pub fn argument(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(Value::as_str)
    }
}

/// Routes host calls to an [`ImageSaver`].
#[derive(Clone)]
pub struct ImageSaverChannel {
    saver: Arc<ImageSaver>,
}

impl ImageSaverChannel {
    pub fn new(saver: Arc<ImageSaver>) -> Self {
        Self { saver }
    }

    pub fn saver(&self) -> &Arc<ImageSaver> {
        &self.saver
    }

    /// Handle one call. The response is produced on the caller's task even
    /// when the save itself finishes elsewhere.
    #[instrument(skip(self, call), fields(method = %call.method))]
    pub async fn handle(&self, call: MethodCall) -> MethodResponse {
        match call.method.as_str() {
            SAVE_IMAGE => {
                let path = call.argument("path");
                if path.is_none() {
                    warn!(arguments = %call.arguments, "saveImage called without a path");
                }
                let result = self.saver.dispatch(path).wait().await;
                MethodResponse::from(&result)
            }
            other => {
                debug!(method = other, "Method not implemented");
                MethodResponse::NotImplemented
            }
        }
    }

    /// Parse a JSON call and handle it.
    pub async fn handle_json(&self, raw: &str) -> Result<MethodResponse> {
        let call: MethodCall =
            serde_json::from_str(raw).map_err(|e| SaverError::MalformedCall(e.to_string()))?;
        Ok(self.handle(call).await)
    }
}
