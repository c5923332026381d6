//! Robot mode JSON output implementation.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, instrument, trace};

use crate::config::SaverConfig;
use crate::error::SaverError;
use crate::reporter::MethodResponse;
use crate::request::SaveResult;
use crate::store::MediaRecord;

use super::{Output, RobotFormat, VersionInfo};

/// JSON output implementation for agents and scripting.
pub struct RobotOutput {
    format: RobotFormat,
}

impl RobotOutput {
    #[instrument]
    pub fn new(format: RobotFormat) -> Self {
        debug!(?format, "Creating RobotOutput");
        Self { format }
    }

    /// Serialize in the configured format.
    pub fn render<T: Serialize + ?Sized>(&self, data: &T) -> String {
        let rendered = match self.format {
            RobotFormat::Json => serde_json::to_string_pretty(data),
            RobotFormat::JsonCompact => serde_json::to_string(data),
        };
        rendered.unwrap_or_else(|e| {
            json!({ "error": true, "message": format!("serialization failed: {e}") }).to_string()
        })
    }

    fn output_json<T: Serialize + ?Sized>(&self, data: &T) {
        let json = self.render(data);
        trace!(json_len = json.len(), "JSON serialized");
        println!("{json}");
    }

    /// Payload for a finished save.
    pub fn save_payload(path: &str, result: &SaveResult) -> Value {
        json!({
            "path": path,
            "response": MethodResponse::from(result),
            "saved": result.as_ref().ok(),
        })
    }

    pub fn error_payload(error: &SaverError) -> Value {
        json!({
            "error": true,
            "message": error.to_string(),
            "suggestion": error.suggestion(),
            "recoverable": error.is_user_recoverable(),
        })
    }
}

impl Output for RobotOutput {
    #[instrument(skip(self))]
    fn error(&self, error: &SaverError) {
        debug!(error = %error, "Robot: error");
        eprintln!("{}", self.render(&Self::error_payload(error)));
    }

    #[instrument(skip(self, result))]
    fn save_outcome(&self, path: &str, result: &SaveResult) {
        self.output_json(&Self::save_payload(path, result));
    }

    fn call_response(&self, response: &MethodResponse) {
        self.output_json(response);
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    fn record_list(&self, records: &[MediaRecord]) {
        self.output_json(records);
    }

    fn asset_list(&self, assets: &[PathBuf]) {
        self.output_json(assets);
    }

    fn purged(&self, removed: usize, older_than_hours: u64) {
        self.output_json(&json!({
            "removed": removed,
            "older_than_hours": older_than_hours,
        }));
    }

    fn config(&self, config: &SaverConfig, source: Option<&Path>) {
        self.output_json(&json!({
            "source": source.map(|p| p.display().to_string()),
            "config": config,
        }));
    }

    fn version_info(&self, info: &VersionInfo) {
        self.output_json(info);
    }
}
