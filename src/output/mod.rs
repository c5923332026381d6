//! Output mode abstraction for robot and human output.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cli::Cli;
use crate::config::SaverConfig;
use crate::error::SaverError;
use crate::reporter::MethodResponse;
use crate::request::SaveResult;
use crate::store::MediaRecord;

pub mod human;
pub mod robot;

pub use human::HumanOutput;
pub use robot::RobotOutput;

/// Build metadata shown by `version`.
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    pub version: &'static str,
    pub git_sha: &'static str,
    pub git_dirty: bool,
    pub build_timestamp: &'static str,
    pub rustc_version: &'static str,
    pub target: &'static str,
}

/// JSON formatting options for robot mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotFormat {
    /// Pretty-printed JSON (default for --robot).
    Json,
    /// Single-line JSON (--format=json-compact).
    JsonCompact,
}

/// Determines how command output is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// JSON output for agents and scripting.
    Robot(RobotFormat),
    /// Styled terminal output for human users.
    Human,
}

impl OutputMode {
    /// Create OutputMode from CLI arguments.
    #[must_use]
    pub const fn from_cli(cli: &Cli) -> Self {
        if cli.use_json() {
            if cli.use_compact_json() {
                Self::Robot(RobotFormat::JsonCompact)
            } else {
                Self::Robot(RobotFormat::Json)
            }
        } else {
            Self::Human
        }
    }

    #[must_use]
    pub const fn is_robot(&self) -> bool {
        matches!(self, Self::Robot(_))
    }

    /// Convert into the appropriate Output implementation.
    #[must_use]
    pub fn into_output(self) -> Box<dyn Output> {
        match self {
            Self::Robot(format) => Box::new(RobotOutput::new(format)),
            Self::Human => Box::new(HumanOutput::new()),
        }
    }
}

/// Renders command results for one output mode.
pub trait Output {
    fn error(&self, error: &SaverError);

    /// Result of `save`.
    fn save_outcome(&self, path: &str, result: &SaveResult);
    /// Wire response of a raw channel call.
    fn call_response(&self, response: &MethodResponse);

    fn record_list(&self, records: &[MediaRecord]);
    fn asset_list(&self, assets: &[PathBuf]);
    fn purged(&self, removed: usize, older_than_hours: u64);

    fn config(&self, config: &SaverConfig, source: Option<&Path>);
    fn version_info(&self, info: &VersionInfo);
}
