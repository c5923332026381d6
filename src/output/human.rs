//! Human-friendly output using `console` styling.

use std::path::{Path, PathBuf};

use console::style;
use tracing::{debug, instrument};

use crate::config::SaverConfig;
use crate::error::SaverError;
use crate::reporter::MethodResponse;
use crate::request::{SaveResult, SavedImage};
use crate::store::MediaRecord;

use super::{Output, VersionInfo};

/// Styled terminal output implementation for human users.
#[derive(Debug, Default)]
pub struct HumanOutput;

fn label(name: &str) -> String {
    format!("  {name:<12}")
}

impl HumanOutput {
    pub const fn new() -> Self {
        Self
    }

    /// One line per record: name, size, collection, state.
    pub fn format_record(record: &MediaRecord) -> String {
        let state = if record.is_pending {
            style("pending").yellow().to_string()
        } else {
            style("visible").green().to_string()
        };
        format!(
            "  {:<32} {:>10}  {:<24} {}",
            record.display_name,
            human_bytes(record.size),
            record.relative_path,
            state
        )
    }

    fn saved_details(saved: &SavedImage) {
        match saved {
            SavedImage::MediaRecord {
                handle,
                display_name,
                bytes,
                sha256,
            } => {
                println!("{}{}", label("Record"), style(handle).cyan());
                println!("{}{}", label("Name"), display_name);
                println!("{}{}", label("Size"), human_bytes(*bytes));
                println!("{}{}", label("SHA-256"), style(sha256).dim());
            }
            SavedImage::LibraryAsset { asset_id } => {
                println!("{}{}", label("Asset"), style(asset_id).cyan());
            }
        }
    }
}

/// Format a byte count with a binary unit.
#[allow(clippy::cast_precision_loss)] // display only
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

impl Output for HumanOutput {
    #[instrument(skip(self))]
    fn error(&self, error: &SaverError) {
        debug!(
            error = %error,
            recoverable = error.is_user_recoverable(),
            "Outputting error"
        );
        eprintln!("{} {}", style("[ERR]").red().bold(), style(error).bold());
        if let Some(suggestion) = error.suggestion() {
            eprintln!("{} {}", style("Hint:").yellow(), suggestion);
        }
    }

    fn save_outcome(&self, path: &str, result: &SaveResult) {
        match result {
            Ok(saved) => {
                println!("{} Saved {}", style("[OK]").green().bold(), path);
                Self::saved_details(saved);
            }
            Err(err) => {
                eprintln!(
                    "{} {} ({})",
                    style("[ERR]").red().bold(),
                    style(err.message()).bold(),
                    style(err.code()).dim()
                );
                if let Some(details) = err.details() {
                    eprintln!("{}{}", label("Details"), details);
                }
            }
        }
    }

    fn call_response(&self, response: &MethodResponse) {
        match response {
            MethodResponse::Success { result } => {
                println!("{} success: {result}", style("[OK]").green().bold());
            }
            MethodResponse::Error {
                code,
                message,
                details,
            } => {
                eprintln!("{} {code}: {message}", style("[ERR]").red().bold());
                if let Some(details) = details {
                    eprintln!("{}{details}", label("Details"));
                }
            }
            MethodResponse::NotImplemented => {
                eprintln!("{} method not implemented", style("[--]").yellow().bold());
            }
        }
    }

    fn record_list(&self, records: &[MediaRecord]) {
        if records.is_empty() {
            println!("{}", style("No records").dim());
            return;
        }
        println!("{}", style(format!("{} record(s)", records.len())).bold());
        for record in records {
            println!("{}", Self::format_record(record));
        }
    }

    fn asset_list(&self, assets: &[PathBuf]) {
        if assets.is_empty() {
            println!("{}", style("No assets").dim());
            return;
        }
        println!("{}", style(format!("{} asset(s)", assets.len())).bold());
        for asset in assets {
            println!("  {}", asset.display());
        }
    }

    fn purged(&self, removed: usize, older_than_hours: u64) {
        println!(
            "{} Removed {removed} pending record(s) older than {older_than_hours}h",
            style("[OK]").green().bold()
        );
    }

    fn config(&self, config: &SaverConfig, source: Option<&Path>) {
        match source {
            Some(path) => println!("{}{}", label("Source"), path.display()),
            None => println!("{}{}", label("Source"), style("built-in defaults").dim()),
        }
        println!("{}{}", label("Platform"), style(config.platform).cyan());
        println!("{}{}", label("Store"), config.store_dir.display());
        println!("{}{}", label("Collection"), config.collection);
        println!("{}{}", label("MIME type"), config.mime_type);
        match config.consent_timeout() {
            Some(timeout) => println!("{}{}s", label("Consent"), timeout.as_secs()),
            None => println!("{}no timeout", label("Consent")),
        }
        println!("{}{}h", label("Purge after"), config.pending_max_age_hours);
    }

    fn version_info(&self, info: &VersionInfo) {
        println!("image-saver {}", info.version);
        let dirty = if info.git_dirty {
            style(" (dirty)").yellow().to_string()
        } else {
            String::new()
        };
        println!("git: {}{dirty}", info.git_sha);
        println!("built: {}", info.build_timestamp);
        println!("rustc: {}", info.rustc_version);
        println!("target: {}", info.target);
    }
}
