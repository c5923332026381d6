//! CLI argument definitions.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::permission::ConsentAnswer;
use crate::platform::Platform;

/// image-saver - Save images into the shared photo library behind a permission gate.
///
/// Robot Mode: Use --robot or --format=json for machine-parseable output.
#[derive(Parser, Debug)]
#[command(name = "image-saver", version, about, long_about = None)]
#[command(propagate_version = true)]
#[allow(clippy::struct_excessive_bools)] // CLI flags naturally use multiple bools
pub struct Cli {
    /// Output format (text for humans, json for agents/scripts)
    #[arg(
        long,
        short = 'f',
        default_value = "text",
        global = true,
        env = "IMAGE_SAVER_FORMAT"
    )]
    pub format: OutputFormat,

    /// Robot mode: equivalent to --format=json
    #[arg(long, global = true)]
    pub robot: bool,

    /// Verbose output (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR", value_parser = clap::builder::FalseyValueParser::new())]
    pub no_color: bool,

    /// Config file (default: <config dir>/image-saver/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Storage model to target (overrides the config file)
    #[arg(long, global = true, env = "IMAGE_SAVER_PLATFORM")]
    pub platform: Option<Platform>,

    /// Pick the media-index flavour from an Android API level
    #[arg(
        long,
        global = true,
        env = "IMAGE_SAVER_ANDROID_SDK",
        value_name = "LEVEL",
        conflicts_with = "platform"
    )]
    pub android_sdk: Option<u32>,

    /// Root of the media store / photo library (overrides the config file)
    #[arg(long, global = true, env = "IMAGE_SAVER_STORE", value_name = "DIR")]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output format selection.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text with optional color
    #[default]
    Text,
    /// JSON output for scripts and agents
    Json,
    /// Compact JSON (single line)
    JsonCompact,
}

impl Cli {
    /// Returns true if output should be JSON (robot mode or explicit --format=json).
    pub const fn use_json(&self) -> bool {
        self.robot || matches!(self.format, OutputFormat::Json | OutputFormat::JsonCompact)
    }

    /// Returns true if output should be compact JSON.
    pub const fn use_compact_json(&self) -> bool {
        matches!(self.format, OutputFormat::JsonCompact)
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Save an image into the shared library
    Save(SaveArgs),

    /// Send a raw method-channel call (JSON) and print the response
    Call(CallArgs),

    /// List records in the media store
    List(ListArgs),

    /// Delete pending records left behind by interrupted saves
    PurgePending(PurgeArgs),

    /// Show the effective configuration
    Config,

    /// Show version and build information
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
pub struct SaveArgs {
    /// Path to the image file
    pub path: String,

    /// How to answer a permission prompt
    #[arg(long, default_value = "ask")]
    pub consent: ConsentAnswer,
}

/// Arguments for a raw channel call.
///
/// ```bash
/// image-saver call '{"method":"saveImage","arguments":{"path":"/tmp/photo.jpg"}}'
/// ```
#[derive(Parser, Debug)]
pub struct CallArgs {
    /// Method call as JSON: {"method": ..., "arguments": {...}}
    pub json: String,

    /// How to answer a permission prompt
    #[arg(long, default_value = "ask")]
    pub consent: ConsentAnswer,
}

#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Include pending (unpublished) records
    #[arg(long, short = 'a')]
    pub all: bool,
}

#[derive(Parser, Debug)]
pub struct PurgeArgs {
    /// Age threshold in hours (default from config)
    #[arg(long, value_name = "HOURS")]
    pub older_than_hours: Option<u64>,
}

#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
