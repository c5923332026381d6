//! image-saver CLI - save images into the shared photo library.
//!
//! Stands in for the host application: every command goes through the same
//! saver and method channel a host would embed.
#![forbid(unsafe_code)]

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::{debug, info};

use image_saver::channel::ImageSaverChannel;
use image_saver::cli::{self, Cli, Commands};
use image_saver::config::{SaverConfig, default_config_path};
use image_saver::error::SaverError;
use image_saver::library::{AuthorizationSource, AuthorizationStatus, DirectoryPhotoLibrary};
use image_saver::logging::init_logging;
use image_saver::output::{Output, OutputMode, VersionInfo};
use image_saver::permission::{
    ConsentAnswer, ConsentDecision, PermissionProvider, ScriptedConsent, TerminalConsent,
};
use image_saver::platform::Platform;
use image_saver::reporter::MethodResponse;
use image_saver::saver::ImageSaver;
use image_saver::store::{DirectoryMediaStore, MediaQuery, MediaStore};

/// Build information embedded at compile time.
mod build_info {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    pub fn git_sha() -> &'static str {
        option_env!("VERGEN_GIT_SHA").unwrap_or("unknown")
    }

    pub fn git_dirty() -> bool {
        option_env!("VERGEN_GIT_DIRTY") == Some("true")
    }

    pub fn build_timestamp() -> &'static str {
        option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown")
    }

    pub fn rustc_semver() -> &'static str {
        option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown")
    }

    pub fn target() -> &'static str {
        option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown")
    }
}

/// Exit status for failures outside a save request.
const EXIT_INFRASTRUCTURE: u8 = 1;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }
    init_logging(cli.robot, cli.verbose, cli.quiet);

    let output = OutputMode::from_cli(&cli).into_output();
    match run(&cli, output.as_ref()).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            // Bare SaverErrors keep their suggestion; added context is kept as text.
            let err = if err.chain().count() == 1 {
                err.downcast::<SaverError>()
                    .unwrap_or_else(|other| SaverError::Other(other.to_string()))
            } else {
                SaverError::Other(format!("{err:#}"))
            };
            output.error(&err);
            ExitCode::from(EXIT_INFRASTRUCTURE)
        }
    }
}

async fn run(cli: &Cli, output: &dyn Output) -> anyhow::Result<u8> {
    match &cli.command {
        None => {
            print_quick_start(cli, output);
            Ok(0)
        }
        Some(Commands::Save(args)) => cmd_save(cli, output, args).await,
        Some(Commands::Call(args)) => cmd_call(cli, output, args).await,
        Some(Commands::List(args)) => cmd_list(cli, output, args),
        Some(Commands::PurgePending(args)) => cmd_purge(cli, output, args),
        Some(Commands::Config) => cmd_config(cli, output),
        Some(Commands::Version) => {
            output.version_info(&version_info());
            Ok(0)
        }
        Some(Commands::Completions(args)) => {
            use clap::CommandFactory;
            clap_complete::generate(
                args.shell,
                &mut Cli::command(),
                "image-saver",
                &mut io::stdout(),
            );
            Ok(0)
        }
    }
}

// === Wiring ===

/// Config file plus command-line overrides.
fn load_config(cli: &Cli) -> anyhow::Result<SaverConfig> {
    let mut config = SaverConfig::load(cli.config.as_deref())?;
    if let Some(platform) = cli.platform {
        config.platform = platform;
    }
    if let Some(level) = cli.android_sdk {
        config.platform = Platform::from_android_sdk(level);
    }
    if let Some(store) = &cli.store {
        config.store_dir.clone_from(store);
    }
    debug!(platform = %config.platform, store = %config.store_dir.display(), "Effective configuration");
    Ok(config)
}

fn consent_provider(config: &SaverConfig, answer: ConsentAnswer) -> Arc<dyn PermissionProvider> {
    match answer {
        ConsentAnswer::Ask => Arc::new(TerminalConsent::new(config.initial_permission)),
        ConsentAnswer::Allow => Arc::new(ScriptedConsent::new(
            config.initial_permission,
            ConsentDecision::Granted,
        )),
        ConsentAnswer::Deny => Arc::new(ScriptedConsent::new(
            config.initial_permission,
            ConsentDecision::Denied,
        )),
    }
}

fn build_saver(config: &SaverConfig, answer: ConsentAnswer) -> anyhow::Result<ImageSaver> {
    let builder = ImageSaver::builder(config.platform)
        .permissions(consent_provider(config, answer))
        .record_options(config.record_options())
        .consent_timeout(config.consent_timeout());

    let builder = if config.platform.capabilities().uses_library_asset_api {
        let source = AuthorizationSource::from_answer(answer, config.limited_library_access);
        builder.photo_library(Arc::new(DirectoryPhotoLibrary::new(&config.store_dir, source)))
    } else {
        let store = DirectoryMediaStore::open(&config.store_dir)
            .with_context(|| format!("opening media store at {}", config.store_dir.display()))?;
        builder.media_store(Arc::new(store))
    };

    Ok(builder.build()?)
}

fn open_store(config: &SaverConfig) -> anyhow::Result<DirectoryMediaStore> {
    if config.platform.capabilities().uses_library_asset_api {
        return Err(SaverError::ConfigInvalid(format!(
            "{} has no media index; use --platform media-index or legacy-media-index",
            config.platform
        ))
        .into());
    }
    DirectoryMediaStore::open(&config.store_dir)
        .with_context(|| format!("opening media store at {}", config.store_dir.display()))
}

// === Commands ===

async fn cmd_save(cli: &Cli, output: &dyn Output, args: &cli::SaveArgs) -> anyhow::Result<u8> {
    let config = load_config(cli)?;
    let saver = Arc::new(build_saver(&config, args.consent)?);

    let result = saver.dispatch(Some(&args.path)).wait().await;
    output.save_outcome(&args.path, &result);
    Ok(exit_status(&MethodResponse::from(&result)))
}

async fn cmd_call(cli: &Cli, output: &dyn Output, args: &cli::CallArgs) -> anyhow::Result<u8> {
    let config = load_config(cli)?;
    let channel = ImageSaverChannel::new(Arc::new(build_saver(&config, args.consent)?));

    let response = channel.handle_json(&args.json).await?;
    output.call_response(&response);
    Ok(exit_status(&response))
}

fn cmd_list(cli: &Cli, output: &dyn Output, args: &cli::ListArgs) -> anyhow::Result<u8> {
    let config = load_config(cli)?;
    if config.platform.capabilities().uses_library_asset_api {
        // Listing never asks for authorization.
        let library = DirectoryPhotoLibrary::new(
            &config.store_dir,
            AuthorizationSource::Fixed(AuthorizationStatus::NotDetermined),
        );
        let assets = library
            .assets()
            .with_context(|| format!("reading {}", library.assets_dir().display()))?;
        output.asset_list(&assets);
        return Ok(0);
    }

    let store = open_store(&config)?;
    let query = if args.all {
        MediaQuery::all()
    } else {
        MediaQuery::visible()
    };
    output.record_list(&store.query(&query)?);
    Ok(0)
}

fn cmd_purge(cli: &Cli, output: &dyn Output, args: &cli::PurgeArgs) -> anyhow::Result<u8> {
    let mut config = load_config(cli)?;
    if let Some(hours) = args.older_than_hours {
        config.pending_max_age_hours = hours;
    }
    let store = open_store(&config)?;
    let removed = store.purge_stale_pending(config.pending_max_age())?;
    info!(removed, "Purged stale pending records");
    output.purged(removed, config.pending_max_age_hours);
    Ok(0)
}

fn cmd_config(cli: &Cli, output: &dyn Output) -> anyhow::Result<u8> {
    let config = load_config(cli)?;
    let source: Option<PathBuf> = cli
        .config
        .clone()
        .or_else(|| default_config_path().filter(|p| p.is_file()));
    output.config(&config, source.as_deref());
    Ok(0)
}

fn exit_status(response: &MethodResponse) -> u8 {
    u8::try_from(response.exit_code()).unwrap_or(EXIT_INFRASTRUCTURE)
}

fn version_info() -> VersionInfo {
    VersionInfo {
        version: build_info::VERSION,
        git_sha: build_info::git_sha(),
        git_dirty: build_info::git_dirty(),
        build_timestamp: build_info::build_timestamp(),
        rustc_version: build_info::rustc_semver(),
        target: build_info::target(),
    }
}

// === Quick Start ===

#[derive(Serialize)]
struct RobotQuickStart {
    tool: &'static str,
    version: &'static str,
    description: &'static str,
    channel: &'static str,
    commands: RobotCommands,
    exit_codes: RobotExitCodes,
    output_modes: OutputModes,
}

#[derive(Serialize)]
struct RobotCommands {
    save: &'static str,
    call: &'static str,
    list: &'static str,
    purge_pending: &'static str,
    config: &'static str,
}

#[derive(Serialize)]
struct RobotExitCodes {
    success: u8,
    infrastructure: u8,
    invalid_path: u8,
    permission_denied: u8,
    save_failed: u8,
    not_implemented: u8,
}

#[derive(Serialize)]
struct OutputModes {
    human: &'static str,
    robot: &'static str,
    compact: &'static str,
}

fn print_quick_start(cli: &Cli, output: &dyn Output) {
    if cli.use_json() {
        let help = RobotQuickStart {
            tool: "image-saver",
            version: build_info::VERSION,
            description: "Save images into the shared photo library behind a permission gate",
            channel: image_saver::channel::CHANNEL_NAME,
            commands: RobotCommands {
                save: "image-saver save <PATH> --consent allow --robot",
                call: r#"image-saver call '{"method":"saveImage","arguments":{"path":"<PATH>"}}'"#,
                list: "image-saver list [--all] --robot",
                purge_pending: "image-saver purge-pending [--older-than-hours N]",
                config: "image-saver config --robot",
            },
            exit_codes: RobotExitCodes {
                success: 0,
                infrastructure: EXIT_INFRASTRUCTURE,
                invalid_path: 2,
                permission_denied: 3,
                save_failed: 4,
                not_implemented: 5,
            },
            output_modes: OutputModes {
                human: "--format=text (default)",
                robot: "--robot or --format=json",
                compact: "--format=json-compact",
            },
        };
        match serde_json::to_string_pretty(&help) {
            Ok(json) => println!("{json}"),
            Err(e) => output.error(&SaverError::Other(e.to_string())),
        }
        return;
    }

    use console::style;
    println!(
        "{} {} - save images into the shared photo library\n",
        style("image-saver").bold().cyan(),
        build_info::VERSION
    );
    println!("{}", style("QUICK START").bold().underlined());
    println!();
    println!("  {}  Save, prompting for consent", style("image-saver save photo.jpg").green());
    println!(
        "  {}  Save without prompting",
        style("image-saver save photo.jpg --consent allow").green()
    );
    println!("  {}  List saved records", style("image-saver list").green());
    println!("  {}  Effective configuration", style("image-saver config").green());
    println!();
    println!("{}", style("ROBOT MODE").bold().underlined());
    println!();
    println!("  {}  JSON output", style("image-saver --robot <command>").cyan());
    println!("  {}  Quick-start JSON", style("image-saver --robot").cyan());
    println!();
    println!("Run {} for full help", style("image-saver --help").yellow());
}
