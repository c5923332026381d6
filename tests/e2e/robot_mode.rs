//! Robot-mode end-to-end tests.

use serde_json::{Value, json};

use crate::common::cli::CliRunner;
use crate::common::fixtures::{SourceImages, Workspace, path_str};
use crate::common::init_test_logging;

#[test]
fn robot_quick_start_outputs_json() {
    init_test_logging();
    let result = CliRunner::new().run(&["--robot"]);
    result.assert_success();

    let json = result.json();
    assert_eq!(json["tool"], "image-saver");
    assert_eq!(json["channel"], "my_app/image_saver");
    assert_eq!(json["exit_codes"]["permission_denied"], 3);
}

#[test]
fn robot_version_has_build_fields() {
    let result = CliRunner::new().run(&["version", "--format=json"]);
    result.assert_success();

    let json = result.json();
    assert!(json["version"].is_string());
    assert!(json["git_dirty"].is_boolean());
    assert!(json.get("target").is_some());
}

#[test]
fn save_on_scoped_platform_creates_record() {
    let workspace = Workspace::new("platform = \"media-index\"");
    let sources = SourceImages::new();
    let (source, bytes) = sources.jpeg("photo.jpg");
    let cli = CliRunner::new();

    let result = cli.run_robot(&[
        "--config",
        workspace.config_str(),
        "save",
        path_str(&source),
        "--consent",
        "deny",
    ]);
    result
        .assert_exit_code(0)
        .assert_json_field("/response/status", &json!("success"))
        .assert_json_field("/response/result", &json!(true))
        .assert_json_field("/saved/kind", &json!("media_record"))
        .assert_json_field("/saved/display_name", &json!("photo.jpg"))
        .assert_json_field("/saved/bytes", &json!(bytes.len()));

    cli.run_robot(&["--config", workspace.config_str(), "list"])
        .assert_success()
        .assert_json_array_len("", 1)
        .assert_json_field("/0/relative_path", &json!("Pictures/StarGallery"))
        .assert_json_field("/0/is_pending", &json!(false));
    assert_eq!(workspace.files_in("Pictures/StarGallery"), vec!["photo.jpg"]);
}

#[test]
fn legacy_denial_exits_with_permission_code() {
    let workspace = Workspace::new("platform = \"legacy-media-index\"");
    let sources = SourceImages::new();
    let (source, _) = sources.jpeg("photo.jpg");
    let cli = CliRunner::new();

    cli.run_robot(&[
        "--config",
        workspace.config_str(),
        "save",
        path_str(&source),
        "--consent",
        "deny",
    ])
    .assert_exit_code(3)
    .assert_json_field("/response/code", &json!("PERMISSION_DENIED"))
    .assert_json_field("/saved", &Value::Null);

    cli.run_robot(&["--config", workspace.config_str(), "list", "--all"])
        .assert_success()
        .assert_json_array_len("", 0);
}

#[test]
fn legacy_allow_saves_into_pictures() {
    let workspace = Workspace::new("platform = \"legacy-media-index\"");
    let sources = SourceImages::new();
    let (source, _) = sources.jpeg("photo.jpg");

    CliRunner::new()
        .run_robot(&[
            "--config",
            workspace.config_str(),
            "save",
            path_str(&source),
            "--consent",
            "allow",
        ])
        .assert_success();
    assert_eq!(workspace.files_in("Pictures"), vec!["photo.jpg"]);
}

#[test]
fn missing_file_exits_with_invalid_path() {
    let workspace = Workspace::new("");
    CliRunner::new()
        .run_robot(&[
            "--config",
            workspace.config_str(),
            "save",
            "/no/such/image.jpg",
            "--consent",
            "allow",
        ])
        .assert_exit_code(2)
        .assert_json_field("/response/code", &json!("INVALID_PATH"))
        .assert_json_field("/response/message", &json!("Invalid image path"));
}

#[test]
fn call_prints_wire_response() {
    let workspace = Workspace::new("");
    let sources = SourceImages::new();
    let (source, _) = sources.jpeg("photo.jpg");
    let call = json!({ "method": "saveImage", "arguments": { "path": path_str(&source) } });

    CliRunner::new()
        .run_robot(&[
            "--config",
            workspace.config_str(),
            "call",
            &call.to_string(),
            "--consent",
            "allow",
        ])
        .assert_success()
        .assert_json_field("", &json!({ "status": "success", "result": true }));
}

#[test]
fn call_unknown_method_is_not_implemented() {
    let workspace = Workspace::new("");
    CliRunner::new()
        .run_robot(&[
            "--config",
            workspace.config_str(),
            "call",
            r#"{"method":"deleteImage","arguments":{}}"#,
        ])
        .assert_exit_code(5)
        .assert_json_field("/status", &json!("not_implemented"));
}

#[test]
fn malformed_call_reports_error_on_stderr() {
    let workspace = Workspace::new("");
    let result = CliRunner::new().run_robot(&[
        "--config",
        workspace.config_str(),
        "call",
        "{not json",
    ]);
    result.assert_exit_code(1);

    let err = result.stderr_json();
    assert_eq!(err["error"], true);
    assert_eq!(err["recoverable"], true);
    assert!(err["message"].as_str().unwrap().contains("Malformed method call"));
}

#[test]
fn missing_config_file_is_infrastructure_error() {
    let result = CliRunner::new().run_robot(&["--config", "/no/such/config.toml", "config"]);
    result.assert_exit_code(1);
    assert!(
        result.stderr_json()["suggestion"]
            .as_str()
            .unwrap()
            .contains("--config")
    );
}

#[test]
fn config_shows_resolved_store() {
    let workspace = Workspace::new("collection = \"Pictures/Screens\"");
    let result = CliRunner::new().run_robot(&["--config", workspace.config_str(), "config"]);
    result
        .assert_success()
        .assert_json_field("/config/platform", &json!("media-index"))
        .assert_json_field("/config/collection", &json!("Pictures/Screens"))
        .assert_json_field("/config/consent_timeout_secs", &json!(5));

    let json = result.json();
    let store = json["config"]["store_dir"].as_str().unwrap();
    assert!(store.ends_with("store"), "{store}");
}

#[test]
fn platform_flag_overrides_config() {
    let workspace = Workspace::new("platform = \"media-index\"");
    CliRunner::new()
        .run_robot(&[
            "--config",
            workspace.config_str(),
            "--platform",
            "photo-library",
            "config",
        ])
        .assert_success()
        .assert_json_field("/config/platform", &json!("photo-library"));
}

#[test]
fn android_sdk_level_selects_media_index_flavour() {
    let workspace = Workspace::new("");
    let cli = CliRunner::new();
    cli.run_robot(&["--config", workspace.config_str(), "--android-sdk", "28", "config"])
        .assert_success()
        .assert_json_field("/config/platform", &json!("legacy-media-index"));
    cli.run_robot(&["--config", workspace.config_str(), "--android-sdk", "34", "config"])
        .assert_success()
        .assert_json_field("/config/platform", &json!("media-index"));
}

#[test]
fn photo_library_save_creates_asset() {
    let workspace = Workspace::new("platform = \"photo-library\"");
    let sources = SourceImages::new();
    let source = sources.image("shot.png", 20, 10);
    let cli = CliRunner::new();

    cli.run_robot(&[
        "--config",
        workspace.config_str(),
        "save",
        path_str(&source),
        "--consent",
        "allow",
    ])
    .assert_success()
    .assert_json_field("/saved/kind", &json!("library_asset"));

    cli.run_robot(&["--config", workspace.config_str(), "list"])
        .assert_success()
        .assert_json_array_len("", 1);
}

#[test]
fn purge_pending_reports_count() {
    let workspace = Workspace::new("");
    CliRunner::new()
        .run_robot(&[
            "--config",
            workspace.config_str(),
            "purge-pending",
            "--older-than-hours",
            "1",
        ])
        .assert_success()
        .assert_json_field("/removed", &json!(0))
        .assert_json_field("/older_than_hours", &json!(1));
}

#[test]
fn compact_format_is_single_line() {
    let workspace = Workspace::new("");
    let result = CliRunner::new().run(&[
        "--config",
        workspace.config_str(),
        "--format",
        "json-compact",
        "config",
    ]);
    result.assert_success();
    assert_eq!(result.stdout.trim().lines().count(), 1);
}

#[test]
fn purge_pending_accepts_any_age() {
    let workspace = Workspace::new("");
    CliRunner::new()
        .run_robot(&[
            "--config",
            workspace.config_str(),
            "purge-pending",
            "--older-than-hours",
            "18446744073709551615",
        ])
        .assert_success()
        .assert_json_field("/removed", &json!(0));
}
