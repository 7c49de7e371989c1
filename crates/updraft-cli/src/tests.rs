use std::path::{Path, PathBuf};

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tempfile::TempDir;
use updraft_core::{AppRelease, UpdateStatus};
use updraft_installer::Interaction;

use super::*;
use crate::config::{parse_heap_size, CONFIG_FILE_NAME};
use crate::prompt::{parse_confirmation, parse_selection};
use crate::render::{colorize, resolve_output_style};

fn no_env(_: &str) -> Option<String> {
    None
}

fn releases() -> Vec<AppRelease> {
    vec![
        AppRelease::new("Demo", "1.0.0", 1_700_000_000_000),
        AppRelease::new("Demo", "1.1.0", 1_710_000_000_000),
        AppRelease::new("Demo", "2.0.0", 1_720_000_000_000),
    ]
}

#[test]
fn missing_config_file_loads_defaults() {
    let dir = TempDir::new().expect("must create temp dir");
    let config = UpdraftConfig::load(&dir.path().join(CONFIG_FILE_NAME)).expect("must load");
    assert_eq!(config, UpdraftConfig::default());
}

#[test]
fn config_file_is_parsed_from_toml() {
    let dir = TempDir::new().expect("must create temp dir");
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(
        &path,
        "site_url = \"https://updates.example.test\"\napp_name = \"Demo\"\nusername = \"ci\"\ntimeout_secs = 5\n",
    )
    .expect("must write config");

    let config = UpdraftConfig::load(&path).expect("must load");
    assert_eq!(config.site_url.as_deref(), Some("https://updates.example.test"));
    assert_eq!(config.app_name.as_deref(), Some("Demo"));
    assert_eq!(config.username.as_deref(), Some("ci"));
    assert_eq!(config.timeout_secs, Some(5));
}

#[test]
fn unknown_config_keys_are_rejected() {
    let dir = TempDir::new().expect("must create temp dir");
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "site = \"typo\"\n").expect("must write config");

    let err = UpdraftConfig::load(&path).expect_err("unknown key must fail");
    assert!(format!("{err:#}").contains("failed to parse"));
}

#[test]
fn command_line_overrides_win_over_file_values() {
    let config = UpdraftConfig {
        site_url: Some("https://file.example.test".to_string()),
        app_name: Some("FromFile".to_string()),
        install_root: Some(PathBuf::from("/opt/file")),
        ..UpdraftConfig::default()
    };
    let overrides = Overrides {
        site_url: Some("https://cli.example.test".to_string()),
        app_name: None,
        install_root: None,
    };

    let settings = Settings::resolve(config, overrides, Some(PathBuf::from("/opt/host")), no_env)
        .expect("must resolve");
    assert_eq!(settings.site_url, "https://cli.example.test");
    assert_eq!(settings.app_name, "FromFile");
    assert_eq!(settings.install_root, PathBuf::from("/opt/host"));
    assert!(settings.credential.is_none());
    assert_eq!(settings.timeout.as_secs(), 30);
}

#[test]
fn missing_site_url_is_reported() {
    let config = UpdraftConfig {
        app_name: Some("Demo".to_string()),
        install_root: Some(PathBuf::from("/opt/demo")),
        ..UpdraftConfig::default()
    };
    let err = Settings::resolve(config, Overrides::default(), None, no_env)
        .expect_err("site url is required");
    assert!(err.to_string().contains("no update site configured"));
}

#[test]
fn credential_secret_is_read_from_named_variable() {
    let config = UpdraftConfig {
        site_url: Some("https://updates.example.test".to_string()),
        app_name: Some("Demo".to_string()),
        install_root: Some(PathBuf::from("/opt/demo")),
        username: Some("ci".to_string()),
        password_env: Some("DEMO_SECRET".to_string()),
        ..UpdraftConfig::default()
    };
    let lookup = |name: &str| (name == "DEMO_SECRET").then(|| "hunter2".to_string());

    let settings =
        Settings::resolve(config, Overrides::default(), None, lookup).expect("must resolve");
    let credential = settings.credential.expect("credential must be set");
    assert_eq!(credential.username(), "ci");
    assert_eq!(credential.secret(), "hunter2");
}

#[test]
fn username_without_password_is_an_error() {
    let config = UpdraftConfig {
        site_url: Some("https://updates.example.test".to_string()),
        app_name: Some("Demo".to_string()),
        install_root: Some(PathBuf::from("/opt/demo")),
        username: Some("ci".to_string()),
        ..UpdraftConfig::default()
    };
    let err = Settings::resolve(config, Overrides::default(), None, no_env)
        .expect_err("password must be required");
    assert!(err.to_string().contains("UPDRAFT_PASSWORD"));
}

#[test]
fn config_path_prefers_explicit_then_install_root() {
    let explicit = Path::new("/etc/updraft/custom.toml");
    let root = Path::new("/opt/demo");
    assert_eq!(config_path(Some(explicit), Some(root)), explicit);
    assert_eq!(config_path(None, Some(root)), root.join(CONFIG_FILE_NAME));
    assert_eq!(config_path(None, None), PathBuf::from(CONFIG_FILE_NAME));
}

#[test]
fn heap_sizes_accept_binary_suffixes() {
    assert_eq!(parse_heap_size("1048576").expect("bytes"), 1_048_576);
    assert_eq!(parse_heap_size("1024k").expect("kilobytes"), 1_048_576);
    assert_eq!(parse_heap_size("512M").expect("megabytes"), 512 * 1024 * 1024);
    assert_eq!(parse_heap_size(" 2g ").expect("gigabytes"), 2 * 1024 * 1024 * 1024);
    assert!(parse_heap_size("0m").is_err());
    assert!(parse_heap_size("lots").is_err());
    assert!(parse_heap_size("99999999999999999999g").is_err());
}

#[test]
fn plain_status_lines_have_no_badges() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "Demo 1.0.0 is up to date"),
        "Demo 1.0.0 is up to date"
    );
    assert_eq!(colorize(OutputStyle::Plain, "Update ready"), "Update ready");
}

#[test]
fn rich_status_lines_carry_badges() {
    let cases = [
        ("ok", "[OK]"),
        ("warn", "[WARN]"),
        ("err", "[ERR]"),
        ("info", "[..]"),
    ];
    for (status, badge) in cases {
        let line = render_status_line(OutputStyle::Rich, status, "message");
        assert!(line.contains(badge), "{status} must render {badge}: {line}");
        assert!(line.ends_with(" message"));
    }
}

#[test]
fn output_style_is_plain_off_terminal_or_with_no_color() {
    assert_eq!(resolve_output_style(true, false), OutputStyle::Rich);
    assert_eq!(resolve_output_style(true, true), OutputStyle::Plain);
    assert_eq!(resolve_output_style(false, false), OutputStyle::Plain);
}

#[test]
fn status_line_describes_each_outcome() {
    let style = OutputStyle::Plain;
    assert_eq!(
        status_line(style, Some("Demo 1.0.0"), &UpdateStatus::UpToDate(true)),
        "Demo 1.0.0 is up to date"
    );
    assert_eq!(
        status_line(style, None, &UpdateStatus::UpToDate(false)),
        "unknown release has an update available"
    );
    assert_eq!(
        status_line(style, None, &UpdateStatus::Error("offline".to_string())),
        "update check failed: offline"
    );
}

#[test]
fn release_listing_marks_installed_release() {
    let all = releases();
    let lines = format_release_lines(&all, &all[1]);
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("  1) Demo 1.0.0"));
    assert!(lines[1].ends_with("(installed)"));
    assert!(!lines[2].ends_with("(installed)"));
}

#[test]
fn selection_is_one_based_and_bounded() {
    assert_eq!(parse_selection("1\n", 3), Some(0));
    assert_eq!(parse_selection(" 3 ", 3), Some(2));
    assert_eq!(parse_selection("0", 3), None);
    assert_eq!(parse_selection("4", 3), None);
    assert_eq!(parse_selection("", 3), None);
    assert_eq!(parse_selection("two", 3), None);
}

#[test]
fn confirmation_requires_explicit_yes() {
    assert!(parse_confirmation("y\n"));
    assert!(parse_confirmation("YES"));
    assert!(!parse_confirmation(""));
    assert!(!parse_confirmation("no"));
}

#[test]
fn requested_release_is_chosen_without_prompting() {
    let all = releases();
    let ui = TerminalInteraction {
        style: OutputStyle::Plain,
        release: Some("1.1.0".to_string()),
        assume_yes: false,
        progress: None,
    };
    let picked = ui.choose_release(&all, &all[0]).expect("release must be picked");
    assert_eq!(picked.version_label, "1.1.0");

    let missing = TerminalInteraction {
        release: Some("9.9.9".to_string()),
        ..ui
    };
    assert!(missing.choose_release(&all, &all[0]).is_none());
}

#[test]
fn assume_yes_picks_newest_and_discards_stale_updates() {
    let all = releases();
    let ui = TerminalInteraction {
        style: OutputStyle::Plain,
        release: None,
        assume_yes: true,
        progress: None,
    };
    let picked = ui.choose_release(&all, &all[0]).expect("release must be picked");
    assert_eq!(picked.version_label, "2.0.0");
    assert!(ui.confirm_discard_stale_delta());
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn update_flags_parse() {
    let cli = Cli::try_parse_from([
        "updraft",
        "--site-url",
        "file:///srv/site",
        "update",
        "--release",
        "2.0.0",
        "-y",
    ])
    .expect("must parse");
    assert_eq!(cli.site_url.as_deref(), Some("file:///srv/site"));
    match cli.command {
        Commands::Update { release, yes } => {
            assert_eq!(release.as_deref(), Some("2.0.0"));
            assert!(yes);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn global_flags_are_accepted_after_subcommand() {
    let cli = Cli::try_parse_from(["updraft", "status", "--json", "-vv", "--app-name", "Demo"])
        .expect("must parse");
    assert_eq!(cli.verbose, 2);
    assert_eq!(cli.app_name.as_deref(), Some("Demo"));
    assert!(matches!(cli.command, Commands::Status { json: true }));
}

#[test]
fn max_heap_requires_a_size() {
    let err = Cli::try_parse_from(["updraft", "max-heap"]).expect_err("size is required");
    assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

    let cli = Cli::try_parse_from(["updraft", "max-heap", "512m"]).expect("must parse");
    assert!(matches!(cli.command, Commands::MaxHeap { size } if size == "512m"));
}

#[test]
fn unknown_subcommand_is_rejected() {
    let err = Cli::try_parse_from(["updraft", "upgrade"]).expect_err("must reject");
    assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
}

#[test]
fn completions_mention_every_subcommand() {
    let mut out = Vec::new();
    write_completions(CliCompletionShell::Bash, &mut out).expect("must write completions");
    let script = String::from_utf8(out).expect("completions must be utf-8");
    assert!(script.contains("updraft"));
    for name in ["status", "releases", "update", "revert", "startup", "max-heap"] {
        assert!(script.contains(name), "missing {name}");
    }
}

#[test]
fn status_report_serializes_status_variant() {
    let report = StatusReport {
        app: "Demo".to_string(),
        installed: Some("Demo 1.0.0".to_string()),
        status: UpdateStatus::UpToDate(false),
    };
    let value = serde_json::to_value(&report).expect("must serialize");
    assert_eq!(value["app"], "Demo");
    assert_eq!(value["installed"], "Demo 1.0.0");
    assert_eq!(value["status"]["up_to_date"], false);
}

#[test]
fn file_urls_and_bare_paths_use_the_file_transport() {
    let dir = TempDir::new().expect("must create temp dir");
    let settings = Settings {
        site_url: dir.path().display().to_string(),
        app_name: "Demo".to_string(),
        install_root: dir.path().to_path_buf(),
        credential: None,
        timeout: std::time::Duration::from_secs(1),
    };
    let site = build_site(&settings).expect("must build site");
    assert_eq!(site.app_name(), "Demo");
    assert!(site.app_catalog_url().starts_with(&settings.site_url));
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("must build runtime")
        .block_on(future)
}

#[test]
fn interrupt_cancels_the_update_task() {
    let task = Task::new();
    let cancelled = block_on(crate::interrupt::cancel_when(
        &task.cancel_handle(),
        std::future::ready(Ok(())),
    ));
    assert!(cancelled);
    assert!(!task.is_active());
    assert!(!task.sub_task(0.0, 0.5).is_active());
}

#[test]
fn failed_interrupt_listener_leaves_task_running() {
    let task = Task::new();
    let cancelled = block_on(crate::interrupt::cancel_when(
        &task.cancel_handle(),
        std::future::ready(Err(std::io::Error::other("no signal support"))),
    ));
    assert!(!cancelled);
    assert!(task.is_active());
}
