mod completion;
mod config;
mod interrupt;
mod prompt;
mod render;
#[cfg(test)]
mod tests;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use updraft_core::{HostState, Platform, Task, UpdateOutcome, UpdateStatus};
use updraft_installer::{
    interaction_channel, serve_interaction, spawn_update_worker, AppCfgPlatform, ApplyOutcome,
    InstallLayout, Interaction, PlatformConfig, UpdateEngine,
};
use updraft_registry::{FileTransport, HttpTransport, Transport, UpdateSite};

use completion::{write_completions, CliCompletionShell};
use config::{config_path, Overrides, Settings, UpdraftConfig};
use interrupt::cancel_on_interrupt;
use prompt::{format_release_lines, TerminalInteraction};
use render::{current_output_style, render_status_line, OutputStyle, TerminalProgress};

#[derive(Parser, Debug)]
#[command(name = "updraft")]
#[command(about = "Self-update engine for launcher-managed applications", long_about = None)]
struct Cli {
    /// Path to updraft.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    site_url: Option<String>,
    #[arg(long, global = true)]
    app_name: Option<String>,
    #[arg(long, global = true)]
    install_root: Option<PathBuf>,
    /// Repeat for more detail (-v info, -vv debug).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Report whether the installed release is the newest one.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// List published releases.
    Releases,
    /// Stage a release; it goes live on the next restart.
    Update {
        /// Version label to install instead of prompting.
        #[arg(long)]
        release: Option<String>,
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Discard a staged update that has not gone live yet.
    Revert,
    /// Finish or roll back the previous update, as reported by the launcher.
    Startup,
    /// Set the maximum heap of the application (e.g. 512m, 2g).
    MaxHeap { size: String },
    Completions {
        #[arg(value_enum)]
        shell: CliCompletionShell,
    },
}

#[derive(Debug, Serialize)]
struct StatusReport {
    app: String,
    installed: Option<String>,
    status: UpdateStatus,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    run_cli(cli)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Everything a command needs once the configuration is resolved.
struct Session {
    settings: Settings,
    layout: InstallLayout,
    host: HostState,
    style: OutputStyle,
}

impl Session {
    fn open(cli: &Cli, style: OutputStyle) -> Result<Self> {
        let host = HostState::from_env().context("failed to read launcher environment")?;
        let root_hint = cli.install_root.clone().or_else(|| host.install_root.clone());
        let config_file = config_path(cli.config.as_deref(), root_hint.as_deref());
        let file_config = UpdraftConfig::load(&config_file)?;
        let settings = Settings::resolve(
            file_config,
            Overrides {
                site_url: cli.site_url.clone(),
                app_name: cli.app_name.clone(),
                install_root: cli.install_root.clone(),
            },
            host.install_root.clone(),
            |name| std::env::var(name).ok(),
        )?;
        tracing::debug!(
            config = %config_file.display(),
            site = %settings.site_url,
            root = %settings.install_root.display(),
            "resolved settings"
        );

        let layout = InstallLayout::new(&settings.install_root, Platform::current());
        Ok(Self {
            settings,
            layout,
            host,
            style,
        })
    }

    fn engine(&self) -> Result<UpdateEngine> {
        build_engine(
            &self.settings,
            &self.layout,
            self.host.clone(),
            plain_interaction(self.style),
        )
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    let style = current_output_style();

    match &cli.command {
        Commands::Status { json } => {
            let session = Session::open(&cli, style)?;
            let mut engine = session.engine()?;
            let installed = engine.installed_release()?.map(|release| release.to_string());
            let status = engine.check_status();
            if *json {
                let report = StatusReport {
                    app: session.settings.app_name.clone(),
                    installed,
                    status,
                };
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", status_line(style, installed.as_deref(), &status));
            }
        }
        Commands::Releases => {
            let session = Session::open(&cli, style)?;
            let engine = session.engine()?;
            let releases = engine.list_releases()?;
            if releases.is_empty() {
                println!("No releases published for {}", session.settings.app_name);
            } else {
                match engine.installed_release()? {
                    Some(installed) => {
                        for line in format_release_lines(&releases, &installed) {
                            println!("{line}");
                        }
                    }
                    None => {
                        for release in &releases {
                            println!("{release}");
                        }
                    }
                }
            }
        }
        Commands::Update { release, yes } => {
            let session = Session::open(&cli, style)?;
            run_update(&session, release.clone(), *yes)?;
        }
        Commands::Revert => {
            let mut engine = Session::open(&cli, style)?.engine()?;
            if !engine.revert_update()? {
                println!(
                    "{}",
                    render_status_line(style, "info", "No pending update to revert")
                );
            }
        }
        Commands::Startup => {
            let mut engine = Session::open(&cli, style)?.engine()?;
            if engine.handle_startup()? == UpdateOutcome::None {
                tracing::info!("no previous update to finish");
            }
        }
        Commands::MaxHeap { size } => {
            let session = Session::open(&cli, style)?;
            let bytes = config::parse_heap_size(size)?;
            let platform =
                AppCfgPlatform::new(session.layout.config_path(), session.layout.platform());
            platform
                .set_max_heap_bytes(bytes)
                .with_context(|| format!("failed to set max heap to {size}"))?;
            println!(
                "{}",
                render_status_line(style, "ok", &format!("max heap set to {bytes} bytes"))
            );
        }
        Commands::Completions { shell } => {
            write_completions(*shell, &mut io::stdout().lock())?;
        }
    }

    Ok(())
}

fn plain_interaction(style: OutputStyle) -> TerminalInteraction {
    TerminalInteraction {
        style,
        release: None,
        assume_yes: false,
        progress: None,
    }
}

fn status_line(style: OutputStyle, installed: Option<&str>, status: &UpdateStatus) -> String {
    let installed = installed.unwrap_or("unknown release");
    match status {
        UpdateStatus::UpToDate(true) => {
            render_status_line(style, "ok", &format!("{installed} is up to date"))
        }
        UpdateStatus::UpToDate(false) => {
            render_status_line(style, "warn", &format!("{installed} has an update available"))
        }
        UpdateStatus::Error(reason) => {
            render_status_line(style, "err", &format!("update check failed: {reason}"))
        }
    }
}

fn build_site(settings: &Settings) -> Result<UpdateSite> {
    let url = settings.site_url.as_str();
    let transport: Arc<dyn Transport> = if url.starts_with("file://") || !url.contains("://") {
        Arc::new(FileTransport)
    } else {
        Arc::new(
            HttpTransport::new(settings.credential.clone(), settings.timeout)
                .context("failed to create HTTP client")?,
        )
    };
    Ok(UpdateSite::new(url, &settings.app_name, transport))
}

fn build_engine(
    settings: &Settings,
    layout: &InstallLayout,
    host: HostState,
    ui: impl Interaction + Send + 'static,
) -> Result<UpdateEngine> {
    let site = build_site(settings)?;
    let platform = AppCfgPlatform::new(layout.config_path(), layout.platform());
    Ok(UpdateEngine::new(
        layout.clone(),
        site,
        host,
        Box::new(platform),
        Box::new(ui),
    ))
}

fn run_update(session: &Session, release: Option<String>, assume_yes: bool) -> Result<()> {
    let style = session.style;
    let progress = Arc::new(TerminalProgress::new(style));
    let (channel, requests) = interaction_channel();
    let observer_progress = Arc::clone(&progress);
    let engine = build_engine(
        &session.settings,
        &session.layout,
        session.host.clone(),
        channel,
    )?;
    let engine = engine.with_observer(move |state| observer_progress.set_stage(state.as_str()));

    let task = Task::with_sink(progress.clone());
    if let Err(err) = cancel_on_interrupt(task.cancel_handle()) {
        tracing::warn!("Ctrl-C will not cancel this update: {err}");
    }
    let worker = spawn_update_worker(engine, task).context("failed to start update worker")?;

    let terminal = TerminalInteraction {
        style,
        release,
        assume_yes,
        progress: Some(Arc::clone(&progress)),
    };
    serve_interaction(&requests, &terminal);

    let result = worker
        .join()
        .map_err(|_| anyhow!("update worker panicked"))?;
    match result {
        Ok(ApplyOutcome::Applied(applied)) => {
            progress.finish("staged");
            tracing::info!(
                reused = applied.transfer.reused.len(),
                fetched = applied.transfer.fetched.len(),
                bytes = applied.transfer.bytes,
                "update staged"
            );
            println!(
                "{}",
                render_status_line(
                    style,
                    "ok",
                    &format!("{} will be installed on the next restart", applied.release)
                )
            );
        }
        Ok(ApplyOutcome::UpToDate) => progress.finish("up to date"),
        Ok(ApplyOutcome::Declined) => progress.abandon("declined"),
        Ok(ApplyOutcome::Cancelled) => progress.abandon("cancelled"),
        Err(err) => {
            progress.abandon("failed");
            return Err(err).context("update failed");
        }
    }
    Ok(())
}
