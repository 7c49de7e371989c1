use std::io::IsTerminal;
use std::time::Duration;

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{ProgressBar, ProgressStyle};
use updraft_core::ProgressSink;

const PROGRESS_SCALE: u64 = 1000;
const PROGRESS_TEMPLATE: &str =
    "{spinner:.cyan.bold} {msg:<12} [{bar:20.cyan/blue}] {pos:>3}/{len:3} {elapsed_precise}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) fn current_output_style() -> OutputStyle {
    resolve_output_style(
        std::io::stdout().is_terminal(),
        std::env::var_os("NO_COLOR").is_some(),
    )
}

pub(crate) fn resolve_output_style(is_terminal: bool, no_color: bool) -> OutputStyle {
    if is_terminal && !no_color {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

fn badge_style(status: &str) -> Style {
    let color = match status {
        "ok" => AnsiColor::Green,
        "warn" => AnsiColor::Yellow,
        "err" => AnsiColor::Red,
        _ => AnsiColor::Cyan,
    };
    Style::new().fg_color(Some(color.into())).effects(Effects::BOLD)
}

/// One status line. Rich output prefixes a badge; plain output is the bare message.
pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => {
            let badge = match status {
                "ok" => "[OK]",
                "warn" => "[WARN]",
                "err" => "[ERR]",
                _ => "[..]",
            };
            let style = badge_style(status);
            format!("{style}{badge}{style:#} {message}")
        }
    }
}

pub(crate) fn colorize(style: OutputStyle, text: &str) -> String {
    match style {
        OutputStyle::Plain => text.to_string(),
        OutputStyle::Rich => {
            let bold = Style::new().effects(Effects::BOLD);
            format!("{bold}{text}{bold:#}")
        }
    }
}

/// Progress bar fed by the update worker's task tree.
pub(crate) struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    pub(crate) fn new(style: OutputStyle) -> Self {
        let bar = match style {
            OutputStyle::Rich => {
                let bar = ProgressBar::new(PROGRESS_SCALE);
                if let Ok(template) = ProgressStyle::with_template(PROGRESS_TEMPLATE) {
                    bar.set_style(template.progress_chars("=>-"));
                }
                bar.set_message("update");
                bar.enable_steady_tick(Duration::from_millis(80));
                bar
            }
            OutputStyle::Plain => ProgressBar::hidden(),
        };
        Self { bar }
    }

    /// Runs `f` with the bar cleared so prompts are not overdrawn.
    pub(crate) fn suspend<R>(&self, f: impl FnOnce() -> R) -> R {
        self.bar.suspend(f)
    }

    pub(crate) fn set_stage(&self, stage: &str) {
        self.bar.set_message(stage.to_string());
    }

    pub(crate) fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    pub(crate) fn abandon(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }
}

impl ProgressSink for TerminalProgress {
    fn on_progress(&self, fraction: f64) {
        let position = (fraction.clamp(0.0, 1.0) * PROGRESS_SCALE as f64).round() as u64;
        self.bar.set_position(position);
    }

    fn on_log(&self, line: &str) {
        tracing::debug!("{line}");
        if !self.bar.is_hidden() {
            self.bar.set_message(line.to_string());
        }
    }
}
