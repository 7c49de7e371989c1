use std::io::{self, BufRead, Write};
use std::sync::Arc;

use updraft_core::AppRelease;
use updraft_installer::Interaction;

use crate::render::{colorize, render_status_line, OutputStyle, TerminalProgress};

/// Answers engine questions on the terminal, or from flags when given.
pub(crate) struct TerminalInteraction {
    pub style: OutputStyle,
    /// Version label picked with `--release`; skips the selection prompt.
    pub release: Option<String>,
    pub assume_yes: bool,
    pub progress: Option<Arc<TerminalProgress>>,
}

impl TerminalInteraction {
    fn with_cleared_bar<R>(&self, f: impl FnOnce() -> R) -> R {
        match &self.progress {
            Some(progress) => progress.suspend(f),
            None => f(),
        }
    }

    fn read_answer(&self, question: &str) -> Option<String> {
        self.with_cleared_bar(|| {
            let mut stdout = io::stdout();
            write!(stdout, "{question}").ok()?;
            stdout.flush().ok()?;
            let mut line = String::new();
            match io::stdin().lock().read_line(&mut line) {
                Ok(0) | Err(_) => None,
                Ok(_) => Some(line),
            }
        })
    }
}

impl Interaction for TerminalInteraction {
    fn notify(&self, title: &str, message: &str) {
        let status = match title {
            "Update ready" | "Update installed" | "Update reverted" | "No updates available" => {
                "ok"
            }
            "Update cancelled" => "warn",
            title if title.contains("failed") => "err",
            _ => "info",
        };
        let line = render_status_line(
            self.style,
            status,
            &format!("{}: {message}", colorize(self.style, title)),
        );
        self.with_cleared_bar(|| println!("{line}"));
    }

    fn choose_release(
        &self,
        candidates: &[AppRelease],
        installed: &AppRelease,
    ) -> Option<AppRelease> {
        if let Some(label) = &self.release {
            let picked = candidates
                .iter()
                .find(|release| release.version_label == *label)
                .cloned();
            if picked.is_none() {
                tracing::warn!(release = %label, "requested release is not published");
            }
            return picked;
        }
        if self.assume_yes {
            return AppRelease::newest(candidates).cloned();
        }

        let listing = format_release_lines(candidates, installed).join("\n");
        self.with_cleared_bar(|| println!("{listing}"));
        let answer = self.read_answer("Install which release? [number, empty to cancel] ")?;
        parse_selection(&answer, candidates.len()).map(|index| candidates[index].clone())
    }

    fn confirm_discard_stale_delta(&self) -> bool {
        if self.assume_yes {
            return true;
        }
        self.read_answer("A previous update was never applied. Discard it? [y/N] ")
            .is_some_and(|answer| parse_confirmation(&answer))
    }
}

pub(crate) fn format_release_lines(
    candidates: &[AppRelease],
    installed: &AppRelease,
) -> Vec<String> {
    candidates
        .iter()
        .enumerate()
        .map(|(index, release)| {
            let marker = if release == installed { " (installed)" } else { "" };
            format!("{:>3}) {release}{marker}", index + 1)
        })
        .collect()
}

/// 1-based selection; empty or out-of-range input declines.
pub(crate) fn parse_selection(answer: &str, count: usize) -> Option<usize> {
    let index = answer.trim().parse::<usize>().ok()?;
    (1..=count).contains(&index).then(|| index - 1)
}

pub(crate) fn parse_confirmation(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
