//! Line-oriented catalog protocol.
//!
//! Every catalog is UTF-8 text with one comma-delimited record per line.
//! Blank lines and `#` comments are ignored; unrecognized records are logged
//! and skipped. `exit` stops parsing, optionally only when a running
//! component is older than a required version, which lets old clients ignore
//! syntax they do not understand.

mod app;
mod artifact;
mod launcher;
mod runtime;

use std::io::BufRead;

use crate::{engine_version, PlainVersion, ProtocolError};

pub use app::parse_app_catalog;
pub use artifact::parse_artifact_catalog;
pub use launcher::parse_launcher_catalog;
pub use runtime::parse_runtime_catalog;

/// Component name of the native launcher in `exit` and `require` records.
pub const LAUNCHER_COMPONENT: &str = "AppLauncher";
/// Component name of this update engine in `exit` records.
pub const ENGINE_COMPONENT: &str = "DistMaker";

/// Versions of the running components, consulted by `exit` directives.
#[derive(Debug, Clone)]
pub struct ParseContext {
    pub origin: String,
    pub engine_version: PlainVersion,
    /// `None` when the launcher did not report a version; treated as `0.0`.
    pub launcher_version: Option<PlainVersion>,
}

impl ParseContext {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            engine_version: engine_version(),
            launcher_version: None,
        }
    }

    pub fn with_launcher_version(mut self, version: Option<PlainVersion>) -> Self {
        self.launcher_version = version;
        self
    }

    pub fn with_engine_version(mut self, version: PlainVersion) -> Self {
        self.engine_version = version;
        self
    }

    fn evaluated_version(&self, component: &str) -> Option<PlainVersion> {
        match component {
            ENGINE_COMPONENT => Some(self.engine_version.clone()),
            LAUNCHER_COMPONENT => Some(
                self.launcher_version
                    .clone()
                    .unwrap_or_else(|| PlainVersion::new(0, 0, 0)),
            ),
            _ => None,
        }
    }

    /// Decides whether an `exit` record ends parsing.
    ///
    /// Only the three-token form is conditional. The required version is
    /// compared major then minor; components that are missing or unparsable
    /// count as infinitely large.
    pub fn should_exit(&self, fields: &[&str]) -> bool {
        let [_, component, needed] = fields else {
            return true;
        };
        let Some(evaluated) = self.evaluated_version(component.trim()) else {
            return true;
        };

        let mut tokens = needed.trim().split('.');
        let mut next = || {
            tokens
                .next()
                .and_then(|token| token.trim().parse::<u64>().ok())
                .unwrap_or(u64::MAX)
        };
        let need_major = next();
        let need_minor = next();

        need_major > evaluated.major()
            || (need_major == evaluated.major() && need_minor > evaluated.minor())
    }
}

pub(crate) struct Record<'a> {
    pub line_no: usize,
    pub raw: &'a str,
}

impl<'a> Record<'a> {
    pub fn fields(&self) -> Vec<&'a str> {
        self.raw.split(',').collect()
    }

    pub fn fields_n(&self, limit: usize) -> Vec<&'a str> {
        self.raw.splitn(limit, ',').collect()
    }

    pub fn kind(&self) -> &'a str {
        self.raw.split(',').next().unwrap_or_default()
    }
}

pub(crate) enum Flow {
    Continue,
    Stop,
}

/// Feeds every meaningful line of `reader` to `handle` until it asks to stop.
pub(crate) fn for_each_record<R, F>(
    reader: R,
    ctx: &ParseContext,
    mut handle: F,
) -> Result<(), ProtocolError>
where
    R: BufRead,
    F: FnMut(&Record<'_>) -> Flow,
{
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| ProtocolError::Read {
            origin: ctx.origin.clone(),
            source,
        })?;
        let trimmed = line.trim_end_matches('\r');
        if trimmed.trim().is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let record = Record {
            line_no: index + 1,
            raw: trimmed,
        };
        if let Flow::Stop = handle(&record) {
            break;
        }
    }
    Ok(())
}

/// A bare file name: no separators, no `.`/`..`, nothing absolute.
/// Runtime and launcher files are stored under this name inside the install.
pub fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', ':'])
        && !name.chars().any(char::is_control)
}

pub(crate) fn skip(ctx: &ParseContext, record: &Record<'_>, reason: &str) {
    tracing::warn!(
        origin = %ctx.origin,
        line = record.line_no,
        "skipping catalog record ({reason}): {}",
        record.raw
    );
}
