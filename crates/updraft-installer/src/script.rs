//! The recovery script (`delta/delta.cmd`) written next to every staged update.
//!
//! ```text
//! sect,fail
//! copy,delta/app.cfg.old,app/app.cfg
//! reboot,trash,jre17.0.2
//! exit
//!
//! sect,pass
//! trash,jre11.0.1
//! exit
//! ```
//!
//! `fail` undoes what the apply changed and `pass` removes what the update
//! superseded. `reboot` and `test` are reserved and always empty. Every path
//! is relative to the install root and is checked before anything runs.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::fs_utils::{copy_path, move_path, remove_path_if_exists};
use crate::ScriptError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    Fail,
    Pass,
    Reboot,
    Test,
}

impl SectionKind {
    const ALL: [SectionKind; 4] = [Self::Fail, Self::Pass, Self::Reboot, Self::Test];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Pass => "pass",
            Self::Reboot => "reboot",
            Self::Test => "test",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptCommand {
    Trash(String),
    Copy(String, String),
    Move(String, String),
    /// Only touches staged artifacts that are not live yet, so it runs immediately.
    Reboot(Box<ScriptCommand>),
}

impl ScriptCommand {
    fn paths(&self) -> Vec<&str> {
        match self {
            Self::Trash(path) => vec![path.as_str()],
            Self::Copy(from, to) | Self::Move(from, to) => vec![from.as_str(), to.as_str()],
            Self::Reboot(inner) => inner.paths(),
        }
    }

    fn parse(fields: &[&str], line: usize) -> Result<Self, ScriptError> {
        let malformed = |reason: &str| ScriptError::Malformed {
            line,
            reason: reason.to_string(),
        };
        match fields {
            ["trash", path] => Ok(Self::Trash(path.to_string())),
            ["copy", from, to] => Ok(Self::Copy(from.to_string(), to.to_string())),
            ["move", from, to] => Ok(Self::Move(from.to_string(), to.to_string())),
            ["reboot", inner @ ..] if !inner.is_empty() => {
                if inner[0] == "reboot" {
                    return Err(malformed("nested reboot command"));
                }
                Ok(Self::Reboot(Box::new(Self::parse(inner, line)?)))
            }
            [kind, ..] => Err(malformed(&format!("unknown or incomplete command '{kind}'"))),
            [] => Err(malformed("empty command")),
        }
    }
}

impl fmt::Display for ScriptCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trash(path) => write!(f, "trash,{path}"),
            Self::Copy(from, to) => write!(f, "copy,{from},{to}"),
            Self::Move(from, to) => write!(f, "move,{from},{to}"),
            Self::Reboot(inner) => write!(f, "reboot,{inner}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecoveryScript {
    fail: Vec<ScriptCommand>,
    pass: Vec<ScriptCommand>,
    reboot: Vec<ScriptCommand>,
    test: Vec<ScriptCommand>,
}

/// What running one section did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionReport {
    pub executed: Vec<String>,
    pub skipped: Vec<String>,
}

impl RecoveryScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(&self, kind: SectionKind) -> &[ScriptCommand] {
        match kind {
            SectionKind::Fail => &self.fail,
            SectionKind::Pass => &self.pass,
            SectionKind::Reboot => &self.reboot,
            SectionKind::Test => &self.test,
        }
    }

    fn section_mut(&mut self, kind: SectionKind) -> &mut Vec<ScriptCommand> {
        match kind {
            SectionKind::Fail => &mut self.fail,
            SectionKind::Pass => &mut self.pass,
            SectionKind::Reboot => &mut self.reboot,
            SectionKind::Test => &mut self.test,
        }
    }

    pub fn push(&mut self, kind: SectionKind, command: ScriptCommand) -> Result<(), ScriptError> {
        for path in command.paths() {
            check_lexical(path, Path::new("."))?;
        }
        self.section_mut(kind).push(command);
        Ok(())
    }

    pub fn parse(raw: &str) -> Result<Self, ScriptError> {
        let mut script = Self::new();
        let mut seen: Vec<SectionKind> = Vec::new();
        let mut current: Option<SectionKind> = None;

        for (index, line) in raw.lines().enumerate() {
            let line_no = index + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let malformed = |reason: String| ScriptError::Malformed {
                line: line_no,
                reason,
            };

            match (fields.as_slice(), current) {
                (["sect", name], None) => {
                    let kind = SectionKind::parse(name)
                        .ok_or_else(|| malformed(format!("unknown section '{name}'")))?;
                    if seen.contains(&kind) {
                        return Err(malformed(format!("duplicate section '{kind}'")));
                    }
                    seen.push(kind);
                    current = Some(kind);
                }
                (["sect", ..], Some(open)) => {
                    return Err(malformed(format!("section opened inside '{open}'")));
                }
                (["exit"], Some(_)) => current = None,
                (["exit"], None) => return Err(malformed("exit outside of a section".to_string())),
                (_, None) => {
                    return Err(malformed(format!("command outside of a section: {line}")));
                }
                (fields, Some(kind)) => {
                    let command = ScriptCommand::parse(fields, line_no)?;
                    for path in command.paths() {
                        check_lexical(path, Path::new("."))?;
                    }
                    script.section_mut(kind).push(command);
                }
            }
        }

        if let Some(open) = current {
            return Err(ScriptError::Unterminated {
                section: open.to_string(),
            });
        }
        Ok(script)
    }

    pub fn render(&self) -> String {
        let mut out = String::from("# Recovery commands for a pending update\n");
        for kind in SectionKind::ALL {
            out.push_str(&format!("\nsect,{kind}\n"));
            for command in self.section(kind) {
                out.push_str(&format!("{command}\n"));
            }
            out.push_str("exit\n");
        }
        out
    }

    pub fn load(path: &Path) -> Result<Option<Self>, ScriptError> {
        match fs::read_to_string(path) {
            Ok(raw) => Self::parse(&raw).map(Some),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(ScriptError::io(path, err)),
        }
    }

    pub fn write(&self, path: &Path) -> Result<(), ScriptError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| ScriptError::io(parent, err))?;
        }
        let temp = path.with_extension("cmd.tmp");
        fs::write(&temp, self.render()).map_err(|err| ScriptError::io(&temp, err))?;
        fs::rename(&temp, path).map_err(|err| ScriptError::io(path, err))
    }

    /// Runs one section against `root`. Every path of the section is
    /// validated before the first command executes.
    pub fn run_section(
        &self,
        kind: SectionKind,
        root: &Path,
    ) -> Result<SectionReport, ScriptError> {
        let canonical_root = root
            .canonicalize()
            .map_err(|err| ScriptError::io(root, err))?;
        let commands = self.section(kind);
        for command in commands {
            for path in command.paths() {
                resolve_checked(path, root, &canonical_root)?;
            }
        }

        let mut report = SectionReport::default();
        for command in commands {
            let ran = execute(command, root, &canonical_root)?;
            tracing::info!(section = %kind, %command, ran, "recovery command");
            if ran {
                report.executed.push(command.to_string());
            } else {
                report.skipped.push(command.to_string());
            }
        }
        Ok(report)
    }
}

/// Returns `false` when there was nothing to act on.
fn execute(
    command: &ScriptCommand,
    root: &Path,
    canonical_root: &Path,
) -> Result<bool, ScriptError> {
    match command {
        ScriptCommand::Trash(path) => {
            let target = resolve_checked(path, root, canonical_root)?;
            remove_path_if_exists(&target).map_err(|err| ScriptError::io(&target, err))
        }
        ScriptCommand::Copy(from, to) | ScriptCommand::Move(from, to) => {
            let source = resolve_checked(from, root, canonical_root)?;
            let destination = resolve_checked(to, root, canonical_root)?;
            if fs::symlink_metadata(&source).is_err() {
                tracing::warn!(source = %source.display(), "recovery source is missing");
                return Ok(false);
            }
            remove_path_if_exists(&destination)
                .map_err(|err| ScriptError::io(&destination, err))?;
            let result = if matches!(command, ScriptCommand::Copy(..)) {
                copy_path(&source, &destination)
            } else {
                move_path(&source, &destination)
            };
            result.map_err(|err| ScriptError::io(&destination, err))?;
            Ok(true)
        }
        ScriptCommand::Reboot(inner) => execute(inner, root, canonical_root),
    }
}

/// Rejects absolute paths and `..` that climb above the root.
fn check_lexical(path: &str, root: &Path) -> Result<PathBuf, ScriptError> {
    let escape = || ScriptError::PathEscape {
        path: path.to_string(),
        root: root.to_path_buf(),
    };
    if path.is_empty() {
        return Err(escape());
    }
    let mut normalized = PathBuf::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(escape());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(escape()),
        }
    }
    if normalized.as_os_str().is_empty() {
        return Err(escape());
    }
    Ok(normalized)
}

/// Lexical check plus a canonical check of the deepest existing ancestor, so
/// symlinked directories cannot lead outside the root.
fn resolve_checked(
    path: &str,
    root: &Path,
    canonical_root: &Path,
) -> Result<PathBuf, ScriptError> {
    let relative = check_lexical(path, root)?;
    let target = root.join(&relative);

    let mut ancestor = target.parent();
    while let Some(candidate) = ancestor {
        if candidate.exists() {
            let canonical = candidate
                .canonicalize()
                .map_err(|err| ScriptError::io(candidate, err))?;
            if !canonical.starts_with(canonical_root) {
                return Err(ScriptError::PathEscape {
                    path: path.to_string(),
                    root: root.to_path_buf(),
                });
            }
            break;
        }
        ancestor = candidate.parent();
    }
    Ok(target)
}
