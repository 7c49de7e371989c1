use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{PlainVersion, RuntimeVersion, VersionError};

pub const ENV_UPDATE_CODE: &str = "UPDRAFT_UPDATE_CODE";
pub const ENV_UPDATE_MSG: &str = "UPDRAFT_UPDATE_MSG";
pub const ENV_DEVELOPER_MODE: &str = "UPDRAFT_DEVELOPER_MODE";
pub const ENV_INSTALL_ROOT: &str = "UPDRAFT_INSTALL_ROOT";
pub const ENV_LAUNCHER_VERSION: &str = "UPDRAFT_LAUNCHER_VERSION";
pub const ENV_RUNTIME_VERSION: &str = "UPDRAFT_RUNTIME_VERSION";
pub const ENV_RUNTIME_EXTERNAL: &str = "UPDRAFT_RUNTIME_EXTERNAL";

#[derive(Debug, thiserror::Error)]
pub enum HostStateError {
    #[error("invalid value for {name}: '{value}'")]
    InvalidValue { name: &'static str, value: String },

    #[error("invalid value for {name}: {source}")]
    InvalidVersion {
        name: &'static str,
        #[source]
        source: VersionError,
    },
}

/// Outcome of the previous update, reported by the launcher at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateOutcome {
    #[default]
    None,
    Passed,
    Failed,
}

impl UpdateOutcome {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Passed),
            2 => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Values the host launcher injects at process start. Built once and passed
/// by reference; the engine only reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostState {
    pub outcome: UpdateOutcome,
    pub outcome_message: Option<String>,
    pub developer_mode: bool,
    pub install_root: Option<PathBuf>,
    pub launcher_version: Option<PlainVersion>,
    pub runtime_version: Option<RuntimeVersion>,
    /// The application runs on a system runtime it cannot replace.
    pub runtime_external: bool,
}

impl HostState {
    pub fn from_env() -> Result<Self, HostStateError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, HostStateError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let outcome = match read(ENV_UPDATE_CODE) {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .and_then(UpdateOutcome::from_code)
                .ok_or(HostStateError::InvalidValue {
                    name: ENV_UPDATE_CODE,
                    value: raw,
                })?,
            None => UpdateOutcome::None,
        };

        let launcher_version = read(ENV_LAUNCHER_VERSION)
            .map(|raw| PlainVersion::parse(&raw))
            .transpose()
            .map_err(|source| HostStateError::InvalidVersion {
                name: ENV_LAUNCHER_VERSION,
                source,
            })?;
        let runtime_version = read(ENV_RUNTIME_VERSION)
            .map(|raw| RuntimeVersion::parse(&raw))
            .transpose()
            .map_err(|source| HostStateError::InvalidVersion {
                name: ENV_RUNTIME_VERSION,
                source,
            })?;

        Ok(Self {
            outcome,
            outcome_message: read(ENV_UPDATE_MSG),
            developer_mode: read(ENV_DEVELOPER_MODE).is_some_and(|raw| parse_flag(&raw)),
            install_root: read(ENV_INSTALL_ROOT).map(PathBuf::from),
            launcher_version,
            runtime_version,
            runtime_external: read(ENV_RUNTIME_EXTERNAL).is_some_and(|raw| parse_flag(&raw)),
        })
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
