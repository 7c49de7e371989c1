use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::{Digest, PlainVersion, RuntimeVersion, VersionWindow};

const LEGACY_BUILD_TIME_FORMAT: &str = "%Y%b%d %H:%M:%S";

/// One published release of the application.
///
/// Equality is identity: name, version label and build time. Ordering is
/// build time only and is exposed through [`AppRelease::cmp_by_build_time`]
/// rather than `Ord`, so it can never end up keying a set or map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppRelease {
    pub app_name: String,
    pub version_label: String,
    pub build_time_millis: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

impl AppRelease {
    pub fn new(app_name: &str, version_label: &str, build_time_millis: i64) -> Self {
        Self {
            app_name: app_name.to_string(),
            version_label: version_label.to_string(),
            build_time_millis,
            info: None,
        }
    }

    pub fn build_time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.build_time_millis).single()
    }

    pub fn append_info(&mut self, line: &str) {
        match &mut self.info {
            Some(info) => {
                info.push('\n');
                info.push_str(line);
            }
            None => self.info = Some(line.to_string()),
        }
    }

    pub fn cmp_by_build_time(&self, other: &Self) -> Ordering {
        self.build_time_millis.cmp(&other.build_time_millis)
    }

    pub fn sort_by_build_time(releases: &mut [AppRelease]) {
        releases.sort_by(Self::cmp_by_build_time);
    }

    pub fn newest(releases: &[AppRelease]) -> Option<&AppRelease> {
        releases.iter().max_by(|a, b| a.cmp_by_build_time(b))
    }

    /// Accepts epoch milliseconds or the legacy deploy stamp (`2024Jan05 13:04:22`, UTC).
    pub fn parse_build_time(raw: &str) -> Option<i64> {
        let raw = raw.trim();
        if let Ok(millis) = raw.parse::<i64>() {
            return Some(millis);
        }
        NaiveDateTime::parse_from_str(raw, LEGACY_BUILD_TIME_FORMAT)
            .ok()
            .map(|naive| naive.and_utc().timestamp_millis())
    }
}

impl PartialEq for AppRelease {
    fn eq(&self, other: &Self) -> bool {
        self.app_name == other.app_name
            && self.version_label == other.version_label
            && self.build_time_millis == other.build_time_millis
    }
}

impl Eq for AppRelease {}

impl Hash for AppRelease {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.app_name.hash(state);
        self.version_label.hash(state);
        self.build_time_millis.hash(state);
    }
}

impl fmt::Display for AppRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.app_name, self.version_label)?;
        if let Some(built) = self.build_time() {
            write!(f, " ({})", built.format("%Y-%m-%d %H:%M"))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    X64,
    Aarch64,
    X86,
}

impl Architecture {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "x64" | "amd64" | "x86_64" => Some(Self::X64),
            "aarch64" | "arm64" => Some(Self::Aarch64),
            "x86" | "i386" | "i686" => Some(Self::X86),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::X64 => "x64",
            Self::Aarch64 => "aarch64",
            Self::X86 => "x86",
        }
    }

    pub fn current() -> Self {
        if cfg!(target_arch = "aarch64") {
            Self::Aarch64
        } else if cfg!(target_arch = "x86") {
            Self::X86
        } else {
            Self::X64
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Apple,
    Windows,
}

impl Platform {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "linux" => Some(Self::Linux),
            "apple" | "macosx" | "macos" | "osx" => Some(Self::Apple),
            "windows" | "win" => Some(Self::Windows),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Apple => "apple",
            Self::Windows => "windows",
        }
    }

    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::Apple
        } else if cfg!(windows) {
            Self::Windows
        } else {
            Self::Linux
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A downloadable runtime bundle from the runtime pool catalog.
#[derive(Debug, Clone)]
pub struct RuntimeRelease {
    pub version: RuntimeVersion,
    pub architecture: Architecture,
    pub platform: Platform,
    pub file_name: String,
    pub digest: Digest,
    pub length: u64,
    /// Launcher versions able to start this runtime.
    pub launcher_window: VersionWindow<PlainVersion>,
}

impl RuntimeRelease {
    fn sort_key(&self) -> (Architecture, Platform, &RuntimeVersion, &str, u64) {
        (
            self.architecture,
            self.platform,
            &self.version,
            self.file_name.as_str(),
            self.length,
        )
    }

    pub fn describe(&self) -> String {
        format!(
            "{} {}/{} ({}, {} bytes)",
            self.version, self.platform, self.architecture, self.file_name, self.length
        )
    }
}

impl Ord for RuntimeRelease {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for RuntimeRelease {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for RuntimeRelease {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RuntimeRelease {}

#[derive(Debug, Clone)]
pub struct LauncherRelease {
    pub version: PlainVersion,
    pub file_name: String,
    pub digest: Digest,
    pub length: u64,
}

impl LauncherRelease {
    pub fn describe(&self) -> String {
        format!("{} ({}, {} bytes)", self.version, self.file_name, self.length)
    }
}

impl Ord for LauncherRelease {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.version, self.file_name.as_str(), self.length).cmp(&(
            &other.version,
            other.file_name.as_str(),
            other.length,
        ))
    }
}

impl PartialOrd for LauncherRelease {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for LauncherRelease {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for LauncherRelease {}

/// Result of a non-interactive update check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    UpToDate(bool),
    Error(String),
}

impl UpdateStatus {
    pub fn is_up_to_date(&self) -> bool {
        matches!(self, Self::UpToDate(true))
    }
}
