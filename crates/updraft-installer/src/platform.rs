use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use updraft_core::{AppRelease, ConfigMutationError, LauncherRelease, Platform, RuntimeVersion};

const LEGACY_BUILD_DATE_FORMAT: &str = "%Y%b%d %H:%M:%S";

/// Points the installed application at a runtime, launcher and release.
/// Changes take effect the next time the launcher starts the application.
pub trait PlatformConfig {
    fn platform_kind(&self) -> Platform;
    fn config_file(&self) -> PathBuf;
    fn set_runtime_version(&self, version: &RuntimeVersion) -> Result<(), ConfigMutationError>;
    fn set_launcher(&self, launcher: &LauncherRelease) -> Result<(), ConfigMutationError>;
    fn set_max_heap_bytes(&self, bytes: u64) -> Result<(), ConfigMutationError>;
    fn apply_release_metadata(&self, release: &AppRelease) -> Result<(), ConfigMutationError>;
}

/// `app.cfg` is a list of `-instruction` lines, each followed by its value
/// lines. Instructions this type does not manage are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppConfig {
    preamble: Vec<String>,
    sections: Vec<(String, Vec<String>)>,
}

impl AppConfig {
    pub fn parse(raw: &str) -> Self {
        let mut config = Self::default();
        for line in raw.lines() {
            if let Some(instruction) = line.strip_prefix('-') {
                config
                    .sections
                    .push((instruction.trim().to_string(), Vec::new()));
            } else if let Some((_, values)) = config.sections.last_mut() {
                values.push(line.to_string());
            } else {
                config.preamble.push(line.to_string());
            }
        }
        config
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.preamble {
            out.push_str(line);
            out.push('\n');
        }
        for (instruction, values) in &self.sections {
            out.push('-');
            out.push_str(instruction);
            out.push('\n');
            for value in values {
                out.push_str(value);
                out.push('\n');
            }
        }
        out
    }

    pub fn value(&self, instruction: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|(name, _)| name == instruction)
            .and_then(|(_, values)| values.iter().map(|v| v.trim()).find(|v| !v.is_empty()))
    }

    pub fn set(&mut self, instruction: &str, value: &str) {
        let values = vec![value.to_string()];
        match self.sections.iter_mut().find(|(name, _)| name == instruction) {
            Some((_, existing)) => *existing = values,
            None => self.sections.push((instruction.to_string(), values)),
        }
    }

    /// The release this configuration describes, if it names one.
    pub fn release(&self) -> Option<AppRelease> {
        let name = self.value("name")?;
        let version = self.value("version")?;
        let build_time = self
            .value("buildDate")
            .and_then(AppRelease::parse_build_time)
            .unwrap_or(0);
        Some(AppRelease::new(name, version, build_time))
    }
}

/// Reads the installed release from a configuration file.
pub fn read_installed_release(path: &Path) -> io::Result<Option<AppRelease>> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(AppConfig::parse(&raw).release()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// [`PlatformConfig`] over the application's `app.cfg`.
#[derive(Debug, Clone)]
pub struct AppCfgPlatform {
    path: PathBuf,
    platform: Platform,
}

impl AppCfgPlatform {
    pub fn new(path: impl Into<PathBuf>, platform: Platform) -> Self {
        Self {
            path: path.into(),
            platform,
        }
    }

    fn edit<F>(&self, action: &str, apply: F) -> Result<(), ConfigMutationError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let raw = fs::read_to_string(&self.path).map_err(|err| {
            ConfigMutationError::new(action, format!("{}: {err}", self.path.display()))
        })?;
        let mut config = AppConfig::parse(&raw);
        apply(&mut config);

        let temp = self.path.with_extension("cfg.tmp");
        fs::write(&temp, config.render())
            .and_then(|()| fs::rename(&temp, &self.path))
            .map_err(|err| {
                let _ = fs::remove_file(&temp);
                ConfigMutationError::new(action, format!("{}: {err}", self.path.display()))
            })?;
        tracing::debug!(path = %self.path.display(), "{action}");
        Ok(())
    }
}

impl PlatformConfig for AppCfgPlatform {
    fn platform_kind(&self) -> Platform {
        self.platform
    }

    fn config_file(&self) -> PathBuf {
        self.path.clone()
    }

    fn set_runtime_version(&self, version: &RuntimeVersion) -> Result<(), ConfigMutationError> {
        self.edit("set runtime version", |config| {
            config.set("jreVersion", version.label())
        })
    }

    fn set_launcher(&self, launcher: &LauncherRelease) -> Result<(), ConfigMutationError> {
        self.edit("set launcher", |config| {
            config.set("launcherVersion", &launcher.version.to_string());
            config.set("launcherFile", &launcher.file_name);
        })
    }

    fn set_max_heap_bytes(&self, bytes: u64) -> Result<(), ConfigMutationError> {
        if bytes == 0 {
            return Err(ConfigMutationError::new(
                "set maximum heap",
                "heap size must be positive",
            ));
        }
        self.edit("set maximum heap", |config| {
            config.set("maxHeap", &bytes.to_string())
        })
    }

    fn apply_release_metadata(&self, release: &AppRelease) -> Result<(), ConfigMutationError> {
        // The legacy date has whole-second precision; keep raw millis otherwise.
        let build_date = release
            .build_time()
            .filter(|_| release.build_time_millis % 1000 == 0)
            .map(|time| time.format(LEGACY_BUILD_DATE_FORMAT).to_string())
            .unwrap_or_else(|| release.build_time_millis.to_string());
        self.edit("apply release metadata", |config| {
            config.set("name", &release.app_name);
            config.set("version", &release.version_label);
            config.set("buildDate", &build_date);
        })
    }
}
