use std::path::{Component, Path, PathBuf};

use updraft_core::{Platform, RuntimeVersion};

pub const APP_DIR: &str = "app";
pub const DELTA_DIR: &str = "delta";
pub const CONFIG_FILE: &str = "app.cfg";
pub const CATALOG_FILE: &str = "catalog.txt";
pub const SCRIPT_FILE: &str = "delta.cmd";
pub const LAUNCHER_DIR: &str = "launcher";
const ACTIVE_MARKER: &str = ".updraft-active";

/// Paths of one installation. The root holds `app/` (application files,
/// `app.cfg` and the installed `catalog.txt`), the bundled runtimes and,
/// while an update is pending, the `delta/` staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    root: PathBuf,
    platform: Platform,
}

impl InstallLayout {
    pub fn new(root: impl Into<PathBuf>, platform: Platform) -> Self {
        Self {
            root: root.into(),
            platform,
        }
    }

    /// The install root is the parent of the application directory.
    pub fn from_app_dir(app_dir: &Path, platform: Platform) -> Option<Self> {
        app_dir
            .parent()
            .map(|root| Self::new(root.to_path_buf(), platform))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn app_dir(&self) -> PathBuf {
        self.root.join(APP_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.app_dir().join(CONFIG_FILE)
    }

    pub fn installed_catalog_path(&self) -> PathBuf {
        self.app_dir().join(CATALOG_FILE)
    }

    pub fn delta_dir(&self) -> PathBuf {
        self.root.join(DELTA_DIR)
    }

    pub fn delta_app_dir(&self) -> PathBuf {
        self.delta_dir().join(APP_DIR)
    }

    pub fn script_path(&self) -> PathBuf {
        self.delta_dir().join(SCRIPT_FILE)
    }

    pub fn config_backup_path(&self, config_file: &Path) -> PathBuf {
        let name = config_file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| CONFIG_FILE.to_string());
        self.delta_dir().join(format!("{name}.old"))
    }

    pub fn runtime_dir_name(version: &RuntimeVersion) -> String {
        format!("jre{}", version.label())
    }

    pub fn staged_runtime_dir(&self, version: &RuntimeVersion) -> PathBuf {
        self.delta_dir().join(Self::runtime_dir_name(version))
    }

    /// Runtime path relative to the root; Apple bundles keep runtimes under `PlugIns/`.
    pub fn runtime_rel_path(&self, version: &RuntimeVersion) -> String {
        match self.platform {
            Platform::Apple => format!("PlugIns/{}", Self::runtime_dir_name(version)),
            Platform::Linux | Platform::Windows => Self::runtime_dir_name(version),
        }
    }

    pub fn runtime_dir(&self, version: &RuntimeVersion) -> PathBuf {
        self.root.join(self.runtime_rel_path(version))
    }

    pub fn staged_launcher_path(&self, file_name: &str) -> PathBuf {
        self.delta_dir().join(LAUNCHER_DIR).join(file_name)
    }

    pub fn launcher_rel_path(&self, file_name: &str) -> String {
        format!("{LAUNCHER_DIR}/{file_name}")
    }

    pub fn active_marker_path(&self) -> PathBuf {
        self.root.join(ACTIVE_MARKER)
    }

    /// `/`-separated path of `path` relative to the root, if it lies below it.
    pub fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let mut parts = Vec::new();
        for component in rel.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => return None,
            }
        }
        if parts.is_empty() {
            return None;
        }
        Some(parts.join("/"))
    }
}
