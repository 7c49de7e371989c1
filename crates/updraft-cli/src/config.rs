use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use updraft_registry::Credential;

pub(crate) const CONFIG_FILE_NAME: &str = "updraft.toml";
const DEFAULT_PASSWORD_ENV: &str = "UPDRAFT_PASSWORD";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Contents of `updraft.toml`. Every field may also come from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct UpdraftConfig {
    pub site_url: Option<String>,
    pub app_name: Option<String>,
    pub username: Option<String>,
    pub password_env: Option<String>,
    pub install_root: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

impl UpdraftConfig {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()))
            }
        };
        toml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
    }
}

/// Values given on the command line; they win over the file.
#[derive(Debug, Clone, Default)]
pub(crate) struct Overrides {
    pub site_url: Option<String>,
    pub app_name: Option<String>,
    pub install_root: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub site_url: String,
    pub app_name: String,
    pub install_root: PathBuf,
    pub credential: Option<Credential>,
    pub timeout: Duration,
}

impl Settings {
    pub(crate) fn resolve<F>(
        config: UpdraftConfig,
        overrides: Overrides,
        host_install_root: Option<PathBuf>,
        lookup_env: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let site_url = overrides
            .site_url
            .or(config.site_url)
            .ok_or_else(|| anyhow!("no update site configured (set site_url or --site-url)"))?;
        let app_name = overrides
            .app_name
            .or(config.app_name)
            .ok_or_else(|| {
                anyhow!("no application name configured (set app_name or --app-name)")
            })?;
        let install_root = overrides
            .install_root
            .or(host_install_root)
            .or(config.install_root)
            .ok_or_else(|| {
                anyhow!("no install root configured (set install_root or --install-root)")
            })?;

        let credential = match config.username {
            Some(username) => {
                let variable = config
                    .password_env
                    .unwrap_or_else(|| DEFAULT_PASSWORD_ENV.to_string());
                let secret = lookup_env(&variable).ok_or_else(|| {
                    anyhow!("password environment variable {variable} is not set for user {username}")
                })?;
                Some(Credential::new(username, secret))
            }
            None => None,
        };

        Ok(Self {
            site_url,
            app_name,
            install_root,
            credential,
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        })
    }
}

/// `--config` wins, then `updraft.toml` in the install root, then the working directory.
pub(crate) fn config_path(explicit: Option<&Path>, install_root: Option<&Path>) -> PathBuf {
    match (explicit, install_root) {
        (Some(path), _) => path.to_path_buf(),
        (None, Some(root)) => root.join(CONFIG_FILE_NAME),
        (None, None) => PathBuf::from(CONFIG_FILE_NAME),
    }
}

/// Accepts plain bytes or a `k`, `m` or `g` suffix (binary multiples).
pub(crate) fn parse_heap_size(raw: &str) -> Result<u64> {
    let trimmed = raw.trim().to_ascii_lowercase();
    let (digits, multiplier) = match trimmed.char_indices().last() {
        Some((at, 'k')) => (&trimmed[..at], 1024),
        Some((at, 'm')) => (&trimmed[..at], 1024 * 1024),
        Some((at, 'g')) => (&trimmed[..at], 1024 * 1024 * 1024),
        _ => (trimmed.as_str(), 1),
    };
    let value = digits
        .parse::<u64>()
        .with_context(|| format!("invalid heap size '{raw}'"))?;
    if value == 0 {
        return Err(anyhow!("heap size must be positive"));
    }
    value
        .checked_mul(multiplier)
        .ok_or_else(|| anyhow!("heap size '{raw}' is too large"))
}
