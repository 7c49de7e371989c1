use updraft_core::{
    Architecture, CompatibilityError, LauncherRelease, Platform, PlainVersion, ProtocolError,
    RuntimeRelease, RuntimeVersion,
};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Compatibility(#[from] CompatibilityError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeChange {
    Upgrade,
    Downgrade,
}

impl RuntimeChange {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upgrade => "upgraded",
            Self::Downgrade => "downgraded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeRequirement {
    Keep,
    Change(RuntimeChange),
}

/// What is currently installed and where it runs.
#[derive(Debug, Clone)]
pub struct PlatformTarget {
    pub architecture: Architecture,
    pub platform: Platform,
    pub runtime_version: Option<RuntimeVersion>,
    pub launcher_version: Option<PlainVersion>,
    pub runtime_external: bool,
}

impl PlatformTarget {
    pub fn current(
        runtime_version: Option<RuntimeVersion>,
        launcher_version: Option<PlainVersion>,
    ) -> Self {
        Self {
            architecture: Architecture::current(),
            platform: Platform::current(),
            runtime_version,
            launcher_version,
            runtime_external: false,
        }
    }
}

/// Runtime and launcher artifacts a release needs beyond its own files.
#[derive(Debug, Clone, Default)]
pub struct PlatformPlan {
    pub runtime: Option<RuntimeRelease>,
    pub launcher: Option<LauncherRelease>,
    pub change: Option<RuntimeChange>,
}

impl PlatformPlan {
    pub fn is_empty(&self) -> bool {
        self.runtime.is_none() && self.launcher.is_none()
    }

    /// Bytes that will be fetched in addition to the release files.
    pub fn extra_bytes(&self) -> u64 {
        self.runtime.as_ref().map_or(0, |runtime| runtime.length)
            + self.launcher.as_ref().map_or(0, |launcher| launcher.length)
    }
}
