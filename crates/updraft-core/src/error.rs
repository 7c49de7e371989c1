use std::io;
use std::path::PathBuf;

/// A catalog could not be read or did not describe anything usable.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("failed to read catalog {origin}: {source}")]
    Read {
        origin: String,
        #[source]
        source: io::Error,
    },

    #[error("catalog {origin} appears invalid: no usable records")]
    EmptyCatalog { origin: String },

    #[error("failed to fetch catalog {origin}: {reason}")]
    Fetch { origin: String, reason: String },
}

/// No runtime or launcher satisfies the constraints of a release.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CompatibilityError {
    #[error("no runtime releases are available for {platform}/{architecture}; evaluated: {}", render_candidates(.candidates))]
    NoPlatformMatch {
        platform: String,
        architecture: String,
        candidates: Vec<String>,
    },

    #[error("no runtime release satisfies {window}; evaluated: {}", render_candidates(.candidates))]
    NoCompatibleRuntime {
        window: String,
        candidates: Vec<String>,
    },

    #[error("no launcher release satisfies {window}; evaluated: {}", render_candidates(.candidates))]
    NoCompatibleLauncher {
        window: String,
        candidates: Vec<String>,
    },

    #[error("the running runtime {current} is not bundled with the application and must be changed manually to satisfy {window}")]
    ExternalRuntime { current: String, window: String },
}

impl CompatibilityError {
    pub fn candidates(&self) -> &[String] {
        match self {
            Self::NoPlatformMatch { candidates, .. }
            | Self::NoCompatibleRuntime { candidates, .. }
            | Self::NoCompatibleLauncher { candidates, .. } => candidates,
            Self::ExternalRuntime { .. } => &[],
        }
    }
}

fn render_candidates(candidates: &[String]) -> String {
    if candidates.is_empty() {
        "none".to_string()
    } else {
        candidates.join(", ")
    }
}

/// Content could not be materialized.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("{}: expected {expected} bytes, got {actual}", .path.display())]
    LengthMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("{}: expected digest {expected}, got {actual}", .path.display())]
    DigestMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("refusing to materialize unsafe entry name '{0}'")]
    UnsafeName(String),

    #[error("failed to transfer '{artifact}' from {site} to {}", .destination.display())]
    NodeFailed {
        site: String,
        artifact: String,
        destination: PathBuf,
        #[source]
        source: Box<TransferError>,
    },

    #[error("failed to unpack {}: {reason}", .archive.display())]
    Unpack { archive: PathBuf, reason: String },

    #[error("transfer cancelled")]
    Cancelled,

    #[error("I/O failure at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TransferError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// The platform configuration collaborator rejected a change.
#[derive(Debug, thiserror::Error)]
#[error("failed to {action}: {reason}")]
pub struct ConfigMutationError {
    pub action: String,
    pub reason: String,
}

impl ConfigMutationError {
    pub fn new(action: impl Into<String>, reason: impl ToString) -> Self {
        Self {
            action: action.into(),
            reason: reason.to_string(),
        }
    }
}
