use std::io;
use std::path::PathBuf;

use updraft_core::{CompatibilityError, ConfigMutationError, ProtocolError, TransferError};
use updraft_resolver::ResolveError;

/// The recovery script is unsafe or structurally broken. Nothing from a
/// script that fails with this error is ever executed.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("recovery script path '{path}' escapes the install root {}", .root.display())]
    PathEscape { path: String, root: PathBuf },

    #[error("malformed recovery script line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("recovery script section '{section}' is missing its terminating exit")]
    Unterminated { section: String },

    #[error("recovery script I/O failure at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ScriptError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("another update operation is already running for {}{detail}", .root.display())]
    Busy { root: PathBuf, detail: String },

    #[error("the installation is not writable: {}", .0.display())]
    NotWritable(PathBuf),

    #[error("update refused: {0}")]
    Refused(String),

    #[error("application may be unstable: {0}")]
    Unstable(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Compatibility(#[from] CompatibilityError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    ConfigMutation(#[from] ConfigMutationError),

    #[error(transparent)]
    Script(#[from] ScriptError),

    #[error("I/O failure at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl UpdateError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<ResolveError> for UpdateError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Protocol(err) => Self::Protocol(err),
            ResolveError::Compatibility(err) => Self::Compatibility(err),
        }
    }
}
