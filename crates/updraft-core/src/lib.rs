mod catalog;
mod error;
mod host;
mod node;
mod progress;
pub mod protocol;
mod release;
mod version;

pub use catalog::ArtifactCatalog;
pub use error::{CompatibilityError, ConfigMutationError, ProtocolError, TransferError};
pub use host::{HostState, HostStateError, UpdateOutcome};
pub use node::{ContentNode, ContentSource, DirectoryNode, FileNode};
pub use progress::{CancelHandle, ProgressSink, Task};
pub use release::{
    AppRelease, Architecture, LauncherRelease, Platform, RuntimeRelease, UpdateStatus,
};
pub use version::{engine_version, PlainVersion, RuntimeVersion, VersionError, VersionWindow};

pub use updraft_security::{Digest, DigestAlgorithm};

#[cfg(test)]
mod tests;
