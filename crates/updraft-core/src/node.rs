use std::fs;
use std::path::{Component, Path, PathBuf};

use updraft_security::compute_digest_file;

use crate::{Digest, Task, TransferError};

/// Where the bytes of a file node come from.
pub trait ContentSource {
    /// Human readable origin, used in error messages.
    fn describe(&self) -> String;

    /// Writes the content stored under `name` to `dest`.
    fn fetch(&self, name: &str, dest: &Path, task: &Task) -> Result<(), TransferError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryNode {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    pub name: String,
    pub digest: Digest,
    pub length: u64,
}

/// One entry of an artifact catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentNode {
    Directory(DirectoryNode),
    File(FileNode),
}

impl ContentNode {
    pub fn directory(name: &str) -> Self {
        Self::Directory(DirectoryNode {
            name: name.to_string(),
        })
    }

    pub fn file(name: &str, digest: Digest, length: u64) -> Self {
        Self::File(FileNode {
            name: name.to_string(),
            digest,
            length,
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Directory(node) => &node.name,
            Self::File(node) => &node.name,
        }
    }

    pub fn length(&self) -> u64 {
        match self {
            Self::Directory(_) => 0,
            Self::File(node) => node.length,
        }
    }

    pub fn content_equals(&self, other: &ContentNode) -> bool {
        match (self, other) {
            (Self::Directory(lhs), Self::Directory(rhs)) => lhs.name == rhs.name,
            (Self::File(lhs), Self::File(rhs)) => {
                lhs.name == rhs.name && lhs.length == rhs.length && lhs.digest == rhs.digest
            }
            _ => false,
        }
    }

    /// Creates this entry below `dest`. Files are verified against their
    /// recorded length and digest; a mismatching file is removed again.
    pub fn materialize_at(
        &self,
        source: &dyn ContentSource,
        dest: &Path,
        task: &Task,
    ) -> Result<PathBuf, TransferError> {
        let target = dest.join(safe_relative_path(self.name())?);
        match self {
            Self::Directory(_) => {
                fs::create_dir_all(&target).map_err(|err| TransferError::io(&target, err))?;
            }
            Self::File(node) => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(|err| TransferError::io(parent, err))?;
                }
                source.fetch(&node.name, &target, task)?;
                if let Err(err) = verify_file(&target, node) {
                    let _ = fs::remove_file(&target);
                    return Err(err);
                }
            }
        }
        task.set_progress(1.0);
        Ok(target)
    }
}

fn verify_file(path: &Path, node: &FileNode) -> Result<(), TransferError> {
    let (actual, length) = compute_digest_file(node.digest.algorithm(), path)
        .map_err(|err| TransferError::io(path, err))?;
    if length != node.length {
        return Err(TransferError::LengthMismatch {
            path: path.to_path_buf(),
            expected: node.length,
            actual: length,
        });
    }
    if actual != node.digest {
        return Err(TransferError::DigestMismatch {
            path: path.to_path_buf(),
            expected: node.digest.to_hex(),
            actual: actual.to_hex(),
        });
    }
    Ok(())
}

/// Catalog names are relative, `/`-separated and may not climb out of the destination.
fn safe_relative_path(name: &str) -> Result<PathBuf, TransferError> {
    let path = Path::new(name);
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            _ => return Err(TransferError::UnsafeName(name.to_string())),
        }
    }
    if normalized.as_os_str().is_empty() {
        return Err(TransferError::UnsafeName(name.to_string()));
    }
    Ok(normalized)
}
