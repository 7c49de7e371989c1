use std::fs;
use std::path::{Path, PathBuf};

use updraft_core::{AppRelease, ContentSource, Task, TransferError};

use crate::UpdateSite;

/// Files of one release on the update site.
pub struct RemoteSource<'a> {
    site: &'a UpdateSite,
    release: &'a AppRelease,
}

impl<'a> RemoteSource<'a> {
    pub fn new(site: &'a UpdateSite, release: &'a AppRelease) -> Self {
        Self { site, release }
    }
}

impl ContentSource for RemoteSource<'_> {
    fn describe(&self) -> String {
        self.site.release_dir_url(self.release)
    }

    fn fetch(&self, name: &str, dest: &Path, task: &Task) -> Result<(), TransferError> {
        let url = self.site.release_file_url(self.release, name);
        self.site.download(&url, dest, None, task).map(|_| ())
    }
}

/// The installed application tree, used to reuse unchanged files.
#[derive(Debug, Clone)]
pub struct LocalSource {
    root: PathBuf,
}

impl LocalSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ContentSource for LocalSource {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn fetch(&self, name: &str, dest: &Path, _task: &Task) -> Result<(), TransferError> {
        let from = self.root.join(name);
        fs::copy(&from, dest).map_err(|err| TransferError::io(from, err))?;
        Ok(())
    }
}
