use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::{InstallLayout, UpdateError};

/// Claims an installation for one check or apply at a time. The marker file
/// is created with `create_new`, so a second claim fails instead of
/// interleaving; it is removed when the guard drops.
#[derive(Debug)]
pub struct OperationGuard {
    path: PathBuf,
}

impl OperationGuard {
    pub fn claim(layout: &InstallLayout, operation: &str) -> Result<Self, UpdateError> {
        let path = layout.active_marker_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| UpdateError::io(parent, err))?;
        }

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                let detail = fs::read_to_string(&path)
                    .ok()
                    .map(|raw| raw.trim().to_string())
                    .filter(|raw| !raw.is_empty())
                    .map(|raw| format!(" ({raw})"))
                    .unwrap_or_default();
                return Err(UpdateError::Busy {
                    root: layout.root().to_path_buf(),
                    detail,
                });
            }
            Err(err) => return Err(UpdateError::io(&path, err)),
        };

        file.write_all(format!("{operation} pid={}\n", std::process::id()).as_bytes())
            .and_then(|()| file.flush())
            .map_err(|err| UpdateError::io(&path, err))?;

        Ok(Self { path })
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %self.path.display(),
                    "failed to release operation marker: {err}"
                );
            }
        }
    }
}
