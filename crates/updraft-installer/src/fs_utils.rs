use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub fn remove_path_if_exists(path: &Path) -> io::Result<bool> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if metadata.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(true)
}

pub fn copy_dir_recursive(source_root: &Path, destination_root: &Path) -> io::Result<()> {
    fs::create_dir_all(destination_root)?;

    let mut queue: VecDeque<(PathBuf, PathBuf)> = VecDeque::new();
    queue.push_back((source_root.to_path_buf(), destination_root.to_path_buf()));

    while let Some((from_dir, to_dir)) = queue.pop_front() {
        for entry in fs::read_dir(&from_dir)? {
            let entry = entry?;
            let from_path = entry.path();
            let to_path = to_dir.join(entry.file_name());
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                fs::create_dir_all(&to_path)?;
                queue.push_back((from_path, to_path));
            } else if file_type.is_file() {
                fs::copy(&from_path, &to_path)?;
            }
        }
    }

    Ok(())
}

pub fn copy_path(source: &Path, destination: &Path) -> io::Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::metadata(source)?.is_dir() {
        copy_dir_recursive(source, destination)
    } else {
        fs::copy(source, destination).map(|_| ())
    }
}

/// Renames `source` to `destination`, copying and deleting when the rename
/// crosses a filesystem boundary.
pub fn move_path(source: &Path, destination: &Path) -> io::Result<()> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(err) => {
            tracing::debug!(
                from = %source.display(),
                to = %destination.display(),
                "rename failed ({err}); falling back to copy"
            );
            copy_path(source, destination)?;
            remove_path_if_exists(source).map(|_| ())
        }
    }
}

/// Returns the first entry below `root` (or `root` itself) that is read-only.
pub fn find_read_only_entry(root: &Path) -> io::Result<Option<PathBuf>> {
    let mut queue: VecDeque<PathBuf> = VecDeque::new();
    queue.push_back(root.to_path_buf());

    while let Some(path) = queue.pop_front() {
        let metadata = fs::symlink_metadata(&path)?;
        if metadata.file_type().is_symlink() {
            continue;
        }
        if metadata.permissions().readonly() {
            return Ok(Some(path));
        }
        if metadata.is_dir() {
            for entry in fs::read_dir(&path)? {
                queue.push_back(entry?.path());
            }
        }
    }

    Ok(None)
}
