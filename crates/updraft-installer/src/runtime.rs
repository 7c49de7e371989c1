use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use updraft_core::protocol::is_plain_file_name;
use updraft_core::{LauncherRelease, RuntimeRelease, Task, TransferError};
use updraft_registry::UpdateSite;

use crate::fs_utils::remove_path_if_exists;
use crate::InstallLayout;

/// Downloads a runtime bundle into `delta/` and unpacks it to
/// `delta/jre<version>`. The archive itself is removed afterwards.
pub fn stage_runtime(
    site: &UpdateSite,
    layout: &InstallLayout,
    runtime: &RuntimeRelease,
    task: &Task,
) -> Result<PathBuf, TransferError> {
    let archive = layout.delta_dir().join(checked_file_name(&runtime.file_name)?);
    let url = site.runtime_file_url(runtime);
    task.log(format!("Downloading runtime {}", runtime.describe()));
    site.download_verified(
        &url,
        &archive,
        &runtime.digest,
        runtime.length,
        &task.sub_task(0.0, 0.9),
    )?;

    let staged = layout.staged_runtime_dir(&runtime.version);
    let result = unpack_runtime(&archive, &staged);
    let _ = fs::remove_file(&archive);
    result?;
    task.set_progress(1.0);
    tracing::info!(runtime = %runtime.version, staged = %staged.display(), "runtime staged");
    Ok(staged)
}

pub(crate) fn checked_file_name(name: &str) -> Result<&str, TransferError> {
    if is_plain_file_name(name) {
        Ok(name)
    } else {
        Err(TransferError::UnsafeName(name.to_string()))
    }
}

/// Unpacks a `.tar.gz` runtime bundle that holds exactly one top-level
/// directory and renames that directory to `destination`.
pub fn unpack_runtime(archive: &Path, destination: &Path) -> Result<(), TransferError> {
    let unpack_error = |reason: String| TransferError::Unpack {
        archive: archive.to_path_buf(),
        reason,
    };
    let name = archive
        .file_name()
        .map(|name| name.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if !(name.ends_with(".tar.gz") || name.ends_with(".tgz")) {
        return Err(unpack_error("unsupported archive format".to_string()));
    }

    let scratch = destination.with_extension("unpack");
    remove_path_if_exists(&scratch).map_err(|err| TransferError::io(&scratch, err))?;
    fs::create_dir_all(&scratch).map_err(|err| TransferError::io(&scratch, err))?;

    let result = extract_into(archive, &scratch).and_then(|()| {
        let top = single_top_level_dir(&scratch).map_err(unpack_error)?;
        remove_path_if_exists(destination).map_err(|err| TransferError::io(destination, err))?;
        fs::rename(&top, destination).map_err(|err| TransferError::io(destination, err))
    });
    let _ = remove_path_if_exists(&scratch);
    result
}

fn extract_into(archive: &Path, scratch: &Path) -> Result<(), TransferError> {
    let unpack_error = |reason: String| TransferError::Unpack {
        archive: archive.to_path_buf(),
        reason,
    };
    let file = File::open(archive).map_err(|err| TransferError::io(archive, err))?;
    let mut tarball = tar::Archive::new(GzDecoder::new(file));
    let entries = tarball
        .entries()
        .map_err(|err| unpack_error(err.to_string()))?;

    for entry in entries {
        let mut entry = entry.map_err(|err| unpack_error(err.to_string()))?;
        let path = entry
            .path()
            .map_err(|err| unpack_error(err.to_string()))?
            .into_owned();
        if path.is_absolute() || path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(unpack_error(format!(
                "entry escapes the archive root: {}",
                path.display()
            )));
        }
        entry
            .unpack_in(scratch)
            .map_err(|err| unpack_error(format!("{}: {err}", path.display())))?;
    }
    Ok(())
}

fn single_top_level_dir(scratch: &Path) -> Result<PathBuf, String> {
    let entries = fs::read_dir(scratch)
        .and_then(|entries| entries.collect::<Result<Vec<_>, _>>())
        .map_err(|err| err.to_string())?;
    match entries.as_slice() {
        [entry] if entry.path().is_dir() => Ok(entry.path()),
        [] => Err("archive is empty".to_string()),
        _ => Err(format!(
            "expected a single top-level folder, found {} entries",
            entries.len()
        )),
    }
}

/// Downloads a launcher into `delta/launcher/<file>`.
pub fn stage_launcher(
    site: &UpdateSite,
    layout: &InstallLayout,
    launcher: &LauncherRelease,
    task: &Task,
) -> Result<PathBuf, TransferError> {
    let staged = layout.staged_launcher_path(checked_file_name(&launcher.file_name)?);
    task.log(format!("Downloading launcher {}", launcher.describe()));
    site.download_verified(
        &site.launcher_file_url(launcher),
        &staged,
        &launcher.digest,
        launcher.length,
        task,
    )?;
    tracing::info!(launcher = %launcher.version, staged = %staged.display(), "launcher staged");
    Ok(staged)
}
