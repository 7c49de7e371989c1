use updraft_core::{CompatibilityError, LauncherRelease, PlainVersion, RuntimeRelease};

/// Whether the running launcher can start `runtime`. An unknown launcher
/// version only passes an unconstrained window.
pub fn launcher_update_needed(current: Option<&PlainVersion>, runtime: &RuntimeRelease) -> bool {
    let window = &runtime.launcher_window;
    match current {
        Some(version) => !window.contains(version),
        None => window.min().is_some() || window.max().is_some(),
    }
}

pub fn select_launcher<'a>(
    runtime: &RuntimeRelease,
    available: &'a [LauncherRelease],
) -> Result<&'a LauncherRelease, CompatibilityError> {
    let window = &runtime.launcher_window;
    let mut sorted: Vec<&LauncherRelease> = available.iter().collect();
    sorted.sort_by(|a, b| b.cmp(a));

    sorted
        .iter()
        .find(|release| window.contains(&release.version))
        .copied()
        .ok_or_else(|| CompatibilityError::NoCompatibleLauncher {
            window: window.to_string(),
            candidates: sorted.iter().map(|release| release.describe()).collect(),
        })
}
