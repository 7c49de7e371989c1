use updraft_core::{
    Architecture, ArtifactCatalog, CompatibilityError, Platform, RuntimeRelease, RuntimeVersion,
    VersionWindow,
};

use crate::{RuntimeChange, RuntimeRequirement};

pub fn runtime_requirement(
    catalog: &ArtifactCatalog,
    current: &RuntimeVersion,
) -> RuntimeRequirement {
    if catalog.is_runtime_too_old(current) {
        RuntimeRequirement::Change(RuntimeChange::Upgrade)
    } else if catalog.is_runtime_too_new(current) {
        RuntimeRequirement::Change(RuntimeChange::Downgrade)
    } else {
        RuntimeRequirement::Keep
    }
}

/// Picks the newest runtime for `architecture`/`platform` inside `window`.
pub fn select_runtime<'a>(
    window: &VersionWindow<RuntimeVersion>,
    available: &'a [RuntimeRelease],
    architecture: Architecture,
    platform: Platform,
) -> Result<&'a RuntimeRelease, CompatibilityError> {
    let mut matching: Vec<&RuntimeRelease> = available
        .iter()
        .filter(|release| release.architecture == architecture && release.platform == platform)
        .collect();
    if matching.is_empty() {
        return Err(CompatibilityError::NoPlatformMatch {
            platform: platform.to_string(),
            architecture: architecture.to_string(),
            candidates: available.iter().map(RuntimeRelease::describe).collect(),
        });
    }

    matching.sort_by(|a, b| b.version.cmp(&a.version));
    for release in &matching {
        if window.contains(&release.version) {
            tracing::debug!(runtime = %release.version, %window, "selected runtime");
            return Ok(release);
        }
        tracing::debug!(runtime = %release.version, %window, "runtime outside window");
    }

    Err(CompatibilityError::NoCompatibleRuntime {
        window: window.to_string(),
        candidates: matching.iter().map(|release| release.describe()).collect(),
    })
}
