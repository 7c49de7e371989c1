use updraft_core::{
    ArtifactCatalog, CompatibilityError, LauncherRelease, ProtocolError, RuntimeRelease,
};

use crate::{
    launcher_update_needed, runtime_requirement, select_launcher, select_runtime, PlatformPlan,
    PlatformTarget, ResolveError, RuntimeRequirement,
};

/// Decides which runtime and launcher a release needs on `target`.
///
/// The pool catalogs are only loaded when a runtime change is required, and
/// the launcher pool only when the chosen runtime rejects the running launcher.
pub fn resolve_platform_plan<R, L>(
    catalog: &ArtifactCatalog,
    target: &PlatformTarget,
    load_runtimes: R,
    load_launchers: L,
) -> Result<PlatformPlan, ResolveError>
where
    R: FnOnce() -> Result<Vec<RuntimeRelease>, ProtocolError>,
    L: FnOnce() -> Result<Vec<LauncherRelease>, ProtocolError>,
{
    let (Some(window), Some(current)) = (catalog.runtime_window(), &target.runtime_version) else {
        if catalog.runtime_window().is_some() {
            tracing::warn!("running runtime version is unknown; keeping the installed runtime");
        }
        return Ok(PlatformPlan::default());
    };

    let change = match runtime_requirement(catalog, current) {
        RuntimeRequirement::Keep => return Ok(PlatformPlan::default()),
        RuntimeRequirement::Change(change) => change,
    };
    tracing::info!(
        current = %current,
        %window,
        "runtime must be {}",
        change.as_str()
    );

    if target.runtime_external {
        return Err(CompatibilityError::ExternalRuntime {
            current: current.to_string(),
            window: window.to_string(),
        }
        .into());
    }

    let runtimes = load_runtimes()?;
    let runtime = select_runtime(window, &runtimes, target.architecture, target.platform)?.clone();

    let launcher = if launcher_update_needed(target.launcher_version.as_ref(), &runtime) {
        let launchers = load_launchers()?;
        Some(select_launcher(&runtime, &launchers)?.clone())
    } else {
        None
    };

    Ok(PlatformPlan {
        runtime: Some(runtime),
        launcher,
        change: Some(change),
    })
}
