use std::cell::Cell;
use std::io::Cursor;

use updraft_core::protocol::{parse_artifact_catalog, ParseContext};
use updraft_core::{
    Architecture, ArtifactCatalog, CompatibilityError, Digest, DigestAlgorithm, LauncherRelease,
    Platform, PlainVersion, RuntimeRelease, RuntimeVersion, VersionWindow,
};

use super::*;

fn digest() -> Digest {
    Digest::from_hex(DigestAlgorithm::Md5, "0cc175b9c0f1b6a831c399e269772661")
        .expect("digest must decode")
}

fn runtime(version: &str, platform: Platform, launcher_min: Option<&str>) -> RuntimeRelease {
    RuntimeRelease {
        version: RuntimeVersion::parse(version).expect("version must parse"),
        architecture: Architecture::X64,
        platform,
        file_name: format!("jre-{version}-{platform}.tar.gz"),
        digest: digest(),
        length: 100,
        launcher_window: VersionWindow::new(
            launcher_min.map(|raw| PlainVersion::parse(raw).expect("launcher min must parse")),
            None,
        )
        .expect("window must build"),
    }
}

fn launcher(version: &str) -> LauncherRelease {
    LauncherRelease {
        version: PlainVersion::parse(version).expect("version must parse"),
        file_name: format!("launcher-{version}.jar"),
        digest: digest(),
        length: 10,
    }
}

fn catalog(window: &str) -> ArtifactCatalog {
    let raw = format!("{window}\nF,0cc175b9c0f1b6a831c399e269772661,1,app.jar\n");
    parse_artifact_catalog(Cursor::new(raw), &ParseContext::new("test")).expect("must parse")
}

fn window(min: &str, max: &str) -> VersionWindow<RuntimeVersion> {
    VersionWindow::new(
        Some(RuntimeVersion::parse(min).expect("min must parse")),
        Some(RuntimeVersion::parse(max).expect("max must parse")),
    )
    .expect("window must build")
}

fn linux_target(runtime: &str, launcher: Option<&str>) -> PlatformTarget {
    PlatformTarget {
        architecture: Architecture::X64,
        platform: Platform::Linux,
        runtime_version: Some(RuntimeVersion::parse(runtime).expect("runtime must parse")),
        launcher_version: launcher.map(|raw| PlainVersion::parse(raw).expect("must parse")),
        runtime_external: false,
    }
}

#[test]
fn selects_newest_runtime_inside_window() {
    let available = vec![
        runtime("11", Platform::Linux, None),
        runtime("17", Platform::Linux, None),
    ];
    let selected = select_runtime(
        &window("12", "20"),
        &available,
        Architecture::X64,
        Platform::Linux,
    )
    .expect("must select");
    assert_eq!(selected.version.label(), "17");
}

#[test]
fn no_runtime_in_window_lists_every_candidate() {
    let available = vec![
        runtime("11", Platform::Linux, None),
        runtime("17", Platform::Linux, None),
    ];
    let err = select_runtime(
        &window("21", "25"),
        &available,
        Architecture::X64,
        Platform::Linux,
    )
    .expect_err("must fail");
    assert!(matches!(err, CompatibilityError::NoCompatibleRuntime { .. }));
    assert_eq!(err.candidates().len(), 2);
    let message = err.to_string();
    assert!(message.contains("jre-11-linux.tar.gz"));
    assert!(message.contains("jre-17-linux.tar.gz"));
}

#[test]
fn platform_filter_runs_before_window() {
    let available = vec![runtime("17", Platform::Windows, None)];
    let err = select_runtime(
        &window("12", "20"),
        &available,
        Architecture::X64,
        Platform::Linux,
    )
    .expect_err("must fail");
    assert!(matches!(err, CompatibilityError::NoPlatformMatch { .. }));
    assert_eq!(err.candidates(), &["17 windows/x64 (jre-17-windows.tar.gz, 100 bytes)"]);
}

#[test]
fn runtime_requirement_reports_direction() {
    let catalog = catalog("jre,12,20");
    let parse = |raw: &str| RuntimeVersion::parse(raw).expect("must parse");
    assert_eq!(runtime_requirement(&catalog, &parse("17")), RuntimeRequirement::Keep);
    assert_eq!(
        runtime_requirement(&catalog, &parse("1.8.0_73")),
        RuntimeRequirement::Change(RuntimeChange::Upgrade)
    );
    assert_eq!(
        runtime_requirement(&catalog, &parse("21")),
        RuntimeRequirement::Change(RuntimeChange::Downgrade)
    );
}

#[test]
fn selects_newest_launcher_in_runtime_window() {
    let mut chosen = runtime("17", Platform::Linux, Some("1.2"));
    chosen.launcher_window = VersionWindow::new(
        Some(PlainVersion::new(1, 2, 0)),
        Some(PlainVersion::new(2, 0, 0)),
    )
    .expect("window must build");
    let available = vec![launcher("1.0"), launcher("2.1"), launcher("1.5"), launcher("2.0")];

    let selected = select_launcher(&chosen, &available).expect("must select");
    assert_eq!(selected.version, PlainVersion::new(2, 0, 0));

    let none = select_launcher(&chosen, &[launcher("0.9")]).expect_err("must fail");
    assert!(matches!(none, CompatibilityError::NoCompatibleLauncher { .. }));
    assert!(none.to_string().contains("launcher-0.9.jar"));
}

#[test]
fn launcher_update_needed_checks_window() {
    let chosen = runtime("17", Platform::Linux, Some("1.2"));
    assert!(launcher_update_needed(Some(&PlainVersion::new(1, 0, 0)), &chosen));
    assert!(!launcher_update_needed(Some(&PlainVersion::new(1, 2, 0)), &chosen));
    assert!(launcher_update_needed(None, &chosen));
    assert!(!launcher_update_needed(None, &runtime("17", Platform::Linux, None)));
}

#[test]
fn plan_skips_pool_catalogs_when_runtime_fits() {
    let loaded = Cell::new(0);
    let plan = resolve_platform_plan(
        &catalog("jre,12,20"),
        &linux_target("17", Some("1.0")),
        || {
            loaded.set(loaded.get() + 1);
            Ok(Vec::new())
        },
        || {
            loaded.set(loaded.get() + 1);
            Ok(Vec::new())
        },
    )
    .expect("must resolve");
    assert!(plan.is_empty());
    assert_eq!(loaded.get(), 0);
}

#[test]
fn plan_selects_runtime_and_launcher_end_to_end() {
    let plan = resolve_platform_plan(
        &catalog("jre,12,20"),
        &linux_target("11", Some("1.0")),
        || {
            Ok(vec![
                runtime("11", Platform::Linux, None),
                runtime("17", Platform::Linux, Some("1.5")),
                runtime("19", Platform::Apple, None),
            ])
        },
        || Ok(vec![launcher("1.4"), launcher("1.6"), launcher("1.8")]),
    )
    .expect("must resolve");

    let runtime = plan.runtime.as_ref().expect("runtime must be chosen");
    assert_eq!(runtime.version.label(), "17");
    assert_eq!(plan.change, Some(RuntimeChange::Upgrade));
    assert_eq!(
        plan.launcher.as_ref().map(|l| l.version.clone()),
        Some(PlainVersion::new(1, 8, 0))
    );
    assert_eq!(plan.extra_bytes(), 110);
}

#[test]
fn plan_rejects_external_runtime() {
    let mut target = linux_target("11", None);
    target.runtime_external = true;
    let err = resolve_platform_plan(
        &catalog("jre,12"),
        &target,
        || panic!("runtime pool must not be loaded"),
        || panic!("launcher pool must not be loaded"),
    )
    .expect_err("must fail");
    assert!(matches!(
        err,
        ResolveError::Compatibility(CompatibilityError::ExternalRuntime { .. })
    ));
}
