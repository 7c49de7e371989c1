use std::cell::RefCell;
use std::cmp::Ordering;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::*;

fn md5_of(bytes: &[u8]) -> Digest {
    let (digest, _) = updraft_security::compute_digest_reader(DigestAlgorithm::Md5, &mut &bytes[..])
        .expect("must hash");
    digest
}

#[test]
fn plain_version_pads_missing_components() {
    let version = PlainVersion::parse("2").expect("must parse");
    assert_eq!(version, PlainVersion::new(2, 0, 0));
    assert_eq!(version.to_string(), "2.0");
    assert_eq!(
        PlainVersion::parse("1.2.3.4").expect("must parse").to_string(),
        "1.2.3"
    );
    assert!(PlainVersion::parse("one.two").is_err());
    assert!(PlainVersion::parse("").is_err());
}

#[test]
fn runtime_version_orders_legacy_before_modern() {
    let parse = |raw: &str| RuntimeVersion::parse(raw).expect("must parse");
    assert!(parse("1.8.0_73") < parse("1.8.0_191"));
    assert!(parse("1.8.0_191") < parse("9"));
    assert!(parse("11.0.2") < parse("17"));
    assert!(parse("17") < parse("17.0.2"));
    assert_eq!(parse("17.0.2").cmp(&parse("17.0.2")), Ordering::Equal);
    assert_eq!(parse("1.8.0_73").feature_release(), 8);
    assert_eq!(parse("17.0.2").feature_release(), 17);
    assert_eq!(parse("1.8.0_73").label(), "1.8.0_73");
    assert!(RuntimeVersion::parse("17-ea").is_err());
}

#[test]
fn version_window_rejects_inverted_bounds() {
    let err = VersionWindow::new(
        Some(PlainVersion::new(2, 0, 0)),
        Some(PlainVersion::new(1, 0, 0)),
    )
    .expect_err("inverted window must fail");
    assert!(matches!(err, VersionError::InvertedWindow { .. }));

    let window = VersionWindow::new(
        Some(PlainVersion::new(1, 0, 0)),
        Some(PlainVersion::new(2, 0, 0)),
    )
    .expect("must build");
    assert!(window.contains(&PlainVersion::new(1, 0, 0)));
    assert!(window.contains(&PlainVersion::new(2, 0, 0)));
    assert!(window.is_too_old(&PlainVersion::new(0, 9, 0)));
    assert!(window.is_too_new(&PlainVersion::new(2, 0, 1)));
    assert_eq!(window.to_string(), "[1.0, 2.0]");
}

#[test]
fn release_order_is_antisymmetric_and_sort_ends_with_newest() {
    let releases = vec![
        AppRelease::new("Demo", "1.1", 3_000),
        AppRelease::new("Demo", "1.0", 1_000),
        AppRelease::new("Other", "9.9", 3_000),
        AppRelease::new("Demo", "1.2", 5_000),
        AppRelease::new("Demo", "0.9", 500),
    ];

    for a in &releases {
        for b in &releases {
            assert_eq!(a.cmp_by_build_time(b), b.cmp_by_build_time(a).reverse());
        }
    }

    let mut sorted = releases.clone();
    AppRelease::sort_by_build_time(&mut sorted);
    let max = releases
        .iter()
        .map(|release| release.build_time_millis)
        .max()
        .expect("non-empty");
    assert_eq!(sorted.last().map(|r| r.build_time_millis), Some(max));
    assert_eq!(
        AppRelease::newest(&releases).map(|r| r.version_label.as_str()),
        Some("1.2")
    );
}

#[test]
fn release_equality_is_identity_not_build_time() {
    let a = AppRelease::new("Demo", "1.1", 3_000);
    let b = AppRelease::new("Other", "9.9", 3_000);
    assert_eq!(a.cmp_by_build_time(&b), Ordering::Equal);
    assert_ne!(a, b);

    let mut with_info = a.clone();
    with_info.append_info("notes");
    assert_eq!(a, with_info);
}

#[test]
fn runtime_release_orders_by_arch_platform_version() {
    let digest = md5_of(b"x");
    let release = |arch, platform, version: &str| RuntimeRelease {
        version: RuntimeVersion::parse(version).expect("must parse"),
        architecture: arch,
        platform,
        file_name: format!("jre-{version}.tar.gz"),
        digest: digest.clone(),
        length: 1,
        launcher_window: VersionWindow::unbounded(),
    };
    let mut releases = vec![
        release(Architecture::Aarch64, Platform::Linux, "11"),
        release(Architecture::X64, Platform::Windows, "11"),
        release(Architecture::X64, Platform::Linux, "17"),
        release(Architecture::X64, Platform::Linux, "11"),
    ];
    releases.sort();
    let order: Vec<String> = releases.iter().map(RuntimeRelease::describe).collect();
    assert_eq!(
        order,
        vec![
            "11 linux/x64 (jre-11.tar.gz, 1 bytes)",
            "17 linux/x64 (jre-17.tar.gz, 1 bytes)",
            "11 windows/x64 (jre-11.tar.gz, 1 bytes)",
            "11 linux/aarch64 (jre-11.tar.gz, 1 bytes)",
        ]
    );
}

#[test]
fn update_status_serializes_as_tagged_json() {
    let json = serde_json::to_string(&UpdateStatus::UpToDate(true)).expect("must serialize");
    assert_eq!(json, r#"{"up_to_date":true}"#);
    let json =
        serde_json::to_string(&UpdateStatus::Error("offline".to_string())).expect("must serialize");
    assert_eq!(json, r#"{"error":"offline"}"#);
}

struct MapSource {
    content: Vec<(String, Vec<u8>)>,
    calls: RefCell<Vec<String>>,
}

impl ContentSource for MapSource {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn fetch(&self, name: &str, dest: &Path, _task: &Task) -> Result<(), TransferError> {
        self.calls.borrow_mut().push(name.to_string());
        let (_, bytes) = self
            .content
            .iter()
            .find(|(candidate, _)| candidate == name)
            .ok_or_else(|| TransferError::Fetch {
                url: name.to_string(),
                reason: "missing".to_string(),
            })?;
        fs::write(dest, bytes).map_err(|err| TransferError::io(dest, err))
    }
}

fn memory_source(entries: &[(&str, &[u8])]) -> MapSource {
    MapSource {
        content: entries
            .iter()
            .map(|(name, bytes)| (name.to_string(), bytes.to_vec()))
            .collect(),
        calls: RefCell::new(Vec::new()),
    }
}

#[test]
fn directory_materialize_is_idempotent() {
    let dir = tempfile::tempdir().expect("must create temp dir");
    let source = memory_source(&[]);
    let node = ContentNode::directory("lib/nested");
    let task = Task::new();

    node.materialize_at(&source, dir.path(), &task)
        .expect("first materialize must succeed");
    node.materialize_at(&source, dir.path(), &task)
        .expect("second materialize must succeed");
    assert!(dir.path().join("lib/nested").is_dir());
    assert!(source.calls.borrow().is_empty());
}

#[test]
fn file_materialize_verifies_and_removes_on_mismatch() {
    let dir = tempfile::tempdir().expect("must create temp dir");
    let source = memory_source(&[("bin/app.jar", b"hello"), ("short.txt", b"abc")]);
    let task = Task::new();

    let good = ContentNode::file("bin/app.jar", md5_of(b"hello"), 5);
    let path = good
        .materialize_at(&source, dir.path(), &task)
        .expect("matching file must materialize");
    assert_eq!(fs::read(path).expect("must read"), b"hello");

    let wrong_length = ContentNode::file("short.txt", md5_of(b"abc"), 4);
    let err = wrong_length
        .materialize_at(&source, dir.path(), &task)
        .expect_err("length mismatch must fail");
    assert!(matches!(err, TransferError::LengthMismatch { expected: 4, actual: 3, .. }));
    assert!(!dir.path().join("short.txt").exists());

    let wrong_digest = ContentNode::file("short.txt", md5_of(b"abd"), 3);
    let err = wrong_digest
        .materialize_at(&source, dir.path(), &task)
        .expect_err("digest mismatch must fail");
    assert!(matches!(err, TransferError::DigestMismatch { .. }));
    assert!(!dir.path().join("short.txt").exists());
}

#[test]
fn materialize_rejects_names_escaping_destination() {
    let dir = tempfile::tempdir().expect("must create temp dir");
    let source = memory_source(&[("../evil", b"x")]);
    let node = ContentNode::file("../evil", md5_of(b"x"), 1);
    let err = node
        .materialize_at(&source, dir.path(), &Task::new())
        .expect_err("escaping name must fail");
    assert!(matches!(err, TransferError::UnsafeName(_)));
    assert!(source.calls.borrow().is_empty());
}

#[test]
fn content_equals_requires_name_length_and_digest() {
    let a = ContentNode::file("a", md5_of(b"a"), 1);
    assert!(a.content_equals(&ContentNode::file("a", md5_of(b"a"), 1)));
    assert!(!a.content_equals(&ContentNode::file("b", md5_of(b"a"), 1)));
    assert!(!a.content_equals(&ContentNode::file("a", md5_of(b"a"), 2)));
    assert!(!a.content_equals(&ContentNode::file("a", md5_of(b"b"), 1)));
    assert!(!a.content_equals(&ContentNode::directory("a")));
}

#[derive(Default)]
struct RecordingSink {
    progress: Mutex<Vec<f64>>,
    lines: Mutex<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn on_progress(&self, fraction: f64) {
        self.progress.lock().expect("lock").push(fraction);
    }

    fn on_log(&self, line: &str) {
        self.lines.lock().expect("lock").push(line.to_string());
    }
}

#[test]
fn sub_tasks_map_onto_parent_slice() {
    let sink = Arc::new(RecordingSink::default());
    let root = Task::with_sink(sink.clone());
    let main = root.sub_task(0.2, 0.6);
    let nested = main.sub_task(0.5, 1.0);

    nested.set_progress(0.5);
    assert!((root.progress() - 0.5).abs() < 1e-9);
    main.set_progress(1.0);
    assert!((root.progress() - 0.6).abs() < 1e-9);

    let silent = main.silent();
    silent.set_progress(0.0);
    silent.log("hidden");
    assert!((root.progress() - 0.6).abs() < 1e-9);

    nested.log("visible");
    assert_eq!(*sink.lines.lock().expect("lock"), vec!["visible".to_string()]);
    assert_eq!(root.log_lines(), vec!["visible".to_string()]);
    assert_eq!(sink.progress.lock().expect("lock").len(), 2);
}

#[test]
fn cancellation_is_shared_across_the_tree() {
    let root = Task::new();
    let child = root.sub_task(0.0, 0.5).silent();
    let handle = root.cancel_handle();
    assert!(child.is_active());
    std::thread::spawn(move || handle.cancel())
        .join()
        .expect("thread must finish");
    assert!(!child.is_active());
    assert!(!root.is_active());
}

#[test]
fn host_state_reads_launcher_values() {
    let values = [
        (host::ENV_UPDATE_CODE, "2"),
        (host::ENV_UPDATE_MSG, "runtime failed to start"),
        (host::ENV_DEVELOPER_MODE, "true"),
        (host::ENV_INSTALL_ROOT, "/opt/demo"),
        (host::ENV_LAUNCHER_VERSION, "1.3"),
        (host::ENV_RUNTIME_VERSION, "1.8.0_73"),
    ];
    let state = HostState::from_lookup(|name| {
        values
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    })
    .expect("must read host state");

    assert_eq!(state.outcome, UpdateOutcome::Failed);
    assert_eq!(state.outcome_message.as_deref(), Some("runtime failed to start"));
    assert!(state.developer_mode);
    assert_eq!(state.install_root.as_deref(), Some(Path::new("/opt/demo")));
    assert_eq!(state.launcher_version, Some(PlainVersion::new(1, 3, 0)));
    assert_eq!(
        state.runtime_version.as_ref().map(RuntimeVersion::label),
        Some("1.8.0_73")
    );
    assert!(!state.runtime_external);
}

#[test]
fn host_state_rejects_unknown_outcome_code() {
    let err = HostState::from_lookup(|name| {
        (name == host::ENV_UPDATE_CODE).then(|| "7".to_string())
    })
        .expect_err("unknown code must fail");
    assert!(err.to_string().contains(host::ENV_UPDATE_CODE));
}
