use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::{Arc, Mutex};

use updraft_core::protocol::ParseContext;
use updraft_core::{AppRelease, ContentNode, Digest, DigestAlgorithm, Task, TransferError};

use super::*;

#[derive(Default)]
struct MemoryTransport {
    files: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl MemoryTransport {
    fn with(mut self, url: &str, body: &[u8]) -> Self {
        self.files.insert(url.to_string(), body.to_vec());
        self
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("lock").clone()
    }
}

impl Transport for MemoryTransport {
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>, FetchError> {
        self.requests.lock().expect("lock").push(url.to_string());
        match self.files.get(url) {
            Some(body) => Ok(Box::new(Cursor::new(body.clone()))),
            None => Err(FetchError::NotFound {
                url: url.to_string(),
            }),
        }
    }
}

fn md5_of(bytes: &[u8]) -> Digest {
    let (digest, _) = updraft_security::compute_digest_reader(DigestAlgorithm::Md5, &mut &bytes[..])
        .expect("must hash");
    digest
}

fn release() -> AppRelease {
    AppRelease::new("Demo", "1.2.0", 1_700_000_000_000)
}

#[test]
fn credential_debug_redacts_secret() {
    let credential = Credential::new("alice", "hunter2");
    let rendered = format!("{credential:?}");
    assert!(rendered.contains("alice"));
    assert!(!rendered.contains("hunter2"));
}

#[test]
fn site_urls_follow_published_layout() {
    let site = UpdateSite::new(
        "https://updates.example.test/dist/",
        "Demo",
        Arc::new(MemoryTransport::default()),
    );
    assert_eq!(
        site.app_catalog_url(),
        "https://updates.example.test/dist/Demo/appCatalog.txt"
    );
    assert_eq!(
        site.release_catalog_url(&release()),
        "https://updates.example.test/dist/Demo/1.2.0/delta/catalog.txt"
    );
    assert_eq!(
        site.release_file_url(&release(), "lib/app.jar"),
        "https://updates.example.test/dist/Demo/1.2.0/delta/lib/app.jar"
    );
    assert_eq!(
        site.runtime_catalog_url(),
        "https://updates.example.test/dist/jre/jreCatalog.txt"
    );
    assert_eq!(
        site.launcher_catalog_url(),
        "https://updates.example.test/dist/launcher/appCatalog.txt"
    );
}

#[test]
fn fetch_app_releases_parses_remote_catalog() {
    let transport = MemoryTransport::default().with(
        "mem://site/Demo/appCatalog.txt",
        b"name,Demo\nR,1.0.0,1000\nR,1.1.0,2000\n",
    );
    let site = UpdateSite::new("mem://site", "Demo", Arc::new(transport));
    let releases = site
        .fetch_app_releases(&ParseContext::new("ignored"))
        .expect("must fetch");
    assert_eq!(releases.len(), 2);
    assert_eq!(releases[1].version_label, "1.1.0");
}

#[test]
fn missing_catalog_surfaces_as_protocol_fetch_error() {
    let site = UpdateSite::new("mem://site", "Demo", Arc::new(MemoryTransport::default()));
    let err = site
        .fetch_runtime_releases(&ParseContext::new("ignored"))
        .expect_err("must fail");
    assert!(matches!(err, updraft_core::ProtocolError::Fetch { .. }));
    assert!(err.to_string().contains("jre/jreCatalog.txt"));
}

#[test]
fn download_verified_rejects_and_removes_corrupt_payload() {
    let dir = tempfile::tempdir().expect("must create temp dir");
    let transport = MemoryTransport::default().with("mem://site/jre/17/jre.tar.gz", b"corrupt");
    let site = UpdateSite::new("mem://site", "Demo", Arc::new(transport));
    let dest = dir.path().join("jre.tar.gz");

    let err = site
        .download_verified(
            "mem://site/jre/17/jre.tar.gz",
            &dest,
            &md5_of(b"payload"),
            7,
            &Task::new(),
        )
        .expect_err("digest mismatch must fail");
    assert!(matches!(err, TransferError::DigestMismatch { .. }));
    assert!(!dest.exists());
}

#[test]
fn download_reports_progress_and_stops_when_cancelled() {
    let dir = tempfile::tempdir().expect("must create temp dir");
    let body = vec![7_u8; 200_000];
    let transport = MemoryTransport::default().with("mem://big", &body);
    let site = UpdateSite::new("mem://site", "Demo", Arc::new(transport));

    let task = Task::new();
    let dest = dir.path().join("big.bin");
    let written = site
        .download("mem://big", &dest, Some(body.len() as u64), &task)
        .expect("must download");
    assert_eq!(written, 200_000);
    assert!((task.progress() - 1.0).abs() < 1e-9);

    task.cancel();
    let err = site
        .download("mem://big", &dest, None, &task)
        .expect_err("cancelled download must fail");
    assert!(matches!(err, TransferError::Cancelled));
    assert!(!dest.exists());
}

#[test]
fn remote_source_materializes_release_files() {
    let dir = tempfile::tempdir().expect("must create temp dir");
    let transport = Arc::new(
        MemoryTransport::default().with("mem://site/Demo/1.2.0/delta/lib/app.jar", b"jar-bytes"),
    );
    let site = UpdateSite::new("mem://site", "Demo", transport.clone());
    let release = release();
    let source = RemoteSource::new(&site, &release);

    let node = ContentNode::file("lib/app.jar", md5_of(b"jar-bytes"), 9);
    node.materialize_at(&source, dir.path(), &Task::new())
        .expect("must materialize");
    assert_eq!(
        std::fs::read(dir.path().join("lib/app.jar")).expect("must read"),
        b"jar-bytes"
    );
    assert_eq!(
        transport.requests(),
        vec!["mem://site/Demo/1.2.0/delta/lib/app.jar".to_string()]
    );
}

#[test]
fn local_source_and_file_transport_read_from_disk() {
    let dir = tempfile::tempdir().expect("must create temp dir");
    let installed = dir.path().join("app");
    std::fs::create_dir_all(&installed).expect("must create app dir");
    std::fs::write(installed.join("app.jar"), b"same").expect("must write");

    let dest = dir.path().join("out");
    let node = ContentNode::file("app.jar", md5_of(b"same"), 4);
    node.materialize_at(&LocalSource::new(&installed), &dest, &Task::new())
        .expect("must copy locally");
    assert_eq!(std::fs::read(dest.join("app.jar")).expect("must read"), b"same");

    let url = format!("file://{}", installed.join("app.jar").display());
    let mut body = String::new();
    FileTransport
        .open(&url)
        .expect("must open")
        .read_to_string(&mut body)
        .expect("must read");
    assert_eq!(body, "same");
    assert!(matches!(
        FileTransport.open("file:///definitely/missing/file"),
        Err(FetchError::NotFound { .. })
    ));
}
