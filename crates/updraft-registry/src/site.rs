use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::Path;
use std::sync::Arc;

use updraft_core::protocol::{
    parse_app_catalog, parse_artifact_catalog, parse_launcher_catalog, parse_runtime_catalog,
    ParseContext,
};
use updraft_core::{
    AppRelease, ArtifactCatalog, Digest, LauncherRelease, ProtocolError, RuntimeRelease, Task,
    TransferError,
};
use updraft_security::DigestWriter;

use crate::{FetchError, Transport};

const CHUNK_SIZE: usize = 64 * 1024;

/// The remote layout all catalogs and artifacts are published under.
///
/// ```text
/// <base>/<app>/appCatalog.txt
/// <base>/<app>/<version>/delta/catalog.txt
/// <base>/<app>/<version>/delta/<file>
/// <base>/jre/jreCatalog.txt
/// <base>/jre/<version>/<file>
/// <base>/launcher/appCatalog.txt
/// <base>/launcher/<file>
/// ```
#[derive(Clone)]
pub struct UpdateSite {
    base_url: String,
    app_name: String,
    transport: Arc<dyn Transport>,
}

impl UpdateSite {
    pub fn new(
        base_url: impl Into<String>,
        app_name: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            app_name: app_name.into(),
            transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn app_catalog_url(&self) -> String {
        format!("{}/{}/appCatalog.txt", self.base_url, self.app_name)
    }

    pub fn release_dir_url(&self, release: &AppRelease) -> String {
        format!(
            "{}/{}/{}/delta",
            self.base_url, self.app_name, release.version_label
        )
    }

    pub fn release_catalog_url(&self, release: &AppRelease) -> String {
        format!("{}/catalog.txt", self.release_dir_url(release))
    }

    pub fn release_file_url(&self, release: &AppRelease, name: &str) -> String {
        format!("{}/{}", self.release_dir_url(release), name)
    }

    pub fn runtime_catalog_url(&self) -> String {
        format!("{}/jre/jreCatalog.txt", self.base_url)
    }

    pub fn runtime_file_url(&self, runtime: &RuntimeRelease) -> String {
        format!(
            "{}/jre/{}/{}",
            self.base_url,
            runtime.version.label(),
            runtime.file_name
        )
    }

    pub fn launcher_catalog_url(&self) -> String {
        format!("{}/launcher/appCatalog.txt", self.base_url)
    }

    pub fn launcher_file_url(&self, launcher: &LauncherRelease) -> String {
        format!("{}/launcher/{}", self.base_url, launcher.file_name)
    }

    fn open_catalog(&self, url: &str) -> Result<BufReader<Box<dyn Read + Send>>, ProtocolError> {
        tracing::debug!(%url, "fetching catalog");
        self.transport
            .open(url)
            .map(BufReader::new)
            .map_err(|err| ProtocolError::Fetch {
                origin: url.to_string(),
                reason: err.to_string(),
            })
    }

    pub fn fetch_app_releases(&self, ctx: &ParseContext) -> Result<Vec<AppRelease>, ProtocolError> {
        let url = self.app_catalog_url();
        let reader = self.open_catalog(&url)?;
        parse_app_catalog(reader, &self.app_name, &with_origin(ctx, &url))
    }

    pub fn fetch_release_catalog(
        &self,
        release: &AppRelease,
        ctx: &ParseContext,
    ) -> Result<ArtifactCatalog, ProtocolError> {
        let url = self.release_catalog_url(release);
        let reader = self.open_catalog(&url)?;
        parse_artifact_catalog(reader, &with_origin(ctx, &url))
    }

    pub fn fetch_runtime_releases(
        &self,
        ctx: &ParseContext,
    ) -> Result<Vec<RuntimeRelease>, ProtocolError> {
        let url = self.runtime_catalog_url();
        let reader = self.open_catalog(&url)?;
        parse_runtime_catalog(reader, &with_origin(ctx, &url))
    }

    pub fn fetch_launcher_releases(
        &self,
        ctx: &ParseContext,
    ) -> Result<Vec<LauncherRelease>, ProtocolError> {
        let url = self.launcher_catalog_url();
        let reader = self.open_catalog(&url)?;
        parse_launcher_catalog(reader, &with_origin(ctx, &url))
    }

    /// Streams `url` into `dest`. Progress is reported against
    /// `expected_len`, and cancellation is honored between chunks.
    pub fn download(
        &self,
        url: &str,
        dest: &Path,
        expected_len: Option<u64>,
        task: &Task,
    ) -> Result<u64, TransferError> {
        self.download_inner(url, dest, expected_len, None, task)
            .map(|(written, _)| written)
    }

    /// Downloads and checks the result against `digest` and `length`; a
    /// mismatching file is removed.
    pub fn download_verified(
        &self,
        url: &str,
        dest: &Path,
        digest: &Digest,
        length: u64,
        task: &Task,
    ) -> Result<(), TransferError> {
        let (written, actual) =
            self.download_inner(url, dest, Some(length), Some(digest), task)?;
        if written != length {
            let _ = fs::remove_file(dest);
            return Err(TransferError::LengthMismatch {
                path: dest.to_path_buf(),
                expected: length,
                actual: written,
            });
        }
        if let Some(actual) = actual {
            if &actual != digest {
                let _ = fs::remove_file(dest);
                return Err(TransferError::DigestMismatch {
                    path: dest.to_path_buf(),
                    expected: digest.to_hex(),
                    actual: actual.to_hex(),
                });
            }
        }
        Ok(())
    }

    fn download_inner(
        &self,
        url: &str,
        dest: &Path,
        expected_len: Option<u64>,
        digest: Option<&Digest>,
        task: &Task,
    ) -> Result<(u64, Option<Digest>), TransferError> {
        tracing::debug!(%url, dest = %dest.display(), "downloading");
        let mut reader = self.transport.open(url).map_err(|err| fetch_error(url, err))?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|err| TransferError::io(parent, err))?;
        }
        let mut file = File::create(dest).map_err(|err| TransferError::io(dest, err))?;
        let mut hasher = digest.map(|digest| DigestWriter::new(digest.algorithm()));

        let mut buffer = vec![0_u8; CHUNK_SIZE];
        let mut written = 0_u64;
        loop {
            if !task.is_active() {
                drop(file);
                let _ = fs::remove_file(dest);
                return Err(TransferError::Cancelled);
            }
            let read = reader.read(&mut buffer).map_err(|err| TransferError::Fetch {
                url: url.to_string(),
                reason: err.to_string(),
            })?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read])
                .map_err(|err| TransferError::io(dest, err))?;
            if let Some(hasher) = hasher.as_mut() {
                hasher.update(&buffer[..read]);
            }
            written += read as u64;
            if let Some(total) = expected_len.filter(|total| *total > 0) {
                task.set_progress(written as f64 / total as f64);
            }
        }
        file.flush().map_err(|err| TransferError::io(dest, err))?;

        Ok((written, hasher.map(DigestWriter::finish)))
    }
}

fn with_origin(ctx: &ParseContext, url: &str) -> ParseContext {
    ParseContext {
        origin: url.to_string(),
        ..ctx.clone()
    }
}

fn fetch_error(url: &str, err: FetchError) -> TransferError {
    TransferError::Fetch {
        url: url.to_string(),
        reason: err.to_string(),
    }
}
