use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;
use std::time::Duration;

use reqwest::StatusCode;

use crate::Credential;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("the update site rejected the credentials for {url}")]
    BadCredentials { url: String },

    #[error("not found: {url}")]
    NotFound { url: String },

    #[error("the update site is not reachable ({url}): {reason}")]
    Unreachable { url: String, reason: String },

    #[error("unexpected status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("failed to read {url}: {source}")]
    Io {
        url: String,
        #[source]
        source: io::Error,
    },
}

/// Opens remote resources as byte streams.
pub trait Transport: Send + Sync {
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>, FetchError>;
}

pub struct HttpTransport {
    client: reqwest::blocking::Client,
    credential: Option<Credential>,
}

impl HttpTransport {
    pub fn new(credential: Option<Credential>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("updraft/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeout)
            .timeout(None)
            .build()
            .map_err(|err| FetchError::Unreachable {
                url: String::new(),
                reason: format!("failed to build HTTP client: {err}"),
            })?;
        Ok(Self { client, credential })
    }
}

impl Transport for HttpTransport {
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>, FetchError> {
        let mut request = self.client.get(url);
        if let Some(credential) = &self.credential {
            request = request.basic_auth(credential.username(), Some(credential.secret()));
        }

        let response = request.send().map_err(|err| FetchError::Unreachable {
            url: url.to_string(),
            reason: err.without_url().to_string(),
        })?;

        match response.status() {
            status if status.is_success() => Ok(Box::new(response)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(FetchError::BadCredentials {
                url: url.to_string(),
            }),
            StatusCode::NOT_FOUND => Err(FetchError::NotFound {
                url: url.to_string(),
            }),
            status => Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }),
        }
    }
}

/// Serves `file://` URLs and bare paths; used for local mirrors.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTransport;

impl FileTransport {
    pub fn path_for(url: &str) -> PathBuf {
        PathBuf::from(url.strip_prefix("file://").unwrap_or(url))
    }
}

impl Transport for FileTransport {
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>, FetchError> {
        let path = Self::path_for(url);
        match File::open(&path) {
            Ok(file) => Ok(Box::new(file)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(FetchError::NotFound {
                url: url.to_string(),
            }),
            Err(source) => Err(FetchError::Io {
                url: url.to_string(),
                source,
            }),
        }
    }
}
