mod credential;
mod site;
mod source;
mod transport;

pub use credential::Credential;
pub use site::UpdateSite;
pub use source::{LocalSource, RemoteSource};
pub use transport::{FetchError, FileTransport, HttpTransport, Transport};

#[cfg(test)]
mod tests;
