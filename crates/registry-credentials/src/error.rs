use std::io;
use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the credential client and its store.
///
/// All failures are returned to the caller; nothing is retried
/// internally. `RegistryClient::credential` never errors on per-host
/// absence (anonymous access is the default path, not an exception).
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The supplied or default store path cannot back a credential store
    /// (a directory, a root path, or an inaccessible location).
    #[error("unusable credential store path {path}: {reason}")]
    ConfigPath { path: PathBuf, reason: String },

    /// The store file exists but cannot be parsed.
    #[error("credential store {path} is corrupt: {reason}")]
    StoreCorrupt { path: PathBuf, reason: String },

    /// The store file exists but cannot be read.
    #[error("cannot access credential store {path}")]
    StoreAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A store mutation could not be persisted. The previous on-disk and
    /// in-memory state is preserved.
    #[error("cannot persist credential store {path}")]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The caller supplied a credential that is rejected before any
    /// network I/O (e.g. an empty username on login).
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// The registry rejected the credential, or the login exchange could
    /// not complete (bad credential, TLS failure, unreachable host).
    #[error("registry {host} rejected the credential: {reason}")]
    AuthRejected { host: String, reason: String },

    /// Logout for a host with no stored credential.
    #[error("no credential stored for {host}")]
    CredentialNotFound { host: String },

    /// An external credential helper could not supply the secret.
    #[error("credential helper docker-credential-{name} failed: {reason}")]
    Helper { name: String, reason: String },

    /// The HTTP or registry transport could not be constructed.
    #[error("failed to construct registry transport: {0}")]
    Transport(String),
}
