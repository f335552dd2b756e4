use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::helper;
use crate::resolver::AuthResolver;
use crate::session::AuthSession;
use crate::store::{Credential, CredentialStore};

const CONFIG_FILE_NAME: &str = "config.json";

/// Scheme selection for registry endpoints.
///
/// Mirrors `oci_client::client::ClientProtocol` so the same choice drives
/// both the login exchange and the resolver's transfer client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RegistryProtocol {
    #[default]
    Https,
    Http,
    /// HTTPS for everything except the listed `host[:port]` entries.
    HttpsExcept(Vec<String>),
}

impl RegistryProtocol {
    pub(crate) fn scheme_for(&self, host: &str) -> &'static str {
        match self {
            RegistryProtocol::Https => "https",
            RegistryProtocol::Http => "http",
            RegistryProtocol::HttpsExcept(exceptions) => {
                if exceptions.iter().any(|e| e == host) {
                    "http"
                } else {
                    "https"
                }
            }
        }
    }

    pub(crate) fn to_oci(&self) -> oci_client::client::ClientProtocol {
        match self {
            RegistryProtocol::Https => oci_client::client::ClientProtocol::Https,
            RegistryProtocol::Http => oci_client::client::ClientProtocol::Http,
            RegistryProtocol::HttpsExcept(exceptions) => {
                oci_client::client::ClientProtocol::HttpsExcept(exceptions.clone())
            }
        }
    }
}

/// Transport knobs shared by the login session and the resolver.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub protocol: RegistryProtocol,
    /// Per-request deadline for the login exchange. `None` means no
    /// client-side deadline; callers can also cancel by dropping the
    /// `login` future.
    pub request_timeout: Option<Duration>,
}

/// Credential client for `host[:port]`-addressed registries.
///
/// Owns one file-backed [`CredentialStore`] for its lifetime. Mutating
/// operations take `&mut self`: a single logical caller drives
/// `login`/`logout`/`credential` sequentially per store path. Two
/// instances pointed at the same path are not serialized against each
/// other; the last writer wins.
#[derive(Debug)]
pub struct RegistryClient {
    store: CredentialStore,
    session: AuthSession,
    options: ClientOptions,
}

impl RegistryClient {
    /// Create a client backed by the default store location:
    /// `$DOCKER_CONFIG/config.json` when set, else
    /// `~/.docker/config.json`.
    pub fn new() -> Result<Self> {
        Self::with_options(None, ClientOptions::default())
    }

    /// Create a client backed by an explicit store file path.
    pub fn with_config_path(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_options(Some(path.into()), ClientOptions::default())
    }

    pub fn with_options(path: Option<PathBuf>, options: ClientOptions) -> Result<Self> {
        let path = match path {
            Some(path) => path,
            None => default_config_path()?,
        };
        validate_store_path(&path)?;

        let store = CredentialStore::load(path)?;
        let session = AuthSession::new(&options)?;
        Ok(Self {
            store,
            session,
            options,
        })
    }

    pub fn config_path(&self) -> &Path {
        self.store.path()
    }

    /// Verify `username:password` against `host`, then persist it.
    ///
    /// The store is only touched after the registry accepts the
    /// credential; a rejected or cancelled login leaves it unchanged.
    /// Repeated logins for the same host overwrite the prior record.
    pub async fn login(&mut self, host: &str, username: &str, password: &str) -> Result<()> {
        let host = canonical_host(host)?;
        if username.is_empty() {
            return Err(Error::InvalidCredential(
                "username must not be empty".to_string(),
            ));
        }

        self.session.verify_login(host, username, password).await?;
        self.store
            .put(host, &Credential::new(username, password))?;
        debug!(host, username, "stored registry credential");
        Ok(())
    }

    /// Remove the stored credential for `host`.
    pub fn logout(&mut self, host: &str) -> Result<()> {
        self.store.delete(host)?;
        debug!(host, "removed registry credential");
        Ok(())
    }

    /// Look up the credential for `host`.
    ///
    /// A host with no stored record yields an anonymous (empty)
    /// credential, not an error; only store-level or helper failures
    /// error.
    pub fn credential(&self, host: &str) -> Result<Credential> {
        helper::resolve(self.store.get(host)?, host)
    }

    /// Build a transfer-layer resolver bound to this client's per-host
    /// credential lookup.
    ///
    /// Fails only if the transport cannot be constructed; credential
    /// lookups happen lazily as the transfer layer touches hosts.
    pub fn resolver(&self) -> Result<AuthResolver> {
        AuthResolver::new(self.store.clone(), &self.options)
    }
}

fn default_config_path() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("DOCKER_CONFIG")
        && !dir.is_empty()
    {
        return Ok(PathBuf::from(dir).join(CONFIG_FILE_NAME));
    }

    let base = directories::BaseDirs::new().ok_or_else(|| Error::ConfigPath {
        path: PathBuf::new(),
        reason: "cannot determine home directory".to_string(),
    })?;
    Ok(base.home_dir().join(".docker").join(CONFIG_FILE_NAME))
}

/// The path must be an existing file, or a location where one can be
/// created later. Directories, root paths, and permission-denied
/// locations are unusable.
fn validate_store_path(path: &Path) -> Result<()> {
    let unusable = |reason: &str| Error::ConfigPath {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Err(unusable("path is a directory")),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            // The file is created lazily on first write; only the
            // containing directory has to be usable (or creatable).
            let Some(parent) = path.parent() else {
                return Err(unusable("path has no parent directory"));
            };
            if parent.as_os_str().is_empty() {
                return Ok(());
            }
            match fs::metadata(parent) {
                Ok(meta) if meta.is_dir() => Ok(()),
                Ok(_) => Err(unusable("parent is not a directory")),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(_) => Err(unusable("parent directory is not accessible")),
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotADirectory => {
            Err(unusable("parent is not a directory"))
        }
        Err(_) => Err(unusable("path is not accessible")),
    }
}

/// Store keys and login targets are bare `host[:port]` strings.
fn canonical_host(host: &str) -> Result<&str> {
    let host = host.trim();
    if host.is_empty() {
        return Err(Error::InvalidCredential(
            "registry host must not be empty".to_string(),
        ));
    }
    if host.contains("://") || host.contains('/') {
        return Err(Error::InvalidCredential(format!(
            "registry host must be 'host[:port]' without scheme or path: {host}"
        )));
    }
    Ok(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_host_rejects_scheme_and_path() {
        assert!(canonical_host("https://registry.example.com").is_err());
        assert!(canonical_host("registry.example.com/v2").is_err());
        assert!(canonical_host("   ").is_err());
        assert_eq!(canonical_host("localhost:5000").unwrap(), "localhost:5000");
    }

    #[test]
    fn root_path_is_unusable() {
        assert!(matches!(
            validate_store_path(Path::new("/")),
            Err(Error::ConfigPath { .. })
        ));
    }

    #[test]
    fn existing_directory_is_unusable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            validate_store_path(dir.path()),
            Err(Error::ConfigPath { .. })
        ));
    }

    #[test]
    fn missing_file_in_existing_directory_is_usable() {
        let dir = tempfile::tempdir().unwrap();
        validate_store_path(&dir.path().join("config.json")).unwrap();
    }

    #[test]
    fn missing_parent_directory_is_usable() {
        let dir = tempfile::tempdir().unwrap();
        validate_store_path(&dir.path().join("nested/config.json")).unwrap();
    }

    #[test]
    fn parent_that_is_a_file_is_unusable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        assert!(matches!(
            validate_store_path(&blocker.join("config.json")),
            Err(Error::ConfigPath { .. })
        ));
    }

    #[test]
    fn file_in_place_of_an_ancestor_directory_is_unusable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();
        assert!(matches!(
            validate_store_path(&blocker.join("nested/config.json")),
            Err(Error::ConfigPath { .. })
        ));
    }

    #[test]
    fn https_except_scheme_selection() {
        let protocol = RegistryProtocol::HttpsExcept(vec!["localhost:5000".to_string()]);
        assert_eq!(protocol.scheme_for("localhost:5000"), "http");
        assert_eq!(protocol.scheme_for("registry.example.com"), "https");
    }
}
