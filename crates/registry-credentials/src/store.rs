use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// A username/secret pair for one registry host.
///
/// Both fields empty means anonymous access. The secret is opaque to the
/// store (password or token) and is never logged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub secret: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.username.is_empty() && self.secret.is_empty()
    }
}

/// How the secret for a host is obtained at lookup time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialRecord {
    /// The secret is stored directly in the config file.
    Inline(Credential),
    /// The secret is retrieved by invoking `docker-credential-<name>`
    /// when the credential is looked up.
    Helper(String),
}

/// One `auths` entry. Field names match docker's `config.json` so
/// existing files load unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AuthEntry {
    /// `base64("username:secret")`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auth: Option<String>,

    /// Token-only auth; takes precedence over the password half of
    /// `auth` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    identitytoken: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    auths: BTreeMap<String, AuthEntry>,

    /// host -> helper name. Read-only configuration: `put`/`delete`
    /// operate on `auths` only.
    #[serde(
        default,
        rename = "credHelpers",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    cred_helpers: BTreeMap<String, String>,
}

/// File-backed map of registry host to credential.
///
/// Hosts are exact `host[:port]` keys, no scheme, no wildcard matching.
/// A missing file is an empty store; mutations persist synchronously via
/// a sibling temp file renamed into place, so a failed write leaves the
/// previous file intact.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    config: ConfigFile,
}

impl CredentialStore {
    /// Read the store file if present; absent means empty.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => ConfigFile::default(),
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|e| Error::StoreCorrupt {
                    path: path.clone(),
                    reason: e.to_string(),
                })?
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => ConfigFile::default(),
            Err(source) => return Err(Error::StoreAccess { path, source }),
        };

        debug!(
            path = %path.display(),
            entries = config.auths.len(),
            "loaded credential store"
        );
        Ok(Self { path, config })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up the record for `host`. Absence is not an error: a host
    /// never configured here is accessed anonymously.
    pub fn get(&self, host: &str) -> Result<Option<CredentialRecord>> {
        if let Some(helper) = self.config.cred_helpers.get(host) {
            return Ok(Some(CredentialRecord::Helper(helper.clone())));
        }

        let Some(entry) = self.config.auths.get(host) else {
            return Ok(None);
        };

        let mut credential = match entry.auth.as_deref() {
            Some(auth) => decode_auth(auth).map_err(|reason| Error::StoreCorrupt {
                path: self.path.clone(),
                reason: format!("entry for {host}: {reason}"),
            })?,
            None => Credential::default(),
        };
        if let Some(token) = entry.identitytoken.as_deref()
            && !token.is_empty()
        {
            credential.secret = token.to_string();
        }

        Ok(Some(CredentialRecord::Inline(credential)))
    }

    /// Insert or overwrite the credential for `host` and persist.
    pub fn put(&mut self, host: &str, credential: &Credential) -> Result<()> {
        let entry = AuthEntry {
            auth: Some(encode_auth(credential)),
            identitytoken: None,
        };
        let previous = self.config.auths.insert(host.to_string(), entry);
        if let Err(e) = self.persist() {
            match previous {
                Some(previous) => self.config.auths.insert(host.to_string(), previous),
                None => self.config.auths.remove(host),
            };
            return Err(e);
        }
        Ok(())
    }

    /// Remove the credential for `host` and persist. A host with no
    /// stored credential is a caller-visible error, not a no-op.
    pub fn delete(&mut self, host: &str) -> Result<()> {
        let Some(previous) = self.config.auths.remove(host) else {
            return Err(Error::CredentialNotFound {
                host: host.to_string(),
            });
        };
        if let Err(e) = self.persist() {
            self.config.auths.insert(host.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        let write_err = |source: io::Error| Error::StoreWrite {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let json = serde_json::to_string_pretty(&self.config)
            .map_err(|e| write_err(io::Error::other(e)))?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json).map_err(write_err)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600)).map_err(write_err)?;
        }
        fs::rename(&tmp, &self.path).map_err(write_err)
    }
}

fn encode_auth(credential: &Credential) -> String {
    base64::engine::general_purpose::STANDARD.encode(format!(
        "{}:{}",
        credential.username, credential.secret
    ))
}

fn decode_auth(auth: &str) -> std::result::Result<Credential, String> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(auth.as_bytes())
        .map_err(|e| format!("auth field is not valid base64: {e}"))?;
    let decoded =
        String::from_utf8(decoded).map_err(|_| "auth field is not valid UTF-8".to_string())?;
    let (username, secret) = decoded
        .split_once(':')
        .ok_or_else(|| "auth field must decode to 'username:secret'".to_string())?;
    Ok(Credential::new(username, secret))
}
