use oci_client::Client;
use oci_client::client::ClientConfig;
use oci_client::secrets::RegistryAuth;

use crate::client::ClientOptions;
use crate::error::{Error, Result};
use crate::helper;
use crate::store::{Credential, CredentialStore};

/// Transfer-layer adapter: a configured [`oci_client::Client`] plus lazy
/// per-host credential lookup.
///
/// Hand this to the push/pull layer; during a multi-host operation it
/// asks [`AuthResolver::auth_for`] for each registry it touches, without
/// the credential client knowing the hosts in advance.
pub struct AuthResolver {
    client: Client,
    store: CredentialStore,
}

impl AuthResolver {
    pub(crate) fn new(store: CredentialStore, options: &ClientOptions) -> Result<Self> {
        let mut config = ClientConfig::default();
        config.protocol = options.protocol.to_oci();
        config.user_agent = concat!("registry-credentials/", env!("CARGO_PKG_VERSION"));
        let client = Client::try_from(config).map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Self { client, store })
    }

    /// Resolve the auth to present to `host`: `Anonymous` when nothing is
    /// stored, `Basic` for username/secret pairs, `Bearer` for token-only
    /// records.
    pub fn auth_for(&self, host: &str) -> Result<RegistryAuth> {
        let credential = helper::resolve(self.store.get(host)?, host)?;
        Ok(registry_auth(credential))
    }

    /// The configured transfer client. Pair with [`AuthResolver::auth_for`]
    /// per `oci_client::Reference` host.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn registry_auth(credential: Credential) -> RegistryAuth {
    if credential.is_anonymous() {
        RegistryAuth::Anonymous
    } else if credential.username.is_empty() {
        RegistryAuth::Bearer(credential.secret)
    } else {
        RegistryAuth::Basic(credential.username, credential.secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_credential_maps_to_anonymous_auth() {
        assert!(matches!(
            registry_auth(Credential::default()),
            RegistryAuth::Anonymous
        ));
    }

    #[test]
    fn username_and_secret_map_to_basic_auth() {
        let auth = registry_auth(Credential::new("alice", "wonderland"));
        assert!(
            matches!(auth, RegistryAuth::Basic(user, pass) if user == "alice" && pass == "wonderland")
        );
    }

    #[test]
    fn token_only_credential_maps_to_bearer_auth() {
        let auth = registry_auth(Credential::new("", "some-token"));
        assert!(matches!(auth, RegistryAuth::Bearer(token) if token == "some-token"));
    }
}
