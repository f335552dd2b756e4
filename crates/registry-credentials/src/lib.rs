//! Docker-config-backed credential client for OCI registries.
//!
//! This crate resolves, persists, and validates registry credentials
//! keyed by `host[:port]`, and exposes them to [`oci-client`] for
//! artifact transfer.
//!
//! It supports:
//! - A file-backed credential store compatible with docker's
//!   `config.json` (`auths` entries, `credHelpers` indirection).
//! - Login verification against the registry's `/v2/` auth endpoint
//!   (Basic and Bearer-token challenges) before anything is persisted.
//! - An [`AuthResolver`] adapter that hands the transfer layer a
//!   configured [`oci_client::Client`] with lazy per-host credential
//!   lookup.
//!
//! # Example
//!
//! ```no_run
//! use registry_credentials::RegistryClient;
//!
//! # async fn run() -> registry_credentials::Result<()> {
//! let mut client = RegistryClient::new()?;
//! client.login("registry.example.com", "alice", "wonderland").await?;
//!
//! let credential = client.credential("registry.example.com")?;
//! assert_eq!(credential.username, "alice");
//!
//! // A host never logged into resolves to an anonymous credential.
//! assert!(client.credential("public.example.net")?.is_anonymous());
//!
//! // resolver.client() + per-host auth drive oci-client pulls/pushes.
//! let resolver = client.resolver()?;
//! let _auth = resolver.auth_for("registry.example.com")?;
//! # Ok(()) }
//! ```

mod client;
mod error;
mod helper;
mod resolver;
mod session;
mod store;

pub use client::{ClientOptions, RegistryClient, RegistryProtocol};
pub use error::{Error, Result};
pub use resolver::AuthResolver;
pub use store::{Credential, CredentialRecord, CredentialStore};

// Downstream callers pass this back into oci-client per host.
pub use oci_client::secrets::RegistryAuth;
