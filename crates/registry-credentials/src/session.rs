use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT, WWW_AUTHENTICATE};
use tracing::debug;
use url::Url;

use crate::client::{ClientOptions, RegistryProtocol};
use crate::error::{Error, Result};

/// Stateless verification oracle for registry logins.
///
/// `verify_login` performs the `/v2/` challenge exchange and reports
/// accept/reject; it never touches the credential store. The call is a
/// plain future: dropping it cancels the in-flight request.
#[derive(Debug, Clone)]
pub(crate) struct AuthSession {
    http: reqwest::Client,
    protocol: RegistryProtocol,
}

impl AuthSession {
    pub(crate) fn new(options: &ClientOptions) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!(
                "registry-credentials/",
                env!("CARGO_PKG_VERSION")
            )),
        );

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Self {
            http,
            protocol: options.protocol.clone(),
        })
    }

    /// Present `username:password` to `host`'s auth endpoint.
    ///
    /// Success means the registry accepted the credential (or requires no
    /// auth at all). Everything else, including unreachable hosts and TLS
    /// failures, is an [`Error::AuthRejected`] carrying the reason.
    pub(crate) async fn verify_login(
        &self,
        host: &str,
        username: &str,
        password: &str,
    ) -> Result<()> {
        let reject = |reason: String| Error::AuthRejected {
            host: host.to_string(),
            reason,
        };

        let base = Url::parse(&format!("{}://{host}/v2/", self.protocol.scheme_for(host)))
            .map_err(|e| reject(format!("invalid registry host: {e}")))?;

        // Unauthenticated probe to discover the challenge scheme.
        let probe = self
            .http
            .get(base.clone())
            .send()
            .await
            .map_err(|e| reject(format!("registry unreachable: {e}")))?;
        let status = probe.status();
        if status.is_success() {
            debug!(host, "registry requires no authentication");
            return Ok(());
        }
        if status != StatusCode::UNAUTHORIZED {
            return Err(reject(format!("unexpected status {status} from {base}")));
        }

        let challenge = probe
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .and_then(Challenge::parse)
            .ok_or_else(|| reject("401 without a usable WWW-Authenticate challenge".into()))?;
        debug!(host, ?challenge, "received auth challenge");

        match challenge {
            Challenge::Basic => {
                let resp = self
                    .http
                    .get(base)
                    .basic_auth(username, Some(password))
                    .send()
                    .await
                    .map_err(|e| reject(format!("registry unreachable: {e}")))?;
                if resp.status().is_success() {
                    Ok(())
                } else {
                    Err(reject(format!("basic auth failed with {}", resp.status())))
                }
            }
            Challenge::Bearer {
                realm,
                service,
                scope,
            } => {
                let mut query: Vec<(&str, &str)> = Vec::new();
                if let Some(service) = service.as_deref() {
                    query.push(("service", service));
                }
                if let Some(scope) = scope.as_deref() {
                    query.push(("scope", scope));
                }

                let resp = self
                    .http
                    .get(&realm)
                    .query(&query)
                    .basic_auth(username, Some(password))
                    .send()
                    .await
                    .map_err(|e| reject(format!("token endpoint unreachable: {e}")))?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(reject(format!("token endpoint refused with {status}")));
                }

                let token: TokenResponse = resp
                    .json()
                    .await
                    .map_err(|e| reject(format!("invalid token response: {e}")))?;
                if token.token().is_empty() {
                    return Err(reject("token endpoint returned an empty token".into()));
                }
                Ok(())
            }
        }
    }
}

/// Parsed `WWW-Authenticate` challenge.
#[derive(Debug, PartialEq, Eq)]
enum Challenge {
    Basic,
    Bearer {
        realm: String,
        service: Option<String>,
        scope: Option<String>,
    },
}

impl Challenge {
    fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let (scheme, params) = match header.split_once(' ') {
            Some((scheme, params)) => (scheme, params.trim()),
            None => (header, ""),
        };

        if scheme.eq_ignore_ascii_case("basic") {
            return Some(Challenge::Basic);
        }
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }

        let mut realm = None;
        let mut service = None;
        let mut scope = None;
        for param in params.split(',') {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"').to_string();
            match key.trim().to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value),
                "service" => service = Some(value),
                "scope" => scope = Some(value),
                _ => {}
            }
        }

        Some(Challenge::Bearer {
            realm: realm?,
            service,
            scope,
        })
    }
}

#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: String,
    #[serde(default)]
    access_token: String,
}

impl TokenResponse {
    fn token(&self) -> &str {
        if self.token.is_empty() {
            &self.access_token
        } else {
            &self.token
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_challenge() {
        assert_eq!(
            Challenge::parse(r#"Basic realm="test-registry""#),
            Some(Challenge::Basic)
        );
        assert_eq!(Challenge::parse("basic"), Some(Challenge::Basic));
    }

    #[test]
    fn parses_bearer_challenge() {
        let parsed = Challenge::parse(
            r#"Bearer realm="https://auth.example.com/token",service="registry.example.com",scope="repository:lib/app:pull""#,
        );
        assert_eq!(
            parsed,
            Some(Challenge::Bearer {
                realm: "https://auth.example.com/token".to_string(),
                service: Some("registry.example.com".to_string()),
                scope: Some("repository:lib/app:pull".to_string()),
            })
        );
    }

    #[test]
    fn bearer_without_realm_is_unusable() {
        assert_eq!(Challenge::parse(r#"Bearer service="x""#), None);
    }

    #[test]
    fn unknown_scheme_is_unusable() {
        assert_eq!(Challenge::parse(r#"Negotiate abc"#), None);
    }

    #[test]
    fn token_response_falls_back_to_access_token() {
        let parsed: TokenResponse =
            serde_json::from_str(r#"{"access_token": "abc"}"#).unwrap();
        assert_eq!(parsed.token(), "abc");
    }
}
