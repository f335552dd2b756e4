//! External credential helper invocation (`docker-credential-<name>`).
//!
//! Only the `get` verb is supported: the helper receives the registry
//! host on stdin and answers with a JSON `{"Username": ..., "Secret":
//! ...}` object on stdout.

use std::io::Write;
use std::process::{Command, Stdio};

use crate::error::{Error, Result};
use crate::store::{Credential, CredentialRecord};

/// Turn a store record into a usable credential, invoking the helper for
/// externally sourced entries. No record means anonymous access.
pub(crate) fn resolve(record: Option<CredentialRecord>, host: &str) -> Result<Credential> {
    match record {
        None => Ok(Credential::default()),
        Some(CredentialRecord::Inline(credential)) => Ok(credential),
        Some(CredentialRecord::Helper(name)) => lookup(&name, host),
    }
}

fn lookup(name: &str, host: &str) -> Result<Credential> {
    let fail = |reason: String| Error::Helper {
        name: name.to_string(),
        reason,
    };

    let program = format!("docker-credential-{name}");
    let mut child = Command::new(&program)
        .arg("get")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| fail(format!("failed to start {program}: {e}")))?;

    {
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| fail("helper stdin unavailable".into()))?;
        stdin
            .write_all(host.as_bytes())
            .map_err(|e| fail(format!("failed to write host to helper: {e}")))?;
    }

    let output = child
        .wait_with_output()
        .map_err(|e| fail(format!("failed to wait for helper: {e}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(fail(format!(
            "helper exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let parsed: HelperOutput = serde_json::from_slice(&output.stdout)
        .map_err(|e| fail(format!("helper produced invalid JSON: {e}")))?;
    Ok(Credential::new(parsed.username, parsed.secret))
}

#[derive(Debug, serde::Deserialize)]
struct HelperOutput {
    #[serde(rename = "Username", default)]
    username: String,
    #[serde(rename = "Secret", default)]
    secret: String,
}
