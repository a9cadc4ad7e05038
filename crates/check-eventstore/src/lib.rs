//! Cluster membership check for an EventStore gossip endpoint.
//!
//! Issues a single GET against the gossip URL and verifies that every entry
//! in the `members` list reports `isAlive`. The first member that does not
//! is reported and the scan stops; members after it are never evaluated.
//! Every failure path collapses to CRITICAL under the agent's plugin-status
//! convention.

#![warn(clippy::pedantic)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::{Certificate, Client, Identity, Url};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use plugin::Report;

/// Name prefixed to the protocol line on stdout.
pub const CHECK_NAME: &str = "CheckEventstore";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Everything that can go wrong during one check invocation.
///
/// Each variant's `Display` output is the exact message the agent sees;
/// all of them map to CRITICAL.
#[derive(Debug, Error)]
pub enum CheckError {
    /// The request exceeded the configured timeout.
    #[error("Connection timed out")]
    TimedOut,

    /// Any other network-level failure: refused connection, DNS, TLS.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Non-2xx response, reported as the literal status code.
    #[error("{0}")]
    HttpStatus(u16),

    /// The body was not syntactically valid JSON.
    #[error("invalid JSON from request")]
    InvalidJson,

    /// A required key was absent from the document or a member record.
    #[error("could not find key: {0}")]
    MissingKey(&'static str),

    /// `members` was present but not a sequence.
    #[error("members is not a list")]
    MembersNotAList,

    /// A member reported itself dead.
    #[error("Member {address} with role {role} is not Alive")]
    MemberNotAlive { address: String, role: String },

    /// Bad option values detected while building the request.
    #[error("{0}")]
    Config(String),
}

/// Resolved options for one run. Built once from CLI input, never mutated.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    /// Gossip endpoint URL; an `https` scheme selects TLS.
    pub url: Url,
    /// Literal header name/value pairs attached to the request.
    pub headers: Vec<(String, String)>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Skip server certificate verification.
    pub insecure: bool,
    /// Client certificate file (PEM).
    pub cert: Option<PathBuf>,
    /// Client key file (PEM); when absent the cert file doubles as the key
    /// source.
    pub cert_key: Option<PathBuf>,
    /// CA bundle used for server verification.
    pub cacert: Option<PathBuf>,
    /// Bounds the whole request, connect plus read.
    pub timeout: Duration,
}

impl CheckConfig {
    #[must_use]
    pub fn new(url: Url) -> Self {
        Self {
            url,
            headers: Vec::new(),
            username: None,
            password: None,
            insecure: false,
            cert: None,
            cert_key: None,
            cacert: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Parse the `-H` option: comma-separated `Name:Value` entries, split on the
/// first colon only, value trimmed of leading whitespace.
pub fn parse_headers(raw: &str) -> Result<Vec<(String, String)>, CheckError> {
    raw.split(',')
        .map(|entry| {
            let (name, value) = entry.split_once(':').ok_or_else(|| {
                CheckError::Config(format!("malformed header entry: {entry:?}"))
            })?;
            Ok((name.to_string(), value.trim_start().to_string()))
        })
        .collect()
}

/// Run the check: one GET, then the membership scan.
pub async fn run(config: &CheckConfig) -> Result<Report, CheckError> {
    let client = build_client(config)?;

    let mut request = client.get(config.url.clone());
    if config.username.is_some() || config.password.is_some() {
        request = request.basic_auth(
            config.username.clone().unwrap_or_default(),
            config.password.clone(),
        );
    }
    request = request.headers(build_headers(&config.headers)?);

    debug!(url = %config.url, "issuing gossip request");
    let response = request.send().await.map_err(transport_error)?;

    let status = response.status();
    debug!(status = status.as_u16(), "gossip response received");
    if !status.is_success() {
        return Err(CheckError::HttpStatus(status.as_u16()));
    }

    let body = response.text().await.map_err(transport_error)?;
    evaluate_members(&body)
}

/// Scan the membership document. Short-circuits on the first failing
/// member: later members are never evaluated, so only the first dead one is
/// ever reported.
pub fn evaluate_members(body: &str) -> Result<Report, CheckError> {
    let document: Value = serde_json::from_str(body).map_err(|_| CheckError::InvalidJson)?;
    let members = document
        .get("members")
        .ok_or(CheckError::MissingKey("members"))?
        .as_array()
        .ok_or(CheckError::MembersNotAList)?;

    let mut nodes = 0usize;
    for member in members {
        nodes += 1;
        let alive = member
            .get("isAlive")
            .ok_or(CheckError::MissingKey("isAlive"))?;
        if !is_truthy(alive) {
            return Err(CheckError::MemberNotAlive {
                address: field_text(member, "internalTcpIp"),
                role: field_text(member, "state"),
            });
        }
    }

    Ok(Report::ok(format!("{nodes} nodes alive in the cluster.")))
}

fn build_client(config: &CheckConfig) -> Result<Client, CheckError> {
    let mut builder = Client::builder()
        .timeout(config.timeout)
        .redirect(Policy::none())
        .use_rustls_tls();

    if config.url.scheme() == "https" {
        if let Some(cert) = &config.cert {
            let pem = read_identity_pem(cert, config.cert_key.as_deref())?;
            let identity = Identity::from_pem(&pem)
                .map_err(|e| CheckError::Config(format!("invalid client certificate: {e}")))?;
            builder = builder.identity(identity);
        }
        if let Some(cacert) = &config.cacert {
            let bundle = fs::read(cacert).map_err(|e| {
                CheckError::Config(format!("cannot read CA bundle {}: {e}", cacert.display()))
            })?;
            let certs = Certificate::from_pem_bundle(&bundle)
                .map_err(|e| CheckError::Config(format!("invalid CA bundle: {e}")))?;
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }
        if config.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }
    }

    builder
        .build()
        .map_err(|e| CheckError::Config(format!("cannot build HTTP client: {e}")))
}

/// PEM bytes handed to `Identity::from_pem`. Without a separate key file
/// the certificate file's own bytes are reused as the key source, matching
/// the documented option behavior.
fn read_identity_pem(cert: &Path, key: Option<&Path>) -> Result<Vec<u8>, CheckError> {
    let mut pem = fs::read(cert).map_err(|e| {
        CheckError::Config(format!("cannot read certificate {}: {e}", cert.display()))
    })?;
    if let Some(key) = key {
        let key_pem = fs::read(key).map_err(|e| {
            CheckError::Config(format!("cannot read certificate key {}: {e}", key.display()))
        })?;
        pem.extend(key_pem);
    }
    Ok(pem)
}

fn build_headers(pairs: &[(String, String)]) -> Result<HeaderMap, CheckError> {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let name = HeaderName::try_from(name.as_str())
            .map_err(|_| CheckError::Config(format!("invalid header name: {name:?}")))?;
        let value = HeaderValue::try_from(value.as_str())
            .map_err(|_| CheckError::Config(format!("invalid header value: {value:?}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn transport_error(err: reqwest::Error) -> CheckError {
    if err.is_timeout() {
        return CheckError::TimedOut;
    }
    CheckError::Connection(root_cause(&err))
}

/// Innermost source message; reqwest's own `Display` buries the cause
/// under the URL and a generic phrase.
fn root_cause(err: &dyn std::error::Error) -> String {
    let mut cause = err;
    while let Some(source) = cause.source() {
        cause = source;
    }
    cause.to_string()
}

/// `false` and `null` fail the liveness test; any other present value
/// passes.
fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Bool(false) | Value::Null)
}

/// Member field rendered for the failure message: absent and null become
/// the empty string, strings print bare, other scalars via JSON text.
fn field_text(member: &Value, key: &str) -> String {
    match member.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugin::Status;

    #[test]
    fn test_parse_headers_single_pair() {
        let headers = parse_headers("Accept: application/json").unwrap();
        assert_eq!(headers, vec![("Accept".into(), "application/json".into())]);
    }

    #[test]
    fn test_parse_headers_multiple_pairs() {
        let headers = parse_headers("X-One:1,X-Two: 2").unwrap();
        assert_eq!(
            headers,
            vec![("X-One".into(), "1".into()), ("X-Two".into(), "2".into())]
        );
    }

    #[test]
    fn test_parse_headers_splits_on_first_colon_only() {
        let headers = parse_headers("Authorization: Bearer a:b:c").unwrap();
        assert_eq!(
            headers,
            vec![("Authorization".into(), "Bearer a:b:c".into())]
        );
    }

    #[test]
    fn test_parse_headers_without_colon_is_config_error() {
        let err = parse_headers("NoColonHere").unwrap_err();
        assert!(matches!(err, CheckError::Config(_)));
    }

    #[test]
    fn test_all_members_alive() {
        let body = r#"{"members": [
            {"isAlive": true, "internalTcpIp": "10.0.0.1", "state": "Master"},
            {"isAlive": true, "internalTcpIp": "10.0.0.2", "state": "Slave"},
            {"isAlive": true, "internalTcpIp": "10.0.0.3", "state": "Slave"}
        ]}"#;
        let report = evaluate_members(body).unwrap();
        assert_eq!(report.status, Status::Ok);
        assert_eq!(report.message, "3 nodes alive in the cluster.");
    }

    #[test]
    fn test_empty_members_list_is_ok_with_count_zero() {
        let report = evaluate_members(r#"{"members": []}"#).unwrap();
        assert_eq!(report.status, Status::Ok);
        assert_eq!(report.message, "0 nodes alive in the cluster.");
    }

    #[test]
    fn test_first_dead_member_short_circuits() {
        // The third member is also dead but must never be reported.
        let body = r#"{"members": [
            {"isAlive": true, "internalTcpIp": "10.0.0.1", "state": "Master"},
            {"isAlive": false, "internalTcpIp": "10.0.0.2", "state": "Slave"},
            {"isAlive": false, "internalTcpIp": "10.0.0.3", "state": "Clone"}
        ]}"#;
        let err = evaluate_members(body).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Member 10.0.0.2 with role Slave is not Alive"
        );
    }

    #[test]
    fn test_dead_member_with_missing_fields_renders_empty() {
        let body = r#"{"members": [{"isAlive": false}]}"#;
        let err = evaluate_members(body).unwrap_err();
        assert_eq!(err.to_string(), "Member  with role  is not Alive");
    }

    #[test]
    fn test_null_is_alive_counts_as_dead() {
        let body =
            r#"{"members": [{"isAlive": null, "internalTcpIp": "10.0.0.9", "state": "Slave"}]}"#;
        let err = evaluate_members(body).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Member 10.0.0.9 with role Slave is not Alive"
        );
    }

    #[test]
    fn test_member_missing_is_alive_key() {
        let body = r#"{"members": [{"internalTcpIp": "10.0.0.1", "state": "Master"}]}"#;
        let err = evaluate_members(body).unwrap_err();
        assert_eq!(err.to_string(), "could not find key: isAlive");
    }

    #[test]
    fn test_missing_is_alive_beats_later_dead_member() {
        // Scan order decides which failure is reported.
        let body = r#"{"members": [
            {"internalTcpIp": "10.0.0.1", "state": "Master"},
            {"isAlive": false, "internalTcpIp": "10.0.0.2", "state": "Slave"}
        ]}"#;
        let err = evaluate_members(body).unwrap_err();
        assert_eq!(err.to_string(), "could not find key: isAlive");
    }

    #[test]
    fn test_document_missing_members_key() {
        let err = evaluate_members(r#"{"nodes": []}"#).unwrap_err();
        assert_eq!(err.to_string(), "could not find key: members");
    }

    #[test]
    fn test_members_not_a_list() {
        let err = evaluate_members(r#"{"members": "all of them"}"#).unwrap_err();
        assert!(matches!(err, CheckError::MembersNotAList));
    }

    #[test]
    fn test_invalid_json_body() {
        let err = evaluate_members("<html>not json</html>").unwrap_err();
        assert_eq!(err.to_string(), "invalid JSON from request");
    }

    #[test]
    fn test_unknown_member_fields_are_ignored() {
        let body = r#"{"members": [
            {"isAlive": true, "internalTcpIp": "10.4.5.179", "state": "Slave",
             "instanceId": "0ea06dba-a7d6-403b-ad8f-9f13d0ac39be",
             "internalTcpPort": 1111, "lastCommitPosition": 249877750}
        ]}"#;
        let report = evaluate_members(body).unwrap();
        assert_eq!(report.message, "1 nodes alive in the cluster.");
    }

    #[test]
    fn test_http_status_message_is_the_literal_code() {
        assert_eq!(CheckError::HttpStatus(404).to_string(), "404");
        assert_eq!(CheckError::HttpStatus(503).to_string(), "503");
    }
}
