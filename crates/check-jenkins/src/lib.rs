//! Ping check for the Jenkins metrics endpoint.
//!
//! One GET against `/metrics/{token}/ping`; the service is up only when the
//! response is 200 and the body contains `pong`. Refused connections and
//! timeouts have their own CRITICAL messages; anything else bubbles up and
//! is reported as UNKNOWN by the binary.

#![warn(clippy::pedantic)]

use std::time::Duration;

use anyhow::Context;
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};
use tracing::debug;

use plugin::Report;

/// Name prefixed to the protocol line on stdout.
pub const CHECK_NAME: &str = "JenkinsMetricsPingPong";

/// Fixed request timeout; not user-configurable.
pub const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Ping URL built by literal substitution, no extra encoding.
#[must_use]
pub fn ping_url(server: &str, port: &str, token: &str) -> String {
    format!("http://{server}:{port}/metrics/{token}/ping")
}

/// Run the check against an already-built URL.
///
/// The timeout is a parameter so tests do not have to wait out the fixed
/// five seconds; the binary always passes [`PING_TIMEOUT`].
pub async fn run(url: &str, timeout: Duration) -> anyhow::Result<Report> {
    let client = Client::builder()
        .timeout(timeout)
        .redirect(Policy::none())
        .build()
        .context("cannot build HTTP client")?;

    debug!(url, "issuing ping request");
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(err) if err.is_timeout() => {
            return Ok(Report::critical("Jenkins Service Connection timed out"))
        }
        Err(err) if err.is_connect() => {
            return Ok(Report::critical("Jenkins Service is not responding"))
        }
        Err(err) => return Err(err).context("ping request failed"),
    };

    let status = response.status();
    let body = match response.text().await {
        Ok(body) => body,
        Err(err) if err.is_timeout() => {
            return Ok(Report::critical("Jenkins Service Connection timed out"))
        }
        Err(err) => return Err(err).context("failed to read ping response body"),
    };

    debug!(status = status.as_u16(), "ping response received");
    if status == StatusCode::OK && body.contains("pong") {
        Ok(Report::ok("Jenkins Service is up"))
    } else {
        Ok(Report::critical("Jenkins Service is not responding"))
    }
}
