//! check-eventstore
//!
//! Polls an EventStore gossip endpoint and reports CRITICAL if any cluster
//! member is not alive. One request, one protocol line, one exit code.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use reqwest::Url;
use tracing::debug;

use check_eventstore::{parse_headers, CheckConfig, CheckError, CHECK_NAME};
use plugin::Report;

/// Check that every member of an EventStore cluster reports itself alive
#[derive(Parser)]
#[command(name = "check-eventstore")]
#[command(about = "Check every members.[].isAlive key of a gossip endpoint")]
#[command(version)]
struct Cli {
    /// Gossip endpoint URL, e.g. http://db-1:2113/gossip?format=json
    #[arg(short, long)]
    url: String,

    /// Comma-separated request headers ("Name: Value,Name: Value")
    #[arg(short = 'H', long)]
    header: Option<String>,

    /// Force SSL (accepted for compatibility; the URL scheme decides)
    #[arg(short = 's')]
    ssl: bool,

    /// Skip server certificate verification
    #[arg(short = 'k')]
    insecure: bool,

    /// Basic auth username
    #[arg(short = 'U', long)]
    username: Option<String>,

    /// Basic auth password
    #[arg(short = 'a', long)]
    password: Option<String>,

    /// Client certificate file (PEM)
    #[arg(short = 'c', long)]
    cert: Option<PathBuf>,

    /// Client key file (PEM); defaults to the cert file itself
    #[arg(long = "cert-key")]
    cert_key: Option<PathBuf>,

    /// CA certificate bundle for server verification
    #[arg(short = 'C', long)]
    cacert: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(short, long, default_value = "15")]
    timeout: u64,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    plugin::init_tracing(cli.verbose, "check_eventstore=debug");

    // Top-level boundary: every failure, anticipated or not, becomes a
    // CRITICAL report so the agent never sees a bare crash.
    let report = match run_check(&cli).await {
        Ok(report) => report,
        Err(err) => Report::critical(err.to_string()),
    };
    plugin::print_and_exit(CHECK_NAME, &report);
}

async fn run_check(cli: &Cli) -> Result<Report, CheckError> {
    let config = build_config(cli)?;
    check_eventstore::run(&config).await
}

fn build_config(cli: &Cli) -> Result<CheckConfig, CheckError> {
    let url = Url::parse(&cli.url)
        .map_err(|e| CheckError::Config(format!("invalid url {:?}: {e}", cli.url)))?;
    if cli.ssl && url.scheme() != "https" {
        debug!("-s has no effect, the URL scheme selects TLS");
    }

    let mut config = CheckConfig::new(url);
    if let Some(raw) = &cli.header {
        config.headers = parse_headers(raw)?;
    }
    config.username = cli.username.clone();
    config.password = cli.password.clone();
    config.insecure = cli.insecure;
    config.cert = cli.cert.clone();
    config.cert_key = cli.cert_key.clone();
    config.cacert = cli.cacert.clone();
    config.timeout = Duration::from_secs(cli.timeout);
    Ok(config)
}
