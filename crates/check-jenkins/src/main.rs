//! check-jenkins
//!
//! Polls the Jenkins metrics ping URL and reports whether the service
//! answers 200 with `pong` in the body.

use clap::Parser;

use check_jenkins::{ping_url, CHECK_NAME, PING_TIMEOUT};
use plugin::Report;

/// Check that the Jenkins metrics ping URL returns pong with status 200
#[derive(Parser)]
#[command(name = "check-jenkins")]
#[command(about = "Check that the Jenkins metrics ping URL returns pong")]
#[command(version)]
struct Cli {
    /// Jenkins host
    #[arg(short, long, default_value = "localhost")]
    server: String,

    /// Jenkins port
    #[arg(short, long, default_value = "8000")]
    port: String,

    /// Metrics token
    #[arg(short, long, default_value = "")]
    token: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    plugin::init_tracing(cli.verbose, "check_jenkins=debug");

    let url = ping_url(&cli.server, &cli.port, &cli.token);
    // Refused and timed-out connections are mapped inside run(); anything
    // else is an unanticipated failure and exits UNKNOWN.
    let report = match check_jenkins::run(&url, PING_TIMEOUT).await {
        Ok(report) => report,
        Err(err) => Report::unknown(format!("{err:#}")),
    };
    plugin::print_and_exit(CHECK_NAME, &report);
}
