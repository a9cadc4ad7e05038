//! Plugin-status protocol for monitoring checks.
//!
//! Checks in this workspace are run by a monitoring agent that classifies
//! each invocation by its exit code: 0 OK, 1 WARNING, 2 CRITICAL, 3 UNKNOWN.
//! A check prints exactly one line to stdout summarizing the outcome and
//! exits with the matching code; everything else (tracing, errors) goes to
//! stderr.
//!
//! # Usage
//!
//! ```no_run
//! use plugin::{print_and_exit, Report};
//!
//! let report = Report::ok("3 nodes alive in the cluster.");
//! print_and_exit("CheckEventstore", &report);
//! ```

#![warn(clippy::pedantic)]

use std::fmt;

/// The four outcome levels of the agent's plugin convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// All checks passed.
    Ok,
    /// Degraded but not failing. Reserved; neither check in this workspace
    /// emits it.
    Warning,
    /// A failure condition.
    Critical,
    /// An unhandled or unexpected internal error.
    Unknown,
}

impl Status {
    /// Exit code consumed by the monitoring agent.
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Warning => 1,
            Status::Critical => 2,
            Status::Unknown => 3,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::Critical => "CRITICAL",
            Status::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The result of one check invocation: a status level plus a one-line
/// human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub status: Status,
    pub message: String,
}

impl Report {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            status: Status::Warning,
            message: message.into(),
        }
    }

    pub fn critical(message: impl Into<String>) -> Self {
        Self {
            status: Status::Critical,
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            status: Status::Unknown,
            message: message.into(),
        }
    }

    /// The single protocol line emitted on stdout.
    #[must_use]
    pub fn to_line(&self, check_name: &str) -> String {
        format!("{check_name} {}: {}", self.status, self.message)
    }
}

/// Print the outcome line and terminate with the mapped exit code.
pub fn print_and_exit(check_name: &str, report: &Report) -> ! {
    println!("{}", report.to_line(check_name));
    std::process::exit(report.status.exit_code())
}

/// Initialize stderr-bound tracing when verbose output is requested.
///
/// `default_filter` applies when `RUST_LOG` is unset, e.g.
/// `"check_eventstore=debug"`. Stdout is left untouched so the protocol
/// line stays the only thing the agent captures.
pub fn init_tracing(verbose: bool, default_filter: &str) {
    if !verbose {
        return;
    }
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}
