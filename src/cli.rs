//! Operator command line: argument parsing and the line-oriented front-end.

use std::future::Future;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::analytics::AnalyticsReport;
use crate::error::{BouncerError, Result};
use crate::ratelimit::{user_key, Decision, FailSafe, LimitType, RateLimiter};

/// Command line arguments for the `bouncer` binary.
#[derive(Parser, Debug)]
#[command(name = "bouncer", version, about = "In-memory admission control")]
pub struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate configuration and print the effective settings
    CheckConfig,
    /// Admit requests read from stdin, one JSON decision per line
    Run,
    /// Send a burst of requests for one identifier and print a report
    Simulate {
        #[arg(long)]
        identifier: String,
        #[arg(long, default_value = "ip")]
        limit_type: LimitType,
        #[arg(long, default_value_t = 100)]
        requests: u32,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// A request parsed from an input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub limit_type: LimitType,
    pub identifier: String,
}

/// Parse `ip <addr>` or `user <id>`. Blank lines and `#` comments yield `None`.
pub fn parse_request_line(line: &str) -> Result<Option<RequestLine>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut parts = line.split_whitespace();
    let limit_type: LimitType = parts
        .next()
        .unwrap_or_default()
        .parse()
        .map_err(|_| BouncerError::InvalidIdentifier(format!("malformed request line '{}'", line)))?;
    let value = match (parts.next(), parts.next()) {
        (Some(value), None) => value,
        _ => {
            return Err(BouncerError::InvalidIdentifier(format!(
                "expected '<ip|user> <identifier>', got '{}'",
                line
            )))
        }
    };

    let identifier = match limit_type {
        LimitType::Ip => value.to_string(),
        LimitType::User => user_key(value),
    };
    Ok(Some(RequestLine {
        limit_type,
        identifier,
    }))
}

#[derive(Serialize)]
struct DecisionLine<'a> {
    identifier: &'a str,
    status: u16,
    #[serde(flatten)]
    decision: &'a Decision,
}

#[derive(Serialize)]
struct ErrorLine<'a> {
    error: &'a str,
}

/// Admit every request read from `reader`, writing one JSON line per request.
///
/// Stops at end of input or when `shutdown` resolves. Returns the number of
/// requests decided.
pub async fn serve_lines<R, W, F>(
    guard: &FailSafe<RateLimiter>,
    reader: R,
    mut writer: W,
    shutdown: F,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    F: Future<Output = ()>,
{
    let mut lines = reader.lines();
    let mut decided = 0;
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut shutdown => {
                debug!("Input loop interrupted");
                break;
            }
        };
        let Some(line) = line else { break };

        let out = match parse_request_line(&line) {
            Ok(Some(request)) => {
                let decision = guard.admit(&request.identifier, request.limit_type);
                decided += 1;
                serde_json::to_string(&DecisionLine {
                    identifier: &request.identifier,
                    status: decision.http_status(),
                    decision: &decision,
                })?
            }
            Ok(None) => continue,
            Err(e) => {
                warn!(error = %e, "Skipping malformed input");
                serde_json::to_string(&ErrorLine {
                    error: &e.to_string(),
                })?
            }
        };

        writer.write_all(out.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    Ok(decided)
}

/// Outcome of [`simulate`].
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub admitted: u32,
    pub rejected: u32,
    pub report: AnalyticsReport,
}

/// Run `requests` checks for one identifier against `limiter`.
pub fn simulate(
    limiter: &RateLimiter,
    identifier: &str,
    limit_type: LimitType,
    requests: u32,
) -> Result<SimulationReport> {
    let mut admitted = 0;
    for _ in 0..requests {
        if limiter.check(identifier, limit_type)?.allowed {
            admitted += 1;
        }
    }
    Ok(SimulationReport {
        admitted,
        rejected: requests - admitted,
        report: limiter.abuse_summary(24),
    })
}
