//! Stdio command bridge — the presentation front end of the daemon.
//!
//! Reads newline-delimited commands from stdin, dispatches them against the
//! orchestrator, and writes one reply line per command to stdout. Stdout is
//! reserved for replies; all diagnostic output goes through tracing.
//!
//! Commands:
//! `bootstrap <user> <link>` · `start <user> <mining|tasks|ads>` ·
//! `start-all <user>` · `stop <user> <kind>` · `stop-all <user>` ·
//! `status <user>` · `help` · `quit`

use crate::error::{FarmError, Result};
use crate::orchestrator::registry::JobKind;
use crate::orchestrator::{JobState, Orchestrator, StartOutcome};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

const HELP_TEXT: &str = "commands:\n  \
    bootstrap <user> <link>   establish a session from a webapp deep link\n  \
    start <user> <kind>       start mining, tasks or ads for a user\n  \
    start-all <user>          start mining and tasks together\n  \
    stop <user> <kind>        stop one job\n  \
    stop-all <user>           stop every job for a user\n  \
    status <user>             show per-job liveness\n  \
    help                      show this help\n  \
    quit                      shut the daemon down";

/// Reply to one command line.
#[derive(Debug, PartialEq, Eq)]
pub enum BridgeReply {
    /// Text to print for the caller.
    Text(String),
    /// The caller asked the daemon to exit.
    Quit,
}

/// Run the bridge until stdin closes or a `quit` command arrives.
pub async fn run_stdio_bridge(orchestrator: &Orchestrator) -> Result<()> {
    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin);
    let mut writer = BufWriter::new(tokio::io::stdout());
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            tracing::info!("stdin closed; shutting down bridge");
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match handle_line(orchestrator, trimmed).await {
            BridgeReply::Quit => break,
            BridgeReply::Text(reply) => {
                writer.write_all(reply.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }
    }

    Ok(())
}

/// Dispatch one command line.
pub async fn handle_line(orchestrator: &Orchestrator, line: &str) -> BridgeReply {
    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or_default();

    let reply = match command {
        "help" => HELP_TEXT.to_owned(),
        "quit" | "exit" => return BridgeReply::Quit,
        "bootstrap" => {
            let (Some(user), Some(link)) = (parse_user(parts.next()), parts.next()) else {
                return usage("bootstrap <user> <link>");
            };
            match orchestrator.bootstrap(user, link).await {
                Ok(_) => format!("session established for user {user}"),
                Err(e) => render_error(&e),
            }
        }
        "start" => {
            let (Some(user), Some(kind)) = (parse_user(parts.next()), parse_kind(parts.next()))
            else {
                return usage("start <user> <mining|tasks|ads>");
            };
            match orchestrator.start(user, kind) {
                Ok(StartOutcome::Started) => format!("{kind} started for user {user}"),
                Ok(StartOutcome::AlreadyRunning) => {
                    format!("{kind} is already running for user {user}")
                }
                Err(e) => render_error(&e),
            }
        }
        "start-all" => {
            let Some(user) = parse_user(parts.next()) else {
                return usage("start-all <user>");
            };
            match orchestrator.start_all(user) {
                Ok(()) => format!("mining and tasks started for user {user}"),
                Err(e) => render_error(&e),
            }
        }
        "stop" => {
            let (Some(user), Some(kind)) = (parse_user(parts.next()), parse_kind(parts.next()))
            else {
                return usage("stop <user> <mining|tasks|ads>");
            };
            if orchestrator.stop(user, kind) {
                format!("{kind} stopping for user {user}")
            } else {
                format!("{kind} was not running for user {user}")
            }
        }
        "stop-all" => {
            let Some(user) = parse_user(parts.next()) else {
                return usage("stop-all <user>");
            };
            orchestrator.stop_all(user);
            format!("all jobs stopping for user {user}")
        }
        "status" => {
            let Some(user) = parse_user(parts.next()) else {
                return usage("status <user>");
            };
            render_status(orchestrator, user)
        }
        other => format!("unknown command `{other}`; try `help`"),
    };

    BridgeReply::Text(reply)
}

fn parse_user(arg: Option<&str>) -> Option<i64> {
    arg.and_then(|raw| raw.parse().ok())
}

fn parse_kind(arg: Option<&str>) -> Option<JobKind> {
    arg.and_then(|raw| raw.parse().ok())
}

fn usage(expected: &str) -> BridgeReply {
    BridgeReply::Text(format!("usage: {expected}"))
}

fn render_error(error: &FarmError) -> String {
    format!("error: {error}")
}

/// Render the per-kind status block the original bot showed.
fn render_status(orchestrator: &Orchestrator, user: i64) -> String {
    if !orchestrator.has_session(user) {
        return format!("user {user} has no session; bootstrap first");
    }

    let status = orchestrator.status(user);
    let word = |state| match state {
        JobState::Running => "running",
        JobState::Stopped => "stopped",
    };
    format!(
        "user {user}: mining {} | tasks {} | ads {} (as of {})",
        word(status.mining),
        word(status.tasks),
        word(status.ads),
        chrono::Utc::now().format("%H:%M:%S"),
    )
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::api::TeaBankClient;
    use crate::config::{ApiConfig, JobTimings};

    fn orchestrator() -> Orchestrator {
        let client = TeaBankClient::new(ApiConfig::default()).unwrap();
        Orchestrator::new(client, JobTimings::default())
    }

    async fn reply_text(orch: &Orchestrator, line: &str) -> String {
        match handle_line(orch, line).await {
            BridgeReply::Text(text) => text,
            BridgeReply::Quit => panic!("unexpected quit"),
        }
    }

    #[tokio::test]
    async fn start_without_session_reports_the_error() {
        let orch = orchestrator();
        let reply = reply_text(&orch, "start 7 mining").await;
        assert!(reply.contains("no session"), "reply was: {reply}");
    }

    #[tokio::test]
    async fn malformed_arguments_yield_usage() {
        let orch = orchestrator();
        assert!(reply_text(&orch, "start seven mining").await.starts_with("usage:"));
        assert!(reply_text(&orch, "start 7 farming").await.starts_with("usage:"));
        assert!(reply_text(&orch, "status").await.starts_with("usage:"));
    }

    #[tokio::test]
    async fn unknown_command_points_at_help() {
        let orch = orchestrator();
        let reply = reply_text(&orch, "dance 7").await;
        assert!(reply.contains("unknown command"));
    }

    #[tokio::test]
    async fn quit_is_reported_as_quit() {
        let orch = orchestrator();
        assert_eq!(handle_line(&orch, "quit").await, BridgeReply::Quit);
        assert_eq!(handle_line(&orch, "exit").await, BridgeReply::Quit);
    }

    #[tokio::test]
    async fn status_without_session_says_so() {
        let orch = orchestrator();
        let reply = reply_text(&orch, "status 42").await;
        assert!(reply.contains("no session"));
    }
}
