//! Run command handler.
//!
//! Supervises the server with an interactive console attached: live
//! output goes to the terminal, typed lines go to the server's stdin,
//! and Ctrl-C turns into a graceful stop.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use futures_util::{FutureExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use cubed_core::{ConsoleLine, ConsoleSource, ServerEvents, ServerState};
use cubed_runtime::ServerSupervisor;

use crate::bootstrap::CliContext;

/// Lifecycle observer for the interactive run.
///
/// Prints transitions as status lines on stderr, so console output on
/// stdout stays clean for piping, and remembers whether the run ended in
/// a crash.
#[derive(Default)]
pub struct StatusReporter {
    crash: Mutex<Option<i32>>,
}

impl StatusReporter {
    /// Exit code of a crash observed during this run, if any.
    pub fn crash_code(&self) -> Option<i32> {
        *self.crash.lock().unwrap()
    }
}

impl ServerEvents for StatusReporter {
    fn transition(&self, state: ServerState) {
        if let ServerState::Crashed { code } = state {
            *self.crash.lock().unwrap() = Some(code);
        }
        eprintln!("[cubed] server {state}");
    }
}

/// Execute the run command.
///
/// Returns once the server has stopped, either because it exited on its
/// own or because the operator asked it to. A crash is reported as an
/// error so the process exit code reflects it.
pub async fn execute(ctx: &CliContext, reporter: &StatusReporter) -> Result<()> {
    let supervisor = Arc::clone(&ctx.supervisor);
    let state = supervisor.start().await?;
    debug!(%state, "server start requested");

    let stop_command = supervisor.config().stop_command.clone();
    let mut output = supervisor.subscribe().into_stream().boxed();
    let mut states = supervisor.watch_state();
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut output_open = true;
    let mut stdin_open = true;
    let mut stop_requested = false;

    loop {
        tokio::select! {
            line = output.next(), if output_open => match line {
                Some(line) => print_line(&line),
                None => output_open = false,
            },
            _ = states.wait_for(|s| *s == ServerState::Stopped) => break,
            command = input.next_line(), if stdin_open => match command {
                Ok(Some(text)) => handle_input(&supervisor, stop_command.as_deref(), &text).await,
                Ok(None) | Err(_) => stdin_open = false,
            },
            _ = tokio::signal::ctrl_c() => {
                if stop_requested {
                    eprintln!("[cubed] stop already in progress");
                } else {
                    stop_requested = true;
                    eprintln!("[cubed] stopping server");
                    request_stop(&supervisor);
                }
            }
        }
    }

    // Lines broadcast just before the stop was observed may still sit in
    // the feed; flush them so the tail of the shutdown is not lost.
    if output_open {
        while let Some(Some(line)) = output.next().now_or_never() {
            print_line(&line);
        }
    }

    if let Some(code) = reporter.crash_code() {
        anyhow::bail!("server crashed with exit code {code}");
    }
    Ok(())
}

fn print_line(line: &ConsoleLine) {
    match line.source {
        ConsoleSource::Stdout => println!("{}", line.text),
        ConsoleSource::Stderr => eprintln!("{}", line.text),
    }
}

/// Handle one line typed by the operator.
async fn handle_input(supervisor: &Arc<ServerSupervisor>, stop_command: Option<&str>, text: &str) {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }
    // Typing the stop command is a stop request. It has to go through the
    // supervisor rather than straight to the server, so the exit counts
    // as requested instead of as a crash.
    if stop_command == Some(trimmed) {
        request_stop(supervisor);
        return;
    }
    if let Err(e) = supervisor.send_command(trimmed).await {
        eprintln!("[cubed] {e}");
    }
}

/// Run the graceful stop in the background; the console loop keeps
/// printing output while the grace period runs down.
fn request_stop(supervisor: &Arc<ServerSupervisor>) {
    let supervisor = Arc::clone(supervisor);
    tokio::spawn(async move {
        if let Err(e) = supervisor.stop().await {
            eprintln!("[cubed] stop failed: {e}");
        }
    });
}
