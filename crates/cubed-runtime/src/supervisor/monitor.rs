//! Child exit watcher.
//!
//! One task owns the `Child` from spawn to reap. It publishes `Running`
//! when the readiness probe fires, executes the forced-kill escalation
//! when told to, and after the child exits drains both console readers
//! before publishing the terminal state. The drain is bounded: a process
//! the child left behind can hold the inherited output pipes open long
//! after the exit, and the exit report must not wait for it. A `Stopped`
//! observation therefore implies the process is reaped, and unless such a
//! leftover exists, that the console history is complete.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use cubed_core::{ReadySignal, ServerState};

use super::StatePublisher;
use super::commands::CommandSender;
use super::shutdown::exit_code;

/// How long the console readers may run on after the child has been
/// reaped. EOF normally arrives the moment the child dies; the bound
/// covers output pipes inherited by processes the child left behind.
const CONSOLE_DRAIN_WINDOW: Duration = Duration::from_millis(250);

pub(crate) struct MonitorArgs {
    pub child: Child,
    pub pid: u32,
    pub publisher: Arc<StatePublisher>,
    pub ready: mpsc::Receiver<()>,
    pub ready_signal: ReadySignal,
    pub stop_requested: CancellationToken,
    pub force_kill: CancellationToken,
    pub commands: Arc<RwLock<Option<CommandSender>>>,
    pub current_pid: Arc<AtomicU32>,
    pub readers: Vec<JoinHandle<()>>,
}

pub(crate) fn spawn_monitor(args: MonitorArgs) -> JoinHandle<()> {
    tokio::spawn(watch_child(args))
}

async fn watch_child(args: MonitorArgs) {
    let MonitorArgs {
        mut child,
        pid,
        publisher,
        mut ready,
        ready_signal,
        stop_requested,
        force_kill,
        commands,
        current_pid,
        readers,
    } = args;

    if ready_signal == ReadySignal::Immediate {
        publisher.mark_running(pid);
    }
    let mut await_ready = ready_signal == ReadySignal::FirstOutput;
    let mut kill_armed = true;

    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            first_output = ready.recv(), if await_ready => {
                await_ready = false;
                if first_output.is_some() {
                    publisher.mark_running(pid);
                }
            }
            () = force_kill.cancelled(), if kill_armed => {
                kill_armed = false;
                warn!(pid, "forcing server process termination");
                if let Err(e) = child.start_kill() {
                    debug!(pid, error = %e, "kill failed; process likely already exited");
                }
            }
        }
    };

    // No more command deliveries once the child is gone.
    commands.write().unwrap().take();
    current_pid.store(0, Ordering::Relaxed);

    // Joining the readers before the terminal state keeps the console
    // history complete at the moment the exit becomes observable. The join
    // is bounded so inherited pipes cannot delay the exit report.
    let drain_deadline = Instant::now() + CONSOLE_DRAIN_WINDOW;
    for mut reader in readers {
        match timeout_at(drain_deadline, &mut reader).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(pid, error = %e, "console reader task failed"),
            Err(_) => {
                debug!(pid, "console pipe still open after exit; abandoning reader");
                reader.abort();
            }
        }
    }

    // The child may have produced its first output and exited before the
    // loop ever polled the readiness channel; the output still counts.
    if await_ready && ready.try_recv().is_ok() {
        publisher.mark_running(pid);
    }

    match status {
        Ok(status) => {
            let code = exit_code(status);
            if stop_requested.is_cancelled() {
                info!(pid, code, "server process exited after stop request");
                publisher.publish(ServerState::Stopped);
            } else {
                warn!(pid, code, "server process exited unexpectedly");
                publisher.publish(ServerState::Crashed { code });
                publisher.publish(ServerState::Stopped);
            }
        }
        Err(e) => {
            error!(pid, error = %e, "failed to reap server process");
            publisher.publish(ServerState::Crashed { code: -1 });
            publisher.publish(ServerState::Stopped);
        }
    }
}
