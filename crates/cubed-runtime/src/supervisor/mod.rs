//! Supervisor facade: one child process, serialized lifecycle control.
//!
//! [`ServerSupervisor`] owns at most one server process at a time. Control
//! operations (start, stop, restart) are serialized through an async mutex;
//! observation (state, pid, console history, live feeds) and command
//! delivery never take that lock, so a stop mid-grace-period cannot stall
//! readers.
//!
//! The child itself is owned by a monitor task (see [`monitor`]) which is
//! the only place that reaps it; control paths influence the child through
//! its stdin, signals by pid, and two cancellation tokens: one marking the
//! exit as requested, one triggering the forced kill.

mod commands;
mod monitor;
mod shutdown;

#[cfg(unix)]
pub use shutdown::process_exists;

use std::process::Stdio;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cubed_core::{
    CommandError, ConsoleLine, ConsoleSource, NoopServerEvents, ServerConfig, ServerEvents,
    ServerState, SupervisorError,
};

use crate::console::{ConsoleBuffer, ConsoleFeed, spawn_console_reader};
use commands::{CommandSender, spawn_command_writer};
use monitor::{MonitorArgs, spawn_monitor};

/// Extra time allowed for the forced kill to reap the child after the
/// grace period has already expired.
const KILL_WAIT: Duration = Duration::from_secs(5);

/// Publishes state to the watch channel and the observer port together.
///
/// All transitions in the crate go through here, which keeps the two
/// surfaces consistent and deduplicates republished values. Each watch
/// mutation and its observer callback run under one lock, so callbacks
/// reach the observer in exactly the order the mutations were applied;
/// without it, two racing transitions could deliver their callbacks
/// inverted.
pub(crate) struct StatePublisher {
    tx: watch::Sender<ServerState>,
    events: Arc<dyn ServerEvents>,
    order: std::sync::Mutex<()>,
}

impl StatePublisher {
    fn new(tx: watch::Sender<ServerState>, events: Arc<dyn ServerEvents>) -> Self {
        Self {
            tx,
            events,
            order: std::sync::Mutex::new(()),
        }
    }

    /// Unconditional transition.
    pub(crate) fn publish(&self, next: ServerState) {
        let _order = self.order.lock().unwrap();
        let previous = self.tx.send_replace(next);
        if previous == next {
            return;
        }
        debug!(from = %previous, to = %next, "state transition");
        self.events.transition(next);
    }

    /// `Starting -> Running`, skipped when a stop raced in first.
    pub(crate) fn mark_running(&self, pid: u32) {
        let _order = self.order.lock().unwrap();
        let flipped = self.tx.send_if_modified(|state| {
            if *state == ServerState::Starting {
                *state = ServerState::Running;
                true
            } else {
                false
            }
        });
        if flipped {
            info!(pid, "server is ready");
            self.events.transition(ServerState::Running);
        }
    }

    /// `Starting|Running -> Stopping`. False when the child already
    /// reached a terminal state, e.g. a crash racing the stop call.
    fn transition_to_stopping(&self) -> bool {
        let _order = self.order.lock().unwrap();
        let flipped = self.tx.send_if_modified(|state| {
            if matches!(state, ServerState::Starting | ServerState::Running) {
                *state = ServerState::Stopping;
                true
            } else {
                false
            }
        });
        if flipped {
            self.events.transition(ServerState::Stopping);
        }
        flipped
    }
}

/// Handles to the background tasks of one server run.
struct ActiveChild {
    pid: u32,
    stop_requested: CancellationToken,
    force_kill: CancellationToken,
    monitor: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl ActiveChild {
    /// Join the run's background tasks. Only called after the monitor has
    /// published a terminal state, so none of them can still be blocked on
    /// a live child. Best effort; task panics are logged.
    async fn finish(self) {
        if let Err(e) = self.monitor.await {
            warn!(pid = self.pid, error = %e, "monitor task failed");
        }
        if let Err(e) = self.writer.await {
            warn!(pid = self.pid, error = %e, "command writer task failed");
        }
    }
}

/// Supervises the bundled server process and bridges its console.
///
/// At most one child process exists per supervisor at any time. The value
/// is cheap to share behind an `Arc`; every method takes `&self`.
pub struct ServerSupervisor {
    config: ServerConfig,
    buffer: Arc<ConsoleBuffer>,
    publisher: Arc<StatePublisher>,
    // Pid of the live child, 0 when there is none. Kept off the control
    // mutex so observation stays responsive during a stop.
    current_pid: Arc<AtomicU32>,
    commands: Arc<RwLock<Option<CommandSender>>>,
    control: Mutex<Option<ActiveChild>>,
}

impl ServerSupervisor {
    /// Create a supervisor with no lifecycle observer.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self::with_events(config, Arc::new(NoopServerEvents))
    }

    /// Create a supervisor that reports transitions to `events`.
    #[must_use]
    pub fn with_events(config: ServerConfig, events: Arc<dyn ServerEvents>) -> Self {
        let (state_tx, _) = watch::channel(ServerState::Stopped);
        Self {
            buffer: Arc::new(ConsoleBuffer::new(config.log_capacity)),
            config,
            publisher: Arc::new(StatePublisher::new(state_tx, events)),
            current_pid: Arc::new(AtomicU32::new(0)),
            commands: Arc::new(RwLock::new(None)),
            control: Mutex::new(None),
        }
    }

    /// Launch configuration this supervisor was built with.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServerState {
        *self.publisher.tx.borrow()
    }

    /// Watch lifecycle state changes. The receiver is last-value-wins;
    /// use [`Self::with_events`] for exact transition sequences.
    pub fn watch_state(&self) -> watch::Receiver<ServerState> {
        self.publisher.tx.subscribe()
    }

    /// Subscribe to the console: retained history first, then live lines.
    pub fn subscribe(&self) -> ConsoleFeed {
        self.buffer.subscribe()
    }

    /// Copy of the retained console history.
    pub fn console_snapshot(&self) -> Vec<ConsoleLine> {
        self.buffer.snapshot()
    }

    /// Pid of the current child, if one exists.
    pub fn pid(&self) -> Option<u32> {
        match self.current_pid.load(Ordering::Relaxed) {
            0 => None,
            pid => Some(pid),
        }
    }

    /// Start the server process.
    ///
    /// Idempotent: while a run is active the call changes nothing and
    /// returns the current state. On spawn failure no state changes; the
    /// supervisor stays `Stopped` and the call may simply be retried.
    pub async fn start(&self) -> Result<ServerState, SupervisorError> {
        let mut control = self.control.lock().await;
        self.start_locked(&mut control).await
    }

    /// Stop the server process and wait until it is gone.
    ///
    /// Prefers the configured console stop command, falls back to a
    /// termination signal, and force-kills when the grace period expires.
    /// A forced kill is part of normal operation and still returns `Ok`.
    /// Idempotent: with no active run the call changes nothing.
    pub async fn stop(&self) -> Result<ServerState, SupervisorError> {
        let mut control = self.control.lock().await;
        self.stop_locked(&mut control).await
    }

    /// Stop (if active), then start a fresh run.
    pub async fn restart(&self) -> Result<ServerState, SupervisorError> {
        let mut control = self.control.lock().await;
        self.stop_locked(&mut control).await?;
        self.start_locked(&mut control).await
    }

    /// Deliver one console command to the server's stdin.
    ///
    /// Resolves once the line has actually been written and flushed.
    /// Rejected with `NotRunning` unless the state is `Running` at
    /// submission time; delivery can still fail afterwards if the server
    /// dies mid-flight.
    pub async fn send_command(&self, command: &str) -> Result<(), CommandError> {
        let line = command.trim();
        if line.is_empty() {
            return Err(CommandError::invalid("command is empty"));
        }
        if line.contains(['\n', '\r']) {
            return Err(CommandError::invalid("command must be a single line"));
        }
        if !self.state().accepts_commands() {
            return Err(CommandError::NotRunning);
        }
        match self.command_sender() {
            Some(sender) => sender.deliver(line.to_string()).await,
            None => Err(CommandError::NotRunning),
        }
    }

    /// Stop if active and release background tasks. Safe to call at any
    /// time; intended for application teardown.
    pub async fn shutdown(&self) {
        if let Err(e) = self.stop().await {
            warn!(error = %e, "stop during shutdown failed");
        }
    }

    fn command_sender(&self) -> Option<CommandSender> {
        self.commands.read().unwrap().clone()
    }

    async fn start_locked(
        &self,
        control: &mut Option<ActiveChild>,
    ) -> Result<ServerState, SupervisorError> {
        let current = self.state();
        if current.is_active() {
            debug!(state = %current, "start ignored; server already active");
            return Ok(current);
        }

        // Reap the previous run's tasks (left behind by a crash).
        if let Some(previous) = control.take() {
            previous.finish().await;
        }

        self.config.validate().map_err(SupervisorError::spawn_failed)?;
        if !self.config.executable.is_file() {
            return Err(SupervisorError::SpawnFailed {
                reason: format!(
                    "server executable not found: {}",
                    self.config.executable.display()
                ),
            });
        }

        let mut command = Command::new(&self.config.executable);
        command
            .args(&self.config.args)
            .envs(&self.config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = self.config.resolved_working_dir() {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| SupervisorError::SpawnFailed {
            reason: e.to_string(),
        })?;

        let Some(pid) = child.id() else {
            // Dropping the child cleans it up via kill_on_drop.
            return Err(SupervisorError::internal("spawned process has no pid"));
        };
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SupervisorError::internal("child stdout was not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SupervisorError::internal("child stderr was not captured"))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SupervisorError::internal("child stdin was not captured"))?;

        // Fresh console for a fresh run.
        self.buffer.clear();

        info!(pid, executable = %self.config.executable.display(), "server process spawned");
        self.publisher.publish(ServerState::Starting);

        let (ready_tx, ready_rx) = mpsc::channel(1);
        let readers = vec![
            spawn_console_reader(
                stdout,
                ConsoleSource::Stdout,
                Arc::clone(&self.buffer),
                ready_tx.clone(),
            ),
            spawn_console_reader(stderr, ConsoleSource::Stderr, Arc::clone(&self.buffer), ready_tx),
        ];

        let (sender, writer) = spawn_command_writer(stdin);
        *self.commands.write().unwrap() = Some(sender);
        self.current_pid.store(pid, Ordering::Relaxed);

        let stop_requested = CancellationToken::new();
        let force_kill = CancellationToken::new();
        let monitor = spawn_monitor(MonitorArgs {
            child,
            pid,
            publisher: Arc::clone(&self.publisher),
            ready: ready_rx,
            ready_signal: self.config.ready_signal,
            stop_requested: stop_requested.clone(),
            force_kill: force_kill.clone(),
            commands: Arc::clone(&self.commands),
            current_pid: Arc::clone(&self.current_pid),
            readers,
        });

        *control = Some(ActiveChild {
            pid,
            stop_requested,
            force_kill,
            monitor,
            writer,
        });
        Ok(ServerState::Starting)
    }

    async fn stop_locked(
        &self,
        control: &mut Option<ActiveChild>,
    ) -> Result<ServerState, SupervisorError> {
        let current = self.state();
        let Some(active) = control.as_ref() else {
            debug!(state = %current, "stop ignored; no server process");
            return Ok(current);
        };
        let pid = active.pid;
        let force_kill = active.force_kill.clone();

        // Mark the exit as requested before anything can make the child
        // exit, so the monitor never classifies this stop as a crash.
        active.stop_requested.cancel();

        if !self.publisher.transition_to_stopping() {
            // The child reached a terminal state on its own while this call
            // was racing it; nothing to signal, just reap the tasks.
            if let Some(previous) = control.take() {
                previous.finish().await;
            }
            return Ok(self.state());
        }
        info!(pid, "stopping server process");

        // The grace clock starts before delivery. A stop command can sit
        // forever behind a full stdin pipe the child never drains, and the
        // stop bound has to hold regardless.
        let deadline = Instant::now() + self.config.grace_period;
        let mut state_rx = self.publisher.tx.subscribe();

        let mut delivered = false;
        if let Some(stop_command) = &self.config.stop_command {
            if let Some(sender) = self.command_sender() {
                match timeout_at(deadline, sender.deliver(stop_command.clone())).await {
                    Ok(Ok(())) => {
                        debug!(pid, command = %stop_command, "stop command delivered");
                        delivered = true;
                    }
                    Ok(Err(e)) => {
                        debug!(pid, error = %e, "stop command not delivered; falling back to signal");
                    }
                    Err(_) => {
                        debug!(pid, "stop command delivery stalled; falling back to signal");
                    }
                }
            }
        }
        if !delivered {
            match shutdown::signal_terminate(pid) {
                Ok(()) => debug!(pid, "termination signal sent"),
                Err(e) => {
                    debug!(pid, error = %e, "no graceful signal available; killing immediately");
                    force_kill.cancel();
                }
            }
        }

        // The monitor publishes Stopped only after the child is reaped and
        // the console drained, so waiting on the watch channel is enough.
        let settled = matches!(
            timeout_at(
                deadline,
                state_rx.wait_for(|state| *state == ServerState::Stopped),
            )
            .await,
            Ok(Ok(_))
        );
        if !settled {
            warn!(
                pid,
                grace = ?self.config.grace_period,
                "graceful stop timed out; escalating to forced kill"
            );
            force_kill.cancel();
            let killed = matches!(
                timeout(
                    KILL_WAIT,
                    state_rx.wait_for(|state| *state == ServerState::Stopped),
                )
                .await,
                Ok(Ok(_))
            );
            if !killed {
                return Err(SupervisorError::internal(format!(
                    "server process {pid} survived forced termination"
                )));
            }
        }

        if let Some(previous) = control.take() {
            previous.finish().await;
        }
        info!(pid, "server stopped");
        Ok(ServerState::Stopped)
    }
}
