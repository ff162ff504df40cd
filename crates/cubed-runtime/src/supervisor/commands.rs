//! Serialized command delivery into the child's stdin.
//!
//! All writes go through one task that owns the stdin handle, so commands
//! submitted from any number of callers come out whole and in submission
//! order. Each request carries a oneshot ack that resolves once the line
//! has been written and flushed (or has failed), which gives callers a
//! synchronous delivered/failed verdict.

use cubed_core::CommandError;
use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Queue depth for commands awaiting the writer.
const COMMAND_QUEUE_CAPACITY: usize = 64;

struct CommandRequest {
    line: String,
    ack: oneshot::Sender<Result<(), CommandError>>,
}

/// Cloneable handle for submitting commands to the writer task.
#[derive(Clone)]
pub(crate) struct CommandSender {
    tx: mpsc::Sender<CommandRequest>,
}

impl CommandSender {
    /// Deliver one command line and wait for the write verdict.
    pub(crate) async fn deliver(&self, line: String) -> Result<(), CommandError> {
        let (ack, verdict) = oneshot::channel();
        self.tx
            .send(CommandRequest { line, ack })
            .await
            .map_err(|_| CommandError::NotRunning)?;
        match verdict.await {
            Ok(result) => result,
            // Writer died with this request still queued; nothing was written.
            Err(_) => Err(CommandError::delivery_failed(
                "command writer stopped before the line was written",
            )),
        }
    }
}

/// Spawn the writer task that owns the child's stdin.
///
/// The task ends when every `CommandSender` clone has been dropped or on
/// the first write error; queued requests behind a failed write are
/// dropped, and their callers see `DeliveryFailed`.
pub(crate) fn spawn_command_writer(stdin: ChildStdin) -> (CommandSender, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<CommandRequest>(COMMAND_QUEUE_CAPACITY);
    let handle = tokio::spawn(async move {
        let mut stdin = stdin;
        while let Some(request) = rx.recv().await {
            match write_line(&mut stdin, &request.line).await {
                Ok(()) => {
                    let _ = request.ack.send(Ok(()));
                }
                Err(e) => {
                    warn!(error = %e, "stdin write failed; command writer stopping");
                    let _ = request.ack.send(Err(CommandError::delivery_failed(&e)));
                    break;
                }
            }
        }
        debug!("command writer finished");
    });
    (CommandSender { tx }, handle)
}

async fn write_line(stdin: &mut ChildStdin, line: &str) -> std::io::Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await
}
