//! Supervisor lifecycle observer port.

use crate::state::ServerState;

/// Port for observing server lifecycle transitions.
///
/// This trait decouples the supervisor from notification surfaces (status
/// lines, desktop notifications, structured logs). Unlike the `watch`-based
/// state channel, which is last-value-wins, an observer sees every
/// transition exactly once and in order.
///
/// # Design
///
/// - **Object-safe**: Uses `&self` for dynamic dispatch via `Arc<dyn ServerEvents>`
/// - **Fire-and-forget**: Methods don't return `Result`; implementations handle errors internally
/// - **Non-reentrant**: Callbacks run on the supervisor's internal tasks and
///   must not call back into the supervisor
///
/// # Example
///
/// ```rust
/// use cubed_core::{ServerEvents, ServerState};
///
/// struct StatusPrinter;
///
/// impl ServerEvents for StatusPrinter {
///     fn transition(&self, state: ServerState) {
///         println!("server is now {state}");
///     }
/// }
/// ```
pub trait ServerEvents: Send + Sync {
    /// Called once for every published state transition.
    fn transition(&self, state: ServerState);
}

/// No-op implementation of `ServerEvents` for tests and headless contexts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopServerEvents;

impl ServerEvents for NoopServerEvents {
    fn transition(&self, _state: ServerState) {}
}
