//! Connection lifecycle state machine
//!
//! Tracks a connection from admission to close. Both pumps share one
//! [`ConnectionState`]; whichever observes a terminal condition first wins the
//! transition to `Unregistering`, and `Closed` is reached exactly once.

use tokio::sync::watch;

/// Connection lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Upgrade succeeded and owner resolved, not yet in the registry
    Admitted,
    /// Present in the registry, pumps not yet running
    Registered,
    /// Both pumps running
    Active,
    /// Teardown started: unregister, then mailbox close, then transport close
    Unregistering,
    /// Transport closed
    Closed,
}

impl ConnectionPhase {
    /// Whether teardown has started or finished
    pub fn is_terminating(self) -> bool {
        matches!(self, ConnectionPhase::Unregistering | ConnectionPhase::Closed)
    }
}

/// Shared, observable lifecycle of one connection
#[derive(Debug)]
pub struct ConnectionState {
    phase: watch::Sender<ConnectionPhase>,
}

impl ConnectionState {
    /// Create state in the `Admitted` phase
    pub fn new() -> Self {
        let (phase, _) = watch::channel(ConnectionPhase::Admitted);
        Self { phase }
    }

    /// Current phase
    pub fn phase(&self) -> ConnectionPhase {
        *self.phase.borrow()
    }

    /// `Admitted` -> `Registered`
    pub fn mark_registered(&self) -> bool {
        self.transition(ConnectionPhase::Admitted, ConnectionPhase::Registered)
    }

    /// `Registered` -> `Active`
    pub fn mark_active(&self) -> bool {
        self.transition(ConnectionPhase::Registered, ConnectionPhase::Active)
    }

    /// Start teardown
    ///
    /// Returns `true` only for the first caller; later callers must not
    /// repeat the teardown steps.
    pub fn begin_teardown(&self) -> bool {
        self.phase.send_if_modified(|phase| {
            if phase.is_terminating() {
                false
            } else {
                *phase = ConnectionPhase::Unregistering;
                true
            }
        })
    }

    /// Finish teardown; returns `true` only the first time
    pub fn mark_closed(&self) -> bool {
        self.phase.send_if_modified(|phase| {
            if *phase == ConnectionPhase::Closed {
                false
            } else {
                *phase = ConnectionPhase::Closed;
                true
            }
        })
    }

    /// Resolves once teardown has started
    pub async fn terminating(&self) {
        let mut rx = self.phase.subscribe();
        // The sender lives in `self`, so waiting cannot fail
        let _ = rx.wait_for(|phase| phase.is_terminating()).await;
    }

    fn transition(&self, from: ConnectionPhase, to: ConnectionPhase) -> bool {
        self.phase.send_if_modified(|phase| {
            if *phase == from {
                *phase = to;
                true
            } else {
                false
            }
        })
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}
