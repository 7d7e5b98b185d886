//! Connection mailboxes
//!
//! A mailbox is a bounded FIFO between the registry (producer) and one
//! outbound pump (consumer). The registry holds the only [`Mailbox`] sender,
//! so dropping it from the membership map is the close operation: it happens
//! at most once and the pump observes end-of-stream after draining what was
//! already queued.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::frame::OutboundFrame;
use crate::session::ConnectionState;

/// Result of a non-blocking enqueue attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    /// Frame was queued
    Queued,
    /// Mailbox is at capacity; the consumer is too slow
    Full,
    /// Consumer has gone away
    Closed,
}

/// Producer half of a connection mailbox, owned by the registry
///
/// Also holds the connection's lifecycle so an eviction can start teardown
/// even when the outbound pump is stuck in a write.
#[derive(Debug)]
pub struct Mailbox {
    tx: mpsc::Sender<OutboundFrame>,
    state: Arc<ConnectionState>,
}

/// Consumer half of a connection mailbox, owned by the outbound pump
#[derive(Debug)]
pub struct MailboxReceiver {
    rx: mpsc::Receiver<OutboundFrame>,
}

/// Create a mailbox pair with the given capacity (minimum 1)
pub fn mailbox(capacity: usize, state: Arc<ConnectionState>) -> (Mailbox, MailboxReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Mailbox { tx, state }, MailboxReceiver { rx })
}

impl Mailbox {
    /// Try to enqueue a frame without waiting
    pub fn offer(&self, frame: OutboundFrame) -> Offer {
        match self.tx.try_send(frame) {
            Ok(()) => Offer::Queued,
            Err(TrySendError::Full(_)) => Offer::Full,
            Err(TrySendError::Closed(_)) => Offer::Closed,
        }
    }

    /// Close the mailbox and tell both pumps to stop
    ///
    /// Returns whether this started the connection's teardown.
    pub(crate) fn evict(self) -> bool {
        self.state.begin_teardown()
    }
}

impl MailboxReceiver {
    /// Wait for the next frame
    ///
    /// Returns `None` once the mailbox is closed and drained.
    pub async fn recv(&mut self) -> Option<OutboundFrame> {
        self.rx.recv().await
    }

    /// Refuse further frames; already-queued frames can still be drained
    pub fn close(&mut self) {
        self.rx.close();
    }
}
