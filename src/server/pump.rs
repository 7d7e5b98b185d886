//! Per-connection read and write pumps
//!
//! Each admitted connection runs two tasks:
//!
//! - the inbound pump owns the read half: decode, persist, fan out;
//! - the outbound pump owns the write half: drain the mailbox, ping, close.
//!
//! Teardown always runs unregister, then mailbox close, then transport close,
//! whichever pump observes the terminal condition first. A registry eviction
//! also starts teardown. [`ConnectionState`] decides which side starts it,
//! and both pumps watch it to stop.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::error::{Error, FrameError, Result};
use crate::persist::EntryStore;
use crate::protocol::{classify_close, classify_error, normal_close, Disconnect, InboundPayload};
use crate::registry::{DeliveryReport, MailboxReceiver, OutboundFrame, Registry};
use crate::session::{ConnectionContext, ConnectionState};

/// Why a read loop ended
enum ReadEnd {
    Closed(Disconnect),
    IdleTimeout,
    Terminated,
}

/// Read frames until the transport closes or the connection is torn down
///
/// Bad frames and persistence failures are logged and skipped; only the
/// transport ending stops the loop.
pub async fn inbound_pump<R, S>(
    conn: ConnectionContext,
    state: Arc<ConnectionState>,
    mut reader: R,
    registry: Arc<Registry>,
    store: Arc<S>,
    idle_timeout: Duration,
) where
    R: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
    S: EntryStore,
{
    let end = loop {
        let next = tokio::select! {
            biased;
            _ = state.terminating() => break ReadEnd::Terminated,
            next = read_next(&mut reader, idle_timeout) => next,
        };

        let message = match next {
            Some(Some(Ok(message))) => message,
            Some(Some(Err(e))) => {
                let disconnect = classify_error(&e);
                if disconnect.is_unexpected() {
                    tracing::warn!(
                        owner = %conn.owner,
                        conn_id = conn.id.get(),
                        error = %e,
                        "Read error"
                    );
                }
                break ReadEnd::Closed(disconnect);
            }
            Some(None) => break ReadEnd::Closed(Disconnect::Ordinary),
            None => break ReadEnd::IdleTimeout,
        };

        let body = match &message {
            Message::Text(text) => text.as_bytes(),
            Message::Binary(data) => &data[..],
            Message::Close(frame) => {
                let disconnect = classify_close(frame.as_ref());
                if disconnect.is_unexpected() {
                    tracing::warn!(
                        owner = %conn.owner,
                        conn_id = conn.id.get(),
                        close = ?frame,
                        "Unexpected close frame"
                    );
                }
                break ReadEnd::Closed(disconnect);
            }
            // Pings are answered by the protocol layer
            _ => continue,
        };

        match process_frame(&conn, body, &registry, store.as_ref()).await {
            Ok(report) => {
                tracing::debug!(
                    owner = %conn.owner,
                    conn_id = conn.id.get(),
                    delivered = report.delivered,
                    evicted = report.evicted,
                    "Entry synced"
                );
            }
            Err(Error::Frame(FrameError::EmptyField(field))) => {
                registry.stats().frame_ignored();
                tracing::debug!(
                    owner = %conn.owner,
                    conn_id = conn.id.get(),
                    field = field,
                    "Ignoring frame with empty field"
                );
            }
            Err(Error::Frame(FrameError::Encode(e))) => {
                tracing::warn!(
                    owner = %conn.owner,
                    conn_id = conn.id.get(),
                    error = %e,
                    "Failed to encode stored entry"
                );
            }
            Err(Error::Frame(e)) => {
                registry.stats().frame_ignored();
                tracing::warn!(
                    owner = %conn.owner,
                    conn_id = conn.id.get(),
                    error = %e,
                    "Ignoring malformed frame"
                );
            }
            Err(e) => {
                registry.stats().persist_failed();
                tracing::warn!(
                    owner = %conn.owner,
                    conn_id = conn.id.get(),
                    error = %e,
                    "Failed to store entry"
                );
            }
        }
    };

    match end {
        ReadEnd::Closed(disconnect) => {
            tracing::debug!(
                owner = %conn.owner,
                conn_id = conn.id.get(),
                unexpected = disconnect.is_unexpected(),
                "Peer disconnected"
            );
        }
        ReadEnd::IdleTimeout => {
            tracing::debug!(
                owner = %conn.owner,
                conn_id = conn.id.get(),
                idle_secs = idle_timeout.as_secs(),
                "Idle timeout"
            );
        }
        // Evicted, or the outbound side already ran teardown
        ReadEnd::Terminated => return,
    }

    state.begin_teardown();
    registry.unregister(&conn).await;
}

/// Decode, persist and fan out one inbound frame
async fn process_frame<S: EntryStore>(
    conn: &ConnectionContext,
    body: &[u8],
    registry: &Registry,
    store: &S,
) -> Result<DeliveryReport> {
    registry.stats().frame_received();

    let payload = InboundPayload::decode(body)?;
    let entry = store
        .store(
            conn.owner,
            &payload.content_type,
            &payload.content,
            payload.source_device(),
        )
        .await?;
    let frame = OutboundFrame::from_record(&entry)?;

    // The originator is one of the owner's connections and gets the
    // stored record too
    Ok(registry.deliver_to_owner(conn.owner, frame).await)
}

/// Next item from the reader; `None` if the idle timeout elapsed first
async fn read_next<R>(
    reader: &mut R,
    idle_timeout: Duration,
) -> Option<Option<std::result::Result<Message, WsError>>>
where
    R: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
{
    if idle_timeout.is_zero() {
        Some(reader.next().await)
    } else {
        tokio::time::timeout(idle_timeout, reader.next()).await.ok()
    }
}

/// Why a write loop ended
enum WriteEnd {
    MailboxClosed,
    WriteFailed,
    Terminated,
}

/// Upper bound on the closing handshake with a peer that may not be reading
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Drain the mailbox into the transport until either fails
///
/// A write failure tears down this connection only. Eviction by the
/// registry interrupts a write that is waiting on a slow peer.
pub async fn outbound_pump<W>(
    conn: ConnectionContext,
    state: Arc<ConnectionState>,
    mut mailbox: MailboxReceiver,
    mut writer: W,
    registry: Arc<Registry>,
    ping_interval: Duration,
) where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    let mut ticker = ping_ticker(ping_interval);

    let end = loop {
        let message = tokio::select! {
            biased;
            _ = state.terminating() => break WriteEnd::Terminated,
            frame = mailbox.recv() => match frame {
                Some(frame) => frame.into_message(),
                None => break WriteEnd::MailboxClosed,
            },
            _ = tick(&mut ticker) => Message::Ping(Default::default()),
        };

        let sent = tokio::select! {
            biased;
            _ = state.terminating() => break WriteEnd::Terminated,
            sent = writer.send(message) => sent,
        };

        if let Err(e) = sent {
            registry.stats().write_failed();
            tracing::warn!(
                owner = %conn.owner,
                conn_id = conn.id.get(),
                error = %e,
                "Write error"
            );
            break WriteEnd::WriteFailed;
        }
    };

    // Unregister even when the other pump started teardown: it may not have
    // finished, and the mailbox must not close while still registered
    state.begin_teardown();
    registry.unregister(&conn).await;
    mailbox.close();

    let closing = async {
        if !matches!(end, WriteEnd::WriteFailed) {
            let _ = writer.send(Message::Close(Some(normal_close()))).await;
        }
        let _ = writer.close().await;
    };
    if tokio::time::timeout(CLOSE_TIMEOUT, closing).await.is_err() {
        tracing::debug!(
            owner = %conn.owner,
            conn_id = conn.id.get(),
            "Close handshake timed out"
        );
    }

    if state.mark_closed() {
        tracing::info!(
            owner = %conn.owner,
            conn_id = conn.id.get(),
            peer = %conn.peer_addr,
            duration_ms = conn.duration().as_millis() as u64,
            "Connection closed"
        );
    }
}

fn ping_ticker(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    // First ping after one full period, not immediately
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(ticker)
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};

    use futures_util::stream::BoxStream;
    use tokio::sync::mpsc;

    use super::*;
    use crate::error::PersistError;
    use crate::persist::{ClipboardEntry, HistoryQuery, MemoryStore};
    use crate::registry::{ConnectionId, OwnerId, RegistryConfig};
    use crate::session::ConnectionPhase;

    fn conn(id: u64, owner: u64) -> ConnectionContext {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 50000 + id as u16);
        ConnectionContext::new(ConnectionId::new(id), OwnerId::new(owner), addr)
    }

    /// Sink that records every message it accepts
    struct RecordingSink {
        tx: mpsc::UnboundedSender<Message>,
    }

    impl Sink<Message> for RecordingSink {
        type Error = WsError;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), WsError>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(self: Pin<&mut Self>, item: Message) -> std::result::Result<(), WsError> {
            self.tx.send(item).map_err(|_| WsError::ConnectionClosed)
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), WsError>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), WsError>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Sink for a peer that never reads: every write waits forever
    struct StuckSink;

    impl Sink<Message> for StuckSink {
        type Error = WsError;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), WsError>> {
            Poll::Pending
        }

        fn start_send(self: Pin<&mut Self>, _item: Message) -> std::result::Result<(), WsError> {
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), WsError>> {
            Poll::Pending
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), WsError>> {
            Poll::Pending
        }
    }

    /// Sink whose every write fails
    struct FailingSink;

    impl Sink<Message> for FailingSink {
        type Error = WsError;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), WsError>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(self: Pin<&mut Self>, _item: Message) -> std::result::Result<(), WsError> {
            Err(WsError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe)))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), WsError>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), WsError>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Store that counts calls and always fails
    #[derive(Default)]
    struct BrokenStore {
        calls: AtomicUsize,
    }

    impl EntryStore for BrokenStore {
        async fn store(
            &self,
            _owner: OwnerId,
            _content_type: &str,
            _content: &str,
            _source_device: &str,
        ) -> std::result::Result<ClipboardEntry, PersistError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(PersistError::Backend("database is down".into()))
        }

        async fn history(
            &self,
            _owner: OwnerId,
            _query: HistoryQuery,
        ) -> std::result::Result<Vec<ClipboardEntry>, PersistError> {
            Ok(Vec::new())
        }
    }

    struct Harness {
        conn: ConnectionContext,
        state: Arc<ConnectionState>,
        mailbox: MailboxReceiver,
    }

    async fn admit(registry: &Registry, id: u64, owner: u64) -> Harness {
        let conn = conn(id, owner);
        let state = Arc::new(ConnectionState::new());
        let (tx, rx) = registry.open_mailbox(&state);
        registry.register(&conn, tx).await;
        state.mark_registered();
        state.mark_active();
        Harness {
            conn,
            state,
            mailbox: rx,
        }
    }

    type Inbound = BoxStream<'static, std::result::Result<Message, WsError>>;

    /// Channel-backed read half: send into the sender, the pump reads the stream
    fn inbound() -> (
        mpsc::UnboundedSender<std::result::Result<Message, WsError>>,
        Inbound,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        (tx, stream.boxed())
    }

    fn text(json: &str) -> std::result::Result<Message, WsError> {
        Ok(Message::text(json.to_string()))
    }

    #[tokio::test]
    async fn test_valid_frame_reaches_every_device_including_sender() {
        let registry = Arc::new(Registry::new());
        let store = Arc::new(MemoryStore::new());
        let mut a = admit(&registry, 1, 7).await;
        let mut b = admit(&registry, 2, 7).await;

        let (tx, rx) = inbound();
        let reader = tokio::spawn(inbound_pump(
            a.conn.clone(),
            Arc::clone(&a.state),
            rx,
            Arc::clone(&registry),
            Arc::clone(&store),
            Duration::ZERO,
        ));

        tx.send(text(
            r#"{"content_type":"text","content":"hello","source_device":"deviceA"}"#,
        ))
        .unwrap();

        let on_a = a.mailbox.recv().await.unwrap();
        let on_b = b.mailbox.recv().await.unwrap();
        assert_eq!(on_a, on_b);

        let record: ClipboardEntry = serde_json::from_str(on_a.as_str()).unwrap();
        assert_eq!(record.content, "hello");
        assert_eq!(record.source_device, "deviceA");
        assert_eq!(record.user_id, OwnerId::new(7));

        drop(tx);
        reader.await.unwrap();
        assert!(!registry.is_registered(a.conn.owner, a.conn.id).await);
        assert!(registry.is_registered(b.conn.owner, b.conn.id).await);
    }

    #[tokio::test]
    async fn test_empty_frame_is_noop() {
        let registry = Arc::new(Registry::new());
        let store = Arc::new(BrokenStore::default());
        let mut a = admit(&registry, 1, 7).await;

        let (tx, rx) = inbound();
        let reader = tokio::spawn(inbound_pump(
            a.conn.clone(),
            Arc::clone(&a.state),
            rx,
            Arc::clone(&registry),
            Arc::clone(&store),
            Duration::ZERO,
        ));

        tx.send(text(r#"{"content_type":"","content":""}"#))
            .unwrap();
        tx.send(text("{not json")).unwrap();
        tx.send(Ok(Message::Ping(Default::default())))
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
        assert!(registry.is_registered(a.conn.owner, a.conn.id).await);
        let nothing = tokio::time::timeout(Duration::from_millis(20), a.mailbox.recv()).await;
        assert!(nothing.is_err());
        assert_eq!(a.state.phase(), ConnectionPhase::Active);
        assert_eq!(registry.stats().snapshot().frames_ignored, 2);

        drop(tx);
        reader.await.unwrap();
        assert!(a.mailbox.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_connection() {
        let registry = Arc::new(Registry::new());
        let store = Arc::new(BrokenStore::default());
        let a = admit(&registry, 1, 7).await;

        let (tx, rx) = inbound();
        let reader = tokio::spawn(inbound_pump(
            a.conn.clone(),
            Arc::clone(&a.state),
            rx,
            Arc::clone(&registry),
            Arc::clone(&store),
            Duration::ZERO,
        ));

        tx.send(text(r#"{"content_type":"text","content":"x"}"#))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        assert!(registry.is_registered(a.conn.owner, a.conn.id).await);
        assert_eq!(registry.stats().snapshot().persist_failures, 1);

        drop(tx);
        reader.await.unwrap();
    }

    #[tokio::test]
    async fn test_close_frame_unregisters() {
        let registry = Arc::new(Registry::new());
        let store = Arc::new(MemoryStore::new());
        let a = admit(&registry, 1, 7).await;

        let (tx, rx) = inbound();
        tx.send(Ok(Message::Close(Some(normal_close()))))
            .unwrap();

        inbound_pump(
            a.conn.clone(),
            Arc::clone(&a.state),
            rx,
            Arc::clone(&registry),
            store,
            Duration::ZERO,
        )
        .await;

        assert_eq!(a.state.phase(), ConnectionPhase::Unregistering);
        assert_eq!(registry.owner_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_timeout_unregisters() {
        let registry = Arc::new(Registry::new());
        let store = Arc::new(MemoryStore::new());
        let a = admit(&registry, 1, 7).await;

        let (_tx, rx) = inbound();
        inbound_pump(
            a.conn.clone(),
            Arc::clone(&a.state),
            rx,
            Arc::clone(&registry),
            store,
            Duration::from_secs(5),
        )
        .await;

        assert!(!registry.is_registered(a.conn.owner, a.conn.id).await);
    }

    #[tokio::test]
    async fn test_outbound_writes_in_order_then_closes() {
        let registry = Arc::new(Registry::new());
        let a = admit(&registry, 1, 7).await;
        let (sink_tx, mut sink_rx) = mpsc::unbounded_channel();

        let writer = tokio::spawn(outbound_pump(
            a.conn.clone(),
            Arc::clone(&a.state),
            a.mailbox,
            RecordingSink { tx: sink_tx },
            Arc::clone(&registry),
            Duration::ZERO,
        ));

        for i in 0..3 {
            registry
                .deliver_to_owner(a.conn.owner, OutboundFrame::text(format!("m{}", i)))
                .await;
        }
        for i in 0..3 {
            let msg = sink_rx.recv().await.unwrap();
            assert_eq!(msg.to_text().unwrap(), format!("m{}", i));
        }

        registry.unregister(&a.conn).await;
        writer.await.unwrap();

        assert!(matches!(sink_rx.recv().await, Some(Message::Close(Some(_)))));
        assert_eq!(a.state.phase(), ConnectionPhase::Closed);
    }

    #[tokio::test]
    async fn test_write_failure_isolated_to_one_connection() {
        let registry = Arc::new(Registry::new());
        let a = admit(&registry, 1, 7).await;
        let mut sibling = admit(&registry, 2, 7).await;
        let mut stranger = admit(&registry, 3, 8).await;

        let writer = tokio::spawn(outbound_pump(
            a.conn.clone(),
            Arc::clone(&a.state),
            a.mailbox,
            FailingSink,
            Arc::clone(&registry),
            Duration::ZERO,
        ));

        registry
            .deliver_to_owner(a.conn.owner, OutboundFrame::text("boom"))
            .await;
        writer.await.unwrap();

        assert_eq!(a.state.phase(), ConnectionPhase::Closed);
        assert!(!registry.is_registered(a.conn.owner, a.conn.id).await);

        // Same owner and a different owner are unaffected
        assert!(registry.is_registered(sibling.conn.owner, sibling.conn.id).await);
        assert!(registry.is_registered(stranger.conn.owner, stranger.conn.id).await);
        assert_eq!(sibling.mailbox.recv().await.unwrap().as_str(), "boom");

        registry
            .deliver_to_owner(stranger.conn.owner, OutboundFrame::text("still here"))
            .await;
        assert_eq!(stranger.mailbox.recv().await.unwrap().as_str(), "still here");
        assert_eq!(registry.stats().snapshot().write_failures, 1);
    }

    #[tokio::test]
    async fn test_write_failure_stops_inbound_pump() {
        let registry = Arc::new(Registry::new());
        let store = Arc::new(MemoryStore::new());
        let a = admit(&registry, 1, 7).await;

        let (_tx, rx) = inbound();
        let reader = tokio::spawn(inbound_pump(
            a.conn.clone(),
            Arc::clone(&a.state),
            rx,
            Arc::clone(&registry),
            store,
            Duration::ZERO,
        ));
        let writer = tokio::spawn(outbound_pump(
            a.conn.clone(),
            Arc::clone(&a.state),
            a.mailbox,
            FailingSink,
            Arc::clone(&registry),
            Duration::ZERO,
        ));

        registry
            .deliver_to_owner(a.conn.owner, OutboundFrame::text("boom"))
            .await;

        tokio::time::timeout(Duration::from_secs(1), async {
            writer.await.unwrap();
            reader.await.unwrap();
        })
        .await
        .expect("both pumps should stop");
        assert_eq!(registry.stats().snapshot().connections_active, 0);
    }

    #[tokio::test]
    async fn test_eviction_closes_transport() {
        let config = RegistryConfig::default().mailbox_capacity(1);
        let registry = Arc::new(Registry::with_config(config));
        let a = admit(&registry, 1, 7).await;

        // Fill the mailbox and overflow it before the pump runs
        registry
            .deliver_to_owner(a.conn.owner, OutboundFrame::text("queued"))
            .await;
        let report = registry
            .deliver_to_owner(a.conn.owner, OutboundFrame::text("overflow"))
            .await;
        assert_eq!(report.evicted, 1);

        let (sink_tx, mut sink_rx) = mpsc::unbounded_channel();
        outbound_pump(
            a.conn.clone(),
            Arc::clone(&a.state),
            a.mailbox,
            RecordingSink { tx: sink_tx },
            Arc::clone(&registry),
            Duration::ZERO,
        )
        .await;

        // Eviction already started teardown, so only the close frame is written
        assert!(matches!(sink_rx.recv().await, Some(Message::Close(_))));
        assert!(sink_rx.recv().await.is_none());
        assert_eq!(a.state.phase(), ConnectionPhase::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_evicted_connection_stops_reading_and_writing() {
        let config = RegistryConfig::default().mailbox_capacity(1);
        let registry = Arc::new(Registry::with_config(config));
        let store = Arc::new(MemoryStore::new());
        let a = admit(&registry, 1, 7).await;

        let (tx, rx) = inbound();
        let reader = tokio::spawn(inbound_pump(
            a.conn.clone(),
            Arc::clone(&a.state),
            rx,
            Arc::clone(&registry),
            Arc::clone(&store),
            Duration::ZERO,
        ));
        let writer = tokio::spawn(outbound_pump(
            a.conn.clone(),
            Arc::clone(&a.state),
            a.mailbox,
            StuckSink,
            Arc::clone(&registry),
            Duration::ZERO,
        ));

        // The writer blocks on the first frame; the mailbox then overflows
        let mut evicted = 0;
        for i in 0..4 {
            let report = registry
                .deliver_to_owner(a.conn.owner, OutboundFrame::text(format!("m{}", i)))
                .await;
            evicted += report.evicted;
            tokio::task::yield_now().await;
        }
        assert_eq!(evicted, 1);
        assert!(!registry.is_registered(a.conn.owner, a.conn.id).await);

        // Frames arriving after eviction are not persisted
        // The reader may already be gone, so sends can fail
        for _ in 0..3 {
            let _ = tx.send(text(r#"{"content_type":"text","content":"late"}"#));
        }

        tokio::time::timeout(Duration::from_secs(30), async {
            reader.await.unwrap();
            writer.await.unwrap();
        })
        .await
        .expect("evicted connection must shut down");

        assert_eq!(a.state.phase(), ConnectionPhase::Closed);
        assert!(store.is_empty().await);
        assert_eq!(registry.stats().snapshot().connections_active, 0);
    }

    #[tokio::test]
    async fn test_outbound_unregisters_before_closing_when_other_side_started() {
        let registry = Arc::new(Registry::new());
        let a = admit(&registry, 1, 7).await;

        // The inbound side won the race but has not unregistered yet
        assert!(a.state.begin_teardown());

        let (sink_tx, mut sink_rx) = mpsc::unbounded_channel();
        outbound_pump(
            a.conn.clone(),
            Arc::clone(&a.state),
            a.mailbox,
            RecordingSink { tx: sink_tx },
            Arc::clone(&registry),
            Duration::ZERO,
        )
        .await;

        assert!(!registry.is_registered(a.conn.owner, a.conn.id).await);
        assert!(matches!(sink_rx.recv().await, Some(Message::Close(_))));
        assert_eq!(a.state.phase(), ConnectionPhase::Closed);

        let stats = registry.stats().snapshot();
        assert_eq!(stats.connections_active, 0);
        assert_eq!(stats.evictions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outbound_sends_pings() {
        let registry = Arc::new(Registry::new());
        let a = admit(&registry, 1, 7).await;
        let (sink_tx, mut sink_rx) = mpsc::unbounded_channel();

        let writer = tokio::spawn(outbound_pump(
            a.conn.clone(),
            Arc::clone(&a.state),
            a.mailbox,
            RecordingSink { tx: sink_tx },
            Arc::clone(&registry),
            Duration::from_secs(30),
        ));

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(matches!(sink_rx.recv().await, Some(Message::Ping(_))));

        registry.unregister(&a.conn).await;
        writer.await.unwrap();
    }
}
