//! Realtime channel manager.
//!
//! Owns the one push connection of a session. Every `open` starts a new
//! connection generation; events from earlier generations are dropped on
//! receipt. `rebind` hands out a new listener token on the live connection,
//! and each dispatched event carries the token current at dispatch, so a
//! saga holding an older token knows the event is not for it.
//!
//! There is no automatic reconnect: after a transport close or error the
//! channel stays `Closed` until someone calls `open` again.

mod ndjson;
mod transport;

use std::sync::Arc;

use leaseflow_core::PushMessage;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub use ndjson::NdjsonPushTransport;
pub use transport::{ConnectionHandle, PushSink, PushTransport, TransportEvent};

use crate::identity::CallerIdentity;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("cannot open realtime channel without an authenticated identity")]
    Unauthenticated,

    #[error("realtime channel is not open")]
    NotOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Closed,
    Opening,
    Open,
}

/// Identifies who is listening on the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEventKind {
    Open,
    Message(PushMessage),
    Closed,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEvent {
    pub token: ListenerToken,
    pub kind: ChannelEventKind,
}

pub struct ChannelManager {
    transport: Arc<dyn PushTransport>,
    state: ChannelState,
    generation: u64,
    next_token: u64,
    listener: ListenerToken,
    connection: Option<ConnectionHandle>,
    tx: mpsc::UnboundedSender<(u64, TransportEvent)>,
    rx: mpsc::UnboundedReceiver<(u64, TransportEvent)>,
}

impl ChannelManager {
    pub fn new(transport: Arc<dyn PushTransport>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            transport,
            state: ChannelState::Closed,
            generation: 0,
            next_token: 1,
            listener: ListenerToken(0),
            connection: None,
            tx,
            rx,
        }
    }

    pub const fn state(&self) -> ChannelState {
        self.state
    }

    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub const fn listener(&self) -> ListenerToken {
        self.listener
    }

    /// Open a new connection, abandoning any previous one.
    pub fn open(&mut self, identity: &CallerIdentity) -> Result<ListenerToken, ChannelError> {
        if !identity.is_authenticated() {
            return Err(ChannelError::Unauthenticated);
        }

        // Dropping the old handle aborts its task.
        self.connection = None;
        self.generation += 1;
        self.state = ChannelState::Opening;
        let token = self.issue_token();

        let sink = PushSink::new(self.generation, self.tx.clone());
        self.connection = Some(self.transport.connect(identity, sink));
        info!(generation = self.generation, "realtime channel opening");
        Ok(token)
    }

    /// Give the live connection a new listener.
    pub fn rebind(&mut self) -> Result<ListenerToken, ChannelError> {
        if self.state == ChannelState::Closed {
            return Err(ChannelError::NotOpen);
        }
        let token = self.issue_token();
        debug!(generation = self.generation, token = token.0, "realtime channel rebound");
        Ok(token)
    }

    /// Close the channel. Closing a closed channel does nothing.
    pub fn close(&mut self) {
        if self.state == ChannelState::Closed {
            return;
        }
        self.teardown();
        info!(generation = self.generation, "realtime channel closed");
    }

    /// Wait for the next event of the current connection.
    ///
    /// Returns `None` once the channel is closed.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        while self.state != ChannelState::Closed {
            let (generation, event) = self.rx.recv().await?;
            if generation != self.generation {
                debug!(generation, current = self.generation, "dropping stale channel event");
                continue;
            }

            let kind = match event {
                TransportEvent::Open => {
                    self.state = ChannelState::Open;
                    ChannelEventKind::Open
                }
                TransportEvent::Message(msg) => ChannelEventKind::Message(msg),
                TransportEvent::Closed => {
                    self.teardown();
                    ChannelEventKind::Closed
                }
                TransportEvent::Error(reason) => {
                    warn!(generation, %reason, "realtime channel error");
                    self.teardown();
                    ChannelEventKind::Error(reason)
                }
            };
            return Some(ChannelEvent {
                token: self.listener,
                kind,
            });
        }
        None
    }

    fn issue_token(&mut self) -> ListenerToken {
        self.listener = ListenerToken(self.next_token);
        self.next_token += 1;
        self.listener
    }

    fn teardown(&mut self) {
        self.connection = None;
        self.state = ChannelState::Closed;
        // Anything the old connection still has in flight is now stale.
        self.generation += 1;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::sync::Mutex;

    use leaseflow_core::DeploymentState;

    use super::*;

    /// Records sinks; events are pushed by the test.
    #[derive(Default)]
    struct ManualTransport {
        sinks: Mutex<Vec<PushSink>>,
    }

    impl ManualTransport {
        fn sink(&self, index: usize) -> PushSink {
            self.sinks.lock().unwrap()[index].clone()
        }
    }

    impl PushTransport for ManualTransport {
        fn connect(&self, _identity: &CallerIdentity, sink: PushSink) -> ConnectionHandle {
            self.sinks.lock().unwrap().push(sink);
            ConnectionHandle::detached()
        }
    }

    fn user() -> CallerIdentity {
        CallerIdentity::authenticated("alice", "token")
    }

    fn message(id: &str) -> TransportEvent {
        TransportEvent::Message(PushMessage {
            id: id.into(),
            update: DeploymentState::Active,
        })
    }

    #[test]
    fn open_requires_identity() {
        let mut channel = ChannelManager::new(Arc::new(ManualTransport::default()));
        assert_eq!(
            channel.open(&CallerIdentity::anonymous()),
            Err(ChannelError::Unauthenticated)
        );
        assert_eq!(channel.state(), ChannelState::Closed);
    }

    #[tokio::test]
    async fn open_then_events_flow() {
        let transport = Arc::new(ManualTransport::default());
        let mut channel = ChannelManager::new(transport.clone());
        let token = channel.open(&user()).unwrap();
        assert_eq!(channel.state(), ChannelState::Opening);

        let sink = transport.sink(0);
        sink.send(TransportEvent::Open);
        sink.send(message("d1"));

        let event = channel.next_event().await.unwrap();
        assert_eq!(event.kind, ChannelEventKind::Open);
        assert_eq!(event.token, token);
        assert_eq!(channel.state(), ChannelState::Open);

        let event = channel.next_event().await.unwrap();
        assert!(matches!(event.kind, ChannelEventKind::Message(m) if m.id.as_str() == "d1"));
    }

    #[tokio::test]
    async fn reopen_drops_previous_generation() {
        let transport = Arc::new(ManualTransport::default());
        let mut channel = ChannelManager::new(transport.clone());
        channel.open(&user()).unwrap();
        channel.open(&user()).unwrap();

        transport.sink(0).send(message("stale"));
        transport.sink(1).send(message("fresh"));

        let event = channel.next_event().await.unwrap();
        assert!(matches!(event.kind, ChannelEventKind::Message(m) if m.id.as_str() == "fresh"));
    }

    #[tokio::test]
    async fn rebind_retags_following_events() {
        let transport = Arc::new(ManualTransport::default());
        let mut channel = ChannelManager::new(transport.clone());
        let first = channel.open(&user()).unwrap();
        let second = channel.rebind().unwrap();
        assert_ne!(first, second);

        transport.sink(0).send(message("d1"));
        let event = channel.next_event().await.unwrap();
        assert_eq!(event.token, second);
    }

    #[test]
    fn rebind_needs_a_channel() {
        let mut channel = ChannelManager::new(Arc::new(ManualTransport::default()));
        assert_eq!(channel.rebind(), Err(ChannelError::NotOpen));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_silences_events() {
        let transport = Arc::new(ManualTransport::default());
        let mut channel = ChannelManager::new(transport.clone());
        channel.open(&user()).unwrap();
        channel.close();
        channel.close();
        assert_eq!(channel.state(), ChannelState::Closed);

        transport.sink(0).send(message("late"));
        assert!(channel.next_event().await.is_none());
    }

    #[tokio::test]
    async fn transport_error_closes_without_reconnect() {
        let transport = Arc::new(ManualTransport::default());
        let mut channel = ChannelManager::new(transport.clone());
        channel.open(&user()).unwrap();
        transport.sink(0).send(TransportEvent::Error("reset".into()));
        transport.sink(0).send(message("after"));

        let event = channel.next_event().await.unwrap();
        assert_eq!(event.kind, ChannelEventKind::Error("reset".into()));
        assert_eq!(channel.state(), ChannelState::Closed);
        assert!(channel.next_event().await.is_none());
        assert_eq!(transport.sinks.lock().unwrap().len(), 1);
    }
}
