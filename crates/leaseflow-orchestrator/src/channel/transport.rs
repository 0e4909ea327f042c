//! Push transport seam.

use leaseflow_core::PushMessage;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::identity::CallerIdentity;

/// What a transport reports about one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Open,
    Message(PushMessage),
    Closed,
    Error(String),
}

/// Where a connection delivers its events, stamped with its generation.
#[derive(Debug, Clone)]
pub struct PushSink {
    generation: u64,
    tx: mpsc::UnboundedSender<(u64, TransportEvent)>,
}

impl PushSink {
    pub(crate) const fn new(generation: u64, tx: mpsc::UnboundedSender<(u64, TransportEvent)>) -> Self {
        Self { generation, tx }
    }

    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Deliver an event. Returns false once the manager is gone.
    pub fn send(&self, event: TransportEvent) -> bool {
        self.tx.send((self.generation, event)).is_ok()
    }
}

/// A live connection. Dropping the handle aborts its task.
#[derive(Debug, Default)]
pub struct ConnectionHandle {
    task: Option<JoinHandle<()>>,
}

impl ConnectionHandle {
    pub const fn from_task(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// A connection with no task of its own (events are pushed externally).
    pub const fn detached() -> Self {
        Self { task: None }
    }

    pub fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Opens push connections to the authority.
pub trait PushTransport: Send + Sync {
    /// Start connecting; the transport reports `Open` through `sink` once
    /// the connection is up.
    fn connect(&self, identity: &CallerIdentity, sink: PushSink) -> ConnectionHandle;
}
