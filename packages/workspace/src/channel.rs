use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use codraft_store::DocumentId;
use tokio::sync::mpsc;

use crate::proto::ServerMessage;
use crate::session::{ConnectionId, SessionRegistry};

/// Outbound frames buffered per connection before a slow client
/// starts missing updates. A client that falls behind observes
/// current state on its next rejoin.
const OUTBOUND_BUFFER: usize = 100;

struct Shared {
    registry: SessionRegistry,
    senders: HashMap<ConnectionId, mpsc::Sender<ServerMessage>>,
}

/// Per-document logical broadcast group.
///
/// One lock guards both the membership registry and the outbound
/// senders, so broadcast emission for a document is serialized: every
/// member observes a single document's updates in issue order. No
/// ordering holds across documents.
#[derive(Clone)]
pub struct SyncChannel {
    shared: Arc<Mutex<Shared>>,
    next_id: Arc<AtomicU64>,
}

impl SyncChannel {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                registry: SessionRegistry::new(),
                senders: HashMap::new(),
            })),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Allocate a connection id and its outbound frame queue. The
    /// transport drains the receiver into the socket.
    pub fn register(&self) -> (ConnectionId, mpsc::Receiver<ServerMessage>) {
        let connection = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        self.shared.lock().unwrap().senders.insert(connection, tx);
        (connection, rx)
    }

    pub fn join(&self, connection: ConnectionId, document_id: DocumentId) {
        self.shared.lock().unwrap().registry.join(connection, document_id);
    }

    pub fn leave(&self, connection: ConnectionId) {
        self.shared.lock().unwrap().registry.leave(connection);
    }

    /// Drop the connection's membership and its outbound queue. The
    /// transport calls this on every disconnect.
    pub fn connection_lost(&self, connection: ConnectionId) {
        let mut shared = self.shared.lock().unwrap();
        shared.registry.on_connection_lost(connection);
        shared.senders.remove(&connection);
    }

    pub fn members_of(&self, document_id: DocumentId) -> Vec<ConnectionId> {
        self.shared.lock().unwrap().registry.members_of(document_id)
    }

    /// Deliver `payload` to every member of the document except
    /// `exclude`. Fire-and-forget: each delivery is a non-blocking
    /// send, and one recipient's full buffer or dead socket never
    /// affects another. Returns the number of deliveries queued.
    pub fn broadcast(
        &self,
        document_id: DocumentId,
        exclude: ConnectionId,
        payload: ServerMessage,
    ) -> usize {
        let shared = self.shared.lock().unwrap();
        let mut delivered = 0;

        for member in shared.registry.members_of(document_id) {
            if member == exclude {
                continue;
            }
            let Some(tx) = shared.senders.get(&member) else {
                continue;
            };
            match tx.try_send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::debug!(connection = member, document_id, "outbound buffer full, dropping frame");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!(connection = member, document_id, "receiver gone, skipping");
                }
            }
        }

        delivered
    }

    /// Direct send to one connection, used for surfacing rejections
    /// to the submitter.
    pub fn send_to(&self, connection: ConnectionId, payload: ServerMessage) {
        let shared = self.shared.lock().unwrap();
        if let Some(tx) = shared.senders.get(&connection) {
            let _ = tx.try_send(payload);
        }
    }
}

impl Default for SyncChannel {
    fn default() -> Self {
        Self::new()
    }
}
