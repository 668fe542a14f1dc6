use std::collections::{HashMap, HashSet};

use codraft_store::DocumentId;

/// Identity of one live transport connection, assigned at accept time.
pub type ConnectionId = u64;

/// Tracks which connection is currently viewing which document.
///
/// Purely in-memory: state lives for the process lifetime and is
/// rebuilt from zero on restart by clients rejoining. A connection is
/// a member of at most one document's channel at a time; joining a
/// new document implicitly leaves the previous one.
#[derive(Default)]
pub struct SessionRegistry {
    by_connection: HashMap<ConnectionId, DocumentId>,
    by_document: HashMap<DocumentId, HashSet<ConnectionId>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `connection` against `document_id`, dropping any
    /// previous membership first. Idempotent for the same document;
    /// always succeeds.
    pub fn join(&mut self, connection: ConnectionId, document_id: DocumentId) {
        if let Some(previous) = self.by_connection.insert(connection, document_id) {
            if previous != document_id {
                self.remove_member(previous, connection);
            }
        }
        self.by_document
            .entry(document_id)
            .or_default()
            .insert(connection);
    }

    /// Remove any membership for `connection`. No-op if none exists.
    pub fn leave(&mut self, connection: ConnectionId) {
        if let Some(document_id) = self.by_connection.remove(&connection) {
            self.remove_member(document_id, connection);
        }
    }

    /// The transport must call this on every disconnect, otherwise
    /// stale memberships accumulate for the process lifetime.
    pub fn on_connection_lost(&mut self, connection: ConnectionId) {
        self.leave(connection);
    }

    /// Current members of a document's channel. Filtering out the
    /// sender is the broadcaster's job.
    pub fn members_of(&self, document_id: DocumentId) -> Vec<ConnectionId> {
        self.by_document
            .get(&document_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn document_of(&self, connection: ConnectionId) -> Option<DocumentId> {
        self.by_connection.get(&connection).copied()
    }

    fn remove_member(&mut self, document_id: DocumentId, connection: ConnectionId) {
        if let Some(members) = self.by_document.get_mut(&document_id) {
            members.remove(&connection);
            if members.is_empty() {
                self.by_document.remove(&document_id);
            }
        }
    }
}
