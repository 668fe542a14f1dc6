use std::sync::Arc;

use codraft_store::{DocumentId, DocumentStore, StoreError, UserId};
use thiserror::Error;

use crate::channel::SyncChannel;
use crate::proto::ServerMessage;
use crate::session::ConnectionId;

#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("document {0} not found")]
    NotFound(DocumentId),

    #[error("failed to persist update: {0}")]
    Persistence(StoreError),

    #[error("content is not serializable: {0}")]
    MalformedPayload(String),
}

/// Orchestrates one accepted update: persist, record history, fan out.
///
/// Received -> Persisting -> HistoryRecorded -> Broadcast -> Complete,
/// with persistence failure as the only terminal rejection. Conflict
/// policy is last-writer-wins: whichever write persists last fully
/// replaces prior content, no merge. A CRDT or OT layer would slot in
/// between validation and persistence if causal merging were ever
/// needed.
pub struct UpdateCoordinator {
    store: Arc<dyn DocumentStore>,
    channel: SyncChannel,
}

impl UpdateCoordinator {
    pub fn new(store: Arc<dyn DocumentStore>, channel: SyncChannel) -> Self {
        Self { store, channel }
    }

    /// Apply `new_content` to the document on behalf of `author_id`,
    /// excluding `origin` from the fan-out. Returns the accepted
    /// content, which is exactly `new_content` since no merge occurs.
    ///
    /// A rejection leaves the store untouched and is never broadcast;
    /// resubmission is the caller's decision, there is no retry here.
    pub async fn apply_update(
        &self,
        document_id: DocumentId,
        new_content: serde_json::Value,
        author_id: UserId,
        origin: ConnectionId,
    ) -> Result<serde_json::Value, UpdateError> {
        // Structural well-formedness only; rejected before any store
        // interaction.
        serde_json::to_vec(&new_content)
            .map_err(|e| UpdateError::MalformedPayload(e.to_string()))?;

        self.store
            .update_content(document_id, new_content.clone())
            .await
            .map_err(|e| match e {
                StoreError::NotFound(id) => UpdateError::NotFound(id),
                other => UpdateError::Persistence(other),
            })?;

        // Content is committed and visible from here on. A failed
        // audit entry is logged, never rolled back: rollback would
        // race with concurrent readers of the new content.
        if let Err(e) = self
            .store
            .append_revision(document_id, new_content.clone(), author_id)
            .await
        {
            tracing::warn!(
                document_id,
                author_id,
                error = %e,
                "revision append failed after content commit; update is un-audited"
            );
        }

        let delivered = self.channel.broadcast(
            document_id,
            origin,
            ServerMessage::Updated {
                content: new_content.clone(),
            },
        );
        tracing::debug!(document_id, author_id, delivered, "update broadcast");

        Ok(new_content)
    }
}
