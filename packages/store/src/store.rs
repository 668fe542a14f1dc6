use async_trait::async_trait;

use crate::error::StoreResult;
use crate::model::{Document, DocumentId, NewDocument, Revision, UserId, WorkspaceId};

/// Storage seam between the sync core and whatever holds the data.
///
/// Each method owns only the duration of its single row's
/// read-modify-write; there are no cross-document transactions.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create_document(&self, new: NewDocument) -> StoreResult<Document>;

    async fn get_document(&self, id: DocumentId) -> StoreResult<Document>;

    async fn list_documents(&self, workspace_id: WorkspaceId) -> StoreResult<Vec<Document>>;

    /// Overwrite the current content and refresh `updated_at`.
    /// Last write wins; no merge is attempted.
    async fn update_content(
        &self,
        id: DocumentId,
        content: serde_json::Value,
    ) -> StoreResult<Document>;

    /// Append an immutable snapshot to the document's revision log.
    async fn append_revision(
        &self,
        document_id: DocumentId,
        content: serde_json::Value,
        author_id: UserId,
    ) -> StoreResult<Revision>;

    /// Revisions in append order.
    async fn list_revisions(&self, document_id: DocumentId) -> StoreResult<Vec<Revision>>;
}
