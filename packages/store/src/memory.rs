use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{StoreError, StoreResult};
use crate::model::{Document, DocumentId, NewDocument, Revision, UserId, WorkspaceId};
use crate::store::DocumentStore;

/// In-memory store with the same contract as the disk-backed one.
/// State lives for the process lifetime only.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

struct Inner {
    documents: HashMap<DocumentId, Document>,
    revisions: Vec<Revision>,
    next_document_id: i64,
    next_revision_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                documents: HashMap::new(),
                revisions: Vec::new(),
                next_document_id: 1,
                next_revision_id: 1,
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_document(&self, new: NewDocument) -> StoreResult<Document> {
        let mut inner = self.inner.lock().unwrap();
        let now = Utc::now();
        let document = Document {
            id: inner.next_document_id,
            name: new.name,
            kind: new.kind,
            content: new.content,
            workspace_id: new.workspace_id,
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
        };
        inner.next_document_id += 1;
        inner.documents.insert(document.id, document.clone());
        Ok(document)
    }

    async fn get_document(&self, id: DocumentId) -> StoreResult<Document> {
        let inner = self.inner.lock().unwrap();
        inner
            .documents
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn list_documents(&self, workspace_id: WorkspaceId) -> StoreResult<Vec<Document>> {
        let inner = self.inner.lock().unwrap();
        let mut documents: Vec<Document> = inner
            .documents
            .values()
            .filter(|d| d.workspace_id == workspace_id)
            .cloned()
            .collect();
        documents.sort_by_key(|d| d.id);
        Ok(documents)
    }

    async fn update_content(
        &self,
        id: DocumentId,
        content: serde_json::Value,
    ) -> StoreResult<Document> {
        let mut inner = self.inner.lock().unwrap();
        let document = inner
            .documents
            .get_mut(&id)
            .ok_or(StoreError::NotFound(id))?;
        document.content = content;
        document.updated_at = Utc::now();
        Ok(document.clone())
    }

    async fn append_revision(
        &self,
        document_id: DocumentId,
        content: serde_json::Value,
        author_id: UserId,
    ) -> StoreResult<Revision> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.documents.contains_key(&document_id) {
            return Err(StoreError::NotFound(document_id));
        }
        let revision = Revision {
            id: inner.next_revision_id,
            document_id,
            content,
            author_id,
            created_at: Utc::now(),
        };
        inner.next_revision_id += 1;
        inner.revisions.push(revision.clone());
        Ok(revision)
    }

    async fn list_revisions(&self, document_id: DocumentId) -> StoreResult<Vec<Revision>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .revisions
            .iter()
            .filter(|r| r.document_id == document_id)
            .cloned()
            .collect())
    }
}
