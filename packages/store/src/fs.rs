use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::model::{Document, DocumentId, NewDocument, Revision, UserId, WorkspaceId};
use crate::store::DocumentStore;

/// Disk-backed store: one JSON file per document plus an append-only
/// JSON-lines revision log per document.
///
/// All writes are serialized through an internal mutex so that
/// back-to-back updates to the same document commit in a total order
/// even on a multi-threaded runtime.
pub struct FsDocumentStore {
    documents_dir: PathBuf,
    revisions_dir: PathBuf,
    write_lock: Mutex<Counters>,
}

struct Counters {
    next_document_id: i64,
    next_revision_id: i64,
}

impl FsDocumentStore {
    /// Open (or initialize) a store rooted at `data_dir`. Id counters
    /// are seeded by scanning existing files, so ids stay
    /// non-decreasing across restarts of a single instance.
    pub fn open(data_dir: impl AsRef<Path>) -> StoreResult<Self> {
        let data_dir = data_dir.as_ref();
        let documents_dir = data_dir.join("documents");
        let revisions_dir = data_dir.join("revisions");
        std::fs::create_dir_all(&documents_dir)?;
        std::fs::create_dir_all(&revisions_dir)?;

        let max_document_id = scan_max_document_id(&documents_dir)?;
        let max_revision_id = scan_max_revision_id(&revisions_dir)?;

        tracing::info!(
            documents = max_document_id,
            revisions = max_revision_id,
            "opened document store at {:?}",
            data_dir
        );

        Ok(Self {
            documents_dir,
            revisions_dir,
            write_lock: Mutex::new(Counters {
                next_document_id: max_document_id + 1,
                next_revision_id: max_revision_id + 1,
            }),
        })
    }

    fn document_path(&self, id: DocumentId) -> PathBuf {
        self.documents_dir.join(format!("{id}.json"))
    }

    fn revisions_path(&self, id: DocumentId) -> PathBuf {
        self.revisions_dir.join(format!("{id}.jsonl"))
    }

    async fn read_document(&self, id: DocumentId) -> StoreResult<Document> {
        let bytes = match tokio::fs::read(self.document_path(id)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound(id)),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Write via temp file + rename so a crash mid-write can never
    /// leave a partially applied document behind.
    async fn write_document(&self, document: &Document) -> StoreResult<()> {
        let path = self.document_path(document.id);
        let tmp = self.documents_dir.join(format!("{}.json.tmp", document.id));
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(document)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn create_document(&self, new: NewDocument) -> StoreResult<Document> {
        let mut counters = self.write_lock.lock().await;
        let now = Utc::now();
        let document = Document {
            id: counters.next_document_id,
            name: new.name,
            kind: new.kind,
            content: new.content,
            workspace_id: new.workspace_id,
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
        };
        self.write_document(&document).await?;
        counters.next_document_id += 1;
        Ok(document)
    }

    async fn get_document(&self, id: DocumentId) -> StoreResult<Document> {
        self.read_document(id).await
    }

    async fn list_documents(&self, workspace_id: WorkspaceId) -> StoreResult<Vec<Document>> {
        let mut documents = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.documents_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            let document: Document = serde_json::from_slice(&bytes)?;
            if document.workspace_id == workspace_id {
                documents.push(document);
            }
        }
        documents.sort_by_key(|d| d.id);
        Ok(documents)
    }

    async fn update_content(
        &self,
        id: DocumentId,
        content: serde_json::Value,
    ) -> StoreResult<Document> {
        let _counters = self.write_lock.lock().await;
        let mut document = self.read_document(id).await?;
        document.content = content;
        document.updated_at = Utc::now();
        self.write_document(&document).await?;
        Ok(document)
    }

    async fn append_revision(
        &self,
        document_id: DocumentId,
        content: serde_json::Value,
        author_id: UserId,
    ) -> StoreResult<Revision> {
        let mut counters = self.write_lock.lock().await;
        // The parent document must exist before an audit entry can
        // reference it.
        self.read_document(document_id).await?;

        let revision = Revision {
            id: counters.next_revision_id,
            document_id,
            content,
            author_id,
            created_at: Utc::now(),
        };

        let mut line = serde_json::to_vec(&revision)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.revisions_path(document_id))
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;

        counters.next_revision_id += 1;
        Ok(revision)
    }

    async fn list_revisions(&self, document_id: DocumentId) -> StoreResult<Vec<Revision>> {
        let text = match tokio::fs::read_to_string(self.revisions_path(document_id)).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let lines: Vec<&str> = text.lines().filter(|l| !l.is_empty()).collect();
        let mut revisions = Vec::new();
        for (index, line) in lines.iter().enumerate() {
            match serde_json::from_str(line) {
                Ok(revision) => revisions.push(revision),
                // A crash mid-append can truncate the final line;
                // the entries before it are still intact.
                Err(e) if index == lines.len() - 1 => {
                    tracing::warn!(
                        document_id,
                        error = %e,
                        "skipping truncated trailing revision entry"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(revisions)
    }
}

fn scan_max_document_id(documents_dir: &Path) -> StoreResult<i64> {
    let mut max = 0;
    for entry in std::fs::read_dir(documents_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        if let Some(id) = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<i64>().ok())
        {
            max = max.max(id);
        }
    }
    Ok(max)
}

fn scan_max_revision_id(revisions_dir: &Path) -> StoreResult<i64> {
    let mut max = 0;
    for entry in std::fs::read_dir(revisions_dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        let text = std::fs::read_to_string(&path)?;
        // The log is append-only, so the last intact line carries the
        // highest id in the file. A crash mid-append can truncate the
        // final line; fall back to the one before it rather than
        // refusing to open the store.
        for line in text.lines().rev().filter(|l| !l.is_empty()) {
            match serde_json::from_str::<Revision>(line) {
                Ok(revision) => {
                    max = max.max(revision.id);
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "skipping truncated trailing revision entry"
                    );
                }
            }
        }
    }
    Ok(max)
}
