use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type DocumentId = i64;
pub type UserId = i64;
pub type WorkspaceId = i64;

/// The two known content shapes. The payload itself is opaque to the
/// sync layer; the kind only tells clients how to render it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    /// Free-text / rich document
    Text,
    /// Tabular / spreadsheet
    Sheet,
}

/// The unit of collaborative content. `content` is always the most
/// recently accepted write, never a partially applied one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    pub kind: DocumentKind,
    pub content: serde_json::Value,
    pub workspace_id: WorkspaceId,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating a document; the store assigns the id
/// and timestamps.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewDocument {
    pub name: String,
    pub kind: DocumentKind,
    pub content: serde_json::Value,
    pub workspace_id: WorkspaceId,
    pub created_by: UserId,
}

/// An immutable full-content snapshot recorded for every accepted
/// update, attributed to its author.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Revision {
    pub id: i64,
    pub document_id: DocumentId,
    pub content: serde_json::Value,
    pub author_id: UserId,
    pub created_at: DateTime<Utc>,
}
