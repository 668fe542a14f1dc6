//! Wire protocol for the document sync channel. Frames are JSON text
//! messages, internally tagged by `type`.

use codraft_store::DocumentId;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Enter a document's channel, implicitly leaving any previous one.
    Join { document_id: DocumentId },

    /// Submit new content for a document. Last writer wins; the
    /// payload fully replaces the stored content.
    Update { id: DocumentId, content: serde_json::Value },

    /// Explicitly drop the current membership.
    Leave,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Another participant's accepted update for the document this
    /// connection is joined to.
    Updated { content: serde_json::Value },

    /// A rejection, surfaced to the submitting connection only.
    Error { message: String },
}
