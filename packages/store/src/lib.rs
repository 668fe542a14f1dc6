//! Durable document persistence for Codraft.
//!
//! Owns the `Document` and `Revision` models and the [`DocumentStore`]
//! trait the sync layer writes through. Two implementations are
//! provided: [`FsDocumentStore`] (JSON files on disk, append-only
//! revision log) and [`MemoryStore`] (for tests and embedding).

pub mod error;
pub mod fs;
pub mod memory;
pub mod model;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use fs::FsDocumentStore;
pub use memory::MemoryStore;
pub use model::{Document, DocumentId, DocumentKind, NewDocument, Revision, UserId, WorkspaceId};
pub use store::DocumentStore;
