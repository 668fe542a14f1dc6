//! Real-time document synchronization for Codraft.
//!
//! Clients join a per-document channel over WebSocket, submit
//! last-writer-wins content updates, and receive every other
//! participant's accepted updates as they land. Every accepted update
//! is persisted and recorded in the revision log before it is fanned
//! out.

pub mod channel;
pub mod client;
pub mod coordinator;
pub mod proto;
pub mod server;
pub mod session;

#[cfg(test)]
mod tests_e2e;

pub use channel::SyncChannel;
pub use client::{ClientError, Connection};
pub use coordinator::{UpdateCoordinator, UpdateError};
pub use proto::{ClientMessage, ServerMessage};
pub use server::{router, AppState};
pub use session::{ConnectionId, SessionRegistry};
