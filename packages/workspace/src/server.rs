//! HTTP + WebSocket surface of the sync server.
//!
//! `/ws` carries the sync protocol; the `/api` routes expose the
//! minimal document collaborator surface (create/read/history).
//! Authorization beyond "supplies an author id" is the authentication
//! collaborator's concern, not handled here.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use codraft_store::{Document, DocumentId, DocumentStore, NewDocument, Revision, StoreError, UserId, WorkspaceId};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::CorsLayer;

use crate::channel::SyncChannel;
use crate::coordinator::UpdateCoordinator;
use crate::proto::{ClientMessage, ServerMessage};
use crate::session::ConnectionId;

pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub channel: SyncChannel,
    pub coordinator: UpdateCoordinator,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let channel = SyncChannel::new();
        let coordinator = UpdateCoordinator::new(store.clone(), channel.clone());
        Self {
            store,
            channel,
            coordinator,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/documents", post(create_document))
        .route("/api/documents/:id", get(get_document))
        .route("/api/documents/:id/history", get(document_history))
        .route("/api/workspaces/:id/documents", get(workspace_documents))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    /// Author identity, supplied by the transport after the
    /// authentication collaborator's own check. Threaded explicitly
    /// rather than read from ambient session state.
    author: Option<UserId>,
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(author_id) = query.author else {
        return (StatusCode::UNAUTHORIZED, "missing author identity").into_response();
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, author_id))
        .into_response()
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, author_id: UserId) {
    let (connection, rx) = state.channel.register();
    tracing::info!(connection, author_id, "client connected");

    let (mut sink, mut stream) = socket.split();

    // Outbound half: drain the connection's frame queue into the
    // socket independently of the read loop.
    let send_task = tokio::spawn(async move {
        let mut frames = ReceiverStream::new(rx);
        while let Some(message) = frames.next().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "failed to encode outbound frame");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(frame)) = stream.next().await {
        let text = match frame {
            Message::Text(text) => text,
            Message::Close(_) => break,
            // Ping/pong are handled by axum; binary frames are not
            // part of the protocol.
            _ => continue,
        };

        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(message) => handle_message(&state, connection, author_id, message).await,
            Err(e) => {
                tracing::debug!(connection, error = %e, "malformed frame");
                state.channel.send_to(
                    connection,
                    ServerMessage::Error {
                        message: format!("malformed message: {e}"),
                    },
                );
            }
        }
    }

    // Disconnect, clean or not, always clears the membership so
    // later broadcasts never target this connection.
    state.channel.connection_lost(connection);
    send_task.abort();
    tracing::info!(connection, "client disconnected");
}

async fn handle_message(
    state: &AppState,
    connection: ConnectionId,
    author_id: UserId,
    message: ClientMessage,
) {
    match message {
        ClientMessage::Join { document_id } => {
            state.channel.join(connection, document_id);
            tracing::debug!(connection, document_id, "joined document channel");
        }
        ClientMessage::Update { id, content } => {
            if let Err(e) = state
                .coordinator
                .apply_update(id, content, author_id, connection)
                .await
            {
                tracing::warn!(connection, document_id = id, error = %e, "update rejected");
                state.channel.send_to(
                    connection,
                    ServerMessage::Error {
                        message: e.to_string(),
                    },
                );
            }
        }
        ClientMessage::Leave => {
            state.channel.leave(connection);
            tracing::debug!(connection, "left document channel");
        }
    }
}

// ============================================================================
// Document collaborator surface
// ============================================================================

type ApiError = (StatusCode, String);

fn store_error(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound(id) => (StatusCode::NOT_FOUND, format!("document {id} not found")),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

async fn create_document(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewDocument>,
) -> Result<Json<Document>, ApiError> {
    let document = state.store.create_document(new).await.map_err(store_error)?;
    tracing::info!(document_id = document.id, "document created");
    Ok(Json(document))
}

async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DocumentId>,
) -> Result<Json<Document>, ApiError> {
    let document = state.store.get_document(id).await.map_err(store_error)?;
    Ok(Json(document))
}

async fn document_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DocumentId>,
) -> Result<Json<Vec<Revision>>, ApiError> {
    // Distinguish a missing document from an empty history.
    state.store.get_document(id).await.map_err(store_error)?;
    let revisions = state.store.list_revisions(id).await.map_err(store_error)?;
    Ok(Json(revisions))
}

async fn workspace_documents(
    State(state): State<Arc<AppState>>,
    Path(id): Path<WorkspaceId>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let documents = state.store.list_documents(id).await.map_err(store_error)?;
    Ok(Json(documents))
}
