//! End-to-end tests: a real server on an ephemeral port, real
//! WebSocket clients, and the HTTP collaborator surface.

use std::sync::Arc;
use std::time::Duration;

use codraft_store::{DocumentKind, DocumentStore, MemoryStore, NewDocument};
use serde_json::json;
use tokio::time::timeout;

use crate::client::{ClientError, Connection};
use crate::proto::ServerMessage;
use crate::server::{router, AppState};

async fn spawn_server() -> (String, Arc<AppState>) {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    let state = Arc::new(AppState::new(store));
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("ws://{addr}"), state)
}

async fn create_document(state: &AppState, name: &str) -> i64 {
    state
        .store
        .create_document(NewDocument {
            name: name.to_string(),
            kind: DocumentKind::Text,
            content: json!({"text": ""}),
            workspace_id: 1,
            created_by: 1,
        })
        .await
        .unwrap()
        .id
}

/// Joins are processed asynchronously by the server's read loop; wait
/// until the membership is visible before submitting updates.
async fn wait_for_members(state: &AppState, document_id: i64, expected: usize) {
    for _ in 0..100 {
        if state.channel.members_of(document_id).len() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "document {document_id} never reached {expected} members (has {})",
        state.channel.members_of(document_id).len()
    );
}

#[tokio::test]
async fn test_update_reaches_other_member_but_not_sender() {
    let (base, state) = spawn_server().await;
    let doc = create_document(&state, "shared").await;

    let mut x = Connection::connect(&format!("{base}/ws?author=1")).await.unwrap();
    let mut y = Connection::connect(&format!("{base}/ws?author=2")).await.unwrap();
    x.join(doc).await.unwrap();
    y.join(doc).await.unwrap();
    wait_for_members(&state, doc, 2).await;

    x.update(doc, json!({"text": "hello"})).await.unwrap();

    let event = timeout(Duration::from_secs(2), y.next_event())
        .await
        .expect("y should receive the update")
        .unwrap();
    match event {
        ServerMessage::Updated { content } => assert_eq!(content, json!({"text": "hello"})),
        other => panic!("unexpected event: {other:?}"),
    }

    // The sender must not receive its own update back.
    assert!(timeout(Duration::from_millis(200), x.next_event()).await.is_err());
}

#[tokio::test]
async fn test_broadcast_does_not_cross_documents() {
    let (base, state) = spawn_server().await;
    let doc_a = create_document(&state, "a").await;
    let doc_b = create_document(&state, "b").await;

    let mut x = Connection::connect(&format!("{base}/ws?author=1")).await.unwrap();
    let mut z = Connection::connect(&format!("{base}/ws?author=3")).await.unwrap();
    x.join(doc_a).await.unwrap();
    z.join(doc_b).await.unwrap();
    wait_for_members(&state, doc_a, 1).await;
    wait_for_members(&state, doc_b, 1).await;

    x.update(doc_a, json!({"text": "hello"})).await.unwrap();

    assert!(timeout(Duration::from_millis(200), z.next_event()).await.is_err());
}

#[tokio::test]
async fn test_update_on_missing_document_rejects_submitter_only() {
    let (base, state) = spawn_server().await;
    let doc = create_document(&state, "real").await;

    let mut x = Connection::connect(&format!("{base}/ws?author=1")).await.unwrap();
    let mut y = Connection::connect(&format!("{base}/ws?author=2")).await.unwrap();
    x.join(doc).await.unwrap();
    y.join(doc).await.unwrap();
    wait_for_members(&state, doc, 2).await;

    x.update(999, json!({"text": "x"})).await.unwrap();

    let event = timeout(Duration::from_secs(2), x.next_event())
        .await
        .expect("submitter should be informed")
        .unwrap();
    match event {
        ServerMessage::Error { message } => assert!(message.contains("not found")),
        other => panic!("unexpected event: {other:?}"),
    }

    // No broadcast, and the store is unchanged.
    assert!(timeout(Duration::from_millis(200), y.next_event()).await.is_err());
    let document = state.store.get_document(doc).await.unwrap();
    assert_eq!(document.content, json!({"text": ""}));
}

#[tokio::test]
async fn test_disconnect_without_leave_clears_membership() {
    let (base, state) = spawn_server().await;
    let doc = create_document(&state, "shared").await;

    let mut x = Connection::connect(&format!("{base}/ws?author=1")).await.unwrap();
    let mut y = Connection::connect(&format!("{base}/ws?author=2")).await.unwrap();
    x.join(doc).await.unwrap();
    y.join(doc).await.unwrap();
    wait_for_members(&state, doc, 2).await;

    // X drops without an explicit leave.
    x.close().await.unwrap();
    wait_for_members(&state, doc, 1).await;

    // Y's next update must not error because of the gone member.
    y.update(doc, json!({"text": "still here"})).await.unwrap();
    assert!(timeout(Duration::from_millis(200), y.next_event()).await.is_err());

    let document = state.store.get_document(doc).await.unwrap();
    assert_eq!(document.content, json!({"text": "still here"}));
}

#[tokio::test]
async fn test_rejoin_moves_membership() {
    let (base, state) = spawn_server().await;
    let doc_a = create_document(&state, "a").await;
    let doc_b = create_document(&state, "b").await;

    let mut x = Connection::connect(&format!("{base}/ws?author=1")).await.unwrap();
    x.join(doc_a).await.unwrap();
    wait_for_members(&state, doc_a, 1).await;

    x.join(doc_b).await.unwrap();
    wait_for_members(&state, doc_b, 1).await;
    assert!(state.channel.members_of(doc_a).is_empty());
}

#[tokio::test]
async fn test_update_records_revision_trail() {
    let (base, state) = spawn_server().await;
    let doc = create_document(&state, "audited").await;

    let mut x = Connection::connect(&format!("{base}/ws?author=9")).await.unwrap();
    x.join(doc).await.unwrap();
    wait_for_members(&state, doc, 1).await;

    x.update(doc, json!({"text": "first"})).await.unwrap();
    x.update(doc, json!({"text": "second"})).await.unwrap();

    // Updates are applied by the read loop; wait for the second one
    // to land.
    for _ in 0..100 {
        if state.store.list_revisions(doc).await.unwrap().len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let revisions = state.store.list_revisions(doc).await.unwrap();
    assert_eq!(revisions.len(), 2);
    assert_eq!(revisions[0].content, json!({"text": "first"}));
    assert_eq!(revisions[1].content, json!({"text": "second"}));
    assert!(revisions.iter().all(|r| r.author_id == 9));

    let document = state.store.get_document(doc).await.unwrap();
    assert_eq!(document.content, json!({"text": "second"}));
}

#[tokio::test]
async fn test_malformed_frame_gets_error_and_connection_survives() {
    use futures::{SinkExt, StreamExt};
    use tokio_tungstenite::{connect_async, tungstenite::Message};

    let (base, _state) = spawn_server().await;

    let (mut ws, _) = connect_async(format!("{base}/ws?author=1")).await.unwrap();
    ws.send(Message::Text("not json".to_string())).await.unwrap();

    let frame = timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("server should answer")
        .unwrap()
        .unwrap();
    match frame {
        Message::Text(text) => {
            let event: ServerMessage = serde_json::from_str(&text).unwrap();
            assert!(matches!(event, ServerMessage::Error { .. }));
        }
        other => panic!("unexpected frame: {other:?}"),
    }

    // The connection stays usable after a malformed frame.
    ws.send(Message::Text(r#"{"type":"join","document_id":1}"#.to_string()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_connect_without_author_is_rejected() {
    let (base, _state) = spawn_server().await;

    let result =
        Connection::connect_with_retry(&format!("{base}/ws"), 1, Duration::from_millis(10)).await;
    assert!(matches!(result, Err(ClientError::Exhausted { .. })));
}

#[tokio::test]
async fn test_reconnect_budget_is_bounded() {
    // Nothing listens here; every attempt must fail and the budget
    // must be spent, not retried forever.
    let start = std::time::Instant::now();
    let result = Connection::connect_with_retry(
        "ws://127.0.0.1:1/ws?author=1",
        3,
        Duration::from_millis(20),
    )
    .await;

    match result {
        Err(ClientError::Exhausted { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected exhausted budget, got {other:?}"),
    }
    // Two fixed backoffs between three attempts.
    assert!(start.elapsed() >= Duration::from_millis(40));
}

mod http_api {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use codraft_store::{Document, Revision};
    use tower::ServiceExt;

    fn test_router() -> (axum::Router, Arc<AppState>) {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let state = Arc::new(AppState::new(store));
        (router(state.clone()), state)
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_fetch_document() {
        let (app, _state) = test_router();

        let payload = json!({
            "name": "roadmap",
            "kind": "sheet",
            "content": {"cells": []},
            "workspace_id": 1,
            "created_by": 7,
        });
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/documents")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let created: Document = body_json(response).await;
        assert_eq!(created.name, "roadmap");

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/documents/{}", created.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let fetched: Document = body_json(response).await;
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.content, json!({"cells": []}));
    }

    #[tokio::test]
    async fn test_missing_document_is_404() {
        let (app, _state) = test_router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/documents/999")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_history_lists_revisions() {
        let (app, state) = test_router();
        let doc = create_document(&state, "audited").await;
        state
            .store
            .append_revision(doc, json!({"text": "v1"}), 1)
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/documents/{doc}/history"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let revisions: Vec<Revision> = body_json(response).await;
        assert_eq!(revisions.len(), 1);
        assert_eq!(revisions[0].content, json!({"text": "v1"}));
    }

    #[tokio::test]
    async fn test_workspace_document_listing() {
        let (app, state) = test_router();
        create_document(&state, "a").await;
        create_document(&state, "b").await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/workspaces/1/documents")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let documents: Vec<Document> = body_json(response).await;
        assert_eq!(documents.len(), 2);
    }
}
