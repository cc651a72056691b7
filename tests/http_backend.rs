//! `HttpBackend` against an in-process mock of the supervisor API.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde_json::json;

use program_dashboard::api::{Action, Cursor};
use program_dashboard::{ApiError, Backend, HttpBackend, ProgramId};

#[derive(Clone, Default)]
struct Mock {
    since: Arc<Mutex<Vec<Option<String>>>>,
    posts: Arc<Mutex<Vec<String>>>,
}

async fn logs(
    State(mock): State<Mock>,
    Path(id): Path<u32>,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let since = query.get("since").cloned();
    mock.since.lock().unwrap().push(since.clone());
    if id == 9 {
        return (StatusCode::OK, "<html>not json</html>").into_response();
    }
    let lines = match since {
        None => json!([format!("program {id} boot"), "ready"]),
        Some(_) => json!(["tick"]),
    };
    Json(json!({"logs": lines, "timestamp": "2024-05-01T10:00:02.500000"})).into_response()
}

async fn status() -> impl IntoResponse {
    Json(json!({
        "1": {"name": "Program 1", "status": "running", "pid": 4242, "last_update": "2024-05-01T10:00:00"},
        "2": {"name": "Program 2", "status": "stopped", "pid": null}
    }))
}

async fn action(State(mock): State<Mock>, Path((id, verb)): Path<(u32, String)>) -> impl IntoResponse {
    mock.posts.lock().unwrap().push(format!("{id}/{verb}"));
    if id == 2 && verb == "start" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"status": "error", "message": "Failed to start program 2"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"status": "success", "message": format!("Program {id} {verb} ok")})),
    )
}

async fn stream(Path(id): Path<u32>) -> impl IntoResponse {
    let events = vec![
        Ok::<Event, Infallible>(Event::default().comment("connected")),
        Ok(Event::default().data(format!("program {id} line 1"))),
        Ok(Event::default().data("first\nsecond")),
        Ok(Event::default().data("program line 3")),
    ];
    Sse::new(futures::stream::iter(events))
}

async fn serve(mock: Mock) -> String {
    let app = Router::new()
        .route("/api/programs/status", get(status))
        .route("/api/programs/{id}/logs", get(logs))
        .route("/api/programs/{id}/logs/stream", get(stream))
        .route("/api/programs/{id}/{verb}", post(action))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/")
}

#[tokio::test]
async fn test_fetch_logs_sends_cursor_only_when_known() {
    let mock = Mock::default();
    let backend = HttpBackend::new(&serve(mock.clone()).await).unwrap();

    let full = backend.fetch_logs(ProgramId(1), None).await.unwrap();
    assert_eq!(full.logs, vec!["program 1 boot", "ready"]);
    let cursor = full.timestamp.unwrap();
    assert_eq!(cursor, Cursor("2024-05-01T10:00:02.500000".to_string()));

    let delta = backend.fetch_logs(ProgramId(1), Some(cursor)).await.unwrap();
    assert_eq!(delta.logs, vec!["tick"]);

    assert_eq!(
        *mock.since.lock().unwrap(),
        vec![None, Some("2024-05-01T10:00:02.500000".to_string())]
    );
}

#[tokio::test]
async fn test_fetch_status_parses_keyed_map() {
    let backend = HttpBackend::new(&serve(Mock::default()).await).unwrap();

    let statuses = backend.fetch_status().await.unwrap();

    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[&ProgramId(1)].status, "running");
    assert_eq!(statuses[&ProgramId(1)].pid, Some(4242));
    assert_eq!(statuses[&ProgramId(2)].pid, None);
}

#[tokio::test]
async fn test_actions_post_to_their_paths_and_read_error_bodies() {
    let mock = Mock::default();
    let backend = HttpBackend::new(&serve(mock.clone()).await).unwrap();

    let cleared = backend
        .send_action(ProgramId(3), Action::ClearLogs)
        .await
        .unwrap();
    assert!(cleared.is_success());
    assert_eq!(cleared.message, "Program 3 clear_logs ok");

    let rejected = backend.send_action(ProgramId(2), Action::Start).await.unwrap();
    assert!(!rejected.is_success());
    assert_eq!(rejected.message, "Failed to start program 2");

    assert_eq!(*mock.posts.lock().unwrap(), vec!["3/clear_logs", "2/start"]);
}

#[tokio::test]
async fn test_malformed_body_is_reported() {
    let backend = HttpBackend::new(&serve(Mock::default()).await).unwrap();

    let err = backend.fetch_logs(ProgramId(9), None).await.unwrap_err();

    assert!(matches!(err, ApiError::Malformed { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_log_stream_yields_event_data_in_order() {
    let backend = HttpBackend::new(&serve(Mock::default()).await).unwrap();

    let stream = backend.open_log_stream(ProgramId(4)).await.unwrap();
    let lines: Vec<String> = stream.map(|item| item.unwrap()).collect().await;

    assert_eq!(
        lines,
        vec!["program 4 line 1", "first\nsecond", "program line 3"]
    );
}

#[tokio::test]
async fn test_unreachable_server_is_a_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let backend = HttpBackend::new(&format!("http://{addr}")).unwrap();

    let err = backend.fetch_status().await.unwrap_err();

    assert!(matches!(err, ApiError::Transport { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_error_status_on_stream_subscribe() {
    let base = serve(Mock::default()).await;
    let backend = HttpBackend::new(&format!("{base}nowhere")).unwrap();

    let err = match backend.open_log_stream(ProgramId(1)).await {
        Ok(_) => panic!("subscription to a missing route must fail"),
        Err(err) => err,
    };

    assert!(matches!(err, ApiError::Status { status: 404, .. }), "got {err:?}");
}
