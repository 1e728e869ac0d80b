use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::time::sleep;
use user_restapi::{ClientConfig, NewUser, ResourceClient, RestErrorKind};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredUser {
    id: u64,
    username: String,
    email: String,
}

#[derive(Clone, Default)]
struct AppState {
    users: Arc<Mutex<Vec<StoredUser>>>,
    next_id: Arc<AtomicU64>,
    seen_sources: Arc<Mutex<Vec<String>>>,
}

impl AppState {
    fn record_source(&self, headers: &HeaderMap) {
        if let Some(value) = headers.get("x-request-source").and_then(|v| v.to_str().ok()) {
            self.seen_sources.lock().expect("sources lock").push(value.to_string());
        }
    }
}

#[tokio::test]
async fn e2e_create_then_list_roundtrip() {
    let server = TestServer::start().await;
    let client = ResourceClient::new(server.config()).expect("absolute base");

    assert!(client.list_users().await.expect("initial list").is_empty());

    let ada = client
        .create_user(&NewUser::new("ada", "ada@example.com", "hunter2"))
        .await
        .expect("create ada");
    let grace = client
        .create_user(&NewUser::new("grace", "grace@example.com", "cobol"))
        .await
        .expect("create grace");
    assert_eq!(ada.id, 1);
    assert_eq!(grace.id, 2);

    let users = client.list_users().await.expect("list after create");
    let names: Vec<_> = users.iter().map(|u| u.username.as_str()).collect();
    assert_eq!(names, vec!["ada", "grace"]);
}

#[tokio::test]
async fn e2e_get_and_delete_member() {
    let server = TestServer::start().await;
    let client = ResourceClient::new(server.config()).expect("absolute base");

    let created = client
        .create_user(&NewUser::new("linus", "linus@example.com", "pw"))
        .await
        .expect("create");
    assert_eq!(client.get_user(created.id).await.expect("get").email, "linus@example.com");

    client.delete_user(created.id).await.expect("delete");
    let err = client.get_user(created.id).await.expect_err("gone");
    assert!(err.is_not_found());
    assert_eq!(err.body_text().as_deref(), Some(r#"{"message":"User 1 not found"}"#));
}

#[tokio::test]
async fn e2e_rejected_payload_is_status_error() {
    let server = TestServer::start().await;
    let client = ResourceClient::new(server.config()).expect("absolute base");

    let err = client
        .create_user(&NewUser::new("", "nobody@example.com", "pw"))
        .await
        .expect_err("empty username is rejected by the backend");
    assert_eq!(err.status(), Some(400));
}

#[tokio::test]
async fn e2e_default_headers_reach_the_server() {
    let server = TestServer::start().await;
    let config = ClientConfig::builder()
        .base_url(server.url("/api/v1"))
        .header("X-Request-Source", "e2e")
        .build()
        .expect("valid config");
    let client = ResourceClient::new(config).expect("absolute base");

    client.list_users().await.expect("list");
    client
        .create_user(&NewUser::new("ken", "ken@example.com", "pw"))
        .await
        .expect("create");

    let seen = server.state.seen_sources.lock().expect("sources lock").clone();
    assert_eq!(seen, vec!["e2e", "e2e"]);
}

#[tokio::test]
async fn e2e_path_prefix_base_resolves_against_origin() {
    let server = TestServer::start().await;
    let origin = server.base_url.parse().expect("origin url");
    let client = ResourceClient::with_origin(ClientConfig::default(), origin);

    assert!(client.list_users().await.expect("list via origin").is_empty());
}

#[tokio::test]
async fn e2e_slow_backend_times_out() {
    let server = TestServer::start().await;
    let config = ClientConfig::builder()
        .base_url(server.url("/slow"))
        .timeout(Duration::from_millis(200))
        .build()
        .expect("valid config");
    let client = ResourceClient::new(config).expect("absolute base");

    let err = client.list_users().await.expect_err("timeout should trigger");
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
}

#[tokio::test]
async fn e2e_unreachable_backend_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let config = ClientConfig::builder()
        .base_url(format!("http://{addr}/api/v1"))
        .build()
        .expect("valid config");
    let client = ResourceClient::new(config).expect("absolute base");

    match client.list_users().await.expect_err("nothing listens") {
        user_restapi::ClientError::Transport(err) => assert_eq!(err.kind(), RestErrorKind::Connect),
        other => panic!("expected transport error, got {other:?}"),
    }
}

struct TestServer {
    base_url: String,
    state: AppState,
    task: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        let state = AppState::default();
        let app = Router::new()
            .route("/api/v1/users", get(list_handler).post(create_handler))
            .route("/api/v1/users/{id}", get(get_handler).delete(delete_handler))
            .route("/slow/users", get(slow_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let base_url = format!("http://{}", addr);

        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url,
            state,
            task,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn config(&self) -> ClientConfig {
        ClientConfig::builder()
            .base_url(self.url("/api/v1"))
            .build()
            .expect("valid config")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[derive(Deserialize)]
struct CreateUser {
    username: String,
    email: String,
    #[allow(dead_code)]
    password: String,
}

async fn list_handler(State(state): State<AppState>, headers: HeaderMap) -> Json<Vec<StoredUser>> {
    state.record_source(&headers);
    Json(state.users.lock().expect("users lock").clone())
}

async fn create_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateUser>,
) -> impl IntoResponse {
    state.record_source(&headers);
    if payload.username.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(message_body("username is required")),
        )
            .into_response();
    }
    let user = StoredUser {
        id: state.next_id.fetch_add(1, Ordering::SeqCst) + 1,
        username: payload.username,
        email: payload.email,
    };
    state.users.lock().expect("users lock").push(user.clone());
    (StatusCode::CREATED, Json(user)).into_response()
}

async fn get_handler(State(state): State<AppState>, Path(id): Path<u64>) -> impl IntoResponse {
    let users = state.users.lock().expect("users lock");
    match users.iter().find(|u| u.id == id) {
        Some(user) => (StatusCode::OK, Json(user.clone())).into_response(),
        None => not_found(id),
    }
}

async fn delete_handler(State(state): State<AppState>, Path(id): Path<u64>) -> impl IntoResponse {
    let mut users = state.users.lock().expect("users lock");
    let before = users.len();
    users.retain(|u| u.id != id);
    if users.len() == before {
        return not_found(id);
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn slow_handler() -> (StatusCode, &'static str) {
    sleep(Duration::from_millis(1500)).await;
    (StatusCode::OK, "[]")
}

fn not_found(id: u64) -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(message_body(&format!("User {id} not found"))),
    )
        .into_response()
}

#[derive(Serialize)]
struct Message {
    message: String,
}

fn message_body(message: &str) -> Message {
    Message {
        message: message.to_string(),
    }
}
