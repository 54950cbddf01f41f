//! Router-level tests: authentication, status mapping, uploads and the
//! REST to socket fan-out.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use teamhub_config::{DatabaseConfig, RealtimeConfig, UploadConfig};
use teamhub_gateway::websocket::{chat_room, ServerEvent};
use teamhub_gateway::{create_router, GatewayState};
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    state: GatewayState,
    router: Router,
    _temp_dir: TempDir,
}

struct TestUser {
    id: String,
    token: String,
}

async fn setup_with(max_file_size_bytes: u64) -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let config = DatabaseConfig {
        url: format!("sqlite://{}", temp_dir.path().join("api.db").display()),
        max_connections: 4,
    };
    let pool = teamhub_database::initialize_database(&config).await.unwrap();
    let uploads = UploadConfig {
        dir: temp_dir.path().join("uploads").display().to_string(),
        max_file_size_bytes,
        ..UploadConfig::default()
    };

    let state = GatewayState::new(pool, uploads, &RealtimeConfig::default());
    let router = create_router(state.clone());
    TestApp {
        state,
        router,
        _temp_dir: temp_dir,
    }
}

async fn setup() -> TestApp {
    setup_with(UploadConfig::default().max_file_size_bytes).await
}

async fn user(app: &TestApp, name: &str) -> TestUser {
    let user = app
        .state
        .users
        .create(name, &format!("{}@example.com", name.to_lowercase()), None)
        .await
        .unwrap();
    let session = app
        .state
        .sessions
        .create(&user.id, chrono::Duration::hours(1))
        .await
        .unwrap();
    TestUser {
        id: user.id,
        token: session.token,
    }
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn json_request(method: &str, uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn multipart_request(uri: &str, token: &str, content: &str, filename: &str, file: &[u8]) -> Request<Body> {
    multipart_with_fields(uri, token, &[("content", content)], filename, file)
}

fn multipart_with_fields(
    uri: &str,
    token: &str,
    fields: &[(&str, &str)],
    filename: &str,
    file: &[u8],
) -> Request<Body> {
    let boundary = "teamhub-test-boundary";
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"document\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(file);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn private_chat(app: &TestApp, a: &TestUser, b: &TestUser) -> String {
    let (status, body) = send(
        app,
        json_request("POST", "/api/chats/private", &a.token, json!({"members": [a.id, b.id]})),
    )
    .await;
    assert!(status.is_success(), "resolve failed: {status} {body}");
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_requests_without_token_are_unauthorized() {
    let app = setup().await;

    let request = Request::builder().uri("/api/chats").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let (status, _) = send(&app, get("/api/chats", "not-a-session")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder().uri("/ws").body(Body::empty()).unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_is_public() {
    let app = setup().await;
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_private_chat_resolution_over_rest() {
    let app = setup().await;
    let alice = user(&app, "Alice").await;
    let bob = user(&app, "Bob").await;
    let carol = user(&app, "Carol").await;

    let (status, first) = send(
        &app,
        json_request("POST", "/api/chats/private", &alice.token, json!({"userId1": alice.id, "userId2": bob.id})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, second) = send(
        &app,
        json_request("POST", "/api/chats/private", &bob.token, json!({"members": [bob.id, alice.id]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["id"], second["id"]);
    assert_eq!(second["participants"].as_array().unwrap().len(), 2);

    let (status, _) = send(
        &app,
        json_request("POST", "/api/chats/private", &carol.token, json!({"members": [alice.id, bob.id]})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        json_request("POST", "/api/chats/private", &alice.token, json!({"members": [alice.id, "not-an-id"]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, get(&format!("/api/chats/user/{}", bob.id), &alice.token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_rest_messages_reach_joined_sockets() {
    let app = setup().await;
    let alice = user(&app, "Alice").await;
    let bob = user(&app, "Bob").await;
    let chat_id = private_chat(&app, &alice, &bob).await;

    let (bob_conn, mut bob_rx) = app.state.hub.connect(&bob.id);
    assert!(app.state.hub.join(&bob_conn, &chat_room(&chat_id)));
    let (_idle_conn, mut idle_rx) = app.state.hub.connect(&alice.id);

    let (status, message) = send(
        &app,
        json_request(
            "POST",
            &format!("/api/chats/{chat_id}/messages"),
            &alice.token,
            json!({"content": "ping"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(message["chat"], chat_id.as_str());
    assert_eq!(message["messageType"], "direct");

    match bob_rx.try_recv().unwrap() {
        ServerEvent::NewMessage(pushed) => assert_eq!(pushed.content, "ping"),
        other => panic!("unexpected event {}", other.name()),
    }
    assert!(idle_rx.try_recv().is_err());

    let message_id = message["id"].as_str().unwrap();
    let (status, _) = send(
        &app,
        json_request("DELETE", &format!("/api/messages/{message_id}"), &bob.token, json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        json_request("DELETE", &format!("/api/messages/{message_id}"), &alice.token, json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bob_rx.try_recv().unwrap().name(), "deleted-message");

    let (status, history) = send(&app, get(&format!("/api/chats/{chat_id}/messages"), &bob.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(history
        .as_array()
        .unwrap()
        .iter()
        .all(|message| message["content"] != "ping"));
}

#[tokio::test]
async fn test_attachment_upload_and_download() {
    let app = setup().await;
    let alice = user(&app, "Alice").await;
    let bob = user(&app, "Bob").await;
    let chat_id = private_chat(&app, &alice, &bob).await;
    let uri = format!("/api/chats/{chat_id}/messages");

    let (status, message) = send(
        &app,
        multipart_request(&uri, &alice.token, "", "notes.txt", b"meeting notes"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(message["content"], "notes.txt");
    assert_eq!(message["attachment"]["filename"], "notes.txt");
    assert_eq!(message["attachment"]["size"], 13);

    let download_url = message["attachment"]["downloadUrl"].as_str().unwrap();
    let response = app
        .router
        .clone()
        .oneshot(get(download_url, &bob.token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"meeting notes");

    let (status, _) = send(
        &app,
        multipart_request(&uri, &alice.token, "run me", "tool.exe", b"MZ"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, get("/api/chats/download/missing.txt", &bob.token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_post_message_needs_exactly_one_target() {
    let app = setup().await;
    let alice = user(&app, "Alice").await;
    let bob = user(&app, "Bob").await;
    let chat_id = private_chat(&app, &alice, &bob).await;

    let both = json!({"chatId": chat_id, "groupId": chat_id, "content": "hi"});
    let (status, _) = send(&app, json_request("POST", "/api/messages", &alice.token, both)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let neither = json!({"content": "hi"});
    let (status, _) = send(&app, json_request("POST", "/api/messages", &alice.token, neither)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let blank_chat = json!({"chatId": "  ", "content": "hi"});
    let (status, _) = send(&app, json_request("POST", "/api/messages", &alice.token, blank_chat)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let direct = json!({"chatId": chat_id, "content": "hi bob"});
    let (status, message) = send(&app, json_request("POST", "/api/messages", &alice.token, direct)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(message["content"], "hi bob");
    assert_eq!(message["chat"], chat_id.as_str());
}

fn stored_uploads(app: &TestApp) -> usize {
    std::fs::read_dir(&app.state.uploads.dir)
        .map(|entries| entries.count())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_rejected_uploads_leave_no_files_behind() {
    let app = setup().await;
    let alice = user(&app, "Alice").await;
    let bob = user(&app, "Bob").await;
    let mallory = user(&app, "Mallory").await;
    let chat_id = private_chat(&app, &alice, &bob).await;
    let uri = format!("/api/chats/{chat_id}/messages");

    let (status, _) = send(
        &app,
        multipart_request(&uri, &mallory.token, "sneaky", "notes.txt", b"not yours"),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(stored_uploads(&app), 0);

    let (status, _) = send(
        &app,
        multipart_with_fields(
            &uri,
            &alice.token,
            &[("content", "re"), ("replyTo", "no such message")],
            "notes.txt",
            b"reply",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(stored_uploads(&app), 0);
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let app = setup_with(8).await;
    let alice = user(&app, "Alice").await;
    let bob = user(&app, "Bob").await;
    let chat_id = private_chat(&app, &alice, &bob).await;

    let (status, body) = send(
        &app,
        multipart_request(
            &format!("/api/chats/{chat_id}/messages"),
            &alice.token,
            "big",
            "big.txt",
            &[b'x'; 64],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "Payload Too Large");
}

#[tokio::test]
async fn test_workspace_invitation_and_group_flow() {
    let app = setup().await;
    let alice = user(&app, "Alice").await;
    let bob = user(&app, "Bob").await;

    let (status, workspace) = send(
        &app,
        json_request("POST", "/api/workspaces", &alice.token, json!({"name": "Acme"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let workspace_id = workspace["id"].as_str().unwrap().to_string();

    let (status, invited) = send(
        &app,
        json_request(
            "POST",
            "/api/invitations",
            &alice.token,
            json!({"workspaceId": workspace_id, "emails": ["BOB@example.com", "bob@example.com"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(invited["results"].as_array().unwrap().len(), 1);
    assert_eq!(invited["results"][0]["status"], "invited");

    let (status, pending) = send(&app, get("/api/invitations/pending", &bob.token)).await;
    assert_eq!(status, StatusCode::OK);
    let invitation_id = pending[0]["id"].as_str().unwrap().to_string();

    let (status, accepted) = send(
        &app,
        json_request("PUT", &format!("/api/invitations/{invitation_id}/accept"), &bob.token, json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(accepted["chats"].as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        json_request("PUT", &format!("/api/invitations/{invitation_id}/accept"), &bob.token, json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, group) = send(
        &app,
        json_request(
            "POST",
            "/api/groups",
            &alice.token,
            json!({"name": "Design", "workspaceId": workspace_id, "members": [bob.id]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let group_id = group["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        json_request(
            "PUT",
            &format!("/api/groups/{group_id}/members/{}/role", alice.id),
            &alice.token,
            json!({"role": "member"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        json_request("POST", &format!("/api/groups/{group_id}/leave"), &bob.token, json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &app,
        json_request("POST", &format!("/api/groups/{group_id}/leave"), &alice.token, json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, page) = send(
        &app,
        get(&format!("/api/groups/{group_id}/messages?page=1&limit=2"), &alice.token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["pagination"]["limit"], 2);
    assert_eq!(page["messages"].as_array().unwrap().len(), 2);
}
