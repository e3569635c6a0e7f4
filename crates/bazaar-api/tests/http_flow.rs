use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use bazaar_api::notifier::Notifier;
use bazaar_api::sessions::SessionIssuer;
use bazaar_api::{AppState, AppStateInner, router};
use bazaar_db::Database;

/// Keeps every code it is asked to deliver.
#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    fn last_code_for(&self, email: &str) -> String {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, code)| code.clone())
            .expect("no code sent")
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_confirmation_code(&self, email: &str, _name: &str, code: &str) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push((email.to_string(), code.to_string()));
        Ok(())
    }
}

struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send_confirmation_code(&self, _email: &str, _name: &str, _code: &str) -> anyhow::Result<()> {
        Err(anyhow!("mail API unreachable"))
    }
}

struct TestApp {
    router: Router,
    state: AppState,
    mail: Arc<RecordingNotifier>,
    upload_dir: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.upload_dir);
    }
}

fn upload_dir() -> PathBuf {
    std::env::temp_dir().join(format!("bazaar-test-{}", Uuid::new_v4()))
}

fn app() -> TestApp {
    let mail = Arc::new(RecordingNotifier::default());
    let upload_dir = upload_dir();
    let state = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        sessions: SessionIssuer::new("integration-secret", 900, 3600),
        notifier: mail.clone(),
        upload_dir: upload_dir.clone(),
    });
    TestApp {
        router: router(state.clone()),
        state,
        mail,
        upload_dir,
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn post_json(uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::get(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn elevation_request(token: &str, government_id: &str) -> Request<Body> {
    let boundary = "bazaar-boundary";
    let mut body = String::new();
    for (name, value) in [
        ("government_id", government_id),
        ("birth_date", "1990-05-17"),
        ("address", "Rua das Flores, 10"),
        ("postal_code", "01000-000"),
        ("state", "SP"),
        ("city", "Sao Paulo"),
        ("neighborhood", "Centro"),
    ] {
        body.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"documents\"; filename=\"id.png\"\r\nContent-Type: image/png\r\n\r\nnot-really-a-png\r\n"
    ));
    body.push_str(&format!("--{boundary}--\r\n"));

    Request::post("/sellers")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={boundary}"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body))
        .unwrap()
}

/// Register, confirm and log in. Returns (user id, access token, refresh token).
async fn verified_login(app: &TestApp, email: &str) -> (String, String, String) {
    let (status, _) = send(
        &app.router,
        post_json("/register", json!({"email": email, "name": "Test", "password": "pw123456"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let code = app.mail.last_code_for(email);
    let (status, _) = send(
        &app.router,
        post_json("/confirm", json!({"confirmation_code": code, "email": email}), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app.router,
        post_json("/login", json!({"email": email, "password": "pw123456"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    (
        body["user"]["id"].as_str().unwrap().to_string(),
        body["access"].as_str().unwrap().to_string(),
        body["refresh"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn registration_to_seller_flow() {
    let app = app();

    let (status, _) = send(
        &app.router,
        post_json("/register", json!({"email": "a@x.com", "name": "A", "password": "pw123456"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Not active yet.
    let (status, body) = send(
        &app.router,
        post_json("/login", json!({"email": "a@x.com", "password": "pw123456"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "inactive");

    let code = app.mail.last_code_for("a@x.com");
    let wrong = if code == "100000" { "100001" } else { "100000" };
    let (status, _) = send(
        &app.router,
        post_json("/confirm", json!({"confirmation_code": wrong, "email": "a@x.com"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app.router,
        post_json("/confirm", json!({"confirmation_code": code, "email": "a@x.com"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["user_id"].is_string());

    // Single use.
    let (status, body) = send(
        &app.router,
        post_json("/confirm", json!({"confirmation_code": code, "email": "a@x.com"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "expired");

    let (status, body) = send(
        &app.router,
        post_json("/login", json!({"email": "a@x.com", "password": "pw123456"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let access = body["access"].as_str().unwrap().to_string();
    assert!(body["refresh"].is_string());
    assert_eq!(body["user"]["active"], true);

    let (status, body) = send(&app.router, elevation_request(&access, "12345678901")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["seller"]["government_id"], "12345678901");
    assert_eq!(body["seller"]["documents"].as_array().unwrap().len(), 1);

    let (status, body) = send(&app.router, elevation_request(&access, "12345678901")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "already_seller");

    // Only the first elevation's document stays on disk.
    let stored = std::fs::read_dir(&app.upload_dir).unwrap().count();
    assert_eq!(stored, 1);

    let (status, body) = send(&app.router, get("/users/me", &access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "seller");
}

#[tokio::test]
async fn chat_membership_flow() {
    let app = app();
    let (u1, t1, _) = verified_login(&app, "u1@x.com").await;
    let (_, t2, _) = verified_login(&app, "u2@x.com").await;
    let (_, t3, _) = verified_login(&app, "u3@x.com").await;

    let (status, body) = send(&app.router, elevation_request(&t1, "12345678901")).await;
    assert_eq!(status, StatusCode::CREATED);
    let s1 = body["seller"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app.router, get(&format!("/sellers/by-user/{u1}"), &t1)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["seller"]["id"], s1);

    let (status, body) = send(&app.router, post_json("/chats", json!({"seller": s1}), Some(&t2))).await;
    assert_eq!(status, StatusCode::CREATED);
    let chat_id = body["chat"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app.router, post_json("/chats", json!({"seller": s1}), Some(&t2))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "duplicate_chat");
    assert_eq!(body["chat_id"], chat_id);

    let (status, body) = send(&app.router, post_json("/chats", json!({"seller": s1}), Some(&t1))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "self_chat");

    let (status, body) = send(
        &app.router,
        post_json("/messages", json!({"chat": chat_id, "message": "hello"}), Some(&t2)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"]["body"], "hello");

    let (status, _) = send(
        &app.router,
        post_json("/messages", json!({"chat": chat_id, "message": "hi"}), Some(&t3)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app.router,
        post_json("/messages", json!({"chat": chat_id, "message": "  "}), Some(&t2)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "empty_body");

    // The seller's owner reads the thread; the outsider cannot.
    let (status, body) = send(&app.router, get(&format!("/chats/{chat_id}/messages"), &t1)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = send(&app.router, get(&format!("/chats/{chat_id}/messages"), &t3)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app.router, get("/chats", &t1)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (_, body) = send(&app.router, get("/chats", &t3)).await;
    assert!(body.as_array().unwrap().is_empty());

    // Referenced by a seller profile and a chat.
    let request = Request::delete("/users/me")
        .header(header::AUTHORIZATION, format!("Bearer {t1}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "identity_in_use");
}

#[tokio::test]
async fn failed_mail_dispatch_rolls_registration_back() {
    let state = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        sessions: SessionIssuer::new("integration-secret", 900, 3600),
        notifier: Arc::new(FailingNotifier),
        upload_dir: upload_dir(),
    });
    let app = router(state.clone());

    let (status, body) = send(
        &app,
        post_json("/register", json!({"email": "a@x.com", "name": "A", "password": "pw123456"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "mail_dispatch_failed");
    assert!(state.db.get_user_by_email("a@x.com").unwrap().is_none());

    // Nothing left behind, so the same email is still free.
    let (status, body) = send(
        &app,
        post_json("/register", json!({"email": "a@x.com", "name": "A"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "mail_dispatch_failed");
}

#[tokio::test]
async fn registration_input_errors() {
    let app = app();

    let (status, _) = send(
        &app.router,
        post_json("/register", json!({"email": "a@x.com", "name": "A", "password": "pw123456"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app.router,
        post_json("/register", json!({"email": "A@X.com", "name": "B", "password": "pw123456"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "duplicate_email");

    let (status, body) = send(
        &app.router,
        post_json("/register", json!({"email": "b@x.com", "name": "B", "password": "short"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "weak_password");

    let (status, body) = send(&app.router, post_json("/register", json!({"email": "c@x.com"}), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_input");

    let (status, _) = send(
        &app.router,
        post_json("/login", json!({"email": "nobody@x.com", "password": "pw123456"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn set_password_without_code_does_not_skip_confirmation() {
    let app = app();

    let (status, body) = send(
        &app.router,
        post_json("/register", json!({"email": "v@x.com", "name": "V"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body.get("user_id").is_none());

    // Even with the id in hand, an unconfirmed identity needs its code.
    let user = app.state.db.get_user_by_email("v@x.com").unwrap().unwrap();
    let (status, body) = send(
        &app.router,
        post_json(&format!("/set-password/{}", user.id), json!({"password": "pw123456"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "inactive");

    let (status, body) = send(
        &app.router,
        post_json("/login", json!({"email": "v@x.com", "password": "pw123456"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "inactive");

    let after = app.state.db.get_user_by_email("v@x.com").unwrap().unwrap();
    assert!(!after.active);
    assert!(!after.password_set);
    assert_eq!(after.password, user.password);
}

#[tokio::test]
async fn deferred_password_and_sessions() {
    let app = app();

    let (status, _) = send(
        &app.router,
        post_json("/register", json!({"email": "d@x.com", "name": "D"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let code = app.mail.last_code_for("d@x.com");
    let (status, body) = send(
        &app.router,
        post_json("/confirm", json!({"confirmation_code": code, "email": "d@x.com"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let user_id = body["user_id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app.router,
        post_json(&format!("/set-password/{user_id}"), json!({"password": "pw123456"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let access = body["access"].as_str().unwrap().to_string();
    let refresh = body["refresh"].as_str().unwrap().to_string();

    let (status, body) = send(&app.router, get("/users/me", &access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], true);

    // A second set-password is a reset and needs a code.
    let (status, _) = send(
        &app.router,
        post_json(&format!("/set-password/{user_id}"), json!({"password": "another99"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app.router, post_json("/password-reset", json!({"email": "d@x.com"}), None)).await;
    assert_eq!(status, StatusCode::OK);
    let code = app.mail.last_code_for("d@x.com");
    let (status, _) = send(
        &app.router,
        post_json(
            &format!("/set-password/{user_id}"),
            json!({"password": "another99", "confirmation_code": code}),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app.router, post_json("/token/refresh", json!({"refresh": refresh}), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["access"].is_string());

    let logout = Request::post("/logout")
        .header(header::AUTHORIZATION, format!("Bearer {refresh}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app.router, logout).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app.router, post_json("/token/refresh", json!({"refresh": refresh}), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_need_an_access_token() {
    let app = app();

    let request = Request::get("/chats").body(Body::empty()).unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");

    let (status, _) = send(&app.router, get("/chats", "not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, _, refresh) = verified_login(&app, "r@x.com").await;
    let (status, _) = send(&app.router, get("/chats", &refresh)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
