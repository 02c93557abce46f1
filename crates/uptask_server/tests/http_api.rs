use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use uptask_core::mail::Mailer;
use uptask_core::model::view::UserSummary;
use uptask_core::sync::SinkClosed;
use uptask_core::{open_db_in_memory, ConnectionId, EventSink, SyncEvent};
use uptask_server::{router, AppState, SessionKeys};
use uuid::Uuid;

const FRONTEND: &str = "http://localhost:5173";

#[derive(Default)]
struct RecordingMailer {
    tokens: Mutex<Vec<(String, String)>>,
}

impl RecordingMailer {
    fn token_for(&self, email: &str) -> String {
        self.tokens
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, token)| token.clone())
            .expect("mail sent")
    }
}

impl Mailer for RecordingMailer {
    fn send_confirmation(&self, user: &UserSummary, token: &str) {
        self.tokens
            .lock()
            .unwrap()
            .push((user.email.clone(), token.to_string()));
    }

    fn send_recovery(&self, user: &UserSummary, token: &str) {
        self.send_confirmation(user, token);
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<SyncEvent>>,
}

impl RecordingSink {
    fn take(&self) -> Vec<SyncEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl EventSink for RecordingSink {
    fn deliver(&self, event: &SyncEvent) -> Result<(), SinkClosed> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

struct Harness {
    state: AppState,
    app: Router,
    mailer: Arc<RecordingMailer>,
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

impl Harness {
    fn new() -> Self {
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::new(
            open_db_in_memory().unwrap(),
            SessionKeys::new(b"test-secret-0123456789", Duration::from_secs(3600)),
            mailer.clone(),
            false,
        )
        .with_allowed_origins([FRONTEND]);
        Self {
            app: router(state.clone()),
            state,
            mailer,
        }
    }

    async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
        connection: Option<ConnectionId>,
    ) -> Reply {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(connection) = connection {
            request = request.header("x-sync-connection", connection.to_string());
        }
        let body = match body {
            Some(value) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&value).unwrap())
            }
            None => Body::empty(),
        };
        let response = self
            .app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        Reply {
            status,
            headers,
            body,
        }
    }

    /// Signs up, confirms and logs in; returns `(user id, session token)`.
    async fn account(&self, name: &str) -> (Uuid, String) {
        let email = format!("{}@example.com", name.to_lowercase());
        let reply = self
            .call(
                "POST",
                "/api/user/signup",
                None,
                Some(json!({ "name": name, "email": email, "password": "secret1" })),
                None,
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);

        let token = self.mailer.token_for(&email);
        let reply = self
            .call("POST", "/api/user/confirm", None, Some(json!({ "token": token })), None)
            .await;
        assert_eq!(reply.status, StatusCode::OK);

        let reply = self
            .call(
                "POST",
                "/api/user/login",
                None,
                Some(json!({ "email": email, "password": "secret1" })),
                None,
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK);
        let id = reply.body["user"]["id"].as_str().unwrap().parse().unwrap();
        (id, reply.body["token"].as_str().unwrap().to_string())
    }

    fn watch(&self, user: Uuid, project: Uuid) -> (ConnectionId, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let mut registry = self.state.broadcaster.registry().lock().unwrap();
        let connection = registry.connect(user, sink.clone());
        registry.join(connection, project).unwrap();
        (connection, sink)
    }
}

fn project_body(name: &str) -> Value {
    json!({
        "name": name,
        "description": "Company site",
        "deliveryDate": "2024-09-30",
        "customer": "ACME"
    })
}

fn task_body(name: &str, project: &str) -> Value {
    json!({
        "name": name,
        "description": "Mockups",
        "deliveryDate": "2024-06-01T00:00:00.000Z",
        "priority": "high",
        "project": project
    })
}

#[tokio::test]
async fn health_is_public() {
    let harness = Harness::new();
    let reply = harness.call("GET", "/health", None, None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "ok");
}

async fn preflight(harness: &Harness, origin: &str) -> HeaderMap {
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/project")
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type,x-sync-connection")
        .body(Body::empty())
        .unwrap();
    let response = harness.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response.headers().clone()
}

#[tokio::test]
async fn cors_allows_credentials_for_the_frontend_only() {
    let harness = Harness::new();

    let headers = preflight(&harness, FRONTEND).await;
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], FRONTEND);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    let allowed = headers[header::ACCESS_CONTROL_ALLOW_HEADERS].to_str().unwrap();
    assert!(allowed.contains("x-sync-connection"));

    let headers = preflight(&harness, "https://evil.example").await;
    assert!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());

    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, FRONTEND)
        .body(Body::empty())
        .unwrap();
    let response = harness.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], FRONTEND);
}

#[tokio::test]
async fn protected_routes_require_a_valid_session() {
    let harness = Harness::new();
    let reply = harness.call("GET", "/api/project", None, None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert!(reply.body["message"].is_string());

    let reply = harness
        .call("GET", "/api/project", Some("not-a-jwt"), None, None)
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = harness.call("GET", "/api/sync", None, None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_sets_session_cookie_and_profile_resolves() {
    let harness = Harness::new();
    let (id, token) = harness.account("Ana").await;

    let reply = harness
        .call("GET", "/api/user/auth", Some(&token), None, None)
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["id"], id.to_string());
    assert_eq!(reply.body["email"], "ana@example.com");
    assert!(reply.body.get("password_hash").is_none());

    let reply = harness
        .call(
            "POST",
            "/api/user/login",
            None,
            Some(json!({ "email": "ana@example.com", "password": "secret1" })),
            None,
        )
        .await;
    let cookie = reply.headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("access_token="));
    assert!(cookie.contains("HttpOnly"));

    let reply = harness
        .call("GET", "/api/user/logout", Some(&token), None, None)
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.headers[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .contains("Max-Age=0"));
}

#[tokio::test]
async fn account_errors_use_field_envelopes() {
    let harness = Harness::new();
    let reply = harness
        .call(
            "POST",
            "/api/user/signup",
            None,
            Some(json!({ "email": "bad", "password": "123" })),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.body["errors"]["name"].is_string());
    assert!(reply.body["errors"]["email"].is_string());
    assert!(reply.body["errors"]["password"].is_string());

    harness.account("Ana").await;
    let reply = harness
        .call(
            "POST",
            "/api/user/signup",
            None,
            Some(json!({ "name": "Ana", "email": "ana@example.com", "password": "secret1" })),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert!(reply.body["errors"]["email"].is_string());

    let reply = harness
        .call(
            "POST",
            "/api/user/login",
            None,
            Some(json!({ "email": "ana@example.com", "password": "wrong-one" })),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert!(reply.body["errors"]["password"].is_string());

    let reply = harness
        .call("POST", "/api/user/check-token", None, Some(json!({ "token": "nope" })), None)
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = harness
        .call("POST", "/api/user/signup", None, Some(json!("not an object")), None)
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.body["message"].is_string());
}

#[tokio::test]
async fn project_lifecycle_and_status_codes() {
    let harness = Harness::new();
    let (_, ana) = harness.account("Ana").await;
    let (bea_id, bea) = harness.account("Bea").await;
    let (_, carl) = harness.account("Carl").await;

    let reply = harness
        .call("POST", "/api/project", Some(&ana), Some(project_body("Website")), None)
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["message"], "project created");
    let project = reply.body["project"]["id"].as_str().unwrap().to_string();

    let reply = harness
        .call("POST", "/api/project", Some(&ana), Some(json!({})), None)
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["errors"].as_object().unwrap().len(), 4);

    let reply = harness
        .call(
            "POST",
            "/api/project/partner",
            Some(&ana),
            Some(json!({ "email": "bea@example.com", "project": project })),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["partner"]["id"], bea_id.to_string());

    let reply = harness
        .call(
            "POST",
            "/api/project/partner",
            Some(&ana),
            Some(json!({ "email": "ana@example.com", "project": project })),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);

    let uri = format!("/api/project/{project}");
    let reply = harness.call("GET", &uri, Some(&bea), None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["partners"][0]["email"], "bea@example.com");

    let reply = harness.call("GET", &uri, Some(&carl), None, None).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    let reply = harness
        .call("PUT", &uri, Some(&bea), Some(project_body("Hijack")), None)
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    let reply = harness
        .call("GET", "/api/project/not-a-uuid", Some(&ana), None, None)
        .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = harness
        .call("PUT", &uri, Some(&ana), Some(project_body("Website v2")), None)
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["project"]["name"], "Website v2");

    let reply = harness.call("GET", "/api/project", Some(&bea), None, None).await;
    assert_eq!(reply.body.as_array().unwrap().len(), 1);

    let reply = harness
        .call(
            "POST",
            &format!("/api/project/partner/{project}"),
            Some(&ana),
            Some(json!({ "id": bea_id.to_string() })),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let reply = harness.call("GET", "/api/project", Some(&bea), None, None).await;
    assert!(reply.body.as_array().unwrap().is_empty());

    let reply = harness.call("DELETE", &uri, Some(&ana), None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    let reply = harness.call("GET", &uri, Some(&ana), None, None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn task_mutations_reach_room_members_except_origin() {
    let harness = Harness::new();
    let (ana_id, ana) = harness.account("Ana").await;
    let (bea_id, bea) = harness.account("Bea").await;
    let (_, carl) = harness.account("Carl").await;
    let reply = harness
        .call("POST", "/api/project", Some(&ana), Some(project_body("Website")), None)
        .await;
    let project = reply.body["project"]["id"].as_str().unwrap().to_string();
    let project_id: Uuid = project.parse().unwrap();
    harness
        .call(
            "POST",
            "/api/project/partner",
            Some(&ana),
            Some(json!({ "email": "bea@example.com", "project": project })),
            None,
        )
        .await;

    let (ana_conn, ana_sink) = harness.watch(ana_id, project_id);
    let (bea_conn, bea_sink) = harness.watch(bea_id, project_id);

    let reply = harness
        .call(
            "POST",
            "/api/task",
            Some(&ana),
            Some(task_body("Design", &project)),
            Some(ana_conn),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["task"]["deliveryDate"], "2024-06-01");
    let task = reply.body["task"]["id"].as_str().unwrap().to_string();
    assert!(ana_sink.take().is_empty());
    let events = bea_sink.take();
    assert_eq!(events.len(), 1);
    assert_eq!(serde_json::to_value(&events[0]).unwrap()["type"], "task-created");

    let reply = harness
        .call(
            "POST",
            "/api/task/status",
            Some(&bea),
            Some(json!({ "id": task })),
            Some(bea_conn),
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["task"]["status"], true);
    assert_eq!(reply.body["task"]["completedBy"]["name"], "Bea");
    assert!(bea_sink.take().is_empty());
    assert_eq!(ana_sink.take().len(), 1);

    let task_uri = format!("/api/task/{task}");
    let reply = harness
        .call("PUT", &task_uri, Some(&carl), Some(task_body("Renamed", &project)), None)
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    let reply = harness
        .call("PUT", &task_uri, Some(&bea), Some(task_body("Renamed", &project)), None)
        .await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert!(ana_sink.take().is_empty());
    assert!(bea_sink.take().is_empty());

    // A connection id owned by someone else does not suppress delivery.
    let reply = harness
        .call("DELETE", &task_uri, Some(&ana), None, Some(bea_conn))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    let events = bea_sink.take();
    assert_eq!(
        events,
        vec![SyncEvent::TaskDeleted {
            task: task.parse().unwrap(),
            project: project_id
        }]
    );
    assert_eq!(ana_sink.take().len(), 1);

    let reply = harness.call("GET", &task_uri, Some(&ana), None, None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    let reply = harness
        .call("GET", &format!("/api/project/{project}"), Some(&ana), None, None)
        .await;
    assert!(reply.body["tasks"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn partner_removal_and_project_deletion_clear_rooms() {
    let harness = Harness::new();
    let (ana_id, ana) = harness.account("Ana").await;
    let (bea_id, _) = harness.account("Bea").await;
    let reply = harness
        .call("POST", "/api/project", Some(&ana), Some(project_body("Website")), None)
        .await;
    let project = reply.body["project"]["id"].as_str().unwrap().to_string();
    let project_id: Uuid = project.parse().unwrap();
    harness
        .call(
            "POST",
            "/api/project/partner",
            Some(&ana),
            Some(json!({ "email": "bea@example.com", "project": project })),
            None,
        )
        .await;
    let (_, ana_sink) = harness.watch(ana_id, project_id);
    let (bea_conn, bea_sink) = harness.watch(bea_id, project_id);

    let reply = harness
        .call(
            "POST",
            &format!("/api/project/partner/{project}"),
            Some(&ana),
            Some(json!({ "id": bea_id.to_string() })),
            None,
        )
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    {
        let registry = harness.state.broadcaster.registry().lock().unwrap();
        assert_eq!(registry.room_size(project_id), 1);
        assert!(registry.is_connected(bea_conn));
    }

    harness
        .call("POST", "/api/task", Some(&ana), Some(task_body("Design", &project)), None)
        .await;
    assert_eq!(ana_sink.take().len(), 1);
    assert!(bea_sink.take().is_empty());

    let reply = harness
        .call("DELETE", &format!("/api/project/{project}"), Some(&ana), None, None)
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        harness.state.broadcaster.registry().lock().unwrap().room_size(project_id),
        0
    );
}
