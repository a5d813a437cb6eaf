use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::sync::Mutex;
use tower::ServiceExt;

use fyp_shared::types::Role;
use fyp_store::{Database, User};

use super::{build_router, AppState};
use crate::auth::{hash_password, Authority};
use crate::config::ServerConfig;
use crate::file_store::FileStore;
use crate::testing;

const BOUNDARY: &str = "portal-test-boundary";

struct Harness {
    app: Router,
    state: AppState,
    _dir: TempDir,
}

impl Harness {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("portal.db")).unwrap();
        let config = ServerConfig {
            upload_storage_path: dir.path().join("uploads"),
            public_base_url: "http://portal.test".to_string(),
            max_upload_size: 1024,
            ..Default::default()
        };
        let files = FileStore::new(config.upload_storage_path.clone(), config.max_upload_size)
            .await
            .unwrap();
        let auth = Authority::new(config.signing_key.clone(), config.session_ttl_hours);

        let state = AppState {
            db: Arc::new(Mutex::new(db)),
            files: Arc::new(files),
            auth: Arc::new(auth),
            config: Arc::new(config),
        };
        Self {
            app: build_router(state.clone()),
            state,
            _dir: dir,
        }
    }

    async fn user(&self, name: &str, role: Role) -> (User, String) {
        let user = testing::user(&*self.state.db.lock().await, name, role);
        let token = self.state.auth.issue(&user).unwrap();
        (user, token)
    }

    async fn supervisor(&self, name: &str, max: u32) -> (User, String) {
        let user = testing::supervisor(&*self.state.db.lock().await, name, max);
        let token = self.state.auth.issue(&user).unwrap();
        (user, token)
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }
}

fn multipart_body(fields: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        if *name == "file" {
            body.extend_from_slice(
                b"Content-Disposition: form-data; name=\"file\"; filename=\"report.pdf\"\r\n\
                  Content-Type: application/pdf\r\n\r\n",
            );
        } else {
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            );
        }
        body.extend_from_slice(value);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(uri: &str, token: &str, fields: &[(&str, &[u8])]) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(fields)))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let h = Harness::new().await;
    let (status, body) = h.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_login_and_me() {
    let h = Harness::new().await;
    {
        let db = h.state.db.lock().await;
        db.create_user(&fyp_store::NewUser {
            name: "Ada".into(),
            email: "ada@uni.test".into(),
            password_hash: hash_password("correct horse").unwrap(),
            role: Role::Student,
            department: Some("CS".into()),
            batch: Some("2026".into()),
            roll_no: Some("CS-001".into()),
            expertise: vec![],
            max_projects: None,
        })
        .unwrap();
    }

    let (status, body) = h
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "ada@uni.test", "password": "wrong" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, body) = h
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "ada@uni.test", "password": "correct horse" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["user"].get("passwordHash").is_none());
    let token = body["token"].as_str().unwrap().to_string();

    let (status, me) = h.call(Method::GET, "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "ada@uni.test");
    assert_eq!(me["role"], "student");
}

#[tokio::test]
async fn test_requires_session() {
    let h = Harness::new().await;
    let (status, body) = h.call(Method::GET, "/projects", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = h
        .call(Method::GET, "/projects", Some("not-a-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_proposal_to_ongoing_over_http() {
    let h = Harness::new().await;
    let (_, admin) = h.user("Admin", Role::Admin).await;
    let (sup, sup_token) = h.supervisor("Dr Turing", 2).await;
    let (_, leader) = h.user("Leader", Role::Student).await;

    let (status, project) = h
        .call(
            Method::POST,
            "/projects",
            Some(&leader),
            Some(json!({ "title": "Compiler for a toy language" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(project["status"], "Pending");
    let id = project["id"].as_str().unwrap().to_string();

    // A student cannot approve.
    let (status, _) = h
        .call(Method::POST, &format!("/projects/{id}/approve"), Some(&leader), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, project) = h
        .call(Method::POST, &format!("/projects/{id}/approve"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(project["status"], "Approved");

    let (status, project) = h
        .call(
            Method::POST,
            &format!("/projects/{id}/requests"),
            Some(&leader),
            Some(json!({ "supervisorId": sup.id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(project["supervisionRequests"][0]["requestStatus"], "Sent");

    // The supervisor sees the requested project in their list.
    let (_, listed) = h.call(Method::GET, "/projects", Some(&sup_token), None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, project) = h
        .call(
            Method::POST,
            &format!("/projects/{id}/requests/respond"),
            Some(&sup_token),
            Some(json!({ "accept": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(project["status"], "Ongoing");
    assert_eq!(project["supervisor"], json!(sup.id));

    let (_, capacity) = h
        .call(
            Method::GET,
            &format!("/users/{}/capacity", sup.id),
            Some(&leader),
            None,
        )
        .await;
    assert_eq!(capacity["current"], 1);

    let (status, count) = h
        .call(Method::GET, "/notifications/unread-count", Some(&leader), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(count["count"].as_u64().unwrap() >= 2);

    let (status, updated) = h
        .call(Method::POST, "/notifications/read-all", Some(&leader), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(updated["updated"].as_u64().unwrap() >= 2);
    let (_, count) = h
        .call(Method::GET, "/notifications/unread-count", Some(&leader), None)
        .await;
    assert_eq!(count["count"], 0);
}

#[tokio::test]
async fn test_assignment_over_capacity_is_conflict() {
    let h = Harness::new().await;
    let (_, admin) = h.user("Admin", Role::Admin).await;
    let (sup, _) = h.supervisor("Dr Full", 1).await;
    let (first, _) = h.user("First", Role::Student).await;
    let (second, _) = h.user("Second", Role::Student).await;

    let (first_id, second_id) = {
        let mut db = h.state.db.lock().await;
        let a = testing::proposal(&mut db, &first, &[]);
        let b = testing::proposal(&mut db, &second, &[]);
        (a.id, b.id)
    };

    let (status, _) = h
        .call(
            Method::POST,
            &format!("/projects/{first_id}/approve"),
            Some(&admin),
            Some(json!({ "supervisorId": sup.id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    h.call(Method::POST, &format!("/projects/{second_id}/approve"), Some(&admin), None)
        .await;
    let (status, body) = h
        .call(
            Method::POST,
            &format!("/projects/{second_id}/assign"),
            Some(&admin),
            Some(json!({ "supervisorId": sup.id })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("capacity"));

    let (_, project) = h
        .call(Method::GET, &format!("/projects/{second_id}"), Some(&admin), None)
        .await;
    assert_eq!(project["status"], "Approved");
    assert!(project["supervisor"].is_null());
}

#[tokio::test]
async fn test_outsiders_cannot_view_project() {
    let h = Harness::new().await;
    let (leader, _) = h.user("Owner", Role::Student).await;
    let (_, outsider) = h.user("Outsider", Role::Student).await;
    let id = {
        let mut db = h.state.db.lock().await;
        testing::proposal(&mut db, &leader, &[]).id
    };

    let (status, _) = h
        .call(Method::GET, &format!("/projects/{id}"), Some(&outsider), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = h
        .call(Method::GET, "/users", Some(&outsider), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, supervisors) = h
        .call(Method::GET, "/users?role=supervisor", Some(&outsider), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(supervisors.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_submission_upload_and_download() {
    let h = Harness::new().await;
    let (admin, _) = h.user("Admin", Role::Admin).await;
    let (sup, _) = h.supervisor("Dr Files", 2).await;
    let (leader, leader_token) = h.user("Uploader", Role::Student).await;
    let id = {
        let mut db = h.state.db.lock().await;
        let project = testing::proposal(&mut db, &leader, &[]);
        crate::workflow::approve_with_supervisor(&mut db, &admin, project.id, sup.id).unwrap();
        project.id
    };

    let content: &[u8] = b"%PDF-1.7 midterm report";
    let (status, body) = h
        .send(multipart_request(
            &format!("/projects/{id}/submissions"),
            &leader_token,
            &[("title", b"Midterm report"), ("file", content)],
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["submission"]["title"], "Midterm report");
    assert_eq!(body["submission"]["status"], "Submitted");
    assert_eq!(body["project"]["submissions"].as_array().unwrap().len(), 1);

    let url = body["submission"]["fileUrl"].as_str().unwrap();
    let path = url.strip_prefix("http://portal.test").unwrap();
    let response = h
        .app
        .clone()
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], content);

    let oversized = vec![b'x'; 2048];
    let (status, body) = h
        .send(multipart_request(
            &format!("/projects/{id}/submissions"),
            &leader_token,
            &[("title", b"Too big"), ("file", &oversized)],
        ))
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_submission_rejected_before_ongoing() {
    let h = Harness::new().await;
    let (leader, leader_token) = h.user("Early", Role::Student).await;
    let id = {
        let mut db = h.state.db.lock().await;
        testing::proposal(&mut db, &leader, &[]).id
    };

    let (status, _) = h
        .send(multipart_request(
            &format!("/projects/{id}/submissions"),
            &leader_token,
            &[("title", b"Too early"), ("file", b"draft")],
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let stored = std::fs::read_dir(&h.state.config.upload_storage_path)
        .unwrap()
        .count();
    assert_eq!(stored, 0);
}

#[tokio::test]
async fn test_approve_with_malformed_supervisor_changes_nothing() {
    let h = Harness::new().await;
    let (_, admin) = h.user("Admin", Role::Admin).await;
    let (leader, _) = h.user("Leader", Role::Student).await;
    let id = {
        let mut db = h.state.db.lock().await;
        testing::proposal(&mut db, &leader, &[]).id
    };

    let (status, body) = h
        .call(
            Method::POST,
            &format!("/projects/{id}/approve"),
            Some(&admin),
            Some(json!({ "supervisorId": "not-a-uuid" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/projects/{id}/approve"))
        .header(header::AUTHORIZATION, format!("Bearer {admin}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"supervisorId\":"))
        .unwrap();
    let (status, _) = h.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, project) = h
        .call(Method::GET, &format!("/projects/{id}"), Some(&admin), None)
        .await;
    assert_eq!(project["status"], "Pending");
    assert!(project["supervisor"].is_null());
    let leader_inbox = testing::inbox(&*h.state.db.lock().await, leader.id);
    assert!(leader_inbox.is_empty());
}

#[tokio::test]
async fn test_group_deadline_shows_on_roadmap() {
    let h = Harness::new().await;
    let (_, admin) = h.user("Admin", Role::Admin).await;
    let (leader, leader_token) = h.user("Leader", Role::Student).await;
    let id = {
        let mut db = h.state.db.lock().await;
        testing::proposal(&mut db, &leader, &[]).id
    };

    let (status, deadline) = h
        .call(
            Method::POST,
            "/deadlines",
            Some(&admin),
            Some(json!({
                "title": "Design review",
                "deadlineDate": "2026-12-01T17:00:00Z",
                "scope": "Group",
                "targetProject": id,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(deadline["targetProject"], json!(id));

    let (status, roadmap) = h
        .call(
            Method::GET,
            &format!("/projects/{id}/roadmap"),
            Some(&leader_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let deadlines = roadmap["deadlines"].as_array().unwrap();
    assert_eq!(deadlines.len(), 1);
    assert_eq!(deadlines[0]["id"], deadline["id"]);
    assert_eq!(deadlines[0]["title"], "Design review");

    // A batch deadline needs its cohort.
    let (status, body) = h
        .call(
            Method::POST,
            "/deadlines",
            Some(&admin),
            Some(json!({
                "title": "Cohort demo",
                "deadlineDate": "2026-12-05T17:00:00Z",
                "scope": "Batch",
                "batch": "2026",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_deleting_supervisor_tells_the_team() {
    let h = Harness::new().await;
    let (admin, admin_token) = h.user("Admin", Role::Admin).await;
    let (sup, _) = h.supervisor("Dr Departed", 2).await;
    let (leader, leader_token) = h.user("Leader", Role::Student).await;
    let id = {
        let mut db = h.state.db.lock().await;
        let project = testing::proposal(&mut db, &leader, &[]);
        crate::workflow::approve_with_supervisor(&mut db, &admin, project.id, sup.id).unwrap();
        project.id
    };

    let (status, _) = h
        .call(
            Method::DELETE,
            &format!("/users/{}", sup.id),
            Some(&admin_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, project) = h
        .call(Method::GET, &format!("/projects/{id}"), Some(&leader_token), None)
        .await;
    assert_eq!(project["status"], "Approved");
    assert!(project["supervisor"].is_null());

    let (_, inbox) = h
        .call(Method::GET, "/notifications", Some(&leader_token), None)
        .await;
    assert_eq!(inbox[0]["title"], "Supervisor removed");

    let (status, _) = h
        .call(
            Method::DELETE,
            &format!("/users/{}", sup.id),
            Some(&admin_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
