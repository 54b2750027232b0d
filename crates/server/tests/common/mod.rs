//! Shared fixtures: a router over a fresh SQLite database, seeded programs and
//! users, and an in-memory file store that records removals.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use prethesis_common::{
    attachments::FileStore,
    config::AppConfig,
    db::{models::*, schema, DbPool},
    errors::{AppError, Result},
};
use prethesis_server::{create_router, AppState};
use sea_orm::{ActiveModelTrait, Database, Set};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

pub const PROGRAM: &str = "MH30_001";
pub const OTHER_PROGRAM: &str = "KH50_005";
pub const TRACK: &str = "MH30_001-track";
pub const OTHER_TRACK: &str = "KH50_005-track";

pub const ADMIN_GROUP: &str = "grp-toska";
pub const EMPLOYEE_GROUP: &str = "hy-employees";

const BOUNDARY: &str = "prethesis-test-boundary";

/// Attachment bytes kept in memory
#[derive(Default)]
pub struct MemoryFileStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
    removed: Mutex<Vec<String>>,
}

impl MemoryFileStore {
    pub fn stored(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn save(&self, contents: &[u8]) -> Result<String> {
        let filename = Uuid::new_v4().simple().to_string();
        self.files
            .lock()
            .unwrap()
            .insert(filename.clone(), contents.to_vec());
        Ok(filename)
    }

    async fn read(&self, filename: &str) -> Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(filename)
            .cloned()
            .ok_or_else(|| AppError::NotFound {
                resource_type: "Attachment".to_string(),
                id: filename.to_string(),
            })
    }

    async fn remove(&self, filename: &str) -> Result<()> {
        self.removed.lock().unwrap().push(filename.to_string());
        self.files.lock().unwrap().remove(filename);
        Ok(())
    }
}

/// The caller a request is sent as
#[derive(Debug, Clone)]
pub struct Caller {
    pub uid: String,
    pub groups: Vec<String>,
}

impl Caller {
    pub fn admin() -> Self {
        Self::new("admin1", &[ADMIN_GROUP, EMPLOYEE_GROUP])
    }

    pub fn manager() -> Self {
        Self::new("manager1", &[EMPLOYEE_GROUP])
    }

    pub fn teacher(uid: &str) -> Self {
        Self::new(uid, &[EMPLOYEE_GROUP])
    }

    pub fn student(uid: &str) -> Self {
        Self::new(uid, &["hy-students"])
    }

    pub fn new(uid: &str, groups: &[&str]) -> Self {
        Self {
            uid: uid.to_string(),
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }
}

pub struct TestApp {
    pub router: Router,
    pub db: DbPool,
    pub files: Arc<MemoryFileStore>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let path = std::env::temp_dir().join(format!("prethesis-test-{}.db", Uuid::new_v4()));
        let url = format!("sqlite://{}?mode=rwc", path.display());
        let conn = Database::connect(&url).await.expect("open sqlite database");
        let db = DbPool::from_connection(conn);

        schema::create_tables(db.write()).await.expect("create tables");
        seed(&db).await;

        let mut config = AppConfig::default();
        config.rate_limit.enabled = false;

        let files = Arc::new(MemoryFileStore::default());
        let state = AppState::new(Arc::new(config), db.clone(), files.clone());

        Self {
            router: create_router(state),
            db,
            files,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        (status, body)
    }

    pub async fn get(&self, caller: &Caller, uri: &str) -> (StatusCode, Value) {
        self.send(request(Method::GET, uri, caller).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, caller: &Caller, uri: &str) -> (StatusCode, Value) {
        self.send(request(Method::DELETE, uri, caller).body(Body::empty()).unwrap())
            .await
    }

    pub async fn put_json(&self, caller: &Caller, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            request(Method::PUT, uri, caller)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn create_thesis(
        &self,
        caller: &Caller,
        thesis: &Value,
        files: &[FilePart],
    ) -> (StatusCode, Value) {
        self.send(multipart(Method::POST, "/api/theses", caller, thesis, files))
            .await
    }

    pub async fn update_thesis(
        &self,
        caller: &Caller,
        id: &str,
        thesis: &Value,
        files: &[FilePart],
    ) -> (StatusCode, Value) {
        let uri = format!("/api/theses/{}", id);
        self.send(multipart(Method::PUT, &uri, caller, thesis, files))
            .await
    }

    /// Create a thesis as admin and return its id
    pub async fn seed_thesis(&self, thesis: &Value) -> String {
        let (status, body) = self
            .create_thesis(&Caller::admin(), thesis, &both_attachments())
            .await;
        assert_eq!(status, StatusCode::CREATED, "seed thesis failed: {}", body);
        body["id"].as_str().unwrap().to_string()
    }
}

pub struct FilePart {
    pub field: &'static str,
    pub filename: &'static str,
    pub mimetype: &'static str,
    pub contents: &'static [u8],
}

pub fn research_plan() -> FilePart {
    FilePart {
        field: "researchPlan",
        filename: "plan.pdf",
        mimetype: "application/pdf",
        contents: b"%PDF-1.4 research plan",
    }
}

pub fn ways_of_working() -> FilePart {
    FilePart {
        field: "waysOfWorking",
        filename: "ways.pdf",
        mimetype: "application/pdf",
        contents: b"%PDF-1.4 ways of working",
    }
}

pub fn both_attachments() -> Vec<FilePart> {
    vec![research_plan(), ways_of_working()]
}

pub fn supervisor(id: &str, percentage: i32) -> Value {
    json!({
        "user": { "id": id },
        "percentage": percentage,
        "isExternal": false,
        "isPrimarySupervisor": false
    })
}

pub fn external_supervisor(email: &str, percentage: i32) -> Value {
    json!({
        "user": { "firstName": "Extra", "lastName": "Person", "email": email },
        "percentage": percentage,
        "isExternal": true,
        "isPrimarySupervisor": false
    })
}

/// A valid thesis in the seeded program
pub fn thesis_json(status: &str, supervisions: Vec<Value>) -> Value {
    json!({
        "programId": PROGRAM,
        "studyTrackId": TRACK,
        "topic": "Incremental type checking",
        "status": status,
        "startDate": "2024-09-01",
        "targetDate": "2025-06-01",
        "supervisions": supervisions,
        "graders": [
            { "user": { "id": "teacher2" }, "isPrimaryGrader": true, "isExternal": false }
        ],
        "authors": [ { "id": "student1" } ]
    })
}

fn request(method: Method, uri: &str, caller: &Caller) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("uid", caller.uid.as_str())
        .header("hygroupcn", caller.groups.join(";"))
}

fn multipart(method: Method, uri: &str, caller: &Caller, thesis: &Value, files: &[FilePart]) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();

    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"json\"\r\n\r\n");
    body.extend_from_slice(thesis.to_string().as_bytes());
    body.extend_from_slice(b"\r\n");

    for file in files {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                file.field, file.filename, file.mimetype
            )
            .as_bytes(),
        );
        body.extend_from_slice(file.contents);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    request(method, uri, caller)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn seed(db: &DbPool) {
    let conn = db.write();

    for (id, track) in [(PROGRAM, TRACK), (OTHER_PROGRAM, OTHER_TRACK)] {
        ProgramActiveModel {
            id: Set(id.to_string()),
            name: Set(json!({ "fi": id, "en": id })),
            level: Set("master".to_string()),
            international: Set(false),
            enabled: Set(true),
        }
        .insert(conn)
        .await
        .expect("seed program");

        StudyTrackActiveModel {
            id: Set(track.to_string()),
            name: Set(json!({ "en": track })),
            program_id: Set(id.to_string()),
        }
        .insert(conn)
        .await
        .expect("seed study track");
    }

    let users = [
        ("admin1", Some("admin1@example.org"), false),
        ("manager1", Some("manager1@example.org"), false),
        ("teacher1", Some("teacher1@example.org"), false),
        ("teacher2", Some("teacher2@example.org"), false),
        ("teacher3", Some("teacher3@example.org"), false),
        ("outsider", Some("outsider@example.org"), false),
        ("student1", Some("student1@example.org"), false),
        ("internal1", Some("shared@example.org"), false),
    ];

    for (id, email, is_external) in users {
        let now = Utc::now();
        UserActiveModel {
            id: Set(id.to_string()),
            username: Set(id.to_string()),
            first_name: Set(id.to_string()),
            last_name: Set("Tester".to_string()),
            email: Set(email.map(String::from)),
            language: Set("en".to_string()),
            is_admin: Set(false),
            is_external: Set(is_external),
            iam_groups: Set(json!([])),
            favorite_program_ids: Set(None),
            department_id: Set(None),
            theses_table_filters: Set(json!({})),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await
        .expect("seed user");
    }

    ProgramManagementActiveModel {
        user_id: Set("manager1".to_string()),
        program_id: Set(PROGRAM.to_string()),
    }
    .insert(conn)
    .await
    .expect("seed program management");
}
