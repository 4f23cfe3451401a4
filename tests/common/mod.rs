#![allow(dead_code)]

use anyhow::{Result, bail};
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::{DateTime, Duration, Utc};
use http_body_util::BodyExt;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use pdf_merge_backend::config::AppConfig;
use pdf_merge_backend::infrastructure::identity::setup_identity;
use pdf_merge_backend::models::Principal;
use pdf_merge_backend::services::session_store::{InMemorySessionStore, SessionStore};
use pdf_merge_backend::services::storage::{LocalStorageService, StorageService};
use pdf_merge_backend::{AppState, create_app};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tempfile::TempDir;
use tower::ServiceExt;

pub const USERNAME: &str = "test_user";
pub const PASSWORD: &str = "password123";

/// A small valid PDF whose page `n` shows the text `{label}-page-{n}`.
pub fn sample_pdf(label: &str, page_total: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });

    let mut kids: Vec<Object> = Vec::new();
    for n in 1..=page_total {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!("{label}-page-{n}"))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_total as i64,
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Text markers of every page, in page order.
pub fn page_markers(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .into_values()
        .map(|id| {
            let content = String::from_utf8_lossy(&doc.get_page_content(id).unwrap()).to_string();
            let start = content.find('(').unwrap() + 1;
            let end = content.find(')').unwrap();
            content[start..end].to_string()
        })
        .collect()
}

/// Number of regular files below `dir`.
pub fn count_files(dir: &Path) -> usize {
    if !dir.exists() {
        return 0;
    }
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| {
            let path = entry.unwrap().path();
            if path.is_dir() { count_files(&path) } else { 1 }
        })
        .sum()
}

pub fn test_config(dir: &TempDir) -> AppConfig {
    AppConfig {
        upload_dir: dir.path().join("uploads"),
        merged_dir: dir.path().join("merged"),
        verify_magic_bytes: true,
        default_username: USERNAME.to_string(),
        default_password: PASSWORD.to_string(),
        ..AppConfig::default()
    }
}

/// Storage that delegates to the local filesystem but can be told to fail.
pub struct FlakyStorage {
    pub inner: LocalStorageService,
    /// Uploads succeed this many times, then fail.
    pub uploads_before_failure: AtomicUsize,
    pub fail_uploads: AtomicBool,
    pub fail_reads: AtomicBool,
    pub fail_deletes: AtomicBool,
}

impl FlakyStorage {
    pub fn new(root: &Path) -> Self {
        Self {
            inner: LocalStorageService::new(root.to_path_buf()),
            uploads_before_failure: AtomicUsize::new(0),
            fail_uploads: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    /// Lets `n` more uploads through, then fails the rest.
    pub fn fail_uploads_after(&self, n: usize) {
        self.uploads_before_failure.store(n, Ordering::SeqCst);
        self.fail_uploads.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageService for FlakyStorage {
    async fn upload_file(&self, key: &str, data: &[u8]) -> Result<()> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            let remaining = self.uploads_before_failure.load(Ordering::SeqCst);
            if remaining == 0 {
                bail!("simulated write failure for {}", key);
            }
            self.uploads_before_failure
                .store(remaining - 1, Ordering::SeqCst);
        }
        self.inner.upload_file(key, data).await
    }

    async fn get_file(&self, key: &str) -> Result<Vec<u8>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("simulated read failure for {}", key);
        }
        self.inner.get_file(key).await
    }

    async fn delete_file(&self, key: &str) -> Result<bool> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            bail!("simulated delete failure for {}", key);
        }
        self.inner.delete_file(key).await
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        self.inner.list_objects(prefix).await
    }

    async fn health_check(&self) -> Result<()> {
        self.inner.health_check().await
    }
}

pub struct TestEnv {
    pub dir: TempDir,
    pub config: AppConfig,
    pub storage: Arc<FlakyStorage>,
    pub sessions: Arc<InMemorySessionStore>,
    pub state: AppState,
}

impl TestEnv {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir);
        std::fs::create_dir_all(&config.upload_dir).unwrap();

        let storage = Arc::new(FlakyStorage::new(&config.upload_dir));
        let sessions = Arc::new(InMemorySessionStore::new());
        let identity = setup_identity(&config).unwrap();
        let state = AppState::new(storage.clone(), sessions.clone(), identity, config.clone());

        Self {
            dir,
            config,
            storage,
            sessions,
            state,
        }
    }

    pub fn app(&self) -> Router {
        create_app(self.state.clone())
    }

    pub fn upload_dir(&self) -> &Path {
        &self.config.upload_dir
    }

    /// Opens a session directly, bypassing the login form.
    pub async fn open_session(&self, username: &str) -> String {
        self.open_session_until(username, Utc::now() + Duration::hours(24))
            .await
    }

    /// Opens a session whose lifetime already ended.
    pub async fn open_expired_session(&self, username: &str) -> String {
        self.open_session_until(username, Utc::now() - Duration::minutes(1))
            .await
    }

    async fn open_session_until(&self, username: &str, expires_at: DateTime<Utc>) -> String {
        self.sessions
            .open(
                &Principal {
                    username: username.to_string(),
                },
                expires_at,
            )
            .await
            .id
    }

    /// Logs in through `POST /login` and returns the `Cookie` header value.
    pub async fn login(&self) -> String {
        let response = self
            .app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/login")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(format!(
                        "username={}&password={}",
                        USERNAME, PASSWORD
                    )))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        set_cookie.split(';').next().unwrap().to_string()
    }
}

/// Builds a `multipart/form-data` body with one part per `(field, filename, bytes)`.
pub fn multipart_body(boundary: &str, parts: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, filename, data) in parts {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\n\
                 Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

pub async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}
