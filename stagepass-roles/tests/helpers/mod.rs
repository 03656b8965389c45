//! Shared fixtures for stagepass-roles integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request},
    routing::post,
    Json, Router,
};
use serde_json::Value;
use sqlx::SqlitePool;
use stagepass_common::api::{generate_api_token, hash_api_token};
use stagepass_common::db::{init_database, init_memory_database};
use stagepass_common::time;
use stagepass_roles::db::accounts;
use stagepass_roles::documents::{DocumentStore, DEFAULT_MAX_BYTES};
use stagepass_roles::models::{Account, KycAuditEntry, RequestId};
use stagepass_roles::notify::{Mailer, MemoryMailer, NotificationDispatcher, WebhookClient};
use stagepass_roles::workflow::RoleRequestSubmission;
use stagepass_roles::{build_router, AppState, RoleWorkflow};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;

pub const FROM_ADDRESS: &str = "no-reply@stagepass.local";

/// An account plus the plaintext token that authenticates it
pub struct TestAccount {
    pub account: Account,
    pub token: String,
}

pub struct Harness {
    pub pool: SqlitePool,
    pub workflow: RoleWorkflow,
    pub mailer: MemoryMailer,
    pub documents_root: TempDir,
    pub admin: TestAccount,
    pub user: TestAccount,
}

impl Harness {
    /// In-memory database, in-memory mailer, no webhook
    pub async fn new() -> Self {
        let mailer = MemoryMailer::new();
        Self::build(Arc::new(mailer.clone()), mailer, None, false).await
    }

    /// WAL database file with a full connection pool, as the service runs it
    pub async fn on_disk() -> Self {
        let mailer = MemoryMailer::new();
        Self::build(Arc::new(mailer.clone()), mailer, None, true).await
    }

    pub async fn with_webhook(webhook: WebhookClient) -> Self {
        let mailer = MemoryMailer::new();
        Self::build(Arc::new(mailer.clone()), mailer, Some(webhook), false).await
    }

    /// Custom mail backend; `self.mailer` stays empty
    pub async fn with_mailer(backend: Arc<dyn Mailer>) -> Self {
        Self::build(backend, MemoryMailer::new(), None, false).await
    }

    async fn build(
        backend: Arc<dyn Mailer>,
        mailer: MemoryMailer,
        webhook: Option<WebhookClient>,
        on_disk: bool,
    ) -> Self {
        let documents_root = TempDir::new().unwrap();
        let pool = if on_disk {
            init_database(&documents_root.path().join("stagepass.db"))
                .await
                .unwrap()
        } else {
            init_memory_database().await.unwrap()
        };

        let dispatcher = NotificationDispatcher::new(
            backend,
            webhook,
            FROM_ADDRESS.to_string(),
            Duration::from_secs(2),
        );
        let documents = DocumentStore::new(documents_root.path().to_path_buf(), DEFAULT_MAX_BYTES);
        let workflow = RoleWorkflow::new(pool.clone(), dispatcher, documents);

        let admin = create_account(&pool, "admin@stagepass.local", "Admin", true).await;
        let user = create_account(&pool, "fan@example.com", "Fan", false).await;

        Self {
            pool,
            workflow,
            mailer,
            documents_root,
            admin,
            user,
        }
    }

    pub fn router(&self) -> Router {
        build_router(AppState::new(self.pool.clone(), self.workflow.clone()))
    }

    /// Wait for every notification queued so far
    pub async fn drain(&self) {
        self.workflow.dispatcher().drain().await;
    }

    pub async fn reload_account(&self, account: &Account) -> Account {
        accounts::load_account(&self.pool, account.id)
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn audit_log(&self, request_id: RequestId) -> Vec<KycAuditEntry> {
        stagepass_roles::db::audit::list_for_request(&self.pool, request_id)
            .await
            .unwrap()
    }

    pub async fn cached_role(&self, account: &Account) -> String {
        sqlx::query_scalar("SELECT role FROM accounts WHERE id = ?")
            .bind(account.id)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }
}

pub async fn create_account(
    pool: &SqlitePool,
    email: &str,
    display_name: &str,
    superuser: bool,
) -> TestAccount {
    let token = generate_api_token();
    let account = accounts::create_account(
        pool,
        email,
        display_name,
        superuser,
        Some(&hash_api_token(&token)),
        time::now(),
    )
    .await
    .unwrap();
    TestAccount { account, token }
}

pub fn submission(request_type: &str, reason: &str) -> RoleRequestSubmission {
    RoleRequestSubmission {
        request_type: request_type.to_string(),
        reason: reason.to_string(),
        ..Default::default()
    }
}

// =============================================================================
// Webhook receiver
// =============================================================================

/// Throwaway HTTP endpoint recording every JSON body it receives
pub struct WebhookReceiver {
    pub url: String,
    pub received: Arc<Mutex<Vec<Value>>>,
}

/// Start a receiver answering every POST with `status`
pub async fn start_webhook_receiver(status: u16) -> WebhookReceiver {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);

    let app = Router::new().route(
        "/hook",
        post(move |Json(body): Json<Value>| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().await.push(body);
                axum::http::StatusCode::from_u16(status).unwrap()
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    WebhookReceiver {
        url: format!("http://{}/hook", addr),
        received,
    }
}

pub fn webhook_client(url: &str, max_attempts: u32) -> WebhookClient {
    WebhookClient::new(
        url.to_string(),
        Duration::from_secs(2),
        max_attempts,
        Duration::from_millis(10),
    )
    .unwrap()
}

// =============================================================================
// HTTP helpers
// =============================================================================

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_form(uri: &str, token: &str, fields: &[(&str, &str)]) -> Request<Body> {
    let encoded = fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, form_encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(encoded))
        .unwrap()
}

fn form_encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            b' ' => "+".to_string(),
            _ => format!("%{:02X}", b),
        })
        .collect()
}

pub async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}
