//! Test helpers for the HTTP API tests.
//!
//! Builds an in-memory app with a stubbed feed source so sync behaviour is
//! fully controlled by the test.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::http::header::AUTHORIZATION;
use axum_test::TestServer;
use futures::future::BoxFuture;
use serde_json::{json, Value};

use feedwatch::config::WebConfig;
use feedwatch::db::bootstrap_users;
use feedwatch::feed::{FeedSource, FetchOutcome, FetchedEntry, SyncEngine, SyncSettings};
use feedwatch::web::handlers::AppState;
use feedwatch::web::middleware::JwtState;
use feedwatch::web::router::{create_health_router, create_router};
use feedwatch::Database;

pub const USER1: &str = "user1@example.com";
pub const USER2: &str = "user2@example.com";

/// Feed source returning canned outcomes per URL.
#[derive(Default)]
pub struct StubSource {
    outcomes: Mutex<HashMap<String, FetchOutcome>>,
}

impl StubSource {
    /// Serve `outcome` for `url`.
    pub fn set(&self, url: &str, outcome: FetchOutcome) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(url.to_string(), outcome);
    }

    /// Serve entries with the given links for `url`.
    pub fn set_links(&self, url: &str, links: &[&str]) {
        let entries = links
            .iter()
            .map(|link| FetchedEntry::new(*link, format!("Title for {}", link)))
            .collect();
        self.set(url, FetchOutcome::Ok(entries));
    }

    /// Make `url` fail to parse.
    pub fn set_malformed(&self, url: &str, cause: &str) {
        self.set(url, FetchOutcome::Malformed(cause.to_string()));
    }
}

impl FeedSource for StubSource {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, FetchOutcome> {
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| FetchOutcome::Malformed("no such feed".to_string()));
        Box::pin(async move { outcome })
    }
}

/// Create a test configuration.
pub fn create_test_config() -> WebConfig {
    WebConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec![],
        jwt_secret: "test-secret-key-for-testing-only".to_string(),
        jwt_access_token_expiry_secs: 900,
    }
}

/// An app under test.
pub struct TestApp {
    pub server: TestServer,
    pub db: Database,
    pub source: Arc<StubSource>,
}

impl TestApp {
    /// Create a test app with the two default users.
    pub async fn new() -> Self {
        Self::with_settings(SyncSettings::default()).await
    }

    /// Create a test app whose sync engine uses `settings`.
    pub async fn with_settings(settings: SyncSettings) -> Self {
        let config = create_test_config();

        let db = Database::open_in_memory()
            .await
            .expect("Failed to create test database");
        bootstrap_users(&db, &[USER1.to_string(), USER2.to_string()])
            .await
            .expect("Failed to create users");

        let source = Arc::new(StubSource::default());
        let engine = Arc::new(SyncEngine::new(db.clone(), source.clone(), settings));

        let app_state = Arc::new(AppState::new(
            db.clone(),
            engine,
            &config.jwt_secret,
            config.jwt_access_token_expiry_secs,
        ));
        let jwt_state = Arc::new(JwtState::new(&config.jwt_secret));

        let router = create_router(app_state, jwt_state, &config.cors_origins)
            .merge(create_health_router());
        let server = TestServer::new(router).expect("Failed to create test server");

        Self { server, db, source }
    }

    /// Log in and return the access token.
    pub async fn login(&self, email: &str) -> String {
        let response = self
            .server
            .post("/api/auth/login")
            .json(&json!({ "email": email }))
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        body["data"]["access_token"]
            .as_str()
            .expect("missing access token")
            .to_string()
    }

    /// Subscribe the token's user to `url` and return the feed ID.
    pub async fn subscribe(&self, token: &str, url: &str) -> i64 {
        let response = self
            .server
            .post("/api/feeds")
            .add_header(AUTHORIZATION, bearer(token))
            .json(&json!({ "url": url }))
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        body["data"]["feed"]["id"].as_i64().expect("missing feed id")
    }

    /// Force a sync of `feed_id` and return the response body.
    pub async fn force_sync(&self, token: &str, feed_id: i64) -> axum_test::TestResponse {
        self.server
            .put(&format!("/api/feeds/{}/force-sync", feed_id))
            .add_header(AUTHORIZATION, bearer(token))
            .await
    }

    /// List a feed's items with an optional filter.
    pub async fn items(&self, token: &str, feed_id: i64, filter: Option<&str>) -> Value {
        let path = match filter {
            Some(filter) => format!("/api/feeds/{}/items?filter={}", feed_id, filter),
            None => format!("/api/feeds/{}/items", feed_id),
        };
        let response = self
            .server
            .get(&path)
            .add_header(AUTHORIZATION, bearer(token))
            .await;
        response.assert_status_ok();
        response.json()
    }
}

/// Format a bearer authorization value.
pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}
