// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request};
use chrono::{Duration, Utc};
use sportlink::config::Config;
use sportlink::db::{FirestoreDb, MemoryStore};
use sportlink::middleware::auth::create_jwt;
use sportlink::models::{Identity, NewActivity, Region, SportType};
use sportlink::routes::create_router;
use sportlink::services::{ActivityRepository, MemoryIdentityProvider};
use sportlink::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection under a fresh app namespace.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    let app_id = format!("test-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default());
    FirestoreDb::new("test-project", &app_id)
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Repository over a fresh in-memory store.
#[allow(dead_code)]
pub fn memory_repository() -> ActivityRepository {
    ActivityRepository::new(
        Arc::new(MemoryStore::new()),
        Config::test_default().max_spots_ceiling,
    )
}

/// Create a test app with in-memory backends.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub async fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let repository = memory_repository();
    let feed = repository.open_feed().await.expect("memory feed");

    let state = Arc::new(AppState {
        config,
        repository,
        identity: Arc::new(MemoryIdentityProvider::new()),
        feed,
    });

    (create_router(state.clone()), state)
}

#[allow(dead_code)]
pub fn user(id: &str) -> Identity {
    Identity::new(id, format!("{}@example.com", id))
}

/// Signed session token for `identity` using the test config's key.
#[allow(dead_code)]
pub fn create_test_jwt(identity: &Identity) -> String {
    create_jwt(identity, &Config::test_default().jwt_signing_key).expect("jwt")
}

/// An activity a week from now with `max_spots` places.
#[allow(dead_code)]
pub fn new_activity(title: &str, max_spots: u32) -> NewActivity {
    NewActivity {
        title: title.to_string(),
        sport_type: SportType::Badminton,
        region: Region::Taichung,
        time: Utc::now() + Duration::days(7),
        location: "Community gym".to_string(),
        fee: 120,
        max_spots,
        contact: "0912-345-678".to_string(),
        contact_name: "Chen".to_string(),
    }
}

/// Build a JSON request, authenticated as `identity` if given.
#[allow(dead_code)]
pub fn json_request(
    method: &str,
    uri: &str,
    identity: Option<&Identity>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(identity) = identity {
        builder = builder.header(
            header::AUTHORIZATION,
            format!("Bearer {}", create_test_jwt(identity)),
        );
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
