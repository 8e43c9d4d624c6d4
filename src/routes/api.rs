// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::db::ActivitySnapshot;
use crate::error::Result;
use crate::models::{Activity, ActivityFilter, ActivityPatch, Identity, NewActivity};
use crate::services::ActivityFeed;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use futures_util::stream::{self, Stream};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// How long a list request waits for the first snapshot.
const FEED_READY_TIMEOUT: Duration = Duration::from_secs(2);

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route(
            "/api/activities",
            get(list_activities).post(create_activity),
        )
        .route("/api/activities/stream", get(stream_activities))
        .route(
            "/api/activities/{id}",
            get(get_activity)
                .put(update_activity)
                .delete(delete_activity),
        )
        .route("/api/activities/{id}/join", post(join_activity))
        .route("/api/activities/{id}/close", post(close_activity))
}

// ─── User Profile ────────────────────────────────────────────

async fn get_me(Extension(user): Extension<Identity>) -> Json<Identity> {
    Json(user)
}

// ─── Activity List ───────────────────────────────────────────

/// Filtered view of one snapshot.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActivityListResponse {
    pub activities: Vec<Activity>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub sequence: u64,
    /// Time the upcoming/history split was evaluated at
    pub evaluated_at: String,
}

impl ActivityListResponse {
    fn from_snapshot(snapshot: &ActivitySnapshot, filter: &ActivityFilter) -> Self {
        let now = Utc::now();
        Self {
            activities: filter.apply(&snapshot.activities, now),
            sequence: snapshot.sequence,
            evaluated_at: format_utc_rfc3339(now),
        }
    }
}

/// List activities matching the filter, newest first.
async fn list_activities(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ActivityFilter>,
) -> Result<Json<ActivityListResponse>> {
    let snapshot = state.feed.ready_snapshot(FEED_READY_TIMEOUT).await?;
    Ok(Json(ActivityListResponse::from_snapshot(&snapshot, &filter)))
}

/// Push a filtered list every time the collection changes.
async fn stream_activities(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ActivityFilter>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    tracing::debug!(?filter, "Activity stream opened");
    Sse::new(snapshot_events(state.feed.clone(), filter)).keep_alive(KeepAlive::default())
}

fn snapshot_events(
    feed: ActivityFeed,
    filter: ActivityFilter,
) -> impl Stream<Item = std::result::Result<Event, Infallible>> {
    stream::unfold((feed, true), move |(mut feed, first)| async move {
        let latest = if first { feed.take_latest() } else { None };
        let snapshot = match latest {
            Some(snapshot) => snapshot,
            None => feed.changed().await?,
        };

        let body = ActivityListResponse::from_snapshot(&snapshot, &filter);
        let event = Event::default()
            .event("snapshot")
            .id(snapshot.sequence.to_string())
            .json_data(&body)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to encode snapshot event");
                Event::default().comment("encoding error")
            });
        Some((Ok(event), (feed, false)))
    })
}

// ─── Activity Operations ─────────────────────────────────────

async fn create_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<Identity>,
    Json(data): Json<NewActivity>,
) -> Result<(StatusCode, Json<Activity>)> {
    let activity = state.repository.create(Some(&user), data).await?;
    Ok((StatusCode::CREATED, Json(activity)))
}

async fn get_activity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Activity>> {
    Ok(Json(state.repository.get(&id).await?))
}

async fn update_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<Identity>,
    Path(id): Path<String>,
    Json(patch): Json<ActivityPatch>,
) -> Result<Json<Activity>> {
    Ok(Json(state.repository.update(Some(&user), &id, patch).await?))
}

async fn delete_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.repository.delete(Some(&user), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn join_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<Activity>> {
    Ok(Json(state.repository.join(Some(&user), &id).await?))
}

async fn close_activity(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<Json<Activity>> {
    Ok(Json(state.repository.close(Some(&user), &id).await?))
}
