// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Email/password authentication routes.
//!
//! Credentials are checked by the identity service; on success the server
//! issues its own session JWT, returned in the body and as an HttpOnly
//! cookie.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, SESSION_COOKIE, SESSION_TTL_SECS};
use crate::models::Identity;
use crate::services::register_account;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthResponse {
    pub token: String,
    pub user: Identity,
}

/// Secure cookies everywhere except a local dev frontend served over http.
fn is_local_frontend(config: &Config) -> bool {
    config.frontend_url.starts_with("http://localhost")
        || config.frontend_url.starts_with("http://127.0.0.1")
}

fn session_cookie(config: &Config, value: String, max_age: time::Duration) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(!is_local_frontend(config))
        .max_age(max_age)
        .build()
}

fn start_session(
    state: &AppState,
    jar: CookieJar,
    identity: Identity,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    // The JWT is the session from here on.
    state.identity.release(&identity);
    let token = create_jwt(&identity, &state.config.jwt_signing_key)?;
    let cookie = session_cookie(
        &state.config,
        token.clone(),
        time::Duration::seconds(SESSION_TTL_SECS as i64),
    );
    Ok((
        jar.add(cookie),
        Json(AuthResponse {
            token,
            user: identity,
        }),
    ))
}

/// Create an account and sign in.
async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>)> {
    let identity = register_account(
        state.identity.as_ref(),
        &request.email,
        &request.password,
        request.display_name.as_deref(),
    )
    .await
    .map_err(|e| {
        tracing::info!(error = %e, "Registration rejected");
        AppError::from(e)
    })?;

    tracing::info!(user_id = %identity.id, "User registered");
    let (jar, body) = start_session(&state, jar, identity)?;
    Ok((StatusCode::CREATED, jar, body))
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let identity = state
        .identity
        .sign_in(&request.email, &request.password)
        .await
        .map_err(|e| {
            tracing::info!(error = %e, "Login rejected");
            AppError::from(e)
        })?;

    tracing::info!(user_id = %identity.id, "User logged in");
    start_session(&state, jar, identity)
}

/// Clear the session cookie. Always succeeds.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (StatusCode, CookieJar) {
    let removal = session_cookie(&state.config, String::new(), time::Duration::ZERO);
    (StatusCode::NO_CONTENT, jar.add(removal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_secure_outside_localhost() {
        let mut config = Config::test_default();
        let cookie = session_cookie(&config, "t".to_string(), time::Duration::ZERO);
        assert_eq!(cookie.secure(), Some(false));

        config.frontend_url = "https://sportlink.example.com".to_string();
        let cookie = session_cookie(&config, "t".to_string(), time::Duration::ZERO);
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
    }
}
