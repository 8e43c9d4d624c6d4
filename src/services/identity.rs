// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity service boundary.

use crate::error::AuthError;
use crate::models::Identity;
use async_trait::async_trait;
use tokio::sync::watch;

/// External identity service: password sign-in, sign-up, sign-out and
/// profile updates, plus a push channel reporting the signed-in identity.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Attach a display name to an account and return the updated identity.
    async fn update_profile(
        &self,
        identity: &Identity,
        display_name: &str,
    ) -> Result<Identity, AuthError>;

    /// Forget everything held for `identity` after a one-shot sign-in:
    /// cached credentials are dropped and, if it is the current identity,
    /// the provider reports signed out. Used by the HTTP server, which
    /// hands out its own session tokens.
    fn release(&self, identity: &Identity);

    /// Current identity, pushed on every change. The receiver holds the
    /// current value as soon as it is created.
    fn on_identity_change(&self) -> watch::Receiver<Option<Identity>>;
}

/// Create an account and attach the optional display name.
///
/// The identity returned carries the display name, so callers never observe
/// a freshly registered account without it.
pub async fn register_account(
    provider: &dyn IdentityProvider,
    email: &str,
    password: &str,
    display_name: Option<&str>,
) -> Result<Identity, AuthError> {
    let identity = provider.sign_up(email, password).await?;

    match display_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => provider.update_profile(&identity, name).await,
        None => Ok(identity),
    }
}
