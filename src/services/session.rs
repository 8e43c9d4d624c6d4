// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Process-wide authentication session.
//!
//! The session state has a single writer: a listener task that mirrors the
//! identity provider's push channel. `login`, `register` and `logout` never
//! write the state themselves; they call the provider and then wait until
//! the pushed state reflects the outcome.

use crate::error::AuthError;
use crate::models::Identity;
use crate::services::identity::{register_account, IdentityProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// How long an operation waits for the provider to report the new state.
const STATE_SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Authentication state as last reported by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No report from the identity service yet
    #[default]
    Loading,
    SignedOut,
    SignedIn(Identity),
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::SignedIn(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading)
    }
}

impl From<Option<Identity>> for SessionState {
    fn from(identity: Option<Identity>) -> Self {
        match identity {
            Some(identity) => SessionState::SignedIn(identity),
            None => SessionState::SignedOut,
        }
    }
}

/// Authentication session bound to one identity provider.
pub struct Session {
    provider: Arc<dyn IdentityProvider>,
    state: watch::Receiver<SessionState>,
    last_error: watch::Sender<Option<AuthError>>,
    listener: JoinHandle<()>,
}

impl Session {
    /// Start mirroring the provider's identity channel.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(provider: Arc<dyn IdentityProvider>) -> Self {
        let (state_tx, state) = watch::channel(SessionState::Loading);
        let mut identities = provider.on_identity_change();

        let listener = tokio::spawn(async move {
            loop {
                let identity = identities.borrow_and_update().clone();
                state_tx.send_replace(identity.into());
                if identities.changed().await.is_err() {
                    tracing::debug!("Identity provider channel closed");
                    break;
                }
            }
        });

        let (last_error, _) = watch::channel(None);
        Self {
            provider,
            state,
            last_error,
            listener,
        }
    }

    /// Snapshot of the current state.
    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Current identity, if signed in.
    pub fn identity(&self) -> Option<Identity> {
        self.state.borrow().identity().cloned()
    }

    /// Wait until the identity service has reported at least once.
    pub async fn resolved(&self) -> SessionState {
        let mut state = self.state.clone();
        let resolved = match state.wait_for(|s| !s.is_loading()).await {
            Ok(resolved) => resolved.clone(),
            Err(_) => self.current(),
        };
        resolved
    }

    /// Receive every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// The most recent classified login or registration failure.
    pub fn last_error(&self) -> Option<AuthError> {
        self.last_error.borrow().clone()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.last_error.send_replace(None);

        let result = self.provider.sign_in(email, password).await;
        self.finish_sign_in(result).await
    }

    /// Create an account, attaching `display_name` before returning.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Identity, AuthError> {
        self.last_error.send_replace(None);

        let result = register_account(self.provider.as_ref(), email, password, display_name).await;
        self.finish_sign_in(result).await
    }

    /// Sign out. Failures are logged, never returned.
    pub async fn logout(&self) {
        match self.provider.sign_out().await {
            Ok(()) => {
                self.settle(|state| matches!(state, SessionState::SignedOut))
                    .await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Sign-out failed");
            }
        }
    }

    async fn finish_sign_in(
        &self,
        result: Result<Identity, AuthError>,
    ) -> Result<Identity, AuthError> {
        match result {
            Ok(identity) => {
                self.settle(|state| state.identity() == Some(&identity))
                    .await;
                tracing::info!(user_id = %identity.id, "Signed in");
                Ok(identity)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Authentication rejected");
                self.last_error.send_replace(Some(e.clone()));
                Err(e)
            }
        }
    }

    /// Wait for the pushed state to satisfy `done`, warning on timeout.
    async fn settle(&self, done: impl FnMut(&SessionState) -> bool) {
        let mut state = self.state.clone();
        match tokio::time::timeout(STATE_SETTLE_TIMEOUT, state.wait_for(done)).await {
            Ok(Ok(_)) => {}
            Ok(Err(_)) => tracing::warn!("Session listener stopped"),
            Err(_) => tracing::warn!(
                timeout_secs = STATE_SETTLE_TIMEOUT.as_secs(),
                "Identity service did not report the new state"
            ),
        };
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.listener.abort();
    }
}
