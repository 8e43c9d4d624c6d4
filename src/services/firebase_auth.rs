// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firebase Authentication client (Identity Toolkit REST API).
//!
//! Handles:
//! - Email/password sign-in and sign-up
//! - Display name updates
//! - Classification of service error codes
//!
//! Set FIREBASE_AUTH_EMULATOR_HOST to talk to the Auth emulator.

use crate::error::{AuthError, AuthOperation};
use crate::models::Identity;
use crate::services::identity::IdentityProvider;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

const PRODUCTION_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Identity Toolkit client.
pub struct FirebaseAuthClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    /// ID tokens of signed-in accounts, needed for profile updates.
    /// Entries live until sign-out or [`IdentityProvider::release`].
    id_tokens: DashMap<String, String>,
    current: watch::Sender<Option<Identity>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateProfileRequest<'a> {
    id_token: &'a str,
    display_name: &'a str,
    return_secure_token: bool,
}

/// Account fields common to the sign-in, sign-up and update responses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    email: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
}

impl AccountResponse {
    fn into_identity(self) -> (Identity, Option<String>) {
        let identity = Identity {
            id: self.local_id,
            email: self.email,
            display_name: self.display_name.filter(|name| !name.is_empty()),
        };
        (identity, self.id_token)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Map an Identity Toolkit error code to a classified failure.
///
/// Codes may carry a suffix, e.g. `WEAK_PASSWORD : Password should be at
/// least 6 characters`.
pub fn classify_error(operation: AuthOperation, message: &str) -> AuthError {
    let code = message.split([' ', ':']).next().unwrap_or_default();
    match code {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            AuthError::InvalidCredentials
        }
        "INVALID_EMAIL" => AuthError::MalformedEmail,
        "EMAIL_EXISTS" => AuthError::EmailAlreadyRegistered,
        "WEAK_PASSWORD" => AuthError::WeakCredential,
        _ => AuthError::service(operation, message),
    }
}

impl FirebaseAuthClient {
    /// Create a client for the given Web API key.
    pub fn new(api_key: String) -> Self {
        let base_url = match std::env::var("FIREBASE_AUTH_EMULATOR_HOST") {
            Ok(host) => {
                tracing::info!(host = %host, "Using Firebase Auth emulator");
                format!("http://{}/identitytoolkit.googleapis.com/v1", host)
            }
            Err(_) => PRODUCTION_BASE_URL.to_string(),
        };
        Self::with_base_url(api_key, base_url)
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
            id_tokens: DashMap::new(),
            current,
        }
    }

    /// POST to an `accounts:*` endpoint and parse the account response.
    async fn call<B: Serialize>(
        &self,
        operation: AuthOperation,
        endpoint: &str,
        body: &B,
    ) -> Result<AccountResponse, AuthError> {
        let url = format!("{}/accounts:{}", self.base_url, endpoint);

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::service(operation, format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(envelope) => classify_error(operation, &envelope.error.message),
                Err(_) => AuthError::service(operation, format!("HTTP {}: {}", status, body)),
            });
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::service(operation, format!("JSON parse error: {}", e)))
    }

    fn signed_in(&self, response: AccountResponse) -> Identity {
        let (identity, id_token) = response.into_identity();
        if let Some(token) = id_token {
            self.id_tokens.insert(identity.id.clone(), token);
        }
        self.current.send_replace(Some(identity.clone()));
        identity
    }

    async fn password_call(
        &self,
        operation: AuthOperation,
        endpoint: &str,
        email: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let request = PasswordRequest {
            email: email.trim(),
            password,
            return_secure_token: true,
        };
        let response = self.call(operation, endpoint, &request).await?;
        Ok(self.signed_in(response))
    }
}

#[async_trait]
impl IdentityProvider for FirebaseAuthClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        self.password_call(AuthOperation::SignIn, "signInWithPassword", email, password)
            .await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let identity = self
            .password_call(AuthOperation::SignUp, "signUp", email, password)
            .await?;
        tracing::info!(user_id = %identity.id, "Firebase account created");
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let previous = self.current.send_replace(None);
        if let Some(identity) = previous {
            self.id_tokens.remove(&identity.id);
        }
        Ok(())
    }

    async fn update_profile(
        &self,
        identity: &Identity,
        display_name: &str,
    ) -> Result<Identity, AuthError> {
        let operation = AuthOperation::UpdateProfile;
        let id_token = self
            .id_tokens
            .get(&identity.id)
            .map(|token| token.value().clone())
            .ok_or_else(|| AuthError::service(operation, "no ID token for account"))?;

        let request = UpdateProfileRequest {
            id_token: &id_token,
            display_name,
            return_secure_token: true,
        };
        let response = self.call(operation, "update", &request).await?;
        let (mut updated, new_token) = response.into_identity();
        if updated.display_name.is_none() {
            updated.display_name = Some(display_name.to_string());
        }
        if let Some(token) = new_token {
            self.id_tokens.insert(updated.id.clone(), token);
        }

        self.current.send_if_modified(|current| match current {
            Some(signed_in) if signed_in.id == updated.id => {
                *signed_in = updated.clone();
                true
            }
            _ => false,
        });
        Ok(updated)
    }

    fn release(&self, identity: &Identity) {
        self.id_tokens.remove(&identity.id);
        self.current.send_if_modified(|current| {
            if current.as_ref().is_some_and(|c| c.id == identity.id) {
                *current = None;
                true
            } else {
                false
            }
        });
    }

    fn on_identity_change(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_credential_errors() {
        for code in ["EMAIL_NOT_FOUND", "INVALID_PASSWORD", "INVALID_LOGIN_CREDENTIALS"] {
            assert_eq!(
                classify_error(AuthOperation::SignIn, code),
                AuthError::InvalidCredentials
            );
        }
        assert_eq!(
            classify_error(AuthOperation::SignIn, "INVALID_EMAIL"),
            AuthError::MalformedEmail
        );
    }

    #[test]
    fn test_classify_sign_up_errors() {
        assert_eq!(
            classify_error(AuthOperation::SignUp, "EMAIL_EXISTS"),
            AuthError::EmailAlreadyRegistered
        );
        assert_eq!(
            classify_error(
                AuthOperation::SignUp,
                "WEAK_PASSWORD : Password should be at least 6 characters"
            ),
            AuthError::WeakCredential
        );
    }

    #[test]
    fn test_unknown_codes_stay_unclassified() {
        let err = classify_error(AuthOperation::SignUp, "TOO_MANY_ATTEMPTS_TRY_LATER");
        assert!(matches!(
            err,
            AuthError::Service {
                operation: AuthOperation::SignUp,
                ..
            }
        ));
        assert_eq!(err.user_message(), "註冊失敗");
    }

    #[test]
    fn test_account_response_parsing() {
        let json = r#"{
            "kind": "identitytoolkit#VerifyPasswordResponse",
            "localId": "uid-1",
            "email": "mei@example.com",
            "displayName": "",
            "idToken": "tok",
            "registered": true
        }"#;
        let response: AccountResponse = serde_json::from_str(json).unwrap();
        let (identity, token) = response.into_identity();
        assert_eq!(identity.id, "uid-1");
        assert_eq!(identity.display_name, None);
        assert_eq!(token.as_deref(), Some("tok"));
    }

    fn account(local_id: &str, token: &str) -> AccountResponse {
        AccountResponse {
            local_id: local_id.to_string(),
            email: format!("{}@example.com", local_id),
            display_name: None,
            id_token: Some(token.to_string()),
        }
    }

    #[test]
    fn test_release_drops_tokens_and_current_identity() {
        let client = FirebaseAuthClient::with_base_url("key".to_string(), "http://unused".into());
        let first = client.signed_in(account("uid-1", "tok-1"));
        let second = client.signed_in(account("uid-2", "tok-2"));
        assert_eq!(client.id_tokens.len(), 2);

        // Releasing an account that is no longer current leaves the
        // current identity alone.
        client.release(&first);
        assert_eq!(client.id_tokens.len(), 1);
        assert_eq!(*client.current.borrow(), Some(second.clone()));

        client.release(&second);
        assert!(client.id_tokens.is_empty());
        assert_eq!(*client.current.borrow(), None);
    }

    #[tokio::test]
    async fn test_update_profile_requires_token() {
        let client = FirebaseAuthClient::with_base_url("key".to_string(), "http://unused".into());
        let identity = Identity::new("uid-1", "mei@example.com");
        let err = client.update_profile(&identity, "Mei").await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::Service {
                operation: AuthOperation::UpdateProfile,
                ..
            }
        ));
    }
}
