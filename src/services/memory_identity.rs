// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Process-local identity provider for development and tests.
//!
//! Accounts are keyed by lowercased email. Passwords are stored as
//! PBKDF2-HMAC-SHA256 hashes with a per-account random salt.

use crate::error::{AuthError, AuthOperation, MIN_PASSWORD_LEN};
use crate::ids;
use crate::models::Identity;
use crate::services::identity::IdentityProvider;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::num::NonZeroU32;
use tokio::sync::watch;
use validator::ValidateEmail;

const PBKDF2_ITERATIONS: u32 = 10_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

struct Account {
    identity: Identity,
    salt: [u8; SALT_LEN],
    hash: [u8; HASH_LEN],
}

fn iterations() -> NonZeroU32 {
    NonZeroU32::new(PBKDF2_ITERATIONS).unwrap_or(NonZeroU32::MIN)
}

fn hash_password(salt: &[u8], password: &str) -> [u8; HASH_LEN] {
    let mut hash = [0u8; HASH_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations(),
        salt,
        password.as_bytes(),
        &mut hash,
    );
    hash
}

fn account_key(email: &str) -> String {
    email.trim().to_lowercase()
}

/// In-memory accounts plus the signed-in identity.
pub struct MemoryIdentityProvider {
    accounts: DashMap<String, Account>,
    current: watch::Sender<Option<Identity>>,
    rng: SystemRandom,
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            accounts: DashMap::new(),
            current,
            rng: SystemRandom::new(),
        }
    }

    fn check_email(email: &str) -> Result<(), AuthError> {
        if email.trim().validate_email() {
            Ok(())
        } else {
            Err(AuthError::MalformedEmail)
        }
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        Self::check_email(email)?;

        let identity = {
            let account = self
                .accounts
                .get(&account_key(email))
                .ok_or(AuthError::InvalidCredentials)?;
            pbkdf2::verify(
                pbkdf2::PBKDF2_HMAC_SHA256,
                iterations(),
                &account.salt,
                password.as_bytes(),
                &account.hash,
            )
            .map_err(|_| AuthError::InvalidCredentials)?;
            account.identity.clone()
        };

        self.current.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        Self::check_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakCredential);
        }

        let mut salt = [0u8; SALT_LEN];
        self.rng
            .fill(&mut salt)
            .map_err(|_| AuthError::service(AuthOperation::SignUp, "System RNG failure"))?;
        let hash = hash_password(&salt, password);
        let id = ids::random_id()
            .map_err(|e| AuthError::service(AuthOperation::SignUp, e.to_string()))?;
        let identity = Identity::new(id, email.trim());

        match self.accounts.entry(account_key(email)) {
            Entry::Occupied(_) => return Err(AuthError::EmailAlreadyRegistered),
            Entry::Vacant(slot) => {
                slot.insert(Account {
                    identity: identity.clone(),
                    salt,
                    hash,
                });
            }
        }

        tracing::info!(user_id = %identity.id, "Account created");
        self.current.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.current.send_replace(None);
        Ok(())
    }

    async fn update_profile(
        &self,
        identity: &Identity,
        display_name: &str,
    ) -> Result<Identity, AuthError> {
        let updated = {
            let mut account = self
                .accounts
                .get_mut(&account_key(&identity.email))
                .filter(|account| account.identity.id == identity.id)
                .ok_or_else(|| {
                    AuthError::service(AuthOperation::UpdateProfile, "unknown account")
                })?;
            account.identity.display_name = Some(display_name.to_string());
            account.identity.clone()
        };

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
