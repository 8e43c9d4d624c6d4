// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Opaque document and account IDs.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::AppError;

// 15 random bytes encode to 20 URL-safe characters, the same length as
// Firestore auto-generated document IDs.
const ID_BYTES: usize = 15;

/// Generate a random, URL-safe opaque ID.
pub fn random_id() -> Result<String, AppError> {
    let mut bytes = [0u8; ID_BYTES];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("System RNG failure")))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
