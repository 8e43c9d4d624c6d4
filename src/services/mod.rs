// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - session, identity and activity operations.

pub mod feed;
pub mod firebase_auth;
pub mod identity;
pub mod memory_identity;
pub mod repository;
pub mod session;

pub use feed::ActivityFeed;
pub use firebase_auth::FirebaseAuthClient;
pub use identity::{register_account, IdentityProvider};
pub use memory_identity::MemoryIdentityProvider;
pub use repository::{ActivityRepository, DEFAULT_MAX_SPOTS_CEILING};
pub use session::{Session, SessionState};
