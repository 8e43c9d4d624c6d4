// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SportLink: a sign-up board for pickup sports activities
//!
//! Signed-in users publish activities with a fixed number of spots, browse
//! and filter a live list, and join until an activity is full or closed by
//! its creator.

pub mod config;
pub mod db;
pub mod error;
pub mod ids;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::{ActivityFeed, ActivityRepository, IdentityProvider};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub repository: ActivityRepository,
    pub identity: Arc<dyn IdentityProvider>,
    /// Process-wide live view of the activity collection
    pub feed: ActivityFeed,
}
