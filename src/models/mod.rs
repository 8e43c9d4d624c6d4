// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod activity;
pub mod filter;
pub mod identity;

pub use activity::{
    sort_newest_first, Activity, ActivityDraft, ActivityPatch, ActivityStatus, NewActivity,
    Region, SportType,
};
pub use filter::{ActivityFilter, TimeView};
pub use identity::Identity;
