// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client-side list filtering: region, sport type and upcoming/history view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::{Activity, Region, SportType};

/// Which side of "now" to show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum TimeView {
    /// Activities whose time has not passed yet
    #[default]
    Upcoming,
    /// Activities whose time is in the past
    History,
}

/// Filter over the live activity list. Unset fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ActivityFilter {
    #[serde(default)]
    pub region: Option<Region>,
    #[serde(default, rename = "type")]
    pub sport_type: Option<SportType>,
    #[serde(default)]
    pub view: TimeView,
}

impl ActivityFilter {
    pub fn matches(&self, activity: &Activity, now: DateTime<Utc>) -> bool {
        let region_ok = self.region.is_none_or(|r| r == activity.region);
        let type_ok = self.sport_type.is_none_or(|t| t == activity.sport_type);
        let time_ok = match self.view {
            TimeView::Upcoming => !activity.is_past(now),
            TimeView::History => activity.is_past(now),
        };
        region_ok && type_ok && time_ok
    }

    /// Filter a snapshot, keeping its order.
    pub fn apply<'a>(
        &self,
        activities: impl IntoIterator<Item = &'a Activity>,
        now: DateTime<Utc>,
    ) -> Vec<Activity> {
        activities
            .into_iter()
            .filter(|a| self.matches(a, now))
            .cloned()
            .collect()
    }
}
