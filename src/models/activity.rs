// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-up activity model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

use crate::error::AppError;

/// Kind of sport an activity is organized around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum SportType {
    Badminton,
    Basketball,
    Volleyball,
    Fitness,
    Running,
}

impl SportType {
    pub const ALL: [SportType; 5] = [
        SportType::Badminton,
        SportType::Basketball,
        SportType::Volleyball,
        SportType::Fitness,
        SportType::Running,
    ];

    /// Label shown in the sign-up board.
    pub fn label(self) -> &'static str {
        match self {
            SportType::Badminton => "羽球",
            SportType::Basketball => "籃球",
            SportType::Volleyball => "排球",
            SportType::Fitness => "健身",
            SportType::Running => "跑步",
        }
    }
}

/// Region an activity takes place in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Region {
    Taipei,
    NewTaipei,
    Taoyuan,
    Taichung,
}

impl Region {
    pub const ALL: [Region; 4] = [
        Region::Taipei,
        Region::NewTaipei,
        Region::Taoyuan,
        Region::Taichung,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Region::Taipei => "台北市",
            Region::NewTaipei => "新北市",
            Region::Taoyuan => "桃園市",
            Region::Taichung => "台中市",
        }
    }
}

/// Lifecycle status. Only ever moves from `Active` to `Closed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum ActivityStatus {
    #[default]
    Active,
    Closed,
}

/// Stored activity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Activity {
    /// Store-assigned ID (also used as document ID)
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub sport_type: SportType,
    pub region: Region,
    /// When the activity takes place
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub time: DateTime<Utc>,
    pub location: String,
    /// Fee in whole currency units
    pub fee: u32,
    pub max_spots: u32,
    #[serde(default)]
    pub current_joined: u32,
    /// Organizer contact (Line ID, phone, ...)
    pub contact: String,
    #[serde(default)]
    pub contact_name: String,
    /// Identity that created the record
    pub creator_id: String,
    #[serde(default)]
    pub status: ActivityStatus,
    /// Store-assigned creation time, used for default ordering
    #[serde(with = "firestore::serialize_as_timestamp")]
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
}

impl Activity {
    pub fn is_full(&self) -> bool {
        self.current_joined >= self.max_spots
    }

    pub fn is_closed(&self) -> bool {
        self.status == ActivityStatus::Closed
    }

    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        self.time < now
    }

    pub fn remaining_spots(&self) -> u32 {
        self.max_spots.saturating_sub(self.current_joined)
    }

    /// Whether a join attempt could currently succeed.
    pub fn is_open_for_join(&self) -> bool {
        !self.is_closed() && !self.is_full()
    }

    /// Merge the descriptive fields of `patch` into this record.
    ///
    /// `current_joined`, `status`, `creator_id` and `created_at` are never
    /// touched. Fails without modifying `self` if the new capacity would drop
    /// below the number of people already signed up.
    pub fn apply_patch(&mut self, patch: &ActivityPatch) -> Result<(), AppError> {
        if let Some(max_spots) = patch.max_spots {
            if max_spots < self.current_joined {
                return Err(AppError::BadRequest(format!(
                    "maxSpots ({}) cannot be lower than currentJoined ({})",
                    max_spots, self.current_joined
                )));
            }
        }

        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(sport_type) = patch.sport_type {
            self.sport_type = sport_type;
        }
        if let Some(region) = patch.region {
            self.region = region;
        }
        if let Some(time) = patch.time {
            self.time = time;
        }
        if let Some(location) = &patch.location {
            self.location = location.clone();
        }
        if let Some(fee) = patch.fee {
            self.fee = fee;
        }
        if let Some(max_spots) = patch.max_spots {
            self.max_spots = max_spots;
        }
        if let Some(contact) = &patch.contact {
            self.contact = contact.clone();
        }
        if let Some(contact_name) = &patch.contact_name {
            self.contact_name = contact_name.clone();
        }
        Ok(())
    }
}

/// Sort activities newest first by `created_at`, ties broken by ID.
pub fn sort_newest_first(activities: &mut [Activity]) {
    activities.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

/// Payload for creating an activity.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct NewActivity {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[serde(rename = "type")]
    pub sport_type: SportType,
    pub region: Region,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub time: DateTime<Utc>,
    #[validate(length(min = 1, max = 200))]
    pub location: String,
    #[serde(default)]
    pub fee: u32,
    #[validate(range(min = 1))]
    pub max_spots: u32,
    #[validate(length(min = 1, max = 100))]
    pub contact: String,
    #[validate(length(min = 1, max = 50))]
    pub contact_name: String,
}

impl NewActivity {
    /// Trim surrounding whitespace so blank fields fail validation.
    pub fn normalized(mut self) -> Self {
        trim_in_place(&mut self.title);
        trim_in_place(&mut self.location);
        trim_in_place(&mut self.contact);
        trim_in_place(&mut self.contact_name);
        self
    }

    /// Build the record to hand to the store.
    pub fn into_draft(self, creator_id: &str) -> ActivityDraft {
        ActivityDraft {
            title: self.title,
            sport_type: self.sport_type,
            region: self.region,
            time: self.time,
            location: self.location,
            fee: self.fee,
            max_spots: self.max_spots,
            current_joined: 0,
            contact: self.contact,
            contact_name: self.contact_name,
            creator_id: creator_id.to_string(),
            status: ActivityStatus::Active,
        }
    }
}

/// An activity that has not been stored yet: no ID, no creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityDraft {
    pub title: String,
    pub sport_type: SportType,
    pub region: Region,
    pub time: DateTime<Utc>,
    pub location: String,
    pub fee: u32,
    pub max_spots: u32,
    pub current_joined: u32,
    pub contact: String,
    pub contact_name: String,
    pub creator_id: String,
    pub status: ActivityStatus,
}

impl ActivityDraft {
    pub fn into_activity(self, id: String, created_at: DateTime<Utc>) -> Activity {
        Activity {
            id,
            title: self.title,
            sport_type: self.sport_type,
            region: self.region,
            time: self.time,
            location: self.location,
            fee: self.fee,
            max_spots: self.max_spots,
            current_joined: self.current_joined,
            contact: self.contact,
            contact_name: self.contact_name,
            creator_id: self.creator_id,
            status: self.status,
            created_at,
        }
    }
}

/// Partial update of an activity's descriptive fields.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ActivityPatch {
    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub sport_type: Option<SportType>,
    pub region: Option<Region>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string | null"))]
    pub time: Option<DateTime<Utc>>,
    #[validate(length(min = 1, max = 200))]
    pub location: Option<String>,
    pub fee: Option<u32>,
    #[validate(range(min = 1))]
    pub max_spots: Option<u32>,
    #[validate(length(min = 1, max = 100))]
    pub contact: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub contact_name: Option<String>,
}

impl ActivityPatch {
    pub fn normalized(mut self) -> Self {
        for field in [
            &mut self.title,
            &mut self.location,
            &mut self.contact,
            &mut self.contact_name,
        ]
        .into_iter()
        .flatten()
        {
            trim_in_place(field);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.sport_type.is_none()
            && self.region.is_none()
            && self.time.is_none()
            && self.location.is_none()
            && self.fee.is_none()
            && self.max_spots.is_none()
            && self.contact.is_none()
            && self.contact_name.is_none()
    }
}

fn trim_in_place(value: &mut String) {
    let trimmed = value.trim();
    if trimmed.len() != value.len() {
        *value = trimmed.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_activity(current_joined: u32, max_spots: u32) -> Activity {
        Activity {
            id: "a1".to_string(),
            title: "熱血羽球團".to_string(),
            sport_type: SportType::Badminton,
            region: Region::Taipei,
            time: Utc.with_ymd_and_hms(2026, 11, 1, 19, 0, 0).unwrap(),
            location: "大安運動中心".to_string(),
            fee: 150,
            max_spots,
            current_joined,
            contact: "Line ID: sport123".to_string(),
            contact_name: "Amy".to_string(),
            creator_id: "creator".to_string(),
            status: ActivityStatus::Active,
            created_at: Utc.with_ymd_and_hms(2026, 10, 1, 8, 0, 0).unwrap(),
        }
    }

    fn new_activity() -> NewActivity {
        NewActivity {
            title: "  Morning run  ".to_string(),
            sport_type: SportType::Running,
            region: Region::Taichung,
            time: Utc.with_ymd_and_hms(2026, 11, 2, 6, 0, 0).unwrap(),
            location: "Park".to_string(),
            fee: 0,
            max_spots: 4,
            contact: "0912-345-678".to_string(),
            contact_name: "Ben".to_string(),
        }
    }

    #[test]
    fn test_capacity_predicates() {
        let activity = make_activity(3, 4);
        assert!(!activity.is_full());
        assert_eq!(activity.remaining_spots(), 1);
        assert!(activity.is_open_for_join());

        let activity = make_activity(4, 4);
        assert!(activity.is_full());
        assert_eq!(activity.remaining_spots(), 0);
        assert!(!activity.is_open_for_join());
    }

    #[test]
    fn test_closed_activity_is_not_open_for_join() {
        let mut activity = make_activity(0, 4);
        activity.status = ActivityStatus::Closed;
        assert!(activity.is_closed());
        assert!(!activity.is_open_for_join());
    }

    #[test]
    fn test_is_past() {
        let activity = make_activity(0, 4);
        assert!(activity.is_past(Utc.with_ymd_and_hms(2026, 11, 2, 0, 0, 0).unwrap()));
        assert!(!activity.is_past(Utc.with_ymd_and_hms(2026, 10, 31, 0, 0, 0).unwrap()));
        // An activity starting exactly now is still upcoming
        assert!(!activity.is_past(activity.time));
    }

    #[test]
    fn test_apply_patch_keeps_counters_and_owner() {
        let mut activity = make_activity(2, 4);
        let patch = ActivityPatch {
            title: Some("New title".to_string()),
            fee: Some(0),
            ..Default::default()
        };

        activity.apply_patch(&patch).unwrap();

        assert_eq!(activity.title, "New title");
        assert_eq!(activity.fee, 0);
        assert_eq!(activity.current_joined, 2);
        assert_eq!(activity.creator_id, "creator");
        assert_eq!(activity.status, ActivityStatus::Active);
        assert_eq!(activity.location, "大安運動中心");
    }

    #[test]
    fn test_apply_patch_rejects_capacity_below_joined() {
        let mut activity = make_activity(3, 4);
        let before = activity.clone();
        let patch = ActivityPatch {
            title: Some("ignored".to_string()),
            max_spots: Some(2),
            ..Default::default()
        };

        let err = activity.apply_patch(&patch).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(activity, before);
    }

    #[test]
    fn test_new_activity_normalization_and_validation() {
        let input = new_activity().normalized();
        assert_eq!(input.title, "Morning run");
        assert!(input.validate().is_ok());

        let mut blank = new_activity();
        blank.location = "   ".to_string();
        assert!(blank.normalized().validate().is_err());

        let mut zero_spots = new_activity();
        zero_spots.max_spots = 0;
        assert!(zero_spots.validate().is_err());
    }

    #[test]
    fn test_into_draft_sets_initial_state() {
        let draft = new_activity().into_draft("creator-1");
        assert_eq!(draft.current_joined, 0);
        assert_eq!(draft.status, ActivityStatus::Active);
        assert_eq!(draft.creator_id, "creator-1");

        let created_at = Utc.with_ymd_and_hms(2026, 10, 15, 0, 0, 0).unwrap();
        let activity = draft.into_activity("id-1".to_string(), created_at);
        assert_eq!(activity.id, "id-1");
        assert_eq!(activity.created_at, created_at);
    }

    #[test]
    fn test_patch_validation_and_emptiness() {
        assert!(ActivityPatch::default().is_empty());

        let patch = ActivityPatch {
            title: Some("  ".to_string()),
            ..Default::default()
        }
        .normalized();
        assert!(!patch.is_empty());
        assert!(patch.validate().is_err());
    }

    #[test]
    fn test_wire_format_matches_document_fields() {
        let json = serde_json::to_value(make_activity(1, 4)).unwrap();
        assert_eq!(json["type"], "badminton");
        assert_eq!(json["region"], "taipei");
        assert_eq!(json["maxSpots"], 4);
        assert_eq!(json["currentJoined"], 1);
        assert_eq!(json["creatorId"], "creator");
        assert_eq!(json["status"], "active");
        assert!(json.get("createdAt").is_some());
    }

    #[test]
    fn test_sort_newest_first() {
        let mut older = make_activity(0, 4);
        older.id = "older".to_string();
        let mut newer = make_activity(0, 4);
        newer.id = "newer".to_string();
        newer.created_at = older.created_at + chrono::Duration::minutes(5);

        let mut list = vec![older, newer];
        sort_newest_first(&mut list);
        assert_eq!(list[0].id, "newer");
        assert_eq!(list[1].id, "older");
    }

    #[test]
    fn test_labels_cover_closed_sets() {
        assert_eq!(SportType::ALL.len(), 5);
        assert_eq!(Region::ALL.len(), 4);
        assert_eq!(SportType::Badminton.label(), "羽球");
        assert_eq!(Region::NewTaipei.label(), "新北市");
    }
}
