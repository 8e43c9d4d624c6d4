// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity repository: the operations callers use on the activity
//! collection.
//!
//! Every mutation requires a signed-in identity. Input is validated here;
//! ownership and capacity rules are enforced by the store inside its
//! transactions, and store errors propagate unchanged.

use crate::db::ActivityStore;
use crate::error::AppError;
use crate::models::{Activity, ActivityPatch, Identity, NewActivity};
use crate::services::feed::ActivityFeed;
use std::sync::Arc;
use validator::Validate;

pub const DEFAULT_MAX_SPOTS_CEILING: u32 = 50;

#[derive(Clone)]
pub struct ActivityRepository {
    store: Arc<dyn ActivityStore>,
    max_spots_ceiling: u32,
}

fn require_identity(actor: Option<&Identity>) -> Result<&Identity, AppError> {
    actor.ok_or(AppError::Unauthenticated)
}

impl ActivityRepository {
    pub fn new(store: Arc<dyn ActivityStore>, max_spots_ceiling: u32) -> Self {
        Self {
            store,
            max_spots_ceiling,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub fn max_spots_ceiling(&self) -> u32 {
        self.max_spots_ceiling
    }

    fn check_ceiling(&self, max_spots: Option<u32>) -> Result<(), AppError> {
        match max_spots {
            Some(max_spots) if max_spots > self.max_spots_ceiling => {
                Err(AppError::BadRequest(format!(
                    "maxSpots cannot exceed {}",
                    self.max_spots_ceiling
                )))
            }
            _ => Ok(()),
        }
    }

    /// Open a continuous, newest-first view of all activities.
    pub async fn open_feed(&self) -> Result<ActivityFeed, AppError> {
        let subscription = self.store.subscribe().await?;
        tracing::debug!(backend = self.backend_name(), "Activity feed opened");
        Ok(ActivityFeed::new(subscription))
    }

    pub async fn get(&self, id: &str) -> Result<Activity, AppError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Activity {} not found", id)))
    }

    /// Publish a new activity owned by `actor`.
    pub async fn create(
        &self,
        actor: Option<&Identity>,
        data: NewActivity,
    ) -> Result<Activity, AppError> {
        let actor = require_identity(actor)?;
        let data = data.normalized();
        data.validate()?;
        self.check_ceiling(Some(data.max_spots))?;

        let activity = self.store.insert(actor, data.into_draft(&actor.id)).await?;
        tracing::info!(
            activity_id = %activity.id,
            creator = %actor.id,
            max_spots = activity.max_spots,
            "Activity created"
        );
        Ok(activity)
    }

    /// Take one spot in an activity.
    pub async fn join(&self, actor: Option<&Identity>, id: &str) -> Result<Activity, AppError> {
        let actor = require_identity(actor)?;
        match self.store.join(actor, id).await {
            Ok(activity) => {
                tracing::info!(
                    activity_id = id,
                    user_id = %actor.id,
                    remaining = activity.remaining_spots(),
                    "Joined activity"
                );
                Ok(activity)
            }
            Err(e) => {
                tracing::debug!(activity_id = id, user_id = %actor.id, error = %e, "Join rejected");
                Err(e)
            }
        }
    }

    /// Stop accepting sign-ups. Closing a closed activity is a no-op.
    pub async fn close(&self, actor: Option<&Identity>, id: &str) -> Result<Activity, AppError> {
        let actor = require_identity(actor)?;
        let activity = self.store.close(actor, id).await?;
        tracing::info!(activity_id = id, user_id = %actor.id, "Activity closed");
        Ok(activity)
    }

    pub async fn delete(&self, actor: Option<&Identity>, id: &str) -> Result<(), AppError> {
        let actor = require_identity(actor)?;
        self.store.delete(actor, id).await?;
        tracing::info!(activity_id = id, user_id = %actor.id, "Activity deleted");
        Ok(())
    }

    /// Edit descriptive fields. Counters, status and ownership are kept.
    pub async fn update(
        &self,
        actor: Option<&Identity>,
        id: &str,
        patch: ActivityPatch,
    ) -> Result<Activity, AppError> {
        let actor = require_identity(actor)?;
        let patch = patch.normalized();
        patch.validate()?;
        self.check_ceiling(patch.max_spots)?;

        let activity = self.store.update(actor, id, &patch).await?;
        tracing::info!(activity_id = id, user_id = %actor.id, "Activity updated");
        Ok(activity)
    }
}
