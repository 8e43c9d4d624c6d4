// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access rules and preconditions for activity documents.
//!
//! These are the store-side equivalent of declarative security rules:
//! - anyone signed in may create a record, but only as its creator, with
//!   no one joined and status `active`;
//! - anyone signed in may join an active record that still has room;
//! - only the creator may update, close or delete a record.
//!
//! Each `plan_*` function is evaluated against a consistent read inside a
//! backend transaction and decides what, if anything, gets written.

use crate::db::Mutation;
use crate::error::AppError;
use crate::models::{Activity, ActivityDraft, ActivityPatch, ActivityStatus, Identity};

/// Validate a record about to be inserted.
pub fn check_create(actor: &Identity, draft: &ActivityDraft) -> Result<(), AppError> {
    if draft.creator_id != actor.id {
        return Err(AppError::Forbidden("create"));
    }
    if draft.current_joined != 0 || draft.status != ActivityStatus::Active {
        return Err(AppError::BadRequest(
            "new activities must start active with no one joined".to_string(),
        ));
    }
    if draft.max_spots == 0 {
        return Err(AppError::BadRequest("maxSpots must be at least 1".to_string()));
    }
    Ok(())
}

/// Reject anyone but the record's creator.
pub fn require_creator(
    actor: &Identity,
    activity: &Activity,
    action: &'static str,
) -> Result<(), AppError> {
    if activity.creator_id == actor.id {
        Ok(())
    } else {
        tracing::warn!(
            activity_id = %activity.id,
            actor = %actor.id,
            action,
            "Rejected non-creator mutation"
        );
        Err(AppError::Forbidden(action))
    }
}

/// Take one spot if the activity is active and not full.
pub fn plan_join(mut current: Activity) -> Result<Mutation, AppError> {
    if current.is_closed() {
        return Err(AppError::Closed);
    }
    if current.is_full() {
        return Err(AppError::Full);
    }
    current.current_joined += 1;
    Ok(Mutation::Write(current))
}

pub fn plan_close(actor: &Identity, mut current: Activity) -> Result<Mutation, AppError> {
    require_creator(actor, &current, "close")?;
    if current.is_closed() {
        return Ok(Mutation::Unchanged(current));
    }
    current.status = ActivityStatus::Closed;
    Ok(Mutation::Write(current))
}

pub fn plan_update(
    actor: &Identity,
    mut current: Activity,
    patch: &ActivityPatch,
) -> Result<Mutation, AppError> {
    require_creator(actor, &current, "update")?;
    if patch.is_empty() {
        return Ok(Mutation::Unchanged(current));
    }
    current.apply_patch(patch)?;
    Ok(Mutation::Write(current))
}

pub fn plan_delete(actor: &Identity, current: Activity) -> Result<Mutation, AppError> {
    require_creator(actor, &current, "delete")?;
    Ok(Mutation::Delete)
}
