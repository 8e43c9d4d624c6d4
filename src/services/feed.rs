// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live, whole-collection view of the activities.

use crate::db::{ActivitySnapshot, SnapshotReceiver, Subscription};
use crate::error::AppError;
use crate::models::{Activity, ActivityFilter};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Handle on a live activity subscription.
///
/// Each delivery replaces the previous snapshot entirely. The underlying
/// subscription is released when the last clone of the feed is dropped.
#[derive(Clone)]
pub struct ActivityFeed {
    subscription: Subscription,
    receiver: SnapshotReceiver,
}

impl ActivityFeed {
    pub fn new(subscription: Subscription) -> Self {
        let receiver = subscription.receiver();
        Self {
            subscription,
            receiver,
        }
    }

    /// Latest snapshot, or `None` while the first one is still loading.
    pub fn current(&self) -> Option<Arc<ActivitySnapshot>> {
        self.subscription.latest()
    }

    pub fn is_loading(&self) -> bool {
        self.current().is_none()
    }

    /// Filtered view of the latest snapshot, newest first.
    pub fn filtered(&self, filter: &ActivityFilter, now: DateTime<Utc>) -> Option<Vec<Activity>> {
        self.current()
            .map(|snapshot| filter.apply(&snapshot.activities, now))
    }

    /// Latest snapshot, marking it seen so [`changed`](Self::changed) only
    /// reports newer ones.
    pub fn take_latest(&mut self) -> Option<Arc<ActivitySnapshot>> {
        self.receiver.borrow_and_update().clone()
    }

    /// Wait for the next snapshot. Returns `None` once the source is gone.
    pub async fn changed(&mut self) -> Option<Arc<ActivitySnapshot>> {
        loop {
            self.receiver.changed().await.ok()?;
            if let Some(snapshot) = self.receiver.borrow_and_update().clone() {
                return Some(snapshot);
            }
        }
    }

    /// Wait until the first snapshot has arrived.
    pub async fn first_snapshot(&self) -> Result<Arc<ActivitySnapshot>, AppError> {
        let mut receiver = self.receiver.clone();
        let snapshot = receiver
            .wait_for(Option::is_some)
            .await
            .map_err(|_| AppError::Database("Activity subscription closed".to_string()))?
            .clone();
        snapshot.ok_or_else(|| AppError::Database("Activity subscription closed".to_string()))
    }

    /// Like [`first_snapshot`](Self::first_snapshot), but gives up with
    /// [`AppError::Loading`] after `timeout`.
    pub async fn ready_snapshot(&self, timeout: Duration) -> Result<Arc<ActivitySnapshot>, AppError> {
        tokio::time::timeout(timeout, self.first_snapshot())
            .await
            .map_err(|_| AppError::Loading)?
    }

    /// A fresh receiver for streaming snapshots to a client.
    pub fn receiver(&self) -> SnapshotReceiver {
        self.receiver.clone()
    }
}
