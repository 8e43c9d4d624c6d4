// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Document store layer.
//!
//! The [`ActivityStore`] trait is the boundary to the transactional
//! document store. Access rules ([`rules`]) are enforced behind it, inside
//! each backend's transaction, so callers cannot bypass them.

pub mod firestore;
pub mod memory;
pub mod rules;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{sort_newest_first, Activity, ActivityDraft, ActivityPatch, Identity};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};

/// Collection path segments: `artifacts/{app_id}/public/data/activities`.
pub mod collections {
    pub const ARTIFACTS: &str = "artifacts";
    pub const PUBLIC: &str = "public";
    pub const DATA: &str = "data";
    pub const ACTIVITIES: &str = "activities";
}

/// Upper bound on optimistic transaction attempts before giving up.
///
/// An attempt fails only when another write to the same document (a join,
/// an edit or a close) committed first, so this bounds how many concurrent
/// writers one call may lose to. Kept above the default spots ceiling.
pub const MAX_TRANSACTION_ATTEMPTS: u32 = 64;

/// A complete, ordered view of the activity collection.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivitySnapshot {
    /// Monotonic per-subscription counter
    pub sequence: u64,
    /// All activities, newest `created_at` first
    pub activities: Vec<Activity>,
}

impl ActivitySnapshot {
    pub fn new(sequence: u64, mut activities: Vec<Activity>) -> Self {
        sort_newest_first(&mut activities);
        Self {
            sequence,
            activities,
        }
    }
}

/// Receiving side of a snapshot stream. `None` until the first snapshot.
pub type SnapshotReceiver = watch::Receiver<Option<Arc<ActivitySnapshot>>>;

/// Live subscription to the activity collection.
///
/// Clones share the same underlying listener, which is released when the
/// last clone is dropped.
#[derive(Clone)]
pub struct Subscription {
    receiver: SnapshotReceiver,
    _release: Option<Arc<oneshot::Sender<()>>>,
}

impl Subscription {
    /// Subscription whose listener stops once `release` is dropped.
    pub fn new(receiver: SnapshotReceiver, release: Option<oneshot::Sender<()>>) -> Self {
        Self {
            receiver,
            _release: release.map(Arc::new),
        }
    }

    pub fn receiver(&self) -> SnapshotReceiver {
        self.receiver.clone()
    }

    pub fn latest(&self) -> Option<Arc<ActivitySnapshot>> {
        self.receiver.borrow().clone()
    }
}

/// Result of evaluating an operation against the current document.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Nothing to write; the document is returned as read
    Unchanged(Activity),
    /// Replace the document with this version
    Write(Activity),
    /// Remove the document
    Delete,
}

/// Transactional document store holding the activity collection.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Store a new record, assigning its ID and creation time.
    async fn insert(&self, actor: &Identity, draft: ActivityDraft) -> Result<Activity, AppError>;

    /// Read one record.
    async fn get(&self, id: &str) -> Result<Option<Activity>, AppError>;

    /// Merge descriptive fields into a record (creator only).
    async fn update(
        &self,
        actor: &Identity,
        id: &str,
        patch: &ActivityPatch,
    ) -> Result<Activity, AppError>;

    /// Mark a record closed (creator only). Closing twice is a no-op.
    async fn close(&self, actor: &Identity, id: &str) -> Result<Activity, AppError>;

    /// Permanently remove a record (creator only).
    async fn delete(&self, actor: &Identity, id: &str) -> Result<(), AppError>;

    /// Take one spot, atomically with respect to concurrent joins.
    async fn join(&self, actor: &Identity, id: &str) -> Result<Activity, AppError>;

    /// Open a live subscription delivering whole-collection snapshots.
    async fn subscribe(&self) -> Result<Subscription, AppError>;

    fn backend_name(&self) -> &'static str;
}

pub(crate) fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Activity {} not found", id))
}
