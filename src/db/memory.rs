// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory activity store.
//!
//! Used for local development and tests. State is lost on restart and is
//! not shared between processes.
//!
//! Mutations use the same optimistic protocol as a remote transactional
//! store: read a versioned document, evaluate the rules against it without
//! holding the lock, then commit only if the version is unchanged, retrying
//! otherwise. Snapshots are published while the write lock is held, so
//! subscribers see them in commit order.

use crate::db::{
    not_found, rules, ActivitySnapshot, ActivityStore, Mutation, Subscription,
    MAX_TRANSACTION_ATTEMPTS,
};
use crate::error::AppError;
use crate::ids;
use crate::models::{Activity, ActivityDraft, ActivityPatch, Identity};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

#[derive(Debug, Clone)]
struct VersionedDoc {
    version: u64,
    activity: Activity,
}

#[derive(Debug, Default)]
struct State {
    docs: HashMap<String, VersionedDoc>,
    next_version: u64,
    sequence: u64,
    last_created_at: Option<DateTime<Utc>>,
}

impl State {
    fn bump_version(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }

    /// Server time for a new record, strictly increasing across inserts.
    fn assign_created_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let created_at = match self.last_created_at {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_created_at = Some(created_at);
        created_at
    }

    fn snapshot(&mut self) -> Arc<ActivitySnapshot> {
        self.sequence += 1;
        let activities = self.docs.values().map(|d| d.activity.clone()).collect();
        Arc::new(ActivitySnapshot::new(self.sequence, activities))
    }
}

/// Process-local activity store.
pub struct MemoryStore {
    state: RwLock<State>,
    snapshots: watch::Sender<Option<Arc<ActivitySnapshot>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (snapshots, _) = watch::channel(Some(Arc::new(ActivitySnapshot::new(0, Vec::new()))));
        Self {
            state: RwLock::new(State::default()),
            snapshots,
        }
    }

    fn publish(&self, state: &mut State) {
        self.snapshots.send_replace(Some(state.snapshot()));
    }

    /// Run `plan` against the current document and commit its result if no
    /// other writer got there first.
    async fn transact<F>(&self, id: &str, mut plan: F) -> Result<Option<Activity>, AppError>
    where
        F: FnMut(Activity) -> Result<Mutation, AppError> + Send,
    {
        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            let read = {
                let state = self.state.read().await;
                state.docs.get(id).cloned()
            };
            let Some(read) = read else {
                return Err(not_found(id));
            };

            let mutation = plan(read.activity)?;

            let mut state = self.state.write().await;
            let unchanged = state
                .docs
                .get(id)
                .is_some_and(|doc| doc.version == read.version);
            if !unchanged {
                tracing::debug!(activity_id = id, attempt, "Transaction conflict, retrying");
                continue;
            }

            let result = match mutation {
                Mutation::Unchanged(activity) => return Ok(Some(activity)),
                Mutation::Write(activity) => {
                    let version = state.bump_version();
                    state.docs.insert(
                        id.to_string(),
                        VersionedDoc {
                            version,
                            activity: activity.clone(),
                        },
                    );
                    Some(activity)
                }
                Mutation::Delete => {
                    state.docs.remove(id);
                    None
                }
            };
            self.publish(&mut state);
            return Ok(result);
        }

        tracing::error!(activity_id = id, "Transaction retries exhausted");
        Err(AppError::Database(format!(
            "Transaction on activity {} did not commit after {} attempts",
            id, MAX_TRANSACTION_ATTEMPTS
        )))
    }
}

fn expect_document(id: &str, result: Option<Activity>) -> Result<Activity, AppError> {
    result.ok_or_else(|| not_found(id))
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn insert(&self, actor: &Identity, draft: ActivityDraft) -> Result<Activity, AppError> {
        rules::check_create(actor, &draft)?;
        let id = ids::random_id()?;

        let mut state = self.state.write().await;
        let activity = draft.into_activity(id.clone(), state.assign_created_at());
        let version = state.bump_version();
        state.docs.insert(
            id,
            VersionedDoc {
                version,
                activity: activity.clone(),
            },
        );
        self.publish(&mut state);
        Ok(activity)
    }

    async fn get(&self, id: &str) -> Result<Option<Activity>, AppError> {
        let state = self.state.read().await;
        Ok(state.docs.get(id).map(|doc| doc.activity.clone()))
    }

    async fn update(
        &self,
        actor: &Identity,
        id: &str,
        patch: &ActivityPatch,
    ) -> Result<Activity, AppError> {
        let result = self
            .transact(id, |current| rules::plan_update(actor, current, patch))
            .await?;
        expect_document(id, result)
    }

    async fn close(&self, actor: &Identity, id: &str) -> Result<Activity, AppError> {
        let result = self
            .transact(id, |current| rules::plan_close(actor, current))
            .await?;
        expect_document(id, result)
    }

    async fn delete(&self, actor: &Identity, id: &str) -> Result<(), AppError> {
        self.transact(id, |current| rules::plan_delete(actor, current))
            .await?;
        Ok(())
    }

    async fn join(&self, actor: &Identity, id: &str) -> Result<Activity, AppError> {
        let result = self.transact(id, rules::plan_join).await?;
        let activity = expect_document(id, result)?;
        tracing::debug!(
            activity_id = id,
            actor = %actor.id,
            current_joined = activity.current_joined,
            "Join committed"
        );
        Ok(activity)
    }

    async fn subscribe(&self) -> Result<Subscription, AppError> {
        Ok(Subscription::new(self.snapshots.subscribe(), None))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
