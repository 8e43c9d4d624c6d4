// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore-backed activity store.
//!
//! Activities live under `artifacts/{app_id}/public/data/activities`.
//! Every mutation of an existing record runs in a Firestore transaction:
//! the document is read through the transaction, the access rules are
//! evaluated against that read, and the write is committed only if no one
//! else wrote the document in between. Commits that lose that race are
//! retried; any other commit failure is returned as is.

use crate::db::{
    collections, not_found, rules, ActivitySnapshot, ActivityStore, Mutation, Subscription,
    MAX_TRANSACTION_ATTEMPTS,
};
use crate::error::AppError;
use crate::ids;
use crate::models::{Activity, ActivityDraft, ActivityPatch, Identity};
use async_trait::async_trait;
use firestore::errors::FirestoreError;
use firestore::{
    FirestoreConsistencySelector, FirestoreListenEvent, FirestoreListenerTarget,
    FirestoreMemListenStateStorage, FirestoreQueryDirection, FirestoreTransformServerValue,
    FirestoreWritePrecondition, ParentPathBuilder,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch, Notify};

const LISTENER_TARGET_ID: u32 = 1;

/// Delay before retrying a failed snapshot query; doubles up to the cap.
const REFRESH_BACKOFF_INITIAL: Duration = Duration::from_millis(250);
const REFRESH_BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
    app_id: String,
}

fn db_error(context: &'static str) -> impl Fn(FirestoreError) -> AppError {
    move |e| AppError::Database(format!("{}: {}", context, e))
}

/// True when a commit was aborted because another transaction touched the
/// same document.
fn is_contention(error: &FirestoreError) -> bool {
    matches!(error, FirestoreError::DatabaseError(e) if e.public.code == "Aborted")
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str, app_id: &str) -> Result<Self, AppError> {
        // The emulator accepts any token; skip credential discovery.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id, app_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, app_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
            app_id: app_id.to_string(),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str, app_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            app_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
            app_id: app_id.to_string(),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self {
            client: None,
            app_id: "offline".to_string(),
        }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// `artifacts/{app_id}/public/data`
    fn parent_path(&self) -> Result<ParentPathBuilder, AppError> {
        self.get_client()?
            .parent_path(collections::ARTIFACTS, &self.app_id)
            .and_then(|path| path.at(collections::PUBLIC, collections::DATA))
            .map_err(db_error("Invalid parent path"))
    }

    /// Read the whole collection.
    async fn list_all(&self) -> Result<Vec<Activity>, AppError> {
        let parent = self.parent_path()?;
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .parent(&parent)
            .order_by([("createdAt", FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(db_error("Failed to list activities"))
    }

    /// Run `plan` against a transactional read of one document and commit
    /// the resulting write, retrying when the commit loses a race.
    async fn transact<F>(&self, id: &str, mut plan: F) -> Result<Option<Activity>, AppError>
    where
        F: FnMut(Activity) -> Result<Mutation, AppError> + Send,
    {
        let client = self.get_client()?;
        let parent = self.parent_path()?;
        let mut last_conflict = None;

        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(db_error("Failed to begin transaction"))?;

            // Reads through the transaction register the document for
            // conflict detection at commit time.
            let tx_client = client.clone_with_consistency_selector(
                FirestoreConsistencySelector::Transaction(transaction.transaction_id().clone()),
            );
            let current: Option<Activity> = match tx_client
                .fluent()
                .select()
                .by_id_in(collections::ACTIVITIES)
                .parent(&parent)
                .obj()
                .one(id)
                .await
            {
                Ok(current) => current,
                Err(e) => {
                    let _ = transaction.rollback().await;
                    return Err(AppError::Database(format!(
                        "Failed to read activity in transaction: {}",
                        e
                    )));
                }
            };

            let Some(current) = current else {
                let _ = transaction.rollback().await;
                return Err(not_found(id));
            };

            let mutation = match plan(current) {
                Ok(mutation) => mutation,
                Err(e) => {
                    let _ = transaction.rollback().await;
                    return Err(e);
                }
            };

            let result = match mutation {
                Mutation::Unchanged(activity) => {
                    let _ = transaction.rollback().await;
                    return Ok(Some(activity));
                }
                Mutation::Write(activity) => {
                    client
                        .fluent()
                        .update()
                        .in_col(collections::ACTIVITIES)
                        .document_id(id)
                        .parent(&parent)
                        .object(&activity)
                        .add_to_transaction(&mut transaction)
                        .map_err(db_error("Failed to add update to transaction"))?;
                    Some(activity)
                }
                Mutation::Delete => {
                    client
                        .fluent()
                        .delete()
                        .from(collections::ACTIVITIES)
                        .document_id(id)
                        .parent(&parent)
                        .add_to_transaction(&mut transaction)
                        .map_err(db_error("Failed to add deletion to transaction"))?;
                    None
                }
            };

            match transaction.commit().await {
                Ok(_) => return Ok(result),
                Err(e) if is_contention(&e) => {
                    tracing::debug!(
                        activity_id = id,
                        attempt,
                        error = %e,
                        "Transaction lost a write race, retrying"
                    );
                    last_conflict = Some(e);
                }
                Err(e) => return Err(db_error("Failed to commit transaction")(e)),
            }
        }

        tracing::error!(activity_id = id, "Transaction retries exhausted");
        Err(AppError::Database(format!(
            "Transaction on activity {} did not commit after {} attempts: {}",
            id,
            MAX_TRANSACTION_ATTEMPTS,
            last_conflict.map(|e| e.to_string()).unwrap_or_default()
        )))
    }
}

fn expect_document(id: &str, result: Option<Activity>) -> Result<Activity, AppError> {
    result.ok_or_else(|| not_found(id))
}

#[async_trait]
impl ActivityStore for FirestoreDb {
    async fn insert(&self, actor: &Identity, draft: ActivityDraft) -> Result<Activity, AppError> {
        rules::check_create(actor, &draft)?;
        let id = ids::random_id()?;
        // Placeholder; the write below replaces createdAt with the commit's
        // request time.
        let activity = draft.into_activity(id.clone(), chrono::Utc::now());
        let parent = self.parent_path()?;

        let stored: Activity = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ACTIVITIES)
            .precondition(FirestoreWritePrecondition::Exists(false))
            .transforms(|t| {
                t.fields([t
                    .field("createdAt")
                    .server_value(FirestoreTransformServerValue::RequestTime)])
            })
            .document_id(&id)
            .parent(&parent)
            .object(&activity)
            .execute()
            .await
            .map_err(db_error("Failed to insert activity"))?;

        Ok(stored)
    }

    async fn get(&self, id: &str) -> Result<Option<Activity>, AppError> {
        let parent = self.parent_path()?;
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ACTIVITIES)
            .parent(&parent)
            .obj()
            .one(id)
            .await
            .map_err(db_error("Failed to read activity"))
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

    /// Listen for changes to the collection and publish a fresh, complete
    /// snapshot after each batch of changes.
    async fn subscribe(&self) -> Result<Subscription, AppError> {
        let client = self.get_client()?;
        let parent = self.parent_path()?;

        let mut listener = client
            .create_listener(FirestoreMemListenStateStorage::new())
            .await
            .map_err(db_error("Failed to create listener"))?;

        client
            .fluent()
            .select()
            .from(collections::ACTIVITIES)
            .parent(&parent)
            .listen()
            .add_target(FirestoreListenerTarget::new(LISTENER_TARGET_ID), &mut listener)
            .map_err(db_error("Failed to add listener target"))?;

        let changed = Arc::new(Notify::new());
        let callback_changed = changed.clone();
        listener
            .start(move |event| {
                let changed = callback_changed.clone();
                async move {
                    match event {
                        FirestoreListenEvent::DocumentChange(_)
                        | FirestoreListenEvent::DocumentDelete(_)
                        | FirestoreListenEvent::DocumentRemove(_) => changed.notify_one(),
                        _ => {}
                    }
                    Ok(())
                }
            })
            .await
            .map_err(db_error("Failed to start listener"))?;

        let (snapshots, receiver) = watch::channel(None);
        let (release, released) = oneshot::channel::<()>();
        let store = self.clone();

        tokio::spawn(async move {
            refresh_snapshots(|| store.list_all(), changed, released, snapshots).await;

            if let Err(e) = listener.shutdown().await {
                tracing::warn!(error = %e, "Failed to shut down activity listener");
            }
            tracing::debug!("Activity listener released");
        });

        Ok(Subscription::new(receiver, Some(release)))
    }

    fn backend_name(&self) -> &'static str {
        "firestore"
    }
}

/// Publish a fresh snapshot from `fetch` on start and after every change
/// notification until `released` fires. Failed queries are retried with
/// exponential backoff so the feed never stays empty after a transient
/// error.
async fn refresh_snapshots<F, Fut>(
    mut fetch: F,
    changed: Arc<Notify>,
    mut released: oneshot::Receiver<()>,
    snapshots: watch::Sender<Option<Arc<ActivitySnapshot>>>,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<Activity>, AppError>>,
{
    let mut sequence = 0;
    let mut backoff = REFRESH_BACKOFF_INITIAL;

    loop {
        match fetch().await {
            Ok(activities) => {
                sequence += 1;
                backoff = REFRESH_BACKOFF_INITIAL;
                snapshots.send_replace(Some(Arc::new(ActivitySnapshot::new(
                    sequence, activities,
                ))));

                tokio::select! {
                    _ = changed.notified() => {}
                    _ = &mut released => break,
                }
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    retry_in_ms = backoff.as_millis() as u64,
                    "Failed to refresh activity snapshot"
                );

                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = changed.notified() => {}
                    _ = &mut released => break,
                }
                backoff = (backoff * 2).min(REFRESH_BACKOFF_MAX);
            }
        }
    }
}
