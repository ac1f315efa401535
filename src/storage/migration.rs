//! Schema migrations for persisted collections.
//!
//! A single integer under [`StorageKey::SchemaVersion`] records which steps
//! have run. Step `N` upgrades data at version `N-1` to version `N`. The
//! version is written after every step, so an interrupted run resumes at the
//! first step that has not been recorded and never re-applies one that has.

use anyhow::{Context, Result, bail};
use futures_util::future::BoxFuture;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::keys::StorageKey;
use super::kv::KeyValueStore;

/// Schema version this build migrates persisted data to.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

pub type StepFn = for<'a> fn(&'a dyn KeyValueStore) -> BoxFuture<'a, Result<()>>;

#[derive(Clone, Copy)]
pub struct MigrationStep {
    /// Version this step produces.
    pub version: u32,
    pub description: &'static str,
    pub apply: StepFn,
}

impl std::fmt::Debug for MigrationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationStep")
            .field("version", &self.version)
            .field("description", &self.description)
            .finish()
    }
}

/// All migrations in version order
pub fn registered_steps() -> Vec<MigrationStep> {
    vec![
        MigrationStep {
            version: 1,
            description: "Fill missing task status and links",
            apply: fill_task_defaults,
        },
        MigrationStep {
            version: 2,
            description: "Rename camelCase task fields and drop non-positive intervals",
            apply: normalize_task_fields,
        },
        MigrationStep {
            version: 3,
            description: "Convert string expense amounts to numbers",
            apply: numeric_expense_amounts,
        },
    ]
}

pub struct SchemaMigrator {
    store: Arc<dyn KeyValueStore>,
}

impl SchemaMigrator {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The persisted schema version. Missing, corrupt or unreadable data
    /// reads as 0.
    pub async fn current_version(&self) -> u32 {
        let key = StorageKey::SchemaVersion.as_str();
        match self.store.get(key).await {
            Ok(Some(raw)) => match raw.trim().parse::<u32>() {
                Ok(version) => version,
                Err(_) => {
                    warn!(value = %raw, "Corrupt schema version, treating as 0");
                    0
                }
            },
            Ok(None) => 0,
            Err(e) => {
                warn!("Failed to read schema version, treating as 0: {e:#}");
                0
            }
        }
    }

    /// Advance the persisted data to `target`, one version at a time.
    ///
    /// A step that fails is logged and skipped; the version marker still
    /// moves past it. Only a failure to persist the marker itself is returned
    /// as an error. Returns how many steps were executed.
    pub async fn migrate_to(&self, target: u32, steps: &[MigrationStep]) -> Result<usize> {
        let current = self.current_version().await;
        if current >= target {
            debug!(current, target, "Schema up to date");
            return Ok(0);
        }

        info!(from = current, to = target, "Migrating schema");

        let mut executed = 0;
        for version in (current + 1)..=target {
            if let Some(step) = steps.iter().find(|s| s.version == version) {
                executed += 1;
                match (step.apply)(self.store.as_ref()).await {
                    Ok(()) => info!(version, "Applied migration: {}", step.description),
                    Err(e) => error!(
                        version,
                        "Migration failed, continuing: {}: {e:#}", step.description
                    ),
                }
            } else {
                debug!(version, "No migration registered");
            }

            self.store
                .set(StorageKey::SchemaVersion.as_str(), version.to_string())
                .await
                .with_context(|| format!("Failed to record schema version {version}"))?;
        }

        Ok(executed)
    }
}

/// Read the JSON array under `key`, rewrite each object entry in place, and
/// write it back. A missing key is left alone.
async fn rewrite_entries(
    store: &dyn KeyValueStore,
    key: StorageKey,
    rewrite: fn(&mut Map<String, Value>),
) -> Result<()> {
    let Some(raw) = store.get(key.as_str()).await? else {
        debug!(%key, "Nothing to migrate");
        return Ok(());
    };

    let mut value: Value =
        serde_json::from_str(&raw).with_context(|| format!("Invalid JSON under '{key}'"))?;
    let Some(entries) = value.as_array_mut() else {
        bail!("Expected an array under '{key}'");
    };

    for entry in entries.iter_mut() {
        if let Some(obj) = entry.as_object_mut() {
            rewrite(obj);
        }
    }

    store.set(key.as_str(), serde_json::to_string(&value)?).await
}

fn fill_task_defaults(store: &dyn KeyValueStore) -> BoxFuture<'_, Result<()>> {
    Box::pin(rewrite_entries(store, StorageKey::Tasks, |task| {
        task.entry("status")
            .or_insert_with(|| Value::String("upcoming".to_string()));
        task.entry("links").or_insert_with(|| Value::Array(Vec::new()));
    }))
}

fn normalize_task_fields(store: &dyn KeyValueStore) -> BoxFuture<'_, Result<()>> {
    Box::pin(rewrite_entries(store, StorageKey::Tasks, |task| {
        for (legacy, current) in [
            ("recurringInterval", "recurring_interval"),
            ("dueDate", "due_date"),
            ("completedAt", "completed_at"),
            ("createdAt", "created_at"),
        ] {
            if let Some(v) = task.remove(legacy) {
                task.entry(current).or_insert(v);
            }
        }

        let positive = task
            .get("recurring_interval")
            .and_then(Value::as_i64)
            .is_some_and(|days| days > 0);
        if !positive {
            task.remove("recurring_interval");
        }
    }))
}

fn numeric_expense_amounts(store: &dyn KeyValueStore) -> BoxFuture<'_, Result<()>> {
    Box::pin(rewrite_entries(store, StorageKey::Expenses, |expense| {
        if let Some(Value::String(s)) = expense.get("amount") {
            let amount = s.trim().parse::<f64>().ok().filter(|a| a.is_finite());
            let number = amount
                .and_then(serde_json::Number::from_f64)
                .unwrap_or_else(|| serde_json::Number::from(0));
            expense.insert("amount".to_string(), Value::Number(number));
        }
    }))
}
