//! Validated reads of persisted collections.
//!
//! Every read goes through [`Repository::load_with`]: wait for the store to be
//! ready, read the raw string, parse it, run the collection's validator. Any
//! failure along the way is logged and the caller's fallback is returned, so
//! a read never errors.
//!
//! Only values that reflect what is actually stored are published to the
//! cache. A fallback handed out because the store could not be read stays
//! local to that call.

use anyhow::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::cache::QueryCache;
use super::init::Initializer;
use super::keys::StorageKey;
use super::kv::KeyValueStore;
use super::seed::SeedData;
use crate::records::{Expense, InventoryItem};
use crate::task::Task;

/// Anything stored in a collection has a stable string id.
pub trait Entity {
    fn id(&self) -> &str;
}

/// A persisted collection: where it lives, what it holds, how it is seeded
/// and validated.
pub trait Collection: Send + Sync + 'static {
    type Item: Entity + Serialize + DeserializeOwned + Clone + Send + Sync + 'static;

    const KEY: StorageKey;
    const NAME: &'static str;

    fn seed(seed: &SeedData) -> Vec<Self::Item>;

    /// Structural validation: an array whose every element has the required
    /// fields with the right primitive types.
    fn parse(raw: Value) -> Option<Vec<Self::Item>> {
        parse_entries(raw)
    }
}

pub fn parse_entries<T: DeserializeOwned>(raw: Value) -> Option<Vec<T>> {
    let Value::Array(entries) = raw else {
        return None;
    };
    entries
        .into_iter()
        .map(|entry| serde_json::from_value(entry).ok())
        .collect()
}

pub struct Tasks;
pub struct Inventory;
pub struct Expenses;

impl Collection for Tasks {
    type Item = Task;
    const KEY: StorageKey = StorageKey::Tasks;
    const NAME: &'static str = "tasks";

    fn seed(seed: &SeedData) -> Vec<Task> {
        seed.tasks.clone()
    }
}

impl Collection for Inventory {
    type Item = InventoryItem;
    const KEY: StorageKey = StorageKey::Inventory;
    const NAME: &'static str = "inventory";

    fn seed(seed: &SeedData) -> Vec<InventoryItem> {
        seed.inventory.clone()
    }
}

impl Collection for Expenses {
    type Item = Expense;
    const KEY: StorageKey = StorageKey::Expenses;
    const NAME: &'static str = "expenses";

    fn seed(seed: &SeedData) -> Vec<Expense> {
        seed.expenses.clone()
    }
}

/// Outcome of [`Repository::load_with`].
#[derive(Debug)]
pub enum Loaded<T> {
    /// The stored value, or the fallback for a missing or invalid one.
    Stored(T),
    /// The store could not be read; the fallback stands in.
    Unavailable { fallback: T, error: anyhow::Error },
}

impl<T> Loaded<T> {
    pub fn into_inner(self) -> T {
        match self {
            Loaded::Stored(value) => value,
            Loaded::Unavailable { fallback, .. } => fallback,
        }
    }
}

/// A finite, non-negative number.
pub fn parse_budget(raw: Value) -> Option<f64> {
    raw.as_f64().filter(|b| b.is_finite() && *b >= 0.0)
}

#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn KeyValueStore>,
    initializer: Initializer,
    cache: QueryCache,
}

impl Repository {
    pub fn new(store: Arc<dyn KeyValueStore>, initializer: Initializer, cache: QueryCache) -> Self {
        Self {
            store,
            initializer,
            cache,
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub async fn ensure_ready(&self) {
        self.initializer.ensure_ready().await;
    }

    /// Read `key`, falling back on any read, parse or validation failure.
    pub async fn load_with<T, F>(&self, key: StorageKey, fallback: T, validate: F) -> Loaded<T>
    where
        F: FnOnce(Value) -> Option<T>,
    {
        self.ensure_ready().await;

        let raw = match self.store.get(key.as_str()).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(%key, "No stored value, using fallback");
                return Loaded::Stored(fallback);
            }
            Err(error) => {
                warn!(%key, "Read failed, using fallback: {error:#}");
                return Loaded::Unavailable { fallback, error };
            }
        };

        let parsed: Value = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(%key, "Stored value is not valid JSON, using fallback: {e}");
                return Loaded::Stored(fallback);
            }
        };

        match validate(parsed) {
            Some(value) => Loaded::Stored(value),
            None => {
                warn!(%key, "Stored value failed validation, using fallback");
                Loaded::Stored(fallback)
            }
        }
    }

    /// Load a collection, publishing it into the cache unless the store was
    /// unreadable.
    pub async fn load<C: Collection>(&self) -> Vec<C::Item> {
        match self.load_with(C::KEY, Vec::new(), C::parse).await {
            Loaded::Stored(items) => {
                self.cache.publish(C::KEY, items.clone());
                items
            }
            Loaded::Unavailable { fallback, .. } => fallback,
        }
    }

    /// Like [`Repository::load`], but an unreadable store is an error so a
    /// write never builds on the fallback.
    pub async fn load_for_write<C: Collection>(&self) -> Result<Vec<C::Item>> {
        match self.load_with(C::KEY, Vec::new(), C::parse).await {
            Loaded::Stored(items) => {
                self.cache.publish(C::KEY, items.clone());
                Ok(items)
            }
            Loaded::Unavailable { error, .. } => {
                Err(error.context(format!("Failed to read {} before saving", C::NAME)))
            }
        }
    }

    /// Load the monthly budget scalar and publish it into the cache.
    pub async fn load_budget(&self) -> f64 {
        let fallback = self.initializer.seed().monthly_budget;
        match self
            .load_with(StorageKey::MonthlyBudget, fallback, parse_budget)
            .await
        {
            Loaded::Stored(budget) => {
                self.cache.publish(StorageKey::MonthlyBudget, budget);
                budget
            }
            Loaded::Unavailable { fallback, .. } => fallback,
        }
    }
}
