//! The operations the rest of the app calls.
//!
//! `HomeStore` wires the key/value store, initializer, repository and
//! mutator together. Reads never fail; writes return errors.

use anyhow::{Result, bail};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::records::{Expense, InventoryItem};
use crate::storage::{
    CacheSyncMutator, Collection, Entity, Expenses, Initializer, Inventory, KeyValueStore,
    QueryCache, Repository, RetryPolicy, SchemaMigrator, SeedData, SqliteStore, StorageKey, Tasks,
};
use crate::task::{Task, TaskStatus};

#[derive(Clone)]
pub struct HomeStore {
    store: Arc<dyn KeyValueStore>,
    initializer: Initializer,
    repository: Repository,
    mutator: CacheSyncMutator,
}

impl HomeStore {
    pub fn new(store: Arc<dyn KeyValueStore>, seed: SeedData, policy: RetryPolicy) -> Self {
        let initializer = Initializer::new(Arc::clone(&store), seed, policy);
        let repository = Repository::new(Arc::clone(&store), initializer.clone(), QueryCache::new());
        let mutator = CacheSyncMutator::new(Arc::clone(&store), repository.clone());
        Self {
            store,
            initializer,
            repository,
            mutator,
        }
    }

    /// Open the SQLite-backed store described by `config`.
    pub fn open(config: &Config) -> Result<Self> {
        let path = config.database_path()?;
        let store = SqliteStore::open(&path)?;
        info!(path = %path.display(), "Opened store");
        Ok(Self::new(
            Arc::new(store),
            SeedData::default(),
            config.init.retry_policy(),
        ))
    }

    pub fn initializer(&self) -> &Initializer {
        &self.initializer
    }

    pub fn cache(&self) -> &QueryCache {
        self.repository.cache()
    }

    pub async fn ensure_ready(&self) {
        self.initializer.ensure_ready().await;
    }

    pub async fn schema_version(&self) -> u32 {
        SchemaMigrator::new(Arc::clone(&self.store))
            .current_version()
            .await
    }

    pub async fn load<C: Collection>(&self) -> Vec<C::Item> {
        self.repository.load::<C>().await
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.load::<Tasks>().await
    }

    pub async fn inventory(&self) -> Vec<InventoryItem> {
        self.load::<Inventory>().await
    }

    pub async fn expenses(&self) -> Vec<Expense> {
        self.load::<Expenses>().await
    }

    pub async fn add<C: Collection>(&self, item: C::Item) -> Result<Vec<C::Item>> {
        self.mutator
            .mutate::<C, _>(move |mut items| {
                if items.iter().any(|i| i.id() == item.id()) {
                    bail!("{} already contains id {}", C::NAME, item.id());
                }
                items.push(item);
                Ok(items)
            })
            .await
    }

    pub async fn update<C, F>(&self, id: &str, edit: F) -> Result<Vec<C::Item>>
    where
        C: Collection,
        F: FnOnce(&mut C::Item) + Send,
    {
        self.mutator
            .mutate::<C, _>(|mut items| {
                let Some(item) = items.iter_mut().find(|i| i.id() == id) else {
                    bail!("No item with id {id} in {}", C::NAME);
                };
                edit(item);
                Ok(items)
            })
            .await
    }

    pub async fn remove<C: Collection>(&self, id: &str) -> Result<Vec<C::Item>> {
        self.mutator
            .mutate::<C, _>(|mut items| {
                let before = items.len();
                items.retain(|i| i.id() != id);
                if items.len() == before {
                    bail!("No item with id {id} in {}", C::NAME);
                }
                Ok(items)
            })
            .await
    }

    /// Mark a task completed on `today`.
    ///
    /// A recurring task gets exactly one successor, which is returned.
    /// Completing a task that is already completed changes nothing.
    pub async fn complete_task(&self, id: &str, today: NaiveDate) -> Result<Option<Task>> {
        let mut spawned = None;
        self.mutator
            .mutate::<Tasks, _>(|mut tasks| {
                let Some(task) = tasks.iter_mut().find(|t| t.id == id) else {
                    bail!("No task with id {id}");
                };
                if task.is_complete() {
                    return Ok(tasks);
                }

                task.status = TaskStatus::Completed;
                task.completed_at = Some(Utc::now());
                spawned = task.successor(today);

                if let Some(next) = &spawned {
                    tasks.push(next.clone());
                }
                Ok(tasks)
            })
            .await?;

        if let Some(next) = &spawned {
            info!(
                task = id,
                successor = %next.id,
                due = ?next.due_date,
                "Scheduled next occurrence"
            );
        }
        Ok(spawned)
    }

    pub async fn monthly_budget(&self) -> f64 {
        self.repository.load_budget().await
    }

    pub async fn set_monthly_budget(&self, budget: f64) -> Result<f64> {
        self.mutator.set_budget(budget).await
    }

    /// Remove every non-reserved key and forget all cached state so the next
    /// load seeds from scratch.
    pub async fn reset_all(&self) -> Result<()> {
        for key in StorageKey::ALL.into_iter().filter(|k| !k.is_reserved()) {
            self.store.remove(key.as_str()).await?;
        }
        self.cache().clear();
        self.initializer.reset();
        info!("All data reset");
        Ok(())
    }
}
