use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::keys::StorageKey;

type Entry = Arc<dyn Any + Send + Sync>;

/// In-memory copy of the last successfully persisted value for each key.
///
/// Values are stored type-erased and handed out as clones; a lookup with the
/// wrong type behaves like a miss.
#[derive(Clone, Default)]
pub struct QueryCache {
    entries: Arc<RwLock<HashMap<StorageKey, Entry>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T>(&self, key: StorageKey) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&key)
            .and_then(|entry| entry.downcast_ref::<T>())
            .cloned()
    }

    pub fn publish<T>(&self, key: StorageKey, value: T)
    where
        T: Send + Sync + 'static,
    {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key, Arc::new(value));
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_and_get() {
        let cache = QueryCache::new();
        assert_eq!(cache.get::<Vec<String>>(StorageKey::Tasks), None);

        cache.publish(StorageKey::Tasks, vec!["a".to_string()]);
        assert_eq!(
            cache.get::<Vec<String>>(StorageKey::Tasks),
            Some(vec!["a".to_string()])
        );
    }

    #[test]
    fn test_wrong_type_is_a_miss() {
        let cache = QueryCache::new();
        cache.publish(StorageKey::MonthlyBudget, 250.0_f64);
        assert_eq!(cache.get::<u32>(StorageKey::MonthlyBudget), None);
        assert_eq!(cache.get::<f64>(StorageKey::MonthlyBudget), Some(250.0));
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = QueryCache::new();
        let other = cache.clone();
        other.publish(StorageKey::Expenses, 3_u32);
        assert_eq!(cache.get::<u32>(StorageKey::Expenses), Some(3));

        cache.clear();
        assert_eq!(other.get::<u32>(StorageKey::Expenses), None);
    }
}
