pub mod cache;
pub mod init;
pub mod keys;
pub mod kv;
pub mod migration;
pub mod mutator;
pub mod repository;
pub mod seed;
pub mod sqlite;

pub use cache::QueryCache;
pub use init::{InitPhase, Initializer, InitializerState, RetryPolicy};
pub use keys::StorageKey;
pub use kv::{KeyValueStore, MemoryStore};
pub use migration::{CURRENT_SCHEMA_VERSION, MigrationStep, SchemaMigrator, registered_steps};
pub use mutator::CacheSyncMutator;
pub use repository::{Collection, Entity, Expenses, Inventory, Loaded, Repository, Tasks};
pub use seed::SeedData;
pub use sqlite::SqliteStore;
