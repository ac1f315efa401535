use std::fmt;

/// Every key this crate persists. The string values are part of the on-disk
/// format and must stay stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Tasks,
    Inventory,
    Expenses,
    MonthlyBudget,
    Initialized,
    SchemaVersion,
}

impl StorageKey {
    pub const ALL: [StorageKey; 6] = [
        StorageKey::Tasks,
        StorageKey::Inventory,
        StorageKey::Expenses,
        StorageKey::MonthlyBudget,
        StorageKey::Initialized,
        StorageKey::SchemaVersion,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StorageKey::Tasks => "homekeep.tasks",
            StorageKey::Inventory => "homekeep.inventory",
            StorageKey::Expenses => "homekeep.expenses",
            StorageKey::MonthlyBudget => "homekeep.monthly_budget",
            StorageKey::Initialized => "homekeep.initialized",
            StorageKey::SchemaVersion => "homekeep.schema_version",
        }
    }

    /// Reserved keys survive a full reset.
    pub fn is_reserved(self) -> bool {
        matches!(self, StorageKey::SchemaVersion)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
