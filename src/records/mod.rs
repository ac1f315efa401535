pub mod expense;
pub mod inventory;

pub use expense::{Expense, total_for_month};
pub use inventory::InventoryItem;
