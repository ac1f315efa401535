//! First-run datasets written by the initializer.

use chrono::{Days, Local, NaiveDate, Utc};

use crate::records::{Expense, InventoryItem};
use crate::task::{Priority, Task, TaskStatus};

pub const DEFAULT_MONTHLY_BUDGET: f64 = 500.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SeedData {
    pub tasks: Vec<Task>,
    pub inventory: Vec<InventoryItem>,
    pub expenses: Vec<Expense>,
    pub monthly_budget: f64,
}

impl SeedData {
    /// Nothing but the default budget. Useful for tests and for users who
    /// want to start from a blank slate.
    pub fn empty() -> Self {
        Self {
            tasks: Vec::new(),
            inventory: Vec::new(),
            expenses: Vec::new(),
            monthly_budget: DEFAULT_MONTHLY_BUDGET,
        }
    }

    /// Starter data with due dates relative to `today`.
    pub fn starter(today: NaiveDate) -> Self {
        let in_days = |n: u64| today.checked_add_days(Days::new(n));

        let tasks = vec![
            seed_task(
                "seed-task-hvac-filter",
                "Replace HVAC filter",
                "Check the size printed on the old filter before buying.",
                Priority::Medium,
                Some(20.0),
                in_days(7),
                Some(90),
            ),
            seed_task(
                "seed-task-smoke-detectors",
                "Test smoke detectors",
                "Press and hold the test button on every unit.",
                Priority::High,
                None,
                in_days(3),
                Some(30),
            ),
            seed_task(
                "seed-task-gutters",
                "Clean gutters",
                "",
                Priority::Low,
                Some(150.0),
                in_days(30),
                None,
            ),
        ];

        let inventory = vec![InventoryItem {
            id: "seed-item-fire-extinguisher".to_string(),
            name: "Fire extinguisher".to_string(),
            location: "Kitchen".to_string(),
            quantity: 1,
            purchase_date: None,
            value: Some(45.0),
        }];

        Self {
            tasks,
            inventory,
            expenses: Vec::new(),
            monthly_budget: DEFAULT_MONTHLY_BUDGET,
        }
    }
}

impl Default for SeedData {
    fn default() -> Self {
        Self::starter(Local::now().date_naive())
    }
}

fn seed_task(
    id: &str,
    title: &str,
    description: &str,
    priority: Priority,
    cost: Option<f64>,
    due_date: Option<NaiveDate>,
    recurring_interval: Option<u32>,
) -> Task {
    Task {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        priority,
        cost,
        links: Vec::new(),
        status: TaskStatus::Upcoming,
        due_date,
        recurring: recurring_interval.is_some(),
        recurring_interval,
        created_at: Utc::now(),
        completed_at: None,
    }
}
