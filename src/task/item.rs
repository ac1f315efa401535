use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::priority::Priority;
use super::recurrence::next_due_date_from;
use super::status::TaskStatus;
use crate::storage::Entity;
use crate::utils::dates::lenient_date;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default)]
    pub links: Vec<String>,
    pub status: TaskStatus,
    #[serde(
        default,
        deserialize_with = "lenient_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub recurring: bool,
    /// Days between occurrences. Only meaningful when `recurring` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurring_interval: Option<u32>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: String::new(),
            priority: Priority::default(),
            cost: None,
            links: Vec::new(),
            status: TaskStatus::Upcoming,
            due_date: None,
            recurring: false,
            recurring_interval: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn due_on(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }

    pub fn every(mut self, interval_days: u32) -> Self {
        self.recurring = true;
        self.recurring_interval = Some(interval_days);
        self
    }

    pub fn is_complete(&self) -> bool {
        self.status.is_complete()
    }

    /// The positive interval of a recurring template, if this is one.
    pub fn recurrence_interval(&self) -> Option<u32> {
        match self.recurring_interval {
            Some(days) if self.recurring && days > 0 => Some(days),
            _ => None,
        }
    }

    /// The next occurrence of a recurring template completed on `today`.
    ///
    /// Returns `None` for non-recurring tasks.
    pub fn successor(&self, today: NaiveDate) -> Option<Task> {
        let interval = self.recurrence_interval()?;
        Some(Task {
            id: Uuid::new_v4().to_string(),
            title: self.title.clone(),
            description: self.description.clone(),
            priority: self.priority,
            cost: self.cost,
            links: self.links.clone(),
            status: TaskStatus::Upcoming,
            due_date: Some(next_due_date_from(self.due_date, interval, today)),
            recurring: true,
            recurring_interval: Some(interval),
            created_at: Utc::now(),
            completed_at: None,
        })
    }
}

impl Entity for Task {
    fn id(&self) -> &str {
        &self.id
    }
}
