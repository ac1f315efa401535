use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::Entity;
use crate::utils::dates::lenient_date;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub description: String,
    pub amount: f64,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(
        default,
        deserialize_with = "lenient_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<NaiveDate>,
}

fn default_category() -> String {
    "general".to_string()
}

impl Expense {
    pub fn new(description: impl Into<String>, amount: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            description: description.into(),
            amount,
            category: default_category(),
            date: Some(Local::now().date_naive()),
        }
    }
}

impl Entity for Expense {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Sum of expenses dated within the given month.
pub fn total_for_month(expenses: &[Expense], year: i32, month: u32) -> f64 {
    use chrono::Datelike;

    expenses
        .iter()
        .filter(|e| {
            e.date
                .is_some_and(|d| d.year() == year && d.month() == month)
        })
        .map(|e| e.amount)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_amount_is_rejected() {
        // Legacy string amounts are rewritten by the v3 migration, never here.
        assert!(
            serde_json::from_str::<Expense>(r#"{"id":"e1","description":"Paint","amount":"12.50"}"#)
                .is_err()
        );
    }

    #[test]
    fn test_total_for_month() {
        let mut a = Expense::new("Paint", 40.0);
        a.date = NaiveDate::from_ymd_opt(2024, 5, 3);
        let mut b = Expense::new("Brushes", 12.5);
        b.date = NaiveDate::from_ymd_opt(2024, 5, 28);
        let mut c = Expense::new("Plumber", 150.0);
        c.date = NaiveDate::from_ymd_opt(2024, 6, 1);
        let mut undated = Expense::new("Unknown", 99.0);
        undated.date = None;

        let all = vec![a, b, c, undated];
        assert_eq!(total_for_month(&all, 2024, 5), 52.5);
        assert_eq!(total_for_month(&all, 2024, 6), 150.0);
        assert_eq!(total_for_month(&all, 2023, 5), 0.0);
    }
}
