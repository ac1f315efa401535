//! Next-occurrence arithmetic for recurring tasks.
//!
//! Completing a recurring task late never produces a backlog: when the next
//! occurrence computed from the old due date is already in the past, the
//! schedule is re-anchored on today in one jump.

use chrono::{Days, NaiveDate};

/// Due date of the successor of a task due on `current_due` that repeats
/// every `interval_days`, completed on `today`.
///
/// The result is never earlier than `today`.
pub fn next_due_date(current_due: NaiveDate, interval_days: u32, today: NaiveDate) -> NaiveDate {
    let candidate = add_days(current_due, interval_days);
    if candidate < today { today } else { candidate }
}

/// Same as [`next_due_date`], for tasks that may have no due date yet.
/// An undated task anchors on today.
pub fn next_due_date_from(
    current_due: Option<NaiveDate>,
    interval_days: u32,
    today: NaiveDate,
) -> NaiveDate {
    match current_due {
        Some(due) => next_due_date(due, interval_days, today),
        None => add_days(today, interval_days),
    }
}

fn add_days(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX)
}
