pub mod item;
pub mod priority;
pub mod recurrence;
pub mod status;

pub use item::Task;
pub use priority::Priority;
pub use recurrence::{next_due_date, next_due_date_from};
pub use status::TaskStatus;
