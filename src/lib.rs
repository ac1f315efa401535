pub mod config;
pub mod records;
pub mod storage;
pub mod store;
pub mod task;
pub mod utils;

pub use store::HomeStore;
