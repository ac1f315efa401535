use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use homekeep::task::Priority;

#[derive(Parser, Debug)]
#[command(name = "homekeep")]
#[command(about = "Household tasks, inventory and expenses, kept locally", long_about = None)]
pub struct Cli {
    /// Use this database file instead of the configured one
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CollectionArg {
    Tasks,
    Inventory,
    Expenses,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Migrate the store and seed it on first run
    Init,
    /// Print a collection as JSON
    List {
        #[arg(value_enum)]
        collection: CollectionArg,
    },
    /// Add a task
    AddTask {
        title: String,

        /// Due date (YYYY-MM-DD)
        #[arg(short, long)]
        due: Option<String>,

        /// Repeat every N days
        #[arg(short, long)]
        every: Option<u32>,

        #[arg(short, long, default_value_t = Priority::Medium)]
        priority: Priority,

        #[arg(long)]
        cost: Option<f64>,
    },
    /// Mark a task completed, scheduling the next occurrence of recurring tasks
    Complete {
        id: String,

        /// Completion date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        on: Option<String>,
    },
    /// Show or set the monthly budget, with this month's spending
    Budget { value: Option<f64> },
    /// Delete all data; the next run starts from the seed data
    Reset {
        #[arg(long)]
        yes: bool,
    },
    /// Print the persisted schema version
    Version,
}
