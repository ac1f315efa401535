mod cli;

use anyhow::{Result, anyhow, bail};
use chrono::{Datelike, Local};
use clap::Parser;
use serde::Serialize;
use std::fs;

use cli::{Cli, CollectionArg, Commands};
use homekeep::config::Config;
use homekeep::records::total_for_month;
use homekeep::storage::{CURRENT_SCHEMA_VERSION, Tasks};
use homekeep::task::Task;
use homekeep::utils::dates::parse_date;
use homekeep::utils::paths::get_logs_dir;
use homekeep::HomeStore;

/// Initialize file-based logging.
///
/// Logs are written to ~/.homekeep/logs/homekeep.log, rolling daily.
/// Log level can be controlled with RUST_LOG env var (default: info).
fn init_file_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let logs_dir = get_logs_dir().ok()?;

    if let Err(e) = fs::create_dir_all(&logs_dir) {
        eprintln!("Warning: Could not create logs directory: {}", e);
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(&logs_dir, "homekeep.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    Some(guard)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_date_arg(raw: &str) -> Result<chrono::NaiveDate> {
    parse_date(raw).ok_or_else(|| anyhow!("Invalid date '{raw}', expected YYYY-MM-DD"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Guard must be kept alive for the duration of the process
    let _log_guard = init_file_logging();

    let cli = Cli::parse();
    let mut config = Config::load()?;
    if let Some(db) = cli.db {
        config.database_path = Some(db);
    }

    let home = HomeStore::open(&config)?;
    tracing::info!("homekeep starting");

    match cli.command {
        Commands::Init => {
            home.ensure_ready().await;
            println!(
                "Store ready ({:?}, schema v{})",
                home.initializer().phase(),
                home.schema_version().await
            );
        }
        Commands::List { collection } => match collection {
            CollectionArg::Tasks => print_json(&home.tasks().await)?,
            CollectionArg::Inventory => print_json(&home.inventory().await)?,
            CollectionArg::Expenses => print_json(&home.expenses().await)?,
        },
        Commands::AddTask {
            title,
            due,
            every,
            priority,
            cost,
        } => {
            let mut task = Task::new(title);
            task.priority = priority;
            task.cost = cost;
            if let Some(raw) = due {
                task = task.due_on(parse_date_arg(&raw)?);
            }
            if let Some(days) = every {
                if days == 0 {
                    bail!("--every must be at least 1 day");
                }
                task = task.every(days);
            }
            let id = task.id.clone();
            home.add::<Tasks>(task).await?;
            println!("{id}");
        }
        Commands::Complete { id, on } => {
            let today = match on {
                Some(raw) => parse_date_arg(&raw)?,
                None => Local::now().date_naive(),
            };
            match home.complete_task(&id, today).await? {
                Some(next) => println!(
                    "Completed. Next occurrence {} due {}",
                    next.id,
                    next.due_date
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "-".to_string())
                ),
                None => println!("Completed."),
            }
        }
        Commands::Budget { value } => {
            let budget = match value {
                Some(v) => home.set_monthly_budget(v).await?,
                None => home.monthly_budget().await,
            };
            let today = Local::now().date_naive();
            let spent = total_for_month(&home.expenses().await, today.year(), today.month());
            println!("{budget:.2} (spent this month: {spent:.2})");
        }
        Commands::Reset { yes } => {
            if !yes {
                bail!("Refusing to delete all data without --yes");
            }
            home.reset_all().await?;
            println!("All data removed.");
        }
        Commands::Version => {
            println!(
                "schema v{} (this build targets v{})",
                home.schema_version().await,
                CURRENT_SCHEMA_VERSION
            );
        }
    }

    Ok(())
}
