use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde_json::json;

use tracker_lib::config::AppConfig;
use tracker_lib::migrate;
use tracker_lib::provider::{DataProvider, TrackerFilter};
use tracker_lib::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "tracker", about = "Habit tracker data maintenance", version)]
struct Cli {
    /// Database file to use instead of the configured one.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log filter to use instead of `TRACKER_LOG`, e.g. `tracker=debug`.
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List the trackers shown for a day, grouped by category.
    List {
        /// Day to show (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Only trackers whose name contains this text.
        #[arg(long)]
        search: Option<String>,
        /// all, today, completed or not-completed.
        #[arg(long)]
        filter: Option<TrackerFilter>,
        #[arg(long)]
        json: bool,
    },
    /// Completion totals.
    Stats,
    /// Category titles in display order.
    Categories,
    /// Database maintenance and inspection commands.
    #[command(subcommand)]
    Db(DbCommand),
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Report the database location, schema version and row counts.
    Status,
    /// Delete every category, tracker and record.
    Reset,
}

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let mut config = AppConfig::from_env().context("resolve configuration")?;
    if let Some(path) = cli.db {
        config = config.with_db_path(path);
    }
    if let Some(filter) = cli.log {
        config = config.with_log_filter(filter);
    }
    tracker_lib::init_logging(&config.log_filter);
    let state = AppState::open(&config)
        .with_context(|| format!("open database {}", config.db_path.display()))?;

    match cli.command {
        Commands::List {
            date,
            search,
            filter,
            json,
        } => handle_list(&state, date, search.as_deref(), filter, json),
        Commands::Stats => handle_stats(&state),
        Commands::Categories => {
            for title in state.data_provider().all_category_titles() {
                println!("{title}");
            }
            Ok(0)
        }
        Commands::Db(DbCommand::Status) => handle_db_status(&state, &config),
        Commands::Db(DbCommand::Reset) => {
            state.data_provider().delete_all_data();
            println!("All tracker data deleted.");
            Ok(0)
        }
    }
}

fn handle_list(
    state: &AppState,
    date: Option<NaiveDate>,
    search: Option<&str>,
    filter: Option<TrackerFilter>,
    emit_json: bool,
) -> Result<i32> {
    let mut provider = state.data_provider();
    if let Some(filter) = filter {
        provider.set_filter(filter);
    }
    if let Some(date) = date {
        provider.select_date(date);
    }
    provider.filter(search);

    if emit_json {
        let payload = list_json(&provider);
        let serialized =
            serde_json::to_string_pretty(&payload).context("serialize tracker listing")?;
        println!("{serialized}");
        return Ok(0);
    }

    println!(
        "{} ({}), filter: {}",
        provider.selected_date(),
        provider.weekday(),
        provider.current_filter()
    );
    if provider.number_of_sections() == 0 {
        println!("Nothing to track.");
        return Ok(0);
    }
    let date = provider.selected_date();
    for category in provider.visible_categories() {
        println!("\n{}", category.title);
        for tracker in &category.trackers {
            let done = if provider.record_exists(&tracker.id, date) { "x" } else { " " };
            let schedule = tracker
                .schedule_summary()
                .unwrap_or_else(|| "event".to_string());
            println!(
                "  [{done}] {} {:<38} {:<20} {:>4} days",
                tracker.emoji,
                tracker.name,
                schedule,
                provider.completed_day_count(&tracker.id)
            );
        }
    }
    Ok(0)
}

fn list_json(provider: &DataProvider<'_>) -> serde_json::Value {
    let date = provider.selected_date();
    let categories: Vec<_> = provider
        .visible_categories()
        .iter()
        .map(|category| {
            let trackers: Vec<_> = category
                .trackers
                .iter()
                .map(|tracker| {
                    json!({
                        "tracker": tracker,
                        "kind": tracker.kind(),
                        "completed": provider.record_exists(&tracker.id, date),
                        "completedDays": provider.completed_day_count(&tracker.id),
                        "pinned": provider.is_pinned(&tracker.id),
                    })
                })
                .collect();
            json!({ "title": category.title, "trackers": trackers })
        })
        .collect();
    json!({
        "date": date,
        "weekday": provider.weekday(),
        "filter": provider.current_filter(),
        "search": provider.search_text(),
        "categories": categories,
    })
}

fn handle_stats(state: &AppState) -> Result<i32> {
    let provider = state.data_provider();
    println!("Trackers completed: {}", provider.total_completed_count());
    for title in provider.category_titles_for_picker() {
        let Some(category) = provider.category_by_title(&title) else {
            continue;
        };
        for tracker in &category.trackers {
            println!(
                "{:<20} {:<38} {:>4}",
                category.title,
                tracker.name,
                provider.completed_day_count(&tracker.id)
            );
        }
    }
    Ok(0)
}

fn handle_db_status(state: &AppState, config: &AppConfig) -> Result<i32> {
    let conn = state.database().conn();
    let applied = migrate::applied_versions(conn).context("read applied migrations")?;
    let count = |table: &str| -> Result<i64> {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .with_context(|| format!("count {table}"))
    };

    println!("Database     : {}", config.db_path.display());
    println!("Settings     : {}", config.settings_path.display());
    println!(
        "Schema       : {} (latest {})",
        applied.last().map(String::as_str).unwrap_or("none"),
        migrate::latest_version()
    );
    for table in ["categories", "trackers", "records", "pins"] {
        println!("{:<13}: {}", table, count(table)?);
    }
    Ok(0)
}
