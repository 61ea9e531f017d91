//! Persistence and query core of a habit tracker.
//!
//! Trackers (recurring habits and one-off events) are filed under
//! categories, completed on calendar days, and listed per weekday through
//! [`provider::DataProvider`]. Everything is stored in one local SQLite file.

pub mod categories;
pub mod changes;
pub mod config;
pub mod db;
mod error;
pub mod mapping;
pub mod migrate;
pub mod model;
pub mod provider;
pub mod records;
pub mod settings;
pub mod state;
pub mod time;
pub mod trackers;

pub use error::{AppError, AppResult, CrashId};

use tracing_subscriber::{fmt::time::UtcTime, EnvFilter};

use crate::config::DEFAULT_LOG_FILTER;

/// Install the JSON log subscriber on stderr. An unparsable `filter` falls
/// back to the default one. Later calls are ignored.
pub fn init_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .json()
        .with_target(true)
        .with_timer(UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .try_init();
}
