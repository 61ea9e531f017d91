use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use tracing::{error, info};

use crate::time::now_ms;
use crate::{AppError, AppResult};

fn preview(sql: &str) -> String {
    let one_line = sql.replace(['\n', '\t'], " ");
    let trimmed = one_line.trim();
    if trimmed.chars().count() > 160 {
        let cut: String = trimmed.chars().take(160).collect();
        format!("{cut}…")
    } else {
        trimmed.to_string()
    }
}

static MIGRATIONS: &[(&str, &str)] = &[
    (
        "0001_initial",
        include_str!("../migrations/0001_initial.sql"),
    ),
    (
        "0002_pins",
        include_str!("../migrations/0002_pins.sql"),
    ),
];

fn checksum(sql: &str) -> String {
    let digest = Sha256::digest(sql.as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Apply every embedded migration that has not run yet, each in its own
/// transaction. Already-applied versions must still match their checksum.
pub fn apply_migrations(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (\
           version    TEXT PRIMARY KEY,\
           applied_at INTEGER NOT NULL,\
           checksum   TEXT NOT NULL\
         )",
    )?;

    for (version, sql) in MIGRATIONS {
        let expected = checksum(sql);
        let recorded: Option<String> = conn
            .query_row(
                "SELECT checksum FROM schema_migrations WHERE version = ?1",
                params![version],
                |row| row.get(0),
            )
            .optional()?;

        match recorded {
            Some(found) if found == expected => continue,
            Some(found) => {
                error!(
                    target: "tracker",
                    event = "migration_checksum_mismatch",
                    version = %version,
                    expected = %expected,
                    found = %found
                );
                return Err(AppError::new(
                    "MIGRATION/CHECKSUM_MISMATCH",
                    "Applied migration differs from the embedded one",
                )
                .with_context("version", version.to_string()));
            }
            None => {}
        }

        let tx = conn.unchecked_transaction()?;
        if let Err(err) = tx.execute_batch(sql) {
            error!(
                target: "tracker",
                event = "migration_failed",
                version = %version,
                sql = %preview(sql),
                error = %err
            );
            return Err(AppError::from(err).with_context("version", version.to_string()));
        }
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at, checksum) VALUES (?1, ?2, ?3)",
            params![version, now_ms(), expected],
        )?;
        tx.commit()?;
        info!(target: "tracker", event = "migration_applied", version = %version);
    }

    Ok(())
}

/// Versions recorded in `schema_migrations`, oldest first.
pub fn applied_versions(conn: &Connection) -> AppResult<Vec<String>> {
    let mut stmt = conn.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
    let versions = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(versions)
}

pub fn latest_version() -> &'static str {
    MIGRATIONS.last().map(|(version, _)| *version).unwrap_or("")
}
