//! Embedded forward-only schema migrations for the record store.
//!
//! # Responsibility
//! - Bring a connection from any older `PRAGMA user_version` to the latest
//!   record schema inside one transaction.
//! - Refuse databases written by a newer binary.
//!
//! # Invariants
//! - Step versions start at 1 and increase by exactly one.
//! - A failed step leaves `user_version` and the schema untouched.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "create_records",
    sql: include_str!("0001_init.sql"),
}];

/// Returns the record schema version this binary writes.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Upgrades `conn` to [`latest_version`].
///
/// # Errors
/// - [`DbError::UnsupportedSchemaVersion`] when the file is newer than this
///   binary.
/// - [`DbError::Migration`] naming the step whose SQL failed.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    let latest = latest_version();

    if from > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: latest,
        });
    }
    if from == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in MIGRATIONS.iter().skip_while(|step| step.version <= from) {
        tx.execute_batch(step.sql)
            .and_then(|()| tx.pragma_update(None, "user_version", step.version))
            .map_err(|source| DbError::Migration {
                version: step.version,
                source,
            })?;
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            step.version, step.name
        );
    }
    tx.commit()?;

    info!("event=db_migrate module=db status=done from={from} to={latest}");
    Ok(())
}
