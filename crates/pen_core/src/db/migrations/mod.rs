//! Ordered schema migrations for the vault.
//!
//! # Invariants
//! - Versions start at 1 and increase by exactly one.
//! - Each migration commits together with its `user_version` bump.

use super::{schema_version, DbError, DbResult};
use log::info;
use rusqlite::Connection;

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "notes_and_images",
        sql: include_str!("0001_init.sql"),
    },
    Migration {
        version: 2,
        name: "files",
        sql: include_str!("0002_files.sql"),
    },
    Migration {
        version: 3,
        name: "tag_cache",
        sql: include_str!("0003_tag_cache.sql"),
    },
];

/// Newest schema version this build can read and write.
pub fn latest_version() -> u32 {
    MIGRATIONS.len() as u32
}

/// Brings `conn` up to `latest_version()`.
///
/// # Errors
/// - `UnsupportedSchemaVersion` when the database was written by a newer build.
/// - `Migration` when a step fails; earlier steps stay committed.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from = schema_version(conn)?;
    let latest = latest_version();
    if from > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: latest,
        });
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > from) {
        run(conn, migration).map_err(|source| DbError::Migration {
            version: migration.version,
            name: migration.name,
            source,
        })?;
        info!(
            "event=db_migrate module=db status=ok version={} name={}",
            migration.version, migration.name
        );
    }
    Ok(())
}

fn run(conn: &mut Connection, migration: &Migration) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(migration.sql)?;
    tx.pragma_update(None, "user_version", migration.version)?;
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_contiguous_from_one() {
        for (index, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version as usize, index + 1, "{}", migration.name);
        }
    }

    #[test]
    fn fresh_connection_reaches_latest() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), latest_version());

        apply_migrations(&mut conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), latest_version());
    }
}
