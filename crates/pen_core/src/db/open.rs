use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{debug, error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backing {
    File,
    Memory,
}

impl Backing {
    fn label(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Memory => "memory",
        }
    }
}

/// Opens (creating if needed) a vault database file, migrated to the latest
/// schema. Missing parent directories are created.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| DbError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    connect(Backing::File, || Connection::open(path))
}

/// Opens a private in-memory vault, migrated to the latest schema.
pub fn open_db_in_memory() -> DbResult<Connection> {
    connect(Backing::Memory, Connection::open_in_memory)
}

fn connect(
    backing: Backing,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    let result = open()
        .map_err(DbError::from)
        .and_then(|mut conn| configure(backing, &mut conn).map(|()| conn));

    match &result {
        Ok(_) => info!(
            "event=db_open module=db status=ok backing={} duration_ms={}",
            backing.label(),
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error backing={} duration_ms={} error={}",
            backing.label(),
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

fn configure(backing: Backing, conn: &mut Connection) -> DbResult<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    if backing == Backing::File {
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!("event=db_open module=db journal_mode={mode}");
    }
    apply_migrations(conn)
}
