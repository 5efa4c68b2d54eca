use pen_core::db::migrations::latest_version;
use pen_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

const VAULT_TABLES: [&str; 5] = ["notes", "images", "files", "tags", "note_tags"];

#[test]
fn in_memory_vault_gets_every_table() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in VAULT_TABLES {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn reopening_a_vault_file_keeps_its_schema() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pen.sqlite3");

    let first = open_db(&path).unwrap();
    first
        .execute(
            "INSERT INTO notes (id, title, content, created_at, updated_at)
             VALUES ('n_1', 'kept', '', 1, 1);",
            [],
        )
        .unwrap();
    drop(first);

    let second = open_db(&path).unwrap();
    assert_eq!(schema_version(&second), latest_version());
    let title: String = second
        .query_row("SELECT title FROM notes WHERE id = 'n_1';", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(title, "kept");
}

#[test]
fn version_one_vault_is_upgraded_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("old.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE notes (
            id TEXT PRIMARY KEY NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE TABLE images (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            note_id TEXT NOT NULL,
            name TEXT NOT NULL,
            data BLOB NOT NULL,
            created_at INTEGER NOT NULL
        );
        PRAGMA user_version = 1;",
    )
    .unwrap();
    drop(conn);

    let conn = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "files");
    assert_table_exists(&conn, "note_tags");
}

#[test]
fn vault_from_a_newer_build_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
