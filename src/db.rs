//! Connection plumbing for both stores: the plain SQLite source library and
//! the SQLCipher-encrypted Rekordbox target.

use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use rusqlite::{ffi, Connection, OpenFlags};

/// The universal Rekordbox 6/7 SQLCipher key (publicly known, same for all
/// installations). Default only — overridable via flag or environment.
pub const REKORDBOX_DB_KEY: &str =
    "402fd482c38817c35ffa8ffb8c7d93143b749e7d315df7a81732a1ff43608497";

/// Environment variable consulted when no `--key` flag is given.
pub const KEY_ENV_VAR: &str = "MIXXPORT_REKORDBOX_KEY";

/// Open the source library read-only and probe it.
pub fn open_source(path: &str) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |_| Ok(()))?;
    Ok(conn)
}

/// Open the encrypted target store. The key pragma and the compatibility
/// mode run before any other statement; the probe query both validates the
/// key and forces SQLCipher to actually derive it.
pub fn open_target(path: &str, key: &str) -> Result<Connection, rusqlite::Error> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
    )?;
    conn.execute_batch(&format!(
        "PRAGMA key = '{key}';
         PRAGMA cipher_compatibility = 4;"
    ))?;
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |_| Ok(()))?;
    Ok(conn)
}

/// Apply the DDL asset `<schema_dir>/<name>.sql` to `conn`.
pub fn load_schema(
    conn: &Connection,
    schema_dir: &Path,
    name: &str,
) -> Result<(), rusqlite::Error> {
    let schema_path = schema_dir.join(format!("{name}.sql"));
    let ddl = std::fs::read_to_string(&schema_path).map_err(|err| {
        rusqlite::Error::SqliteFailure(
            ffi::Error::new(ffi::SQLITE_CANTOPEN),
            Some(format!(
                "failed to read schema asset {}: {}",
                schema_path.display(),
                err
            )),
        )
    })?;
    eprintln!("[db] applying {name} schema from {}", schema_path.display());
    conn.execute_batch(&ddl)
}

/// Timestamp in the target store's `created_at`/`updated_at` format.
pub fn timestamp_now() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S.000 +00:00").to_string()
}

/// Today's date in the target store's date-only format.
pub fn date_today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// Date-only rendering of a filesystem timestamp.
pub fn date_from_system_time(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format("%Y-%m-%d").to_string()
}

#[cfg(test)]
pub fn open_test() -> Connection {
    Connection::open_in_memory().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_source_rejects_missing_file() {
        assert!(open_source("/nonexistent/mixxxdb.sqlite").is_err());
    }

    #[test]
    fn load_schema_applies_ddl_from_asset() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("rekordbox.sql"),
            "CREATE TABLE t (ID TEXT PRIMARY KEY);",
        )
        .unwrap();

        let conn = open_test();
        load_schema(&conn, dir.path(), "rekordbox").unwrap();
        conn.execute("INSERT INTO t (ID) VALUES ('1')", []).unwrap();
    }

    #[test]
    fn load_schema_reports_missing_asset() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_test();
        assert!(load_schema(&conn, dir.path(), "rekordbox").is_err());
    }

    #[test]
    fn timestamp_format_shape() {
        let ts = timestamp_now();
        assert!(ts.ends_with(".000 +00:00"), "unexpected format: {ts}");
        assert_eq!(date_today().len(), 10);
    }
}
