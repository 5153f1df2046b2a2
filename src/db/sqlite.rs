use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};

use super::DatabaseError;

/// File names a bundle directory may hold its database under, in probe order.
pub const DATABASE_FILE_CANDIDATES: &[&str] =
    &["db.sqlite", "patient.sqlite", "bundle.sqlite", "database.sqlite"];

/// Resolve the database file for a bundle. The bundle path may be the file
/// itself or a directory containing one of the candidate names.
pub fn resolve_database_path(bundle: &Path) -> Result<PathBuf, DatabaseError> {
    if bundle.is_file() {
        return Ok(bundle.to_path_buf());
    }
    if bundle.is_dir() {
        if let Some(found) = DATABASE_FILE_CANDIDATES
            .iter()
            .map(|name| bundle.join(name))
            .find(|p| p.is_file())
        {
            return Ok(found);
        }
    }
    tracing::error!(path = %bundle.display(), "No bundle database found");
    Err(DatabaseError::NoActiveRecordStore(bundle.to_path_buf()))
}

/// Open the bundle read-only. Failure here means there is no usable record store.
pub fn open_read_only(path: &Path) -> Result<Connection, DatabaseError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "Cannot open bundle database");
        DatabaseError::NoActiveRecordStore(path.to_path_buf())
    })?;
    configure_pragmas(&conn)?;
    Ok(conn)
}

/// Open read-write, creating the file if needed. Used by the growth loader,
/// which owns the auxiliary tables.
pub fn open_read_write(path: &Path) -> Result<Connection, DatabaseError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    configure_pragmas(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing)
pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    let conn = Connection::open_in_memory()?;
    configure_pragmas(&conn)?;
    Ok(conn)
}

fn configure_pragmas(conn: &Connection) -> Result<(), DatabaseError> {
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    Ok(())
}

/// Create `manual_growth` and `vitals` when missing. Existing tables are left
/// as they are, whatever their columns.
pub fn ensure_auxiliary_tables(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(include_str!("../../resources/sql/auxiliary_tables.sql"))?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn count_tables(conn: &Connection) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auxiliary_tables_created_once() {
        let conn = open_memory_database().unwrap();
        ensure_auxiliary_tables(&conn).unwrap();
        assert_eq!(count_tables(&conn), 2);
        ensure_auxiliary_tables(&conn).unwrap();
        assert_eq!(count_tables(&conn), 2);
    }

    #[test]
    fn existing_vitals_table_is_untouched() {
        let conn = open_memory_database().unwrap();
        conn.execute_batch("CREATE TABLE vitals (id INTEGER PRIMARY KEY, pid INTEGER, poids REAL);")
            .unwrap();
        ensure_auxiliary_tables(&conn).unwrap();
        let cols: Vec<String> = conn
            .prepare("SELECT name FROM pragma_table_info('vitals')")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(cols, vec!["id", "pid", "poids"]);
    }

    #[test]
    fn resolve_database_path_probes_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            resolve_database_path(dir.path()),
            Err(DatabaseError::NoActiveRecordStore(_))
        ));

        let db = dir.path().join("bundle.sqlite");
        Connection::open(&db)
            .unwrap()
            .execute_batch("CREATE TABLE t (x INTEGER);")
            .unwrap();
        assert_eq!(resolve_database_path(dir.path()).unwrap(), db);
        assert_eq!(resolve_database_path(&db).unwrap(), db);
    }

    #[test]
    fn read_only_open_of_missing_file_is_no_store() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.sqlite");
        assert!(matches!(
            open_read_only(&missing),
            Err(DatabaseError::NoActiveRecordStore(_))
        ));
    }

    #[test]
    fn read_only_connection_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.sqlite");
        open_read_write(&path).unwrap().execute_batch("CREATE TABLE t (x INTEGER);").unwrap();

        let ro = open_read_only(&path).unwrap();
        assert!(ro.execute("INSERT INTO t (x) VALUES (1)", []).is_err());
    }
}
