//! Database handle.

use crate::error::DatabaseError;
use crate::mapping::{params, value_from_ref};
use parking_lot::Mutex;
use rusqlite::{params_from_iter, Connection, OpenFlags};
use sqlwire_protocol::{Field, Query, ResultSet, Row, Value};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// SQLite's name for a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// First 16 bytes of every SQLite 3 database file.
pub const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

/// A single SQLite connection.
///
/// Every operation validates its [`Query`] before touching the engine. The
/// connection sits behind a mutex, so a handle can be shared through `Arc`.
pub struct Database {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Database {
    /// Opens an existing database file.
    ///
    /// Refuses `:memory:`, missing files and files without the SQLite header.
    pub fn open(path: impl AsRef<Path>, read_only: bool) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        if path.as_os_str() == IN_MEMORY {
            return Err(DatabaseError::InMemoryOpen);
        }
        if !path.exists() {
            return Err(DatabaseError::NotFound(path.to_path_buf()));
        }
        if !has_sqlite_header(path)? {
            return Err(DatabaseError::NotADatabase(path.to_path_buf()));
        }

        let mode = if read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
        };
        let conn = Connection::open_with_flags(path, mode | OpenFlags::SQLITE_OPEN_NO_MUTEX)?;

        tracing::info!(
            "Opened database {} ({})",
            path.display(),
            if read_only { "read-only" } else { "read-write" }
        );

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Creates a new database file and runs `init` on it, typically to create tables.
    ///
    /// An existing file is replaced only when `overwrite` is set. If `init`
    /// fails the new file is removed again.
    pub fn create<F>(path: impl AsRef<Path>, overwrite: bool, init: F) -> Result<Self, DatabaseError>
    where
        F: FnOnce(&Database) -> Result<(), DatabaseError>,
    {
        let path = path.as_ref();
        if path.as_os_str() == IN_MEMORY {
            return Err(DatabaseError::InMemoryOpen);
        }
        if path.exists() {
            if !overwrite {
                return Err(DatabaseError::AlreadyExists(path.to_path_buf()));
            }
            fs::remove_file(path)?;
            tracing::debug!("Removed existing database {}", path.display());
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let db = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        };

        if let Err(e) = init(&db) {
            drop(db);
            if let Err(rm) = fs::remove_file(path) {
                tracing::warn!("Failed to remove {} after init error: {}", path.display(), rm);
            }
            return Err(e);
        }

        tracing::info!("Created database {}", path.display());
        Ok(db)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            path: None,
        })
    }

    /// File backing this database; `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Version of the linked SQLite library.
    pub fn version() -> &'static str {
        rusqlite::version()
    }

    /// Runs a statement that returns no rows.
    ///
    /// Without arguments the command may hold several `;`-separated statements.
    pub fn exec(&self, query: &Query) -> Result<(), DatabaseError> {
        query.validate()?;
        tracing::debug!("exec {:?}", query.command());

        let conn = self.conn.lock();
        if query.args().is_empty() {
            conn.execute_batch(query.command())?;
        } else {
            conn.execute(query.command(), params_from_iter(params(query.args())))?;
        }
        Ok(())
    }

    /// Runs an INSERT and returns the rowid of the new row.
    pub fn insert(&self, query: &Query) -> Result<i64, DatabaseError> {
        query.validate()?;

        let conn = self.conn.lock();
        conn.execute(query.command(), params_from_iter(params(query.args())))?;
        let rowid = conn.last_insert_rowid();

        tracing::debug!("insert {:?} -> rowid {}", query.command(), rowid);
        Ok(rowid)
    }

    /// Runs an UPDATE (or DELETE) and returns the number of changed rows.
    pub fn update(&self, query: &Query) -> Result<usize, DatabaseError> {
        query.validate()?;

        let conn = self.conn.lock();
        let changed = conn.execute(query.command(), params_from_iter(params(query.args())))?;

        tracing::debug!("update {:?} -> {} row(s)", query.command(), changed);
        Ok(changed)
    }

    /// Runs a SELECT and materializes every row.
    ///
    /// Fields are named after the result columns, in column order.
    pub fn select(&self, query: &Query) -> Result<ResultSet, DatabaseError> {
        query.validate()?;

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(query.command())?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut result = ResultSet::new();
        let mut rows = stmt.query(params_from_iter(params(query.args())))?;
        while let Some(row) = rows.next()? {
            let mut out = Row::new();
            for (i, name) in columns.iter().enumerate() {
                out.add(Field::new(name.as_str(), value_from_ref(row.get_ref(i)?)));
            }
            if !out.is_empty() {
                result.push(out);
            }
        }

        tracing::debug!("select {:?} -> {} row(s)", query.command(), result.len());
        Ok(result)
    }

    /// Inserts `row` into `table`, one column per field, and returns the new rowid.
    ///
    /// Table and column names must not contain `?`.
    pub fn insert_row(&self, table: &str, row: &Row) -> Result<i64, DatabaseError> {
        if row.is_empty() {
            return Err(DatabaseError::EmptyRow(table.to_string()));
        }

        let (names, values) = row.split();
        let columns = names
            .iter()
            .map(|n| quote_identifier(n))
            .collect::<Result<Vec<_>, _>>()?;
        let command = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_identifier(table)?,
            columns.join(","),
            vec!["?"; values.len()].join(",")
        );

        self.insert(&Query::with_args(command, values))
    }

    /// Updates the rows of `table` whose `key` column equals the row's `key`
    /// field, setting every other field. Returns the number of changed rows.
    pub fn update_row(&self, table: &str, key: &str, row: &Row) -> Result<usize, DatabaseError> {
        let key_value = row.value(key).ok_or_else(|| DatabaseError::MissingKey {
            table: table.to_string(),
            key: key.to_string(),
        })?;

        let mut assignments = Vec::with_capacity(row.len());
        let mut args: Vec<Value> = Vec::with_capacity(row.len());
        for field in row.iter().filter(|f| f.name() != key) {
            assignments.push(format!("{}=?", quote_identifier(field.name())?));
            args.push(field.value().clone());
        }
        if assignments.is_empty() {
            return Err(DatabaseError::EmptyRow(table.to_string()));
        }
        args.push(key_value.clone());

        let command = format!(
            "UPDATE {} SET {} WHERE {}=?",
            quote_identifier(table)?,
            assignments.join(","),
            quote_identifier(key)?
        );
        self.update(&Query::with_args(command, args))
    }
}

fn has_sqlite_header(path: &Path) -> Result<bool, DatabaseError> {
    let mut header = [0u8; 16];
    match File::open(path)?.read_exact(&mut header) {
        Ok(()) => Ok(&header == SQLITE_HEADER),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Quotes a table or column name. Names containing `?` are refused because
/// every `?` in a command counts as a placeholder.
fn quote_identifier(name: &str) -> Result<String, DatabaseError> {
    if name.contains('?') {
        return Err(DatabaseError::InvalidIdentifier(name.to_string()));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlwire_protocol::{query, Codec, ProtocolError};
    use tempfile::tempdir;

    const CREATE_ACCOUNT: &str = "CREATE TABLE account (\
        id INTEGER PRIMARY KEY,\
        name TEXT NOT NULL COLLATE NOCASE,\
        is_default INTEGER NOT NULL CHECK(is_default=0 OR is_default=1),\
        avatar BLOB,\
        balance REAL)";

    fn accounts() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.exec(&Query::new(CREATE_ACCOUNT)).unwrap();
        db
    }

    #[test]
    fn test_insert_and_select() {
        let db = accounts();
        let id = db
            .insert(&query!(
                "INSERT INTO account (name, is_default, avatar, balance) VALUES (?, ?, ?, ?)",
                "Ann",
                true,
                vec![1u8, 2, 3],
                12.5
            ))
            .unwrap();
        assert_eq!(id, 1);

        let result = db
            .select(&query!("SELECT * FROM account WHERE id=?", id))
            .unwrap();
        assert_eq!(result.len(), 1);

        let row = &result[0];
        assert_eq!(row.value("id"), Some(&Value::Integer(1)));
        assert_eq!(row.value("name"), Some(&Value::from("Ann")));
        assert_eq!(row.value("is_default"), Some(&Value::Integer(1)));
        assert_eq!(row.value("avatar"), Some(&Value::from(vec![1u8, 2, 3])));
        assert_eq!(row.value("balance"), Some(&Value::Double(12.5)));
    }

    #[test]
    fn test_null_columns_become_null_fields() {
        let db = accounts();
        db.insert(&query!(
            "INSERT INTO account (name, is_default) VALUES (?, ?)",
            "Bob",
            false
        ))
        .unwrap();

        let result = db.select(&Query::new("SELECT avatar, balance FROM account")).unwrap();
        assert!(result[0].value("avatar").unwrap().is_null());
        assert!(result[0].value("balance").unwrap().is_null());
    }

    #[test]
    fn test_select_empty_table() {
        let db = accounts();
        assert!(db.select(&Query::new("SELECT * FROM account")).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_query_never_reaches_engine() {
        let db = accounts();
        let err = db
            .select(&Query::new("SELECT * FROM account WHERE id=?"))
            .unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::Protocol(ProtocolError::PlaceholderMismatch { .. })
        ));

        // A mismatched insert must not write anything.
        assert!(db
            .insert(&query!("INSERT INTO account (name, is_default) VALUES (?, 0)", "x", 1))
            .is_err());
        assert!(db.select(&Query::new("SELECT id FROM account")).unwrap().is_empty());
    }

    #[test]
    fn test_update_counts_changed_rows() {
        let db = accounts();
        for name in ["a", "b", "c"] {
            db.insert(&query!("INSERT INTO account (name, is_default) VALUES (?, 0)", name))
                .unwrap();
        }

        let changed = db
            .update(&query!("UPDATE account SET is_default=? WHERE id>?", 1, 1))
            .unwrap();
        assert_eq!(changed, 2);
        assert_eq!(
            db.update(&query!("DELETE FROM account WHERE id=?", 99)).unwrap(),
            0
        );
    }

    #[test]
    fn test_exec_batch() {
        let db = Database::open_in_memory().unwrap();
        db.exec(&Query::new(
            "CREATE TABLE a (x INTEGER); CREATE TABLE b (y TEXT); INSERT INTO a VALUES (1);",
        ))
        .unwrap();

        let result = db.select(&Query::new("SELECT x FROM a")).unwrap();
        assert_eq!(result[0].value("x"), Some(&Value::Integer(1)));
        assert!(db.exec(&Query::new("NOT SQL")).is_err());
    }

    #[test]
    fn test_row_helpers() {
        let db = accounts();
        let id = db
            .insert_row(
                "account",
                &Row::new().with("name", "Ann").with("is_default", false),
            )
            .unwrap();

        let changed = db
            .update_row(
                "account",
                "id",
                &Row::new().with("id", id).with("name", "Anna").with("is_default", true),
            )
            .unwrap();
        assert_eq!(changed, 1);

        let result = db.select(&query!("SELECT name, is_default FROM account WHERE id=?", id)).unwrap();
        assert_eq!(result[0].value("name"), Some(&Value::from("Anna")));
        assert_eq!(result[0].value("is_default"), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_row_helper_errors() {
        let db = accounts();
        assert!(matches!(
            db.insert_row("account", &Row::new()),
            Err(DatabaseError::EmptyRow(_))
        ));
        assert!(matches!(
            db.update_row("account", "id", &Row::new().with("name", "x")),
            Err(DatabaseError::MissingKey { .. })
        ));
        assert!(matches!(
            db.update_row("account", "id", &Row::new().with("id", 1)),
            Err(DatabaseError::EmptyRow(_))
        ));
    }

    #[test]
    fn test_row_helpers_refuse_placeholder_names() {
        let db = accounts();
        assert!(matches!(
            db.insert_row("account", &Row::new().with("name?", "Ann")),
            Err(DatabaseError::InvalidIdentifier(name)) if name == "name?"
        ));
        assert!(matches!(
            db.update_row("account?", "id", &Row::new().with("id", 1).with("name", "x")),
            Err(DatabaseError::InvalidIdentifier(_))
        ));
        assert!(db.select(&Query::new("SELECT * FROM account")).unwrap().is_empty());
    }

    #[test]
    fn test_open_refusals() {
        let dir = tempdir().unwrap();

        assert!(matches!(
            Database::open(IN_MEMORY, false),
            Err(DatabaseError::InMemoryOpen)
        ));
        assert!(matches!(
            Database::open(dir.path().join("missing.sqlite"), false),
            Err(DatabaseError::NotFound(_))
        ));

        let text = dir.path().join("notes.txt");
        fs::write(&text, b"definitely not a database file").unwrap();
        assert!(matches!(
            Database::open(&text, false),
            Err(DatabaseError::NotADatabase(_))
        ));

        let empty = dir.path().join("empty.sqlite");
        fs::write(&empty, b"").unwrap();
        assert!(matches!(
            Database::open(&empty, false),
            Err(DatabaseError::NotADatabase(_))
        ));
    }

    #[test]
    fn test_create_then_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("postman.sqlite");

        let db = Database::create(&path, false, |db| db.exec(&Query::new(CREATE_ACCOUNT))).unwrap();
        db.insert_row("account", &Row::new().with("name", "Ann").with("is_default", true))
            .unwrap();
        assert_eq!(db.path(), Some(path.as_path()));
        drop(db);

        let db = Database::open(&path, false).unwrap();
        let result = db.select(&Query::new("SELECT name FROM account")).unwrap();
        assert_eq!(result[0].value("name"), Some(&Value::from("Ann")));
    }

    #[test]
    fn test_create_respects_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.sqlite");

        Database::create(&path, false, |db| db.exec(&Query::new("CREATE TABLE old (x)"))).unwrap();
        assert!(matches!(
            Database::create(&path, false, |_| Ok(())),
            Err(DatabaseError::AlreadyExists(_))
        ));

        let db = Database::create(&path, true, |db| db.exec(&Query::new("CREATE TABLE new (y)")))
            .unwrap();
        assert!(db.select(&Query::new("SELECT * FROM old")).is_err());
        assert!(db.select(&Query::new("SELECT * FROM new")).unwrap().is_empty());
    }

    #[test]
    fn test_failed_init_removes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.sqlite");

        let result = Database::create(&path, false, |db| db.exec(&Query::new("CREATE TABLE")));
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ro.sqlite");
        drop(Database::create(&path, false, |db| db.exec(&Query::new(CREATE_ACCOUNT))).unwrap());

        let db = Database::open(&path, true).unwrap();
        assert!(db.select(&Query::new("SELECT * FROM account")).unwrap().is_empty());
        assert!(matches!(
            db.insert_row("account", &Row::new().with("name", "x").with("is_default", 0)),
            Err(DatabaseError::Sqlite(_))
        ));
    }

    #[test]
    fn test_selected_result_travels_over_the_wire() {
        let db = accounts();
        db.insert_row("account", &Row::new().with("name", "Ann").with("is_default", 1))
            .unwrap();
        let result = db.select(&Query::new("SELECT * FROM account")).unwrap();

        let encoded = result.encode_compressed().unwrap();
        let (decoded, consumed) = ResultSet::decode(&encoded);
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, result);
    }

    #[test]
    fn test_version() {
        assert!(Database::version().starts_with('3'));
    }

    #[test]
    fn test_handle_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Database>();
    }
}
