use std::path::Path;

use log::info;
use once_cell::sync::OnceCell;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension};

use crate::error::SecTrackError;
use crate::schema::{CREATE_SCHEMA_SQL, MIGRATIONS, SCHEMA_VERSION};

pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

static POOL: OnceCell<Pool<SqliteConnectionManager>> = OnceCell::new();

pub struct Database;

impl Database {
    /// Opens (or creates) the database at `db_path`, brings the schema up to
    /// date, and installs the global connection pool. Called once at startup.
    pub fn init(db_path: &Path) -> Result<(), SecTrackError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(db_path)
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));

        let pool = Pool::builder()
            .build(manager)
            .map_err(SecTrackError::PoolError)?;

        {
            let conn = pool.get().map_err(SecTrackError::PoolError)?;
            Self::ensure_schema(&conn)?;
        }

        info!("Database opened at: {}", db_path.display());

        POOL.set(pool)
            .map_err(|_| SecTrackError::Error("Database already initialized".to_string()))?;

        Ok(())
    }

    /// Fetches a pooled connection. Handlers call this per request.
    pub fn get_connection() -> Result<PooledConnection, SecTrackError> {
        let pool = POOL
            .get()
            .ok_or_else(|| SecTrackError::Error("Database not initialized".to_string()))?;
        pool.get().map_err(SecTrackError::PoolError)
    }

    /// Creates the schema on a fresh database or migrates an existing one
    /// forward to SCHEMA_VERSION. Public so tests can run it against
    /// in-memory connections.
    pub fn ensure_schema(conn: &Connection) -> Result<(), SecTrackError> {
        let meta_exists: bool = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='meta'",
                [],
                |row| row.get::<_, i32>(0),
            )
            .map(|count| count > 0)
            .unwrap_or(false);

        if !meta_exists {
            conn.execute_batch(CREATE_SCHEMA_SQL)?;
            return Ok(());
        }

        let mut version = Self::stored_schema_version(conn)?;

        if version > SCHEMA_VERSION {
            return Err(SecTrackError::Error(format!(
                "Database schema version {} is newer than this binary supports ({})",
                version, SCHEMA_VERSION
            )));
        }

        while version < SCHEMA_VERSION {
            let migration = MIGRATIONS
                .iter()
                .find(|m| m.from == version)
                .ok_or_else(|| {
                    SecTrackError::Error(format!("No migration from schema version {}", version))
                })?;

            info!("Migrating schema from version {} to {}", version, version + 1);
            conn.execute_batch(migration.sql)?;
            version += 1;
        }

        Ok(())
    }

    pub fn stored_schema_version(conn: &Connection) -> Result<u32, SecTrackError> {
        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match stored {
            Some(v) => v
                .parse::<u32>()
                .map_err(|_| SecTrackError::Error(format!("Invalid schema version: '{}'", v))),
            None => Err(SecTrackError::Error("Schema version missing".to_string())),
        }
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;

    /// In-memory database with the current schema, for model-layer tests.
    pub fn open_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        Database::ensure_schema(&conn).unwrap();
        conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_database_gets_current_schema() {
        let conn = test_support::open_test_db();
        assert_eq!(Database::stored_schema_version(&conn).unwrap(), SCHEMA_VERSION);

        // All five tables plus meta exist
        let count: i32 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name IN
                 ('meta', 'items', 'security_controls', 'sub_controls',
                  'control_implementations', 'sub_control_implementations')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 6);
    }

    #[test]
    fn test_v1_database_migrates_to_current() {
        let conn = Connection::open_in_memory().unwrap();

        // Minimal version 1 schema: no sort_order, no tags
        conn.execute_batch(
            r#"
            CREATE TABLE meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);
            INSERT INTO meta (key, value) VALUES ('schema_version', '1');
            CREATE TABLE items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL, description TEXT, category TEXT,
                item_type TEXT, owner TEXT, criticality TEXT,
                created_at TEXT NOT NULL, updated_at TEXT NOT NULL
            );
            CREATE TABLE security_controls (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL, description TEXT,
                created_at TEXT NOT NULL, updated_at TEXT NOT NULL
            );
            INSERT INTO security_controls (name, created_at, updated_at)
            VALUES ('b', 't', 't'), ('a', 't', 't');
            "#,
        )
        .unwrap();

        Database::ensure_schema(&conn).unwrap();
        assert_eq!(Database::stored_schema_version(&conn).unwrap(), SCHEMA_VERSION);

        // sort_order backfilled from insertion order
        let orders: Vec<(i64, i64)> = conn
            .prepare("SELECT id, sort_order FROM security_controls ORDER BY id")
            .unwrap()
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(orders, vec![(1, 0), (2, 1)]);
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);
             INSERT INTO meta (key, value) VALUES ('schema_version', '99');",
        )
        .unwrap();

        assert!(Database::ensure_schema(&conn).is_err());
    }
}
