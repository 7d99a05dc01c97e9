//! SQLite connection pool and schema bootstrap.
//!
//! A single database file holds one table per entity. Connections come
//! from an r2d2 pool (max 8) so WAL-mode reads can parallelise; writes are
//! serialised by SQLite's own page lock.

use anyhow::{Context, Result};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;

const POOL_MAX_SIZE: u32 = 8;

/// Open (or create) the database at `path` and return a pool over it.
pub fn open_pool(path: &Path) -> Result<DbPool> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data dir: {}", parent.display()))?;
        }
    }

    let manager = SqliteConnectionManager::file(path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous  = NORMAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
    });

    let pool = r2d2::Pool::builder()
        .max_size(POOL_MAX_SIZE)
        .build(manager)
        .with_context(|| format!("Failed to open database: {}", path.display()))?;

    Ok(pool)
}

/// Create the entity tables if they do not exist yet.
///
/// Column sets mirror the declared field schemas in [`crate::entity`];
/// `id` is store-assigned and immutable, all other columns are TEXT.
pub fn init_schema(pool: &DbPool) -> Result<()> {
    let conn = pool.get()?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            fullname    TEXT,
            affiliation TEXT,
            note        TEXT,
            role        TEXT
        );

        CREATE TABLE IF NOT EXISTS materials (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            matid         TEXT,
            interusername TEXT,
            name          TEXT,
            species       TEXT,
            note          TEXT
        );

        CREATE TABLE IF NOT EXISTS gels (
            id      INTEGER PRIMARY KEY AUTOINCREMENT,
            gelid   TEXT,
            gelname TEXT,
            geltype TEXT,
            note    TEXT
        );

        CREATE TABLE IF NOT EXISTS plates (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            plateid     TEXT,
            platename   TEXT,
            platenumber TEXT
        );

        CREATE TABLE IF NOT EXISTS analysis (
            id      INTEGER PRIMARY KEY AUTOINCREMENT,
            analid  TEXT,
            anatype TEXT,
            note    TEXT
        );

        CREATE TABLE IF NOT EXISTS methods (
            id       INTEGER PRIMARY KEY AUTOINCREMENT,
            metid    TEXT,
            methname TEXT,
            note     TEXT
        );

        CREATE TABLE IF NOT EXISTS proteomes (
            id      INTEGER PRIMARY KEY AUTOINCREMENT,
            mapid   TEXT,
            species TEXT,
            note    TEXT
        );",
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use tempfile::TempDir;

    #[test]
    fn open_and_init_creates_all_tables() {
        let tmp = TempDir::new().unwrap();
        let pool = open_pool(&tmp.path().join("labtrack.db")).unwrap();
        init_schema(&pool).unwrap();

        let conn = pool.get().unwrap();
        for entity in Entity::ALL {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    rusqlite::params![entity.table()],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {}", entity.table());
        }
    }

    #[test]
    fn init_schema_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let pool = open_pool(&tmp.path().join("labtrack.db")).unwrap();
        init_schema(&pool).unwrap();
        init_schema(&pool).unwrap();
    }

    #[test]
    fn open_pool_creates_parent_dirs() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("a").join("b").join("labtrack.db");
        open_pool(&nested).unwrap();
        assert!(nested.parent().unwrap().is_dir());
    }
}
