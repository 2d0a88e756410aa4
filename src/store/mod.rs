//! Transactional persistence (C2). A single `rusqlite::Connection` guarded
//! by a `parking_lot::Mutex` — the "single-writer, store is the sole shared
//! resource" discipline from spec §5. Methods are split across submodules by
//! entity; all operate on the same `Store` type.

mod audit;
mod blobs;
mod edge;
mod file;
mod handle;
mod metrics;
mod overview_data;
mod schema;
mod search;
mod symbol;
mod version;

pub use overview_data::{DirectoryAggregate, Hotspots};
pub use search::SearchHit;

use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

use crate::error::{StoreError, StoreResult};
use crate::model::Repository;

/// SQLite's compiled-in bound-parameter limit is 999 by default; 900 leaves
/// headroom for fixed parameters alongside a chunked `IN (...)` list.
pub const MAX_BATCH_PARAMS: usize = 900;

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "busy_timeout", 5000)?;
        conn.set_prepared_statement_cache_capacity(128);
        conn.execute_batch(schema::SCHEMA_SQL)?;
        conn.pragma_update(None, "user_version", schema::SCHEMA_VERSION)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Splits `ids` into chunks no larger than [`MAX_BATCH_PARAMS`], per
    /// spec §4.2 "chunk the input into constant-sized batches".
    pub(crate) fn chunk_ids<'a, T>(ids: &'a [T]) -> impl Iterator<Item = &'a [T]> {
        ids.chunks(MAX_BATCH_PARAMS)
    }

    pub fn upsert_repo(&self, repo: &Repository) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO repos (repo_id, root_path, config_blob) VALUES (?1, ?2, ?3)
             ON CONFLICT(repo_id) DO UPDATE SET root_path = excluded.root_path, config_blob = excluded.config_blob",
            rusqlite::params![repo.repo_id, repo.root_path, repo.config_blob.to_string()],
        )?;
        Ok(())
    }

    pub fn get_repo(&self, repo_id: &str) -> StoreResult<Option<Repository>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached("SELECT repo_id, root_path, config_blob FROM repos WHERE repo_id = ?1")?;
        let result = stmt
            .query_row(rusqlite::params![repo_id], |row| {
                let config_blob: String = row.get(2)?;
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, config_blob))
            })
            .map(|(repo_id, root_path, config_blob)| Repository {
                repo_id,
                root_path,
                config_blob: serde_json::from_str(&config_blob).unwrap_or(serde_json::Value::Null),
            });
        match result {
            Ok(repo) => Ok(Some(repo)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn require_repo(&self, repo_id: &str) -> StoreResult<Repository> {
        self.get_repo(repo_id)?.ok_or_else(|| StoreError::UnknownRepo {
            repo_id: repo_id.to_string(),
        })
    }

    pub fn delete_repo(&self, repo_id: &str) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM repos WHERE repo_id = ?1", rusqlite::params![repo_id])?;
        Ok(())
    }

    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    pub(crate) fn with_conn_mut<T>(&self, f: impl FnOnce(&mut Connection) -> StoreResult<T>) -> StoreResult<T> {
        let mut conn = self.conn.lock();
        f(&mut conn)
    }
}
