use std::collections::HashMap;

use super::{Store, MAX_BATCH_PARAMS};
use crate::error::StoreResult;
use crate::model::{FileId, FileRecord};

impl Store {
    pub fn upsert_file(&self, file: &FileRecord) -> StoreResult<FileId> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO files (repo_id, rel_path, content_hash, language, byte_size, last_indexed_at, directory)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(repo_id, rel_path) DO UPDATE SET
                    content_hash = excluded.content_hash,
                    language = excluded.language,
                    byte_size = excluded.byte_size,
                    last_indexed_at = excluded.last_indexed_at,
                    directory = excluded.directory",
                rusqlite::params![
                    file.repo_id,
                    file.rel_path,
                    file.content_hash,
                    file.language,
                    file.byte_size as i64,
                    file.last_indexed_at,
                    file.directory,
                ],
            )?;
            let file_id: i64 = conn.query_row(
                "SELECT file_id FROM files WHERE repo_id = ?1 AND rel_path = ?2",
                rusqlite::params![file.repo_id, file.rel_path],
                |row| row.get(0),
            )?;
            Ok(FileId::new(file_id as u32).expect("sqlite AUTOINCREMENT ids start at 1"))
        })
    }

    pub fn get_file_by_path(&self, repo_id: &str, rel_path: &str) -> StoreResult<Option<FileRecord>> {
        self.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT file_id, repo_id, rel_path, content_hash, language, byte_size, last_indexed_at, directory
                 FROM files WHERE repo_id = ?1 AND rel_path = ?2",
                rusqlite::params![repo_id, rel_path],
                row_to_file,
            );
            match result {
                Ok(f) => Ok(Some(f)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn list_files(&self, repo_id: &str) -> StoreResult<Vec<FileRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT file_id, repo_id, rel_path, content_hash, language, byte_size, last_indexed_at, directory
                 FROM files WHERE repo_id = ?1",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![repo_id], row_to_file)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Chunked batch read: returns a map of found `fileId -> FileRecord`.
    pub fn get_files_by_ids(&self, file_ids: &[FileId]) -> StoreResult<HashMap<FileId, FileRecord>> {
        self.with_conn(|conn| {
            let mut out = HashMap::with_capacity(file_ids.len());
            for chunk in file_ids.chunks(MAX_BATCH_PARAMS) {
                let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(",");
                let sql = format!(
                    "SELECT file_id, repo_id, rel_path, content_hash, language, byte_size, last_indexed_at, directory
                     FROM files WHERE file_id IN ({placeholders})"
                );
                let mut stmt = conn.prepare(&sql)?;
                let params: Vec<i64> = chunk.iter().map(|id| id.value() as i64).collect();
                let rows = stmt.query_map(rusqlite::params_from_iter(params), row_to_file)?;
                for row in rows {
                    let f = row?;
                    out.insert(f.file_id, f);
                }
            }
            Ok(out)
        })
    }

    /// Deletes a file together with everything that cascades from it in one
    /// transaction: symbols, symbol_references, edges incident to those
    /// symbols, metrics, and snapshot rows — per spec §3 "deletion cascade".
    pub fn delete_file_transaction(&self, repo_id: &str, file_id: FileId) -> StoreResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let symbol_ids: Vec<String> = {
                let mut stmt = tx.prepare("SELECT symbol_id FROM symbols WHERE file_id = ?1")?;
                stmt.query_map(rusqlite::params![file_id.value() as i64], |row| row.get(0))?
                    .collect::<Result<_, _>>()?
            };
            for sid in &symbol_ids {
                tx.execute(
                    "DELETE FROM edges WHERE repo_id = ?1 AND (from_symbol = ?2 OR to_symbol = ?2)",
                    rusqlite::params![repo_id, sid],
                )?;
                tx.execute("DELETE FROM metrics WHERE symbol_id = ?1", rusqlite::params![sid])?;
                tx.execute(
                    "DELETE FROM symbol_versions WHERE symbol_id = ?1",
                    rusqlite::params![sid],
                )?;
                tx.execute(
                    "DELETE FROM symbol_feedback_weights WHERE symbol_id = ?1",
                    rusqlite::params![sid],
                )?;
                tx.execute(
                    "DELETE FROM symbol_embeddings WHERE symbol_id = ?1",
                    rusqlite::params![sid],
                )?;
            }
            tx.execute(
                "DELETE FROM symbol_references WHERE file_id = ?1",
                rusqlite::params![file_id.value() as i64],
            )?;
            tx.execute(
                "DELETE FROM symbols WHERE file_id = ?1",
                rusqlite::params![file_id.value() as i64],
            )?;
            tx.execute(
                "DELETE FROM files WHERE file_id = ?1",
                rusqlite::params![file_id.value() as i64],
            )?;
            tx.commit()?;
            Ok(())
        })
    }
}

fn row_to_file(row: &rusqlite::Row) -> rusqlite::Result<FileRecord> {
    let file_id: i64 = row.get(0)?;
    let byte_size: i64 = row.get(5)?;
    Ok(FileRecord {
        file_id: crate::model::FileId::new(file_id as u32).expect("file_id is never 0"),
        repo_id: row.get(1)?,
        rel_path: row.get(2)?,
        content_hash: row.get(3)?,
        language: row.get(4)?,
        byte_size: byte_size as u64,
        last_indexed_at: row.get(6)?,
        directory: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Repository;

    fn setup() -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_repo(&Repository {
                repo_id: "r".into(),
                root_path: "/r".into(),
                config_blob: serde_json::json!({}),
            })
            .unwrap();
        store
    }

    #[test]
    fn upsert_file_is_idempotent_by_path() {
        let store = setup();
        let rec = FileRecord {
            file_id: FileId::new(1).unwrap(),
            repo_id: "r".into(),
            rel_path: "a.ts".into(),
            content_hash: "h1".into(),
            language: Some("typescript".into()),
            byte_size: 10,
            last_indexed_at: 1,
            directory: "".into(),
        };
        let id1 = store.upsert_file(&rec).unwrap();
        let mut updated = rec.clone();
        updated.content_hash = "h2".into();
        let id2 = store.upsert_file(&updated).unwrap();
        assert_eq!(id1, id2);
        let fetched = store.get_file_by_path("r", "a.ts").unwrap().unwrap();
        assert_eq!(fetched.content_hash, "h2");
    }

    #[test]
    fn delete_file_transaction_cascades() {
        let store = setup();
        let file_id = store
            .upsert_file(&FileRecord {
                file_id: FileId::new(1).unwrap(),
                repo_id: "r".into(),
                rel_path: "a.ts".into(),
                content_hash: "h1".into(),
                language: Some("typescript".into()),
                byte_size: 10,
                last_indexed_at: 1,
                directory: "".into(),
            })
            .unwrap();

        let sym = crate::model::Symbol::new(
            "sym1".into(),
            "r",
            file_id,
            crate::model::SymbolKind::Function,
            "a",
            "typescript",
            crate::model::Range::new(1, 0, 2, 0),
            "fp1",
            1,
        );
        store.upsert_symbol(&sym).unwrap();

        store.delete_file_transaction("r", file_id).unwrap();
        assert!(store.get_file_by_path("r", "a.ts").unwrap().is_none());
        assert!(store.get_symbol("sym1").unwrap().is_none());
    }
}
