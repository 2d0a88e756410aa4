use super::Store;
use crate::error::StoreResult;
use crate::model::SymbolMetrics;

impl Store {
    pub fn upsert_metrics(&self, metrics: &SymbolMetrics) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO metrics (symbol_id, fan_in, fan_out, churn_30d, test_refs_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(symbol_id) DO UPDATE SET
                    fan_in = excluded.fan_in,
                    fan_out = excluded.fan_out,
                    churn_30d = excluded.churn_30d,
                    test_refs_json = excluded.test_refs_json,
                    updated_at = excluded.updated_at",
                rusqlite::params![
                    metrics.symbol_id,
                    metrics.fan_in,
                    metrics.fan_out,
                    metrics.churn_30d,
                    metrics.test_refs_json.as_ref().map(|v| v.to_string()),
                    metrics.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_metrics(&self, symbol_id: &str) -> StoreResult<Option<SymbolMetrics>> {
        self.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT symbol_id, fan_in, fan_out, churn_30d, test_refs_json, updated_at
                 FROM metrics WHERE symbol_id = ?1",
                rusqlite::params![symbol_id],
                |row| {
                    let test_refs_json: Option<String> = row.get(4)?;
                    Ok(SymbolMetrics {
                        symbol_id: row.get(0)?,
                        fan_in: row.get(1)?,
                        fan_out: row.get(2)?,
                        churn_30d: row.get(3)?,
                        test_refs_json: test_refs_json.and_then(|s| serde_json::from_str(&s).ok()),
                        updated_at: row.get(5)?,
                    })
                },
            );
            match result {
                Ok(m) => Ok(Some(m)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Inserts a `symbol_references` row (the inverted index over test files
    /// that reference a symbol — spec §4.4 "rebuild symbol-reference inverted
    /// index for test files").
    pub fn record_symbol_reference(&self, symbol_id: &str, file_id: crate::model::FileId, ref_kind: &str) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO symbol_references (symbol_id, file_id, ref_kind) VALUES (?1, ?2, ?3)",
                rusqlite::params![symbol_id, file_id.value() as i64, ref_kind],
            )?;
            Ok(())
        })
    }

    /// Clears all reference rows for a file before re-indexing it, so stale
    /// references from a previous parse don't linger.
    pub fn clear_symbol_references_for_file(&self, file_id: crate::model::FileId) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM symbol_references WHERE file_id = ?1",
                rusqlite::params![file_id.value() as i64],
            )?;
            Ok(())
        })
    }

    /// Reverse of [`Store::test_refs_for_symbol`]: symbols referenced by a
    /// given file, used by the slice engine's entry-derivation step
    /// ("symbols owned by test files that reference a failing test path").
    pub fn symbols_referencing_file(&self, file_id: crate::model::FileId, ref_kind: &str) -> StoreResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT symbol_id FROM symbol_references WHERE file_id = ?1 AND ref_kind = ?2",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![file_id.value() as i64, ref_kind], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn test_refs_for_symbol(&self, symbol_id: &str) -> StoreResult<Vec<crate::model::FileId>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT file_id FROM symbol_references WHERE symbol_id = ?1 AND ref_kind = 'test'",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![symbol_id], |row| {
                    let id: i64 = row.get(0)?;
                    Ok(crate::model::FileId::new(id as u32).expect("file_id is never 0"))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileId, FileRecord, Range, Repository, Symbol, SymbolKind};

    fn setup() -> (Store, FileId) {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_repo(&Repository {
                repo_id: "r".into(),
                root_path: "/r".into(),
                config_blob: serde_json::json!({}),
            })
            .unwrap();
        let file_id = store
            .upsert_file(&FileRecord {
                file_id: FileId::new(1).unwrap(),
                repo_id: "r".into(),
                rel_path: "a.ts".into(),
                content_hash: "h".into(),
                language: Some("typescript".into()),
                byte_size: 1,
                last_indexed_at: 0,
                directory: "".into(),
            })
            .unwrap();
        store
            .upsert_symbol(&Symbol::new(
                "sym1".into(),
                "r",
                file_id,
                SymbolKind::Function,
                "a",
                "typescript",
                Range::new(1, 0, 2, 0),
                "fp",
                1,
            ))
            .unwrap();
        (store, file_id)
    }

    #[test]
    fn metrics_round_trip() {
        let (store, _) = setup();
        store
            .upsert_metrics(&SymbolMetrics {
                symbol_id: "sym1".into(),
                fan_in: 3,
                fan_out: 1,
                churn_30d: 0,
                test_refs_json: None,
                updated_at: 5,
            })
            .unwrap();
        let fetched = store.get_metrics("sym1").unwrap().unwrap();
        assert_eq!(fetched.fan_in, 3);
    }

    #[test]
    fn symbol_reference_round_trips_and_clears() {
        let (store, file_id) = setup();
        store.record_symbol_reference("sym1", file_id, "test").unwrap();
        assert_eq!(store.test_refs_for_symbol("sym1").unwrap(), vec![file_id]);
        store.clear_symbol_references_for_file(file_id).unwrap();
        assert!(store.test_refs_for_symbol("sym1").unwrap().is_empty());
    }

    #[test]
    fn symbols_referencing_file_finds_reverse_index() {
        let (store, file_id) = setup();
        store.record_symbol_reference("sym1", file_id, "test").unwrap();
        assert_eq!(store.symbols_referencing_file(file_id, "test").unwrap(), vec!["sym1".to_string()]);
        assert!(store.symbols_referencing_file(file_id, "other").unwrap().is_empty());
    }
}
