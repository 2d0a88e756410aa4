use std::collections::HashMap;

use super::Store;
use crate::error::StoreResult;
use crate::model::{FileId, Symbol, SymbolKind, Visibility};

impl Store {
    pub fn upsert_symbol(&self, symbol: &Symbol) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO symbols (
                    symbol_id, repo_id, file_id, kind, name, exported, visibility, language,
                    start_line, start_column, end_line, end_column, ast_fingerprint,
                    signature_json, summary, invariants_json, side_effects_json, updated_at
                 ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)
                 ON CONFLICT(symbol_id) DO UPDATE SET
                    exported = excluded.exported,
                    visibility = excluded.visibility,
                    start_line = excluded.start_line,
                    start_column = excluded.start_column,
                    end_line = excluded.end_line,
                    end_column = excluded.end_column,
                    ast_fingerprint = excluded.ast_fingerprint,
                    signature_json = excluded.signature_json,
                    summary = excluded.summary,
                    invariants_json = excluded.invariants_json,
                    side_effects_json = excluded.side_effects_json,
                    updated_at = excluded.updated_at",
                rusqlite::params![
                    symbol.symbol_id,
                    symbol.repo_id,
                    symbol.file_id.value() as i64,
                    symbol.kind.as_str(),
                    symbol.name,
                    symbol.exported as i64,
                    symbol.visibility.map(Visibility::as_str),
                    symbol.language,
                    symbol.range.start_line,
                    symbol.range.start_column,
                    symbol.range.end_line,
                    symbol.range.end_column,
                    symbol.ast_fingerprint,
                    symbol.signature_json.as_ref().map(|v| v.to_string()),
                    symbol.summary,
                    symbol.invariants_json.as_ref().map(|v| v.to_string()),
                    symbol.side_effects_json.as_ref().map(|v| v.to_string()),
                    symbol.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_symbol(&self, symbol_id: &str) -> StoreResult<Option<Symbol>> {
        self.with_conn(|conn| {
            let result = conn.query_row(SELECT_SYMBOL_SQL, rusqlite::params![symbol_id], row_to_symbol);
            match result {
                Ok(s) => Ok(Some(s)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_symbols_by_ids(&self, ids: &[String]) -> StoreResult<HashMap<String, Symbol>> {
        self.with_conn(|conn| {
            let mut out = HashMap::with_capacity(ids.len());
            for chunk in Store::chunk_ids(ids) {
                let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(",");
                let sql = format!(
                    "SELECT symbol_id, repo_id, file_id, kind, name, exported, visibility, language,
                            start_line, start_column, end_line, end_column, ast_fingerprint,
                            signature_json, summary, invariants_json, side_effects_json, updated_at
                     FROM symbols WHERE symbol_id IN ({placeholders})"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(rusqlite::params_from_iter(chunk.iter()), row_to_symbol)?;
                for row in rows {
                    let s = row?;
                    out.insert(s.symbol_id.clone(), s);
                }
            }
            Ok(out)
        })
    }

    pub fn list_symbols_for_file(&self, file_id: FileId) -> StoreResult<Vec<Symbol>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT symbol_id, repo_id, file_id, kind, name, exported, visibility, language,
                        start_line, start_column, end_line, end_column, ast_fingerprint,
                        signature_json, summary, invariants_json, side_effects_json, updated_at
                 FROM symbols WHERE file_id = ?1"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![file_id.value() as i64], row_to_symbol)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn list_symbols_for_repo(&self, repo_id: &str) -> StoreResult<Vec<Symbol>> {
        self.with_conn(|conn| {
            let sql = "SELECT symbol_id, repo_id, file_id, kind, name, exported, visibility, language,
                        start_line, start_column, end_line, end_column, ast_fingerprint,
                        signature_json, summary, invariants_json, side_effects_json, updated_at
                 FROM symbols WHERE repo_id = ?1";
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt
                .query_map(rusqlite::params![repo_id], row_to_symbol)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Deletes a specific set of symbols together with everything keyed off
    /// their identity (edges, metrics, snapshots, feedback, embeddings) but
    /// leaves their file row alone — the stale-symbol half of re-indexing a
    /// changed file, where [`Store::delete_file_transaction`] is too coarse.
    pub fn delete_symbols_transaction(&self, repo_id: &str, symbol_ids: &[String]) -> StoreResult<()> {
        if symbol_ids.is_empty() {
            return Ok(());
        }
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            for sid in symbol_ids {
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
                tx.execute("DELETE FROM symbols WHERE symbol_id = ?1", rusqlite::params![sid])?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Symbols fully or partially contained in `[start_line, end_line]`,
    /// sorted containment-first then by distance to the range start — per
    /// spec §4.2 `findSymbolsInRange`.
    pub fn find_symbols_in_range(
        &self,
        repo_id: &str,
        file_id: FileId,
        start_line: u32,
        end_line: u32,
    ) -> StoreResult<Vec<Symbol>> {
        let mut symbols = self
            .list_symbols_for_file(file_id)?
            .into_iter()
            .filter(|s| s.repo_id == repo_id)
            .filter(|s| {
                let query = crate::model::Range::new(start_line, 0, end_line, 0);
                s.range.overlaps(&query)
            })
            .collect::<Vec<_>>();

        let query = crate::model::Range::new(start_line, 0, end_line, 0);
        symbols.sort_by(|a, b| {
            let a_contains = a.range.fully_contains(&query);
            let b_contains = b.range.fully_contains(&query);
            b_contains
                .cmp(&a_contains)
                .then(a.range.distance_from_start(start_line).cmp(&b.range.distance_from_start(start_line)))
        });
        Ok(symbols)
    }
}

const SELECT_SYMBOL_SQL: &str = "SELECT symbol_id, repo_id, file_id, kind, name, exported, visibility, language,
        start_line, start_column, end_line, end_column, ast_fingerprint,
        signature_json, summary, invariants_json, side_effects_json, updated_at
 FROM symbols WHERE symbol_id = ?1";

fn row_to_symbol(row: &rusqlite::Row) -> rusqlite::Result<Symbol> {
    let file_id: i64 = row.get(2)?;
    let kind_str: String = row.get(3)?;
    let exported: i64 = row.get(5)?;
    let visibility: Option<String> = row.get(6)?;
    let signature_json: Option<String> = row.get(13)?;
    let invariants_json: Option<String> = row.get(15)?;
    let side_effects_json: Option<String> = row.get(16)?;
    Ok(Symbol {
        symbol_id: row.get(0)?,
        repo_id: row.get(1)?,
        file_id: FileId::new(file_id as u32).expect("file_id is never 0"),
        kind: SymbolKind::from_str(&kind_str).unwrap_or(SymbolKind::Variable),
        name: row.get(4)?,
        exported: exported != 0,
        visibility: visibility.and_then(|v| Visibility::from_str(&v)),
        language: row.get(7)?,
        range: crate::model::Range::new(row.get(8)?, row.get(9)?, row.get(10)?, row.get(11)?),
        ast_fingerprint: row.get(12)?,
        signature_json: signature_json.and_then(|s| serde_json::from_str(&s).ok()),
        summary: row.get(14)?,
        invariants_json: invariants_json.and_then(|s| serde_json::from_str(&s).ok()),
        side_effects_json: side_effects_json.and_then(|s| serde_json::from_str(&s).ok()),
        updated_at: row.get(17)?,
    })
}
