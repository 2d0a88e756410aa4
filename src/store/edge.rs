use std::collections::HashMap;

use super::Store;
use crate::error::StoreResult;
use crate::model::{Edge, EdgeKind, EdgeTarget, ResolutionStrategy};

impl Store {
    pub fn insert_edge(&self, edge: &Edge) -> StoreResult<()> {
        self.with_conn(|conn| {
            let (to_symbol, to_placeholder): (Option<&str>, Option<&str>) = match &edge.to {
                EdgeTarget::Symbol(id) => (Some(id.as_str()), None),
                EdgeTarget::Placeholder(name) => (None, Some(name.as_str())),
            };
            conn.execute(
                "INSERT INTO edges (repo_id, kind, from_symbol, to_symbol, to_placeholder, weight, confidence, resolution_strategy, provenance, created_at)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
                rusqlite::params![
                    edge.repo_id,
                    edge.kind.as_str(),
                    edge.from,
                    to_symbol,
                    to_placeholder,
                    edge.weight,
                    edge.confidence,
                    edge.resolution_strategy.as_str(),
                    edge.provenance,
                    edge.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn delete_outgoing_call_edges(&self, repo_id: &str, from_symbols: &[String]) -> StoreResult<()> {
        self.with_conn(|conn| {
            for chunk in Store::chunk_ids(from_symbols) {
                let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(",");
                let sql = format!(
                    "DELETE FROM edges WHERE repo_id = ? AND kind = 'call' AND from_symbol IN ({placeholders})"
                );
                let mut params: Vec<&dyn rusqlite::ToSql> = vec![&repo_id];
                for s in chunk {
                    params.push(s);
                }
                conn.execute(&sql, params.as_slice())?;
            }
            Ok(())
        })
    }

    /// Mirrors [`Store::delete_outgoing_call_edges`] for the module-keyed
    /// side of re-indexing: a file's import edges all share one `from`
    /// (its module symbol), so this takes a single id rather than a batch.
    pub fn delete_outgoing_import_edges(&self, repo_id: &str, module_from: &str) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM edges WHERE repo_id = ?1 AND kind = 'import' AND from_symbol = ?2",
                rusqlite::params![repo_id, module_from],
            )?;
            Ok(())
        })
    }

    pub fn get_edges_from_symbols(&self, repo_id: &str, symbol_ids: &[String]) -> StoreResult<Vec<Edge>> {
        self.with_conn(|conn| {
            let mut out = Vec::new();
            for chunk in Store::chunk_ids(symbol_ids) {
                let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(",");
                let sql = format!(
                    "SELECT repo_id, kind, from_symbol, to_symbol, to_placeholder, weight, confidence, resolution_strategy, provenance, created_at
                     FROM edges WHERE repo_id = ? AND from_symbol IN ({placeholders})"
                );
                let mut params: Vec<&dyn rusqlite::ToSql> = vec![&repo_id];
                for s in chunk {
                    params.push(s);
                }
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params.as_slice(), row_to_edge)?;
                for row in rows {
                    out.push(row?);
                }
            }
            Ok(out)
        })
    }

    pub fn get_edges_to_symbols(&self, repo_id: &str, symbol_ids: &[String]) -> StoreResult<Vec<Edge>> {
        self.with_conn(|conn| {
            let mut out = Vec::new();
            for chunk in Store::chunk_ids(symbol_ids) {
                let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(",");
                let sql = format!(
                    "SELECT repo_id, kind, from_symbol, to_symbol, to_placeholder, weight, confidence, resolution_strategy, provenance, created_at
                     FROM edges WHERE repo_id = ? AND to_symbol IN ({placeholders})"
                );
                let mut params: Vec<&dyn rusqlite::ToSql> = vec![&repo_id];
                for s in chunk {
                    params.push(s);
                }
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params.as_slice(), row_to_edge)?;
                for row in rows {
                    out.push(row?);
                }
            }
            Ok(out)
        })
    }

    pub fn list_placeholder_edges(&self, repo_id: &str) -> StoreResult<Vec<Edge>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT repo_id, kind, from_symbol, to_symbol, to_placeholder, weight, confidence, resolution_strategy, provenance, created_at
                 FROM edges WHERE repo_id = ?1 AND to_placeholder IS NOT NULL",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![repo_id], row_to_edge)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Rewrites a placeholder edge's target to a concrete symbol and upgrades
    /// its strategy/confidence — the "cleanup sweep" from spec §4.4.
    pub fn rewrite_placeholder_edge(
        &self,
        repo_id: &str,
        from_symbol: &str,
        placeholder_name: &str,
        resolved_symbol_id: &str,
        strategy: ResolutionStrategy,
        confidence: f32,
    ) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE edges SET to_symbol = ?1, to_placeholder = NULL, resolution_strategy = ?2, confidence = ?3
                 WHERE repo_id = ?4 AND from_symbol = ?5 AND to_placeholder = ?6",
                rusqlite::params![
                    resolved_symbol_id,
                    strategy.as_str(),
                    confidence,
                    repo_id,
                    from_symbol,
                    placeholder_name,
                ],
            )?;
            Ok(())
        })
    }

    /// All edges for a repo, unfiltered — export (C10) needs the full set
    /// rather than the `from`/`to`-scoped lookups the slice engine uses.
    pub fn list_edges_for_repo(&self, repo_id: &str) -> StoreResult<Vec<Edge>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT repo_id, kind, from_symbol, to_symbol, to_placeholder, weight, confidence, resolution_strategy, provenance, created_at
                 FROM edges WHERE repo_id = ?1",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![repo_id], row_to_edge)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Fan-in/fan-out per symbol, for metrics refresh (C4 finalize step).
    pub fn compute_fan_counts(&self, repo_id: &str) -> StoreResult<HashMap<String, (u32, u32)>> {
        self.with_conn(|conn| {
            let mut out: HashMap<String, (u32, u32)> = HashMap::new();
            {
                let mut stmt = conn.prepare(
                    "SELECT from_symbol, COUNT(*) FROM edges WHERE repo_id = ?1 GROUP BY from_symbol",
                )?;
                let rows = stmt.query_map(rusqlite::params![repo_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u32))
                })?;
                for row in rows {
                    let (sym, count) = row?;
                    out.entry(sym).or_insert((0, 0)).1 = count;
                }
            }
            {
                let mut stmt = conn.prepare(
                    "SELECT to_symbol, COUNT(*) FROM edges WHERE repo_id = ?1 AND to_symbol IS NOT NULL GROUP BY to_symbol",
                )?;
                let rows = stmt.query_map(rusqlite::params![repo_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u32))
                })?;
                for row in rows {
                    let (sym, count) = row?;
                    out.entry(sym).or_insert((0, 0)).0 = count;
                }
            }
            Ok(out)
        })
    }
}

fn row_to_edge(row: &rusqlite::Row) -> rusqlite::Result<Edge> {
    let kind: String = row.get(1)?;
    let to_symbol: Option<String> = row.get(3)?;
    let to_placeholder: Option<String> = row.get(4)?;
    let strategy: String = row.get(7)?;
    Ok(Edge {
        repo_id: row.get(0)?,
        kind: EdgeKind::from_str(&kind).unwrap_or(EdgeKind::Call),
        from: row.get(2)?,
        to: match (to_symbol, to_placeholder) {
            (Some(s), _) => EdgeTarget::Symbol(s),
            (None, Some(p)) => EdgeTarget::Placeholder(p),
            (None, None) => EdgeTarget::Placeholder(String::new()),
        },
        weight: row.get(5)?,
        confidence: row.get(6)?,
        resolution_strategy: ResolutionStrategy::from_str(&strategy).unwrap_or(ResolutionStrategy::Unresolved),
        provenance: row.get(8)?,
        created_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileId, FileRecord, Range, Symbol, SymbolKind};

    fn setup() -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_repo(&crate::model::Repository {
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
        for (id, name) in [("a", "a"), ("b", "b")] {
            store
                .upsert_symbol(&Symbol::new(
                    id.into(),
                    "r",
                    file_id,
                    SymbolKind::Function,
                    name,
                    "typescript",
                    Range::new(1, 0, 2, 0),
                    "fp",
                    1,
                ))
                .unwrap();
        }
        store
    }

    #[test]
    fn placeholder_edge_round_trips_and_rewrites() {
        let store = setup();
        let edge = Edge::placeholder("r", EdgeKind::Call, "a".into(), "unresolved:call:b", "pass1", 1);
        store.insert_edge(&edge).unwrap();

        let placeholders = store.list_placeholder_edges("r").unwrap();
        assert_eq!(placeholders.len(), 1);
        assert!(placeholders[0].resolution_strategy == ResolutionStrategy::Unresolved);

        store
            .rewrite_placeholder_edge("r", "a", "unresolved:call:b", "b", ResolutionStrategy::Heuristic, 0.8)
            .unwrap();

        let placeholders = store.list_placeholder_edges("r").unwrap();
        assert!(placeholders.is_empty());
        let from_a = store.get_edges_from_symbols("r", &["a".to_string()]).unwrap();
        assert_eq!(from_a.len(), 1);
        assert_eq!(from_a[0].to, EdgeTarget::Symbol("b".into()));
        assert_eq!(from_a[0].confidence, 0.8);
    }

    #[test]
    fn fan_counts_reflect_edges() {
        let store = setup();
        store
            .insert_edge(&Edge {
                repo_id: "r".into(),
                kind: EdgeKind::Call,
                from: "a".into(),
                to: EdgeTarget::Symbol("b".into()),
                weight: 1.0,
                confidence: 0.9,
                resolution_strategy: ResolutionStrategy::Exact,
                provenance: "pass1".into(),
                created_at: 1,
            })
            .unwrap();
        let counts = store.compute_fan_counts("r").unwrap();
        assert_eq!(counts.get("a").unwrap().1, 1); // fan-out
        assert_eq!(counts.get("b").unwrap().0, 1); // fan-in
    }
}
