use super::Store;
use crate::error::StoreResult;
use crate::model::Symbol;

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub symbol: Symbol,
    pub file_path: String,
}

/// File-path penalty applied to rank 3 of `searchSymbols`' ordering: adapter,
/// test, script, and spec paths rank behind "real" source files.
fn path_penalty(path: &str) -> u8 {
    let lower = path.to_ascii_lowercase();
    if lower.contains("/tests/")
        || lower.contains(".test.")
        || lower.contains(".spec.")
        || lower.contains("/scripts/")
        || lower.contains("/adapters/")
    {
        1
    } else {
        0
    }
}

/// Escapes SQL LIKE wildcards so a raw user query can't accidentally match
/// more than intended (`%`, `_`, and the escape character itself).
fn escape_like(query: &str) -> String {
    query.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

impl Store {
    /// Ranked by, in order: (1) exact-case name match, (2) case-insensitive
    /// name match, (3) file-path penalty, (4) kind priority, (5) name match
    /// before summary match — per spec §4.2.
    pub fn search_symbols(&self, repo_id: &str, query: &str, limit: usize) -> StoreResult<Vec<SearchHit>> {
        let escaped = escape_like(query);
        let pattern = format!("%{escaped}%");

        self.with_conn(|conn| {
            let sql = "SELECT s.symbol_id, s.repo_id, s.file_id, s.kind, s.name, s.exported, s.visibility,
                              s.language, s.start_line, s.start_column, s.end_line, s.end_column,
                              s.ast_fingerprint, s.signature_json, s.summary, s.invariants_json,
                              s.side_effects_json, s.updated_at, f.rel_path
                       FROM symbols s JOIN files f ON f.file_id = s.file_id
                       WHERE s.repo_id = ?1
                         AND (s.name LIKE ?2 ESCAPE '\\' OR s.summary LIKE ?2 ESCAPE '\\')";
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map(rusqlite::params![repo_id, pattern], row_to_hit)?;
            let mut hits: Vec<SearchHit> = rows.collect::<Result<_, _>>()?;

            let lower_query = query.to_ascii_lowercase();
            hits.sort_by(|a, b| {
                let exact_a = a.symbol.name == query;
                let exact_b = b.symbol.name == query;
                let ci_a = a.symbol.name.to_ascii_lowercase() == lower_query;
                let ci_b = b.symbol.name.to_ascii_lowercase() == lower_query;
                let name_match_a = a.symbol.name.to_ascii_lowercase().contains(&lower_query);
                let name_match_b = b.symbol.name.to_ascii_lowercase().contains(&lower_query);

                exact_b
                    .cmp(&exact_a)
                    .then(ci_b.cmp(&ci_a))
                    .then(path_penalty(&a.file_path).cmp(&path_penalty(&b.file_path)))
                    .then(a.symbol.kind.search_priority().cmp(&b.symbol.kind.search_priority()))
                    .then(name_match_b.cmp(&name_match_a))
            });
            hits.truncate(limit);
            Ok(hits)
        })
    }
}

fn row_to_hit(row: &rusqlite::Row) -> rusqlite::Result<SearchHit> {
    let file_id: i64 = row.get(2)?;
    let kind_str: String = row.get(3)?;
    let exported: i64 = row.get(5)?;
    let visibility: Option<String> = row.get(6)?;
    let signature_json: Option<String> = row.get(13)?;
    let invariants_json: Option<String> = row.get(15)?;
    let side_effects_json: Option<String> = row.get(16)?;
    let symbol = Symbol {
        symbol_id: row.get(0)?,
        repo_id: row.get(1)?,
        file_id: crate::model::FileId::new(file_id as u32).expect("file_id is never 0"),
        kind: crate::model::SymbolKind::from_str(&kind_str).unwrap_or(crate::model::SymbolKind::Variable),
        name: row.get(4)?,
        exported: exported != 0,
        visibility: visibility.and_then(|v| crate::model::Visibility::from_str(&v)),
        language: row.get(7)?,
        range: crate::model::Range::new(row.get(8)?, row.get(9)?, row.get(10)?, row.get(11)?),
        ast_fingerprint: row.get(12)?,
        signature_json: signature_json.and_then(|s| serde_json::from_str(&s).ok()),
        summary: row.get(14)?,
        invariants_json: invariants_json.and_then(|s| serde_json::from_str(&s).ok()),
        side_effects_json: side_effects_json.and_then(|s| serde_json::from_str(&s).ok()),
        updated_at: row.get(17)?,
    };
    Ok(SearchHit {
        symbol,
        file_path: row.get(18)?,
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
                rel_path: "src/widget.ts".into(),
                content_hash: "h".into(),
                language: Some("typescript".into()),
                byte_size: 1,
                last_indexed_at: 0,
                directory: "src".into(),
            })
            .unwrap();
        let test_file_id = store
            .upsert_file(&FileRecord {
                file_id: FileId::new(2).unwrap(),
                repo_id: "r".into(),
                rel_path: "src/widget.test.ts".into(),
                content_hash: "h".into(),
                language: Some("typescript".into()),
                byte_size: 1,
                last_indexed_at: 0,
                directory: "src".into(),
            })
            .unwrap();
        store
            .upsert_symbol(&Symbol::new(
                "s1".into(),
                "r",
                file_id,
                SymbolKind::Function,
                "render",
                "typescript",
                Range::new(1, 0, 2, 0),
                "fp1",
                1,
            ))
            .unwrap();
        store
            .upsert_symbol(&Symbol::new(
                "s2".into(),
                "r",
                test_file_id,
                SymbolKind::Function,
                "render",
                "typescript",
                Range::new(1, 0, 2, 0),
                "fp2",
                1,
            ))
            .unwrap();
        store
    }

    #[test]
    fn exact_match_ranks_above_test_file_duplicate() {
        let store = setup();
        let hits = store.search_symbols("r", "render", 10).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].symbol.symbol_id, "s1");
    }

    #[test]
    fn like_wildcards_in_query_are_escaped() {
        let store = setup();
        let hits = store.search_symbols("r", "%", 10).unwrap();
        assert!(hits.is_empty());
    }
}
