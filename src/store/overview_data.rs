use super::Store;
use crate::error::StoreResult;

/// Per-directory rollup consumed by the overview builder (C9).
#[derive(Debug, Clone, Default)]
pub struct DirectoryAggregate {
    pub directory: String,
    pub file_count: u32,
    pub symbol_count: u32,
    pub kind_counts: std::collections::HashMap<String, u32>,
    pub top_fan_in: Vec<(String, u32)>,
    pub top_churn: Vec<(String, u32)>,
}

#[derive(Debug, Clone, Default)]
pub struct Hotspots {
    pub most_depended: Vec<(String, u32)>,
    pub most_changed: Vec<(String, u32)>,
    pub largest_files: Vec<(String, u64)>,
    pub most_connected_files: Vec<(String, u32)>,
}

impl Store {
    pub fn directory_aggregates(&self, repo_id: &str, top_n: usize) -> StoreResult<Vec<DirectoryAggregate>> {
        self.with_conn(|conn| {
            let mut by_dir: std::collections::HashMap<String, DirectoryAggregate> = std::collections::HashMap::new();

            {
                let mut stmt = conn.prepare(
                    "SELECT directory, COUNT(*) FROM files WHERE repo_id = ?1 GROUP BY directory",
                )?;
                let rows = stmt.query_map(rusqlite::params![repo_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u32))
                })?;
                for row in rows {
                    let (dir, count) = row?;
                    by_dir.entry(dir.clone()).or_insert_with(|| DirectoryAggregate {
                        directory: dir,
                        ..Default::default()
                    }).file_count = count;
                }
            }

            {
                let mut stmt = conn.prepare(
                    "SELECT f.directory, s.kind, COUNT(*) FROM symbols s JOIN files f ON f.file_id = s.file_id
                     WHERE s.repo_id = ?1 GROUP BY f.directory, s.kind",
                )?;
                let rows = stmt.query_map(rusqlite::params![repo_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)? as u32))
                })?;
                for row in rows {
                    let (dir, kind, count) = row?;
                    let entry = by_dir.entry(dir.clone()).or_insert_with(|| DirectoryAggregate {
                        directory: dir,
                        ..Default::default()
                    });
                    entry.symbol_count += count;
                    *entry.kind_counts.entry(kind).or_insert(0) += count;
                }
            }

            {
                let mut stmt = conn.prepare(
                    "SELECT f.directory, s.name, m.fan_in FROM metrics m
                     JOIN symbols s ON s.symbol_id = m.symbol_id
                     JOIN files f ON f.file_id = s.file_id
                     WHERE s.repo_id = ?1 ORDER BY m.fan_in DESC",
                )?;
                let rows = stmt.query_map(rusqlite::params![repo_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)? as u32))
                })?;
                for row in rows {
                    let (dir, name, fan_in) = row?;
                    if let Some(entry) = by_dir.get_mut(&dir) {
                        if entry.top_fan_in.len() < top_n {
                            entry.top_fan_in.push((name, fan_in));
                        }
                    }
                }
            }

            {
                let mut stmt = conn.prepare(
                    "SELECT f.directory, s.name, m.churn_30d FROM metrics m
                     JOIN symbols s ON s.symbol_id = m.symbol_id
                     JOIN files f ON f.file_id = s.file_id
                     WHERE s.repo_id = ?1 ORDER BY m.churn_30d DESC",
                )?;
                let rows = stmt.query_map(rusqlite::params![repo_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)? as u32))
                })?;
                for row in rows {
                    let (dir, name, churn) = row?;
                    if let Some(entry) = by_dir.get_mut(&dir) {
                        if entry.top_churn.len() < top_n {
                            entry.top_churn.push((name, churn));
                        }
                    }
                }
            }

            let mut out: Vec<DirectoryAggregate> = by_dir.into_values().collect();
            out.sort_by(|a, b| a.directory.cmp(&b.directory));
            Ok(out)
        })
    }

    pub fn hotspots(&self, repo_id: &str, top_n: usize) -> StoreResult<Hotspots> {
        self.with_conn(|conn| {
            let most_depended = query_top_pairs(
                conn,
                "SELECT s.name, m.fan_in FROM metrics m JOIN symbols s ON s.symbol_id = m.symbol_id
                 WHERE s.repo_id = ?1 ORDER BY m.fan_in DESC LIMIT ?2",
                repo_id,
                top_n,
            )?;
            let most_changed = query_top_pairs(
                conn,
                "SELECT s.name, m.churn_30d FROM metrics m JOIN symbols s ON s.symbol_id = m.symbol_id
                 WHERE s.repo_id = ?1 ORDER BY m.churn_30d DESC LIMIT ?2",
                repo_id,
                top_n,
            )?;
            let most_connected_files = query_top_pairs(
                conn,
                "SELECT f.rel_path, COUNT(*) FROM symbols s JOIN files f ON f.file_id = s.file_id
                 JOIN metrics m ON m.symbol_id = s.symbol_id
                 WHERE s.repo_id = ?1 GROUP BY f.rel_path ORDER BY COUNT(*) DESC LIMIT ?2",
                repo_id,
                top_n,
            )?;

            let mut stmt = conn.prepare(
                "SELECT rel_path, byte_size FROM files WHERE repo_id = ?1 ORDER BY byte_size DESC LIMIT ?2",
            )?;
            let largest_files = stmt
                .query_map(rusqlite::params![repo_id, top_n as i64], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Hotspots {
                most_depended,
                most_changed,
                largest_files,
                most_connected_files,
            })
        })
    }
}

fn query_top_pairs(
    conn: &rusqlite::Connection,
    sql: &str,
    repo_id: &str,
    limit: usize,
) -> StoreResult<Vec<(String, u32)>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(rusqlite::params![repo_id, limit as i64], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u32))
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileId, FileRecord, Range, Symbol, SymbolKind};

    #[test]
    fn directory_aggregates_group_by_directory() {
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
                rel_path: "src/a.ts".into(),
                content_hash: "h".into(),
                language: Some("typescript".into()),
                byte_size: 5,
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
                "f",
                "typescript",
                Range::new(1, 0, 2, 0),
                "fp",
                1,
            ))
            .unwrap();

        let aggs = store.directory_aggregates("r", 3).unwrap();
        assert_eq!(aggs.len(), 1);
        assert_eq!(aggs[0].directory, "src");
        assert_eq!(aggs[0].file_count, 1);
        assert_eq!(aggs[0].symbol_count, 1);
    }
}
