use super::Store;
use crate::error::StoreResult;

/// One row per indexing run — supplemental observability the overview
/// builder and watcher health reporting both read from (SPEC_FULL.md §3).
#[derive(Debug, Clone)]
pub struct AuditRun {
    pub repo_id: String,
    pub version_id: Option<String>,
    pub mode: String,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    pub files_scanned: u32,
    pub files_changed: u32,
    pub symbols_total: u32,
    pub edges_total: u32,
    pub parse_errors: u32,
}

impl Store {
    pub fn start_audit_run(&self, repo_id: &str, mode: &str, started_at: i64) -> StoreResult<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO audit (repo_id, mode, started_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![repo_id, mode, started_at],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn finish_audit_run(
        &self,
        audit_id: i64,
        version_id: Option<&str>,
        finished_at: i64,
        files_scanned: u32,
        files_changed: u32,
        symbols_total: u32,
        edges_total: u32,
        parse_errors: u32,
    ) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE audit SET version_id = ?1, finished_at = ?2, files_scanned = ?3, files_changed = ?4,
                    symbols_total = ?5, edges_total = ?6, parse_errors = ?7 WHERE id = ?8",
                rusqlite::params![
                    version_id,
                    finished_at,
                    files_scanned,
                    files_changed,
                    symbols_total,
                    edges_total,
                    parse_errors,
                    audit_id,
                ],
            )?;
            Ok(())
        })
    }

    pub fn latest_audit_run(&self, repo_id: &str) -> StoreResult<Option<AuditRun>> {
        self.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT repo_id, version_id, mode, started_at, finished_at, files_scanned, files_changed,
                        symbols_total, edges_total, parse_errors
                 FROM audit WHERE repo_id = ?1 ORDER BY started_at DESC LIMIT 1",
                rusqlite::params![repo_id],
                |row| {
                    Ok(AuditRun {
                        repo_id: row.get(0)?,
                        version_id: row.get(1)?,
                        mode: row.get(2)?,
                        started_at: row.get(3)?,
                        finished_at: row.get(4)?,
                        files_scanned: row.get::<_, i64>(5)? as u32,
                        files_changed: row.get::<_, i64>(6)? as u32,
                        symbols_total: row.get::<_, i64>(7)? as u32,
                        edges_total: row.get::<_, i64>(8)? as u32,
                        parse_errors: row.get::<_, i64>(9)? as u32,
                    })
                },
            );
            match result {
                Ok(r) => Ok(Some(r)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Repository;

    #[test]
    fn audit_run_round_trips() {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_repo(&Repository {
                repo_id: "r".into(),
                root_path: "/r".into(),
                config_blob: serde_json::json!({}),
            })
            .unwrap();
        let id = store.start_audit_run("r", "full", 100).unwrap();
        store
            .finish_audit_run(id, Some("v1"), 105, 10, 2, 20, 8, 0)
            .unwrap();
        let run = store.latest_audit_run("r").unwrap().unwrap();
        assert_eq!(run.mode, "full");
        assert_eq!(run.symbols_total, 20);
    }
}
