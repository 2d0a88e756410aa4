use super::Store;
use crate::error::StoreResult;
use crate::hash::version_hash;
use crate::model::{SymbolVersionSnapshot, Version};

impl Store {
    /// Inserts the version row, inserts all symbol snapshots, computes
    /// `versionHash` from `prevVersionHash` + the sorted fingerprint list,
    /// and patches it back into the version row — all atomically. Per spec
    /// §4.2 `createSnapshotTransaction`.
    pub fn create_snapshot_transaction(
        &self,
        repo_id: &str,
        version_id: &str,
        reason: &str,
        created_at: i64,
        snapshots: &[SymbolVersionSnapshot],
    ) -> StoreResult<Version> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let prev_version_hash: Option<String> = tx
                .query_row(
                    "SELECT version_hash FROM versions WHERE repo_id = ?1 ORDER BY created_at DESC LIMIT 1",
                    rusqlite::params![repo_id],
                    |row| row.get(0),
                )
                .ok();

            tx.execute(
                "INSERT INTO versions (version_id, repo_id, created_at, reason, prev_version_hash, version_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, '')",
                rusqlite::params![version_id, repo_id, created_at, reason, prev_version_hash],
            )?;

            for snap in snapshots {
                tx.execute(
                    "INSERT INTO symbol_versions (version_id, symbol_id, ast_fingerprint, signature_json, summary, invariants_json, side_effects_json)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    rusqlite::params![
                        snap.version_id,
                        snap.symbol_id,
                        snap.ast_fingerprint,
                        snap.signature_json.as_ref().map(|v| v.to_string()),
                        snap.summary,
                        snap.invariants_json.as_ref().map(|v| v.to_string()),
                        snap.side_effects_json.as_ref().map(|v| v.to_string()),
                    ],
                )?;
            }

            let fingerprints: Vec<String> = snapshots.iter().map(|s| s.ast_fingerprint.clone()).collect();
            let computed_hash = version_hash(prev_version_hash.as_deref(), &fingerprints);

            tx.execute(
                "UPDATE versions SET version_hash = ?1 WHERE version_id = ?2",
                rusqlite::params![computed_hash, version_id],
            )?;

            tx.commit()?;

            Ok(Version {
                version_id: version_id.to_string(),
                repo_id: repo_id.to_string(),
                created_at,
                reason: reason.to_string(),
                prev_version_hash,
                version_hash: computed_hash,
            })
        })
    }

    pub fn list_versions(&self, repo_id: &str) -> StoreResult<Vec<Version>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT version_id, repo_id, created_at, reason, prev_version_hash, version_hash
                 FROM versions WHERE repo_id = ?1 ORDER BY created_at ASC",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![repo_id], |row| {
                    Ok(Version {
                        version_id: row.get(0)?,
                        repo_id: row.get(1)?,
                        created_at: row.get(2)?,
                        reason: row.get(3)?,
                        prev_version_hash: row.get(4)?,
                        version_hash: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn latest_version(&self, repo_id: &str) -> StoreResult<Option<Version>> {
        Ok(self.list_versions(repo_id)?.into_iter().last())
    }
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
    fn version_hash_chains_and_listing_grows() {
        let store = setup();
        let v1 = store
            .create_snapshot_transaction(
                "r",
                "v1",
                "full",
                1,
                &[SymbolVersionSnapshot {
                    version_id: "v1".into(),
                    symbol_id: "s1".into(),
                    ast_fingerprint: "fp1".into(),
                    signature_json: None,
                    summary: None,
                    invariants_json: None,
                    side_effects_json: None,
                }],
            )
            .unwrap();
        assert!(v1.prev_version_hash.is_none());

        let v2 = store
            .create_snapshot_transaction(
                "r",
                "v2",
                "incremental",
                2,
                &[SymbolVersionSnapshot {
                    version_id: "v2".into(),
                    symbol_id: "s1".into(),
                    ast_fingerprint: "fp1-changed".into(),
                    signature_json: None,
                    summary: None,
                    invariants_json: None,
                    side_effects_json: None,
                }],
            )
            .unwrap();
        assert_eq!(v2.prev_version_hash, Some(v1.version_hash));

        assert_eq!(store.list_versions("r").unwrap().len(), 2);
        assert_eq!(store.latest_version("r").unwrap().unwrap().version_id, "v2");
    }
}
