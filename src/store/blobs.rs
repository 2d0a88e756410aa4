use super::Store;
use crate::error::StoreResult;
use crate::model::{AgentFeedback, FeedbackWeight};

/// The three content-addressed blob kinds from spec §3, all insert-if-absent
/// (write-once, read-by-hash — never update).
#[derive(Debug, Clone, Copy)]
pub enum BlobKind {
    Card,
    ToolPolicy,
    Tsconfig,
}

impl BlobKind {
    fn table(self) -> &'static str {
        match self {
            BlobKind::Card => "card_hashes",
            BlobKind::ToolPolicy => "tool_policy_hashes",
            BlobKind::Tsconfig => "tsconfig_hashes",
        }
    }

    fn hash_column(self) -> &'static str {
        match self {
            BlobKind::Card => "card_hash",
            BlobKind::ToolPolicy => "policy_hash",
            BlobKind::Tsconfig => "tsconfig_hash",
        }
    }

    fn blob_column(self) -> &'static str {
        match self {
            BlobKind::Card => "card_blob",
            BlobKind::ToolPolicy => "policy_blob",
            BlobKind::Tsconfig => "tsconfig_blob",
        }
    }
}

impl Store {
    /// Insert-if-absent; returns `true` if a new row was written.
    pub fn upsert_blob(&self, kind: BlobKind, hash: &str, blob: &str) -> StoreResult<bool> {
        self.with_conn(|conn| {
            let sql = format!(
                "INSERT OR IGNORE INTO {} ({}, {}) VALUES (?1, ?2)",
                kind.table(),
                kind.hash_column(),
                kind.blob_column()
            );
            let changed = conn.execute(&sql, rusqlite::params![hash, blob])?;
            Ok(changed > 0)
        })
    }

    pub fn get_blob(&self, kind: BlobKind, hash: &str) -> StoreResult<Option<String>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM {} WHERE {} = ?1", kind.blob_column(), kind.table(), kind.hash_column());
            let result = conn.query_row(&sql, rusqlite::params![hash], |row| row.get(0));
            match result {
                Ok(v) => Ok(Some(v)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn record_agent_feedback(&self, feedback: &AgentFeedback) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO agent_feedback (repo_id, version_id, slice_handle, useful_json, missing_json, submitted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    feedback.repo_id,
                    feedback.version_id,
                    feedback.slice_handle,
                    serde_json::to_string(&feedback.useful_symbols)?,
                    serde_json::to_string(&feedback.missing_symbols)?,
                    feedback.submitted_at,
                ],
            )?;
            Ok(())
        })?;

        // Aggregate into symbol_feedback_weights: useful nudges up more than
        // missing nudges down, so a symbol repeatedly marked useful stays
        // ahead of one that's merely absent from a few other slices.
        const USEFUL_DELTA: f32 = 0.1;
        const MISSING_DELTA: f32 = -0.05;
        for symbol_id in &feedback.useful_symbols {
            self.adjust_feedback_weight(symbol_id, USEFUL_DELTA)?;
        }
        for symbol_id in &feedback.missing_symbols {
            self.adjust_feedback_weight(symbol_id, MISSING_DELTA)?;
        }
        Ok(())
    }

    fn adjust_feedback_weight(&self, symbol_id: &str, delta: f32) -> StoreResult<()> {
        self.with_conn(|conn| {
            let current: f32 = conn
                .query_row(
                    "SELECT weight FROM symbol_feedback_weights WHERE symbol_id = ?1",
                    rusqlite::params![symbol_id],
                    |row| row.get(0),
                )
                .unwrap_or(0.0);
            let updated = FeedbackWeight::new(current).add(delta).value();
            conn.execute(
                "INSERT INTO symbol_feedback_weights (symbol_id, weight) VALUES (?1, ?2)
                 ON CONFLICT(symbol_id) DO UPDATE SET weight = excluded.weight",
                rusqlite::params![symbol_id, updated],
            )?;
            Ok(())
        })
    }

    pub fn get_feedback_weight(&self, symbol_id: &str) -> StoreResult<FeedbackWeight> {
        self.with_conn(|conn| {
            let weight: f32 = conn
                .query_row(
                    "SELECT weight FROM symbol_feedback_weights WHERE symbol_id = ?1",
                    rusqlite::params![symbol_id],
                    |row| row.get(0),
                )
                .unwrap_or(0.0);
            Ok(FeedbackWeight::new(weight))
        })
    }

    pub fn upsert_symbol_embedding(&self, symbol_id: &str, model: &str, vector: &[f32], updated_at: i64) -> StoreResult<()> {
        self.with_conn(|conn| {
            let bytes: Vec<u8> = vector.iter().flat_map(|f| f.to_le_bytes()).collect();
            conn.execute(
                "INSERT INTO symbol_embeddings (symbol_id, model, dim, vector, updated_at) VALUES (?1,?2,?3,?4,?5)
                 ON CONFLICT(symbol_id) DO UPDATE SET model = excluded.model, dim = excluded.dim, vector = excluded.vector, updated_at = excluded.updated_at",
                rusqlite::params![symbol_id, model, vector.len() as i64, bytes, updated_at],
            )?;
            Ok(())
        })
    }

    pub fn get_symbol_embedding(&self, symbol_id: &str) -> StoreResult<Option<Vec<f32>>> {
        self.with_conn(|conn| {
            let result: Result<Vec<u8>, _> = conn.query_row(
                "SELECT vector FROM symbol_embeddings WHERE symbol_id = ?1",
                rusqlite::params![symbol_id],
                |row| row.get(0),
            );
            match result {
                Ok(bytes) => Ok(Some(
                    bytes
                        .chunks_exact(4)
                        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                        .collect(),
                )),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_upsert_is_write_once() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.upsert_blob(BlobKind::Card, "h1", "{}").unwrap());
        // second insert with the same hash but different content is ignored
        assert!(!store.upsert_blob(BlobKind::Card, "h1", "{\"changed\":true}").unwrap());
        assert_eq!(store.get_blob(BlobKind::Card, "h1").unwrap().unwrap(), "{}");
    }

    #[test]
    fn feedback_weights_respond_to_usefulness_counts() {
        let store = Store::open_in_memory().unwrap();
        for _ in 0..5 {
            store
                .record_agent_feedback(&AgentFeedback {
                    repo_id: "r".into(),
                    version_id: "v1".into(),
                    slice_handle: "h".into(),
                    useful_symbols: vec!["sym1".into()],
                    missing_symbols: vec![],
                    submitted_at: 0,
                })
                .unwrap();
        }
        for _ in 0..3 {
            store
                .record_agent_feedback(&AgentFeedback {
                    repo_id: "r".into(),
                    version_id: "v1".into(),
                    slice_handle: "h".into(),
                    useful_symbols: vec!["sym2".into()],
                    missing_symbols: vec!["sym1".into()],
                    submitted_at: 0,
                })
                .unwrap();
        }
        let w1 = store.get_feedback_weight("sym1").unwrap().value();
        let w2 = store.get_feedback_weight("sym2").unwrap().value();
        assert!(w1 > w2, "sym1={w1} sym2={w2}");
        assert!((-1.0..=1.0).contains(&w1));
        assert!((-1.0..=1.0).contains(&w2));
    }

    #[test]
    fn embedding_round_trips() {
        let store = Store::open_in_memory().unwrap();
        let vec = vec![0.1_f32, 0.2, -0.3];
        store.upsert_symbol_embedding("s1", "mock", &vec, 1).unwrap();
        let fetched = store.get_symbol_embedding("s1").unwrap().unwrap();
        assert_eq!(fetched.len(), 3);
        assert!((fetched[0] - 0.1).abs() < 1e-6);
    }
}
