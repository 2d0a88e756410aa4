use super::Store;
use crate::error::StoreResult;
use crate::model::SliceHandle;

impl Store {
    /// Persists a slice handle so it can be resolved back to its originating
    /// `(minVersion, maxVersion, sliceHash)` later — spec §6 "slice handle URI
    /// ... consumers only store-and-resend".
    pub fn create_slice_handle(&self, handle: &SliceHandle) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO slice_handles (handle, repo_id, created_at, expires_at, min_version, max_version, slice_hash, spillover)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(handle) DO NOTHING",
                rusqlite::params![
                    handle.handle,
                    handle.repo_id,
                    handle.created_at,
                    handle.expires_at,
                    handle.min_version,
                    handle.max_version,
                    handle.slice_hash,
                    handle.spillover,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_slice_handle(&self, handle: &str) -> StoreResult<Option<SliceHandle>> {
        self.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT handle, repo_id, created_at, expires_at, min_version, max_version, slice_hash, spillover
                 FROM slice_handles WHERE handle = ?1",
                rusqlite::params![handle],
                |row| {
                    Ok(SliceHandle {
                        handle: row.get(0)?,
                        repo_id: row.get(1)?,
                        created_at: row.get(2)?,
                        expires_at: row.get(3)?,
                        min_version: row.get(4)?,
                        max_version: row.get(5)?,
                        slice_hash: row.get(6)?,
                        spillover: row.get(7)?,
                    })
                },
            );
            match result {
                Ok(h) => Ok(Some(h)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }
}
