//! Sync artifacts (C10): export a repo's complete indexed state to a single
//! portable blob and import it back. Grounded on the teacher's snapshot
//! export/import path (`storage::export`/`storage::import` — JSON rows,
//! gzip, content-hashed) generalized from a single-binary cache file to a
//! base64-embeddable artifact so it can ride inside a JSON envelope.

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, SyncError, SyncResult};
use crate::hash::hash_content;
use crate::model::{Edge, FileRecord, Symbol, SymbolMetrics, SymbolVersionSnapshot, Version};
use crate::store::Store;

/// The decompressed, pre-hash payload — everything needed to reconstruct a
/// repo's indexed state in a fresh store.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ArtifactPayload {
    repo_id: String,
    root_path: String,
    config_blob: serde_json::Value,
    files: Vec<FileRecord>,
    symbols: Vec<Symbol>,
    edges: Vec<Edge>,
    metrics: Vec<SymbolMetrics>,
    version: Version,
    snapshots: Vec<SymbolVersionSnapshot>,
}

/// The wire envelope: metadata alongside a gzip-then-base64 payload, per
/// spec §4.10 `{artifactId, repoId, versionId, commitSha?, branch?,
/// artifactHash, compressedData, createdAt, sizeBytes}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncArtifact {
    pub artifact_id: String,
    pub repo_id: String,
    pub version_id: String,
    pub commit_sha: Option<String>,
    pub branch: Option<String>,
    pub artifact_hash: String,
    pub compressed_data: String,
    pub created_at: i64,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub commit_sha: Option<String>,
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    pub force: bool,
}

/// Serializes the repo's files/symbols/edges/metrics and its latest version
/// (with snapshots) to JSON, gzips it, and hashes the compressed bytes to
/// derive `artifactId` — content-addressed the same way `contentHash` is.
pub fn export_repo(store: &Store, repo_id: &str, created_at: i64, options: &ExportOptions) -> SyncResult<SyncArtifact> {
    let repo = store.require_repo(repo_id)?;
    let version = store
        .latest_version(repo_id)?
        .ok_or_else(|| SyncError::Store(StoreError::UnknownRepo { repo_id: repo_id.to_string() }))?;

    let files = store.list_files(repo_id)?;
    let symbols = store.list_symbols_for_repo(repo_id)?;
    let edges = store.list_edges_for_repo(repo_id)?;
    let metrics = symbols
        .iter()
        .filter_map(|s| store.get_metrics(&s.symbol_id).transpose())
        .collect::<Result<Vec<_>, _>>()?;
    let snapshots = store.snapshots_for_version(&version.version_id)?;

    let payload = ArtifactPayload {
        repo_id: repo.repo_id,
        root_path: repo.root_path,
        config_blob: repo.config_blob,
        files,
        symbols,
        edges,
        metrics,
        version: version.clone(),
        snapshots,
    };

    let json = serde_json::to_vec(&payload)?;
    let compressed = gzip(&json)?;
    let artifact_hash = hash_content(&compressed);
    let size_bytes = compressed.len() as u64;
    let compressed_data = BASE64.encode(&compressed);

    Ok(SyncArtifact {
        artifact_id: artifact_hash.clone(),
        repo_id: payload.repo_id,
        version_id: version.version_id,
        commit_sha: options.commit_sha.clone(),
        branch: options.branch.clone(),
        artifact_hash,
        compressed_data,
        created_at,
        size_bytes,
    })
}

/// Verifies `artifactHash`, decompresses, and replays the payload into
/// `store` inside one transaction — insert order respects foreign keys
/// (files before symbols, symbols before edges/metrics/snapshots). Idempotent:
/// every row is upserted by its natural key, so re-importing the same
/// artifact is a no-op beyond the transaction overhead.
pub fn import_artifact(store: &Store, artifact: &SyncArtifact, requested_repo_id: Option<&str>, options: &ImportOptions) -> SyncResult<()> {
    let compressed = BASE64.decode(&artifact.compressed_data)?;
    let actual_hash = hash_content(&compressed);
    if actual_hash != artifact.artifact_hash {
        return Err(SyncError::HashMismatch {
            expected: artifact.artifact_hash.clone(),
            actual: actual_hash,
        });
    }

    let json = gunzip(&compressed)?;
    let payload: ArtifactPayload = serde_json::from_slice(&json)?;

    let target_repo_id = requested_repo_id.unwrap_or(&payload.repo_id);
    if target_repo_id != payload.repo_id && !options.force {
        return Err(SyncError::RepoMismatch {
            artifact_repo_id: payload.repo_id.clone(),
            requested_repo_id: target_repo_id.to_string(),
        });
    }

    store.replay_artifact(target_repo_id, &payload)?;
    Ok(())
}

fn gzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

fn gunzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

impl Store {
    /// All `symbol_versions` rows for one version, used by export — not a
    /// general-purpose lookup so it lives here rather than in `version.rs`.
    fn snapshots_for_version(&self, version_id: &str) -> crate::error::StoreResult<Vec<SymbolVersionSnapshot>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT version_id, symbol_id, ast_fingerprint, signature_json, summary, invariants_json, side_effects_json
                 FROM symbol_versions WHERE version_id = ?1",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![version_id], |row| {
                    let signature_json: Option<String> = row.get(3)?;
                    let invariants_json: Option<String> = row.get(5)?;
                    let side_effects_json: Option<String> = row.get(6)?;
                    Ok(SymbolVersionSnapshot {
                        version_id: row.get(0)?,
                        symbol_id: row.get(1)?,
                        ast_fingerprint: row.get(2)?,
                        signature_json: signature_json.and_then(|s| serde_json::from_str(&s).ok()),
                        summary: row.get(4)?,
                        invariants_json: invariants_json.and_then(|s| serde_json::from_str(&s).ok()),
                        side_effects_json: side_effects_json.and_then(|s| serde_json::from_str(&s).ok()),
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Replays an [`ArtifactPayload`] into this store in one transaction:
    /// repo row, files (explicit `file_id`, preserving the symbol/edge
    /// foreign keys baked into the payload), symbols, edges, metrics,
    /// version row, and its snapshots.
    fn replay_artifact(&self, repo_id: &str, payload: &ArtifactPayload) -> crate::error::StoreResult<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "INSERT INTO repos (repo_id, root_path, config_blob) VALUES (?1, ?2, ?3)
                 ON CONFLICT(repo_id) DO UPDATE SET root_path = excluded.root_path, config_blob = excluded.config_blob",
                rusqlite::params![repo_id, payload.root_path, payload.config_blob.to_string()],
            )?;

            for file in &payload.files {
                tx.execute(
                    "INSERT INTO files (file_id, repo_id, rel_path, content_hash, language, byte_size, last_indexed_at, directory)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(file_id) DO UPDATE SET
                        rel_path = excluded.rel_path, content_hash = excluded.content_hash, language = excluded.language,
                        byte_size = excluded.byte_size, last_indexed_at = excluded.last_indexed_at, directory = excluded.directory",
                    rusqlite::params![
                        file.file_id.value() as i64,
                        repo_id,
                        file.rel_path,
                        file.content_hash,
                        file.language,
                        file.byte_size as i64,
                        file.last_indexed_at,
                        file.directory,
                    ],
                )?;
            }

            for symbol in &payload.symbols {
                tx.execute(
                    "INSERT INTO symbols (
                        symbol_id, repo_id, file_id, kind, name, exported, visibility, language,
                        start_line, start_column, end_line, end_column, ast_fingerprint,
                        signature_json, summary, invariants_json, side_effects_json, updated_at
                     ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)
                     ON CONFLICT(symbol_id) DO UPDATE SET
                        exported = excluded.exported, visibility = excluded.visibility,
                        start_line = excluded.start_line, start_column = excluded.start_column,
                        end_line = excluded.end_line, end_column = excluded.end_column,
                        ast_fingerprint = excluded.ast_fingerprint, signature_json = excluded.signature_json,
                        summary = excluded.summary, invariants_json = excluded.invariants_json,
                        side_effects_json = excluded.side_effects_json, updated_at = excluded.updated_at",
                    rusqlite::params![
                        symbol.symbol_id,
                        repo_id,
                        symbol.file_id.value() as i64,
                        symbol.kind.as_str(),
                        symbol.name,
                        symbol.exported as i64,
                        symbol.visibility.map(crate::model::Visibility::as_str),
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
            }

            for edge in &payload.edges {
                let (to_symbol, to_placeholder): (Option<&str>, Option<&str>) = match &edge.to {
                    crate::model::EdgeTarget::Symbol(id) => (Some(id.as_str()), None),
                    crate::model::EdgeTarget::Placeholder(name) => (None, Some(name.as_str())),
                };
                tx.execute(
                    "INSERT INTO edges (repo_id, kind, from_symbol, to_symbol, to_placeholder, weight, confidence, resolution_strategy, provenance, created_at)
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
                    rusqlite::params![
                        repo_id,
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
            }

            for m in &payload.metrics {
                tx.execute(
                    "INSERT INTO metrics (symbol_id, fan_in, fan_out, churn_30d, test_refs_json, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(symbol_id) DO UPDATE SET
                        fan_in = excluded.fan_in, fan_out = excluded.fan_out, churn_30d = excluded.churn_30d,
                        test_refs_json = excluded.test_refs_json, updated_at = excluded.updated_at",
                    rusqlite::params![
                        m.symbol_id,
                        m.fan_in,
                        m.fan_out,
                        m.churn_30d,
                        m.test_refs_json.as_ref().map(|v| v.to_string()),
                        m.updated_at,
                    ],
                )?;
            }

            tx.execute(
                "INSERT INTO versions (version_id, repo_id, created_at, reason, prev_version_hash, version_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(version_id) DO UPDATE SET
                    created_at = excluded.created_at, reason = excluded.reason,
                    prev_version_hash = excluded.prev_version_hash, version_hash = excluded.version_hash",
                rusqlite::params![
                    payload.version.version_id,
                    repo_id,
                    payload.version.created_at,
                    payload.version.reason,
                    payload.version.prev_version_hash,
                    payload.version.version_hash,
                ],
            )?;

            for snap in &payload.snapshots {
                tx.execute(
                    "INSERT INTO symbol_versions (version_id, symbol_id, ast_fingerprint, signature_json, summary, invariants_json, side_effects_json)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(version_id, symbol_id) DO UPDATE SET
                        ast_fingerprint = excluded.ast_fingerprint, signature_json = excluded.signature_json,
                        summary = excluded.summary, invariants_json = excluded.invariants_json,
                        side_effects_json = excluded.side_effects_json",
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

            tx.commit()?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileId, Range, Repository, SymbolKind};

    fn seeded_repo(repo_id: &str) -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_repo(&Repository {
                repo_id: repo_id.into(),
                root_path: "/r".into(),
                config_blob: serde_json::json!({"languages": ["typescript"]}),
            })
            .unwrap();
        let file_id = store
            .upsert_file(&FileRecord {
                file_id: FileId::new(1).unwrap(),
                repo_id: repo_id.into(),
                rel_path: "a.ts".into(),
                content_hash: "h".into(),
                language: Some("typescript".into()),
                byte_size: 10,
                last_indexed_at: 1,
                directory: "".into(),
            })
            .unwrap();
        store
            .upsert_symbol(&Symbol::new(
                "s1".into(),
                repo_id,
                file_id,
                SymbolKind::Function,
                "handleLogin",
                "typescript",
                Range::new(1, 0, 5, 0),
                "fp1",
                1,
            ))
            .unwrap();
        store
            .upsert_metrics(&SymbolMetrics {
                symbol_id: "s1".into(),
                fan_in: 2,
                fan_out: 1,
                churn_30d: 3,
                test_refs_json: None,
                updated_at: 1,
            })
            .unwrap();
        store
            .create_snapshot_transaction(
                repo_id,
                "v1",
                "full reindex",
                1,
                &[SymbolVersionSnapshot {
                    version_id: "v1".into(),
                    symbol_id: "s1".into(),
                    ast_fingerprint: "fp1".into(),
                    signature_json: None,
                    summary: Some("handles login".into()),
                    invariants_json: None,
                    side_effects_json: None,
                }],
            )
            .unwrap();
        store
    }

    #[test]
    fn export_then_import_round_trips_into_a_fresh_store() {
        let source = seeded_repo("r");
        let artifact = export_repo(&source, "r", 100, &ExportOptions::default()).unwrap();
        assert_eq!(artifact.repo_id, "r");
        assert_eq!(artifact.version_id, "v1");

        let dest = Store::open_in_memory().unwrap();
        import_artifact(&dest, &artifact, None, &ImportOptions::default()).unwrap();

        let symbol = dest.get_symbol("s1").unwrap().unwrap();
        assert_eq!(symbol.name, "handleLogin");
        let metrics = dest.get_metrics("s1").unwrap().unwrap();
        assert_eq!(metrics.fan_in, 2);
        assert_eq!(dest.latest_version("r").unwrap().unwrap().version_id, "v1");
    }

    #[test]
    fn import_is_idempotent() {
        let source = seeded_repo("r");
        let artifact = export_repo(&source, "r", 100, &ExportOptions::default()).unwrap();
        let dest = Store::open_in_memory().unwrap();
        import_artifact(&dest, &artifact, None, &ImportOptions::default()).unwrap();
        import_artifact(&dest, &artifact, None, &ImportOptions::default()).unwrap();
        assert_eq!(dest.list_symbols_for_repo("r").unwrap().len(), 1);
    }

    #[test]
    fn tampered_artifact_fails_hash_check() {
        let source = seeded_repo("r");
        let mut artifact = export_repo(&source, "r", 100, &ExportOptions::default()).unwrap();
        artifact.compressed_data = BASE64.encode(b"not the real payload");
        let dest = Store::open_in_memory().unwrap();
        let err = import_artifact(&dest, &artifact, None, &ImportOptions::default()).unwrap_err();
        assert!(matches!(err, SyncError::HashMismatch { .. }));
    }

    #[test]
    fn import_into_a_different_repo_id_requires_force() {
        let source = seeded_repo("r");
        let artifact = export_repo(&source, "r", 100, &ExportOptions::default()).unwrap();
        let dest = Store::open_in_memory().unwrap();

        let err = import_artifact(&dest, &artifact, Some("other"), &ImportOptions::default()).unwrap_err();
        assert!(matches!(err, SyncError::RepoMismatch { .. }));

        import_artifact(&dest, &artifact, Some("other"), &ImportOptions { force: true }).unwrap();
        assert_eq!(dest.get_symbol("s1").unwrap().unwrap().repo_id, "other");
    }
}
