//! Indexer (C4) — turns a repository on disk into the symbol/edge graph in
//! the store. `index_repo` ties together scan → pass1 → pass2 → finalize,
//! spec §4.4's five-step pipeline. Grounded on the teacher's
//! `indexing::pipeline::IndexingPipeline` staged-orchestration shape,
//! generalized from the teacher's fixed Rust-only extraction to the adapter
//! registry's dynamic extension set.

pub mod debouncer;
pub mod finalize;
pub mod native;
pub mod pass1;
pub mod pass2;
pub mod progress;
pub mod scanner;
pub mod watcher;

use std::sync::Arc;

use rayon::ThreadPoolBuilder;

use crate::adapter::AdapterRegistry;
use crate::config::Settings;
use crate::error::IndexResult;
use crate::model::Repository;
use crate::store::Store;

pub use pass1::SymbolIndex;
pub use progress::{ProgressCallback, ProgressEvent, ProgressReporter, Stage};
pub use watcher::{RepoWatcher, WatcherHealth};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMode {
    Full,
    Incremental,
}

impl IndexMode {
    fn version_reason(self) -> &'static str {
        match self {
            IndexMode::Full => "full reindex",
            IndexMode::Incremental => "incremental reindex",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexSummary {
    pub repo_id: String,
    pub version_id: String,
    pub files_scanned: usize,
    pub files_changed: usize,
    pub files_deleted: usize,
    pub parse_errors: usize,
    pub pass2_calls_resolved: usize,
    pub placeholders_resolved: usize,
    pub metrics_refreshed: usize,
}

const KNOWN_EXTENSIONS: &[&str] = &["rs", "ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "pyi"];

/// The `indexRepo(repoId, mode, onProgress)` entry point, spec §4.4.
pub fn index_repo<'a>(
    store: &Store,
    registry: &AdapterRegistry,
    settings: &Settings,
    repo: &Repository,
    mode: IndexMode,
    on_progress: Option<&'a ProgressCallback<'a>>,
) -> IndexResult<IndexSummary> {
    let reporter = ProgressReporter::new(on_progress, None);
    let now = crate::utils::get_utc_timestamp();
    let root = std::path::Path::new(&repo.root_path);

    // Step 1: scan.
    reporter.emit(Stage::Scanning, 0, 0, None);
    let scanned = scanner::scan_repo(root, &settings.indexing, KNOWN_EXTENSIONS);
    let files_scanned = scanned.len();

    // Step 2: reconcile deletions — any previously-indexed file not seen by
    // this scan is gone and cascades away.
    let scanned_paths: std::collections::HashSet<&str> = scanned.iter().map(|f| f.rel_path.as_str()).collect();
    let mut files_deleted = 0usize;
    for existing in store.list_files(&repo.repo_id)? {
        if !scanned_paths.contains(existing.rel_path.as_str()) {
            store.delete_file_transaction(&repo.repo_id, existing.file_id)?;
            files_deleted += 1;
        }
    }

    let pool = ThreadPoolBuilder::new()
        .num_threads(worker_count(settings, files_scanned))
        .build()
        .map_err(|e| crate::error::IndexError::WorkerPanic(e.to_string()))?;

    // Step 3: pass 1.
    reporter.emit(Stage::Pass1, 0, files_scanned, None);
    let incremental = mode == IndexMode::Incremental;
    let pass1_outcome = pool.install(|| {
        pass1::run_pass1(store, registry, &repo.repo_id, &scanned, incremental, KNOWN_EXTENSIONS, now)
    })?;

    // Step 4: pass 2 — cross-file call resolution.
    reporter.emit(Stage::Pass2, 0, 0, None);
    let changed_paths: Vec<String> = scanned
        .iter()
        .filter(|f| pass1_outcome.module_edge_from.contains_key(&f.rel_path))
        .map(|f| f.rel_path.clone())
        .collect();
    let pass2_targets = pass2::compute_target_set(store, registry, &repo.repo_id, &changed_paths, !incremental)?;
    let pass2_calls_resolved = pass2::run_pass2(store, registry, &repo.repo_id, &pass2_targets, &pass1_outcome.symbol_index, now)?;

    // Step 5: finalize.
    reporter.emit(Stage::Finalizing, 0, 0, None);
    let summary = finalize::run_finalize(store, &repo.repo_id, mode.version_reason(), now)?;

    Ok(IndexSummary {
        repo_id: repo.repo_id.clone(),
        version_id: summary.version_id,
        files_scanned,
        files_changed: pass1_outcome.files_changed,
        files_deleted,
        parse_errors: pass1_outcome.parse_errors,
        pass2_calls_resolved,
        placeholders_resolved: summary.placeholders_resolved,
        metrics_refreshed: summary.metrics_refreshed,
    })
}

/// Sizes the rayon pool: the configured worker count, capped by available
/// cores minus one and by the number of files actually being processed —
/// spec's ambient-stack note on not over-threading small repos.
fn worker_count(settings: &Settings, file_count: usize) -> usize {
    let configured = settings.indexing.worker_pool_size.unwrap_or(settings.indexing.concurrency);
    let cpu_cap = num_cpus::get().saturating_sub(1).max(1);
    configured.min(cpu_cap).min(file_count.max(1))
}

/// Starts a [`RepoWatcher`] for `repo`. The caller (an async host outside
/// this crate's scope) is responsible for spawning the returned future onto
/// its runtime and polling `RepoWatcher::health` via a clone of the same
/// `Arc<Store>`.
pub fn start_watcher(
    store: Arc<Store>,
    registry: Arc<AdapterRegistry>,
    settings: Arc<Settings>,
    repo: Repository,
) -> notify::Result<impl std::future::Future<Output = IndexResult<()>>> {
    let watcher = RepoWatcher::start(
        std::path::Path::new(&repo.root_path),
        settings.indexing.max_watched_files,
        settings.indexing.debounce_ms,
    )?;
    Ok(watcher.run(store, registry, settings, repo))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::model::Repository;
    use std::fs;
    use tempfile::TempDir;

    fn repo_at(dir: &TempDir) -> Repository {
        Repository {
            repo_id: "r".to_string(),
            root_path: dir.path().to_string_lossy().to_string(),
            config_blob: serde_json::json!({}),
        }
    }

    #[test]
    fn full_index_discovers_symbols_and_creates_a_version() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.rs"), "pub fn foo() {}\n").unwrap();

        let store = Store::open_in_memory().unwrap();
        let repo = repo_at(&dir);
        store.upsert_repo(&repo).unwrap();
        let registry = AdapterRegistry::new();
        let settings = Settings::default();

        let summary = index_repo(&store, &registry, &settings, &repo, IndexMode::Full, None).unwrap();
        assert_eq!(summary.files_scanned, 1);
        assert_eq!(summary.files_changed, 1);
        assert!(!summary.version_id.is_empty());

        let symbols = store.list_symbols_for_repo("r").unwrap();
        assert!(symbols.iter().any(|s| s.name == "foo"));
    }

    #[test]
    fn incremental_reindex_detects_deleted_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.rs");
        fs::write(&path, "pub fn foo() {}\n").unwrap();

        let store = Store::open_in_memory().unwrap();
        let repo = repo_at(&dir);
        store.upsert_repo(&repo).unwrap();
        let registry = AdapterRegistry::new();
        let settings = Settings::default();

        index_repo(&store, &registry, &settings, &repo, IndexMode::Full, None).unwrap();
        fs::remove_file(&path).unwrap();

        let summary = index_repo(&store, &registry, &settings, &repo, IndexMode::Incremental, None).unwrap();
        assert_eq!(summary.files_deleted, 1);
        assert!(store.list_symbols_for_repo("r").unwrap().is_empty());
    }
}
