//! Pass 2 — cross-file call resolution (spec §4.4 step 4). Only adapters
//! whose `supports_cross_file_resolution()` returns `true` (TypeScript, in
//! practice) participate; Rust's `RustAdapter` resolves everything it can
//! locally in Pass 1 and is skipped here.

use std::collections::HashMap;
use std::path::Path;

use crate::adapter::AdapterRegistry;
use crate::error::IndexResult;
use crate::model::{Edge, EdgeKind, EdgeTarget};
use crate::resolve::{resolve_call_target, ResolutionContext};
use crate::store::Store;

use super::pass1::SymbolIndex;

/// Determines which files need a cross-file re-resolution pass: in full mode
/// every cross-file-capable file; in incremental mode the changed files plus
/// any file whose imports source from a changed file (spec §4.4: "re-run on
/// changed files + files importing from changed files").
pub fn compute_target_set(
    store: &Store,
    registry: &AdapterRegistry,
    repo_id: &str,
    changed_rel_paths: &[String],
    full_mode: bool,
) -> IndexResult<Vec<String>> {
    let all_files = store.list_files(repo_id)?;
    let cross_capable = |rel_path: &str| -> bool {
        Path::new(rel_path)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|ext| registry.get(ext))
            .is_some_and(|adapter| adapter.supports_cross_file_resolution())
    };

    if full_mode {
        return Ok(all_files
            .into_iter()
            .map(|f| f.rel_path)
            .filter(|p| cross_capable(p))
            .collect());
    }

    let changed: std::collections::HashSet<&str> = changed_rel_paths.iter().map(String::as_str).collect();
    let mut targets: Vec<String> = all_files
        .iter()
        .map(|f| f.rel_path.clone())
        .filter(|p| cross_capable(p) && changed.contains(p.as_str()))
        .collect();

    // files importing from a changed file: any import placeholder or edge
    // whose import source resolves into one of the changed files' symbols.
    for file in &all_files {
        if changed.contains(file.rel_path.as_str()) || !cross_capable(&file.rel_path) {
            continue;
        }
        let symbols = store.list_symbols_for_file(file.file_id)?;
        let ids: Vec<String> = symbols.iter().map(|s| s.symbol_id.clone()).collect();
        let edges = store.get_edges_from_symbols(repo_id, &ids)?;
        let imports_changed = edges.iter().any(|e| {
            e.kind == EdgeKind::Import
                && match &e.to {
                    EdgeTarget::Symbol(target_id) => symbols_file_is_changed(store, target_id, &changed).unwrap_or(false),
                    EdgeTarget::Placeholder(_) => false,
                }
        });
        if imports_changed {
            targets.push(file.rel_path.clone());
        }
    }

    targets.sort();
    targets.dedup();
    Ok(targets)
}

fn symbols_file_is_changed(
    store: &Store,
    symbol_id: &str,
    changed: &std::collections::HashSet<&str>,
) -> IndexResult<bool> {
    let Some(symbol) = store.get_symbol(symbol_id)? else {
        return Ok(false);
    };
    let Some(file) = store.get_files_by_ids(&[symbol.file_id])?.remove(&symbol.file_id) else {
        return Ok(false);
    };
    Ok(changed.contains(file.rel_path.as_str()))
}

/// Re-runs call resolution for every target file against the full
/// `repo_wide` [`SymbolIndex`] built in Pass 1, replacing each file's
/// previous call edges. This is what actually resolves calls into symbols
/// that only became visible once the whole repo had been walked once.
pub fn run_pass2(
    store: &Store,
    registry: &AdapterRegistry,
    repo_id: &str,
    targets: &[String],
    symbol_index: &SymbolIndex,
    now: i64,
) -> IndexResult<usize> {
    let mut resolved_count = 0usize;

    for rel_path in targets {
        let Some(file) = store.get_file_by_path(repo_id, rel_path)? else {
            continue;
        };
        let bytes = match std::fs::read(&rel_path_abs(store, repo_id, rel_path)?) {
            Ok(b) => b,
            Err(_) => continue,
        };
        let extension = Path::new(rel_path).extension().and_then(|e| e.to_str()).unwrap_or("");
        let Some(adapter) = registry.get(extension) else { continue };
        let Ok(parsed) = adapter.parse(&bytes) else { continue };

        let symbols = store.list_symbols_for_file(file.file_id)?;
        let ids: Vec<String> = symbols.iter().map(|s| s.symbol_id.clone()).collect();
        store.delete_outgoing_call_edges(repo_id, &ids)?;

        let same_file_symbols_by_name: HashMap<String, String> =
            symbols.iter().map(|s| (s.name.clone(), s.symbol_id.clone())).collect();
        let file_name_index: HashMap<String, Vec<String>> = symbol_index.by_file.get(rel_path).cloned().unwrap_or_default();

        let ctx = ResolutionContext {
            same_file_symbols_by_name: &same_file_symbols_by_name,
            name_to_symbol_ids: &symbol_index.repo_wide,
            imported_name_to_symbol_ids: &file_name_index,
            namespace_imports: &HashMap::new(),
        };

        for call in &parsed.calls {
            let Some(caller_name) = &call.caller_name else { continue };
            let Some(from_symbol) = same_file_symbols_by_name.get(caller_name) else { continue };
            let Some(resolved) = resolve_call_target(call, &ctx, Some(adapter.as_ref())) else { continue };

            let edge = match &resolved.target {
                EdgeTarget::Symbol(to) => {
                    resolved_count += 1;
                    Edge {
                        repo_id: repo_id.to_string(),
                        kind: EdgeKind::Call,
                        from: from_symbol.clone(),
                        to: EdgeTarget::Symbol(to.clone()),
                        weight: 1.0,
                        confidence: resolved.confidence,
                        resolution_strategy: resolved.strategy,
                        provenance: "pass2".to_string(),
                        created_at: now,
                    }
                }
                EdgeTarget::Placeholder(_) => {
                    Edge::placeholder(repo_id, EdgeKind::Call, from_symbol.clone(), call.callee.clone(), "pass2", now)
                }
            };
            store.insert_edge(&edge)?;
        }
    }

    Ok(resolved_count)
}

fn rel_path_abs(store: &Store, repo_id: &str, rel_path: &str) -> IndexResult<std::path::PathBuf> {
    let repo = store.require_repo(repo_id)?;
    Ok(std::path::Path::new(&repo.root_path).join(rel_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterRegistry;
    use crate::model::{FileId, FileRecord, Repository};

    #[test]
    fn full_mode_targets_only_cross_file_capable_extensions() {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_repo(&Repository {
                repo_id: "r".into(),
                root_path: "/r".into(),
                config_blob: serde_json::json!({}),
            })
            .unwrap();
        store
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
        store
            .upsert_file(&FileRecord {
                file_id: FileId::new(1).unwrap(),
                repo_id: "r".into(),
                rel_path: "a.rs".into(),
                content_hash: "h".into(),
                language: Some("rust".into()),
                byte_size: 1,
                last_indexed_at: 0,
                directory: "".into(),
            })
            .unwrap();

        let registry = AdapterRegistry::new();
        let targets = compute_target_set(&store, &registry, "r", &[], true).unwrap();
        assert_eq!(targets, vec!["a.ts".to_string()]);
    }
}
