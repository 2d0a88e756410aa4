//! Pass 1 — per-file extraction and local edge creation (spec §4.4 step 3).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use rayon::prelude::*;

use crate::adapter::{AdapterRegistry, ExtractedCall, ExtractedImport, ParsedFile};
use crate::error::IndexResult;
use crate::hash::{ast_fingerprint, hash_content, symbol_id};
use crate::model::{Edge, EdgeKind, EdgeTarget, FileId, FileRecord, Range, ResolutionStrategy, Symbol, SymbolKind};
use crate::resolve::{resolve_call_target, ResolutionContext};
use crate::store::Store;

use super::scanner::ScannedFile;

/// `normalizedPath → name → kind → symbolIds[]` — built across Pass 1 and
/// consulted (then refreshed) in Pass 2, per spec §4.4.
#[derive(Debug, Default)]
pub struct SymbolIndex {
    pub by_file: HashMap<String, HashMap<String, Vec<String>>>,
    pub repo_wide: HashMap<String, Vec<String>>,
}

impl SymbolIndex {
    fn record(&mut self, rel_path: &str, name: &str, symbol_id: &str) {
        self.by_file
            .entry(rel_path.to_string())
            .or_default()
            .entry(name.to_string())
            .or_default()
            .push(symbol_id.to_string());
        self.repo_wide.entry(name.to_string()).or_default().push(symbol_id.to_string());
    }
}

pub struct Pass1Outcome {
    pub symbol_index: SymbolIndex,
    pub files_changed: usize,
    pub parse_errors: usize,
    /// Stable per-file identity used as the `from` endpoint of import edges.
    /// Backed by a real `SymbolKind::Module` row (see [`module_pseudo_id`])
    /// so import edges are ordinary symbol-to-symbol edges the graph loader
    /// and slice engine can traverse like any other.
    pub module_edge_from: HashMap<String, String>,
}

struct ParseRecord {
    scanned: ScannedFile,
    content_hash: String,
    language: Option<String>,
    parsed: Option<ParsedFile>,
    parse_error: Option<String>,
}

fn is_test_path(rel_path: &str) -> bool {
    rel_path.contains(".test.") || rel_path.contains(".spec.") || rel_path.contains("/tests/") || rel_path.contains("/__tests__/")
}

pub fn module_pseudo_id(repo_id: &str, rel_path: &str) -> String {
    format!("module:{repo_id}:{rel_path}")
}

fn module_symbol_name(rel_path: &str) -> String {
    Path::new(rel_path).file_name().and_then(|n| n.to_str()).unwrap_or(rel_path).to_string()
}

/// Runs Pass 1 over every scanned file: parses in parallel, then performs
/// store writes and local edge creation sequentially (writes are serialized
/// by the store's single connection anyway; sequential writes let later
/// files in the same pass see earlier files' exported symbols).
pub fn run_pass1(
    store: &Store,
    registry: &AdapterRegistry,
    repo_id: &str,
    scanned: &[ScannedFile],
    incremental: bool,
    known_extensions: &[&str],
    now: i64,
) -> IndexResult<Pass1Outcome> {
    let errors = Mutex::new(0usize);

    let records: Vec<ParseRecord> = scanned
        .par_iter()
        .map(|file| {
            let extension = Path::new(&file.rel_path)
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("");
            let language = crate::adapter::language_by_extension(extension).map(str::to_string);

            let existing = store.get_file_by_path(repo_id, &file.rel_path).ok().flatten();
            let bytes = match std::fs::read(&file.abs_path) {
                Ok(b) => b,
                Err(_) => {
                    *errors.lock().unwrap() += 1;
                    return ParseRecord {
                        scanned: file.clone(),
                        content_hash: String::new(),
                        language,
                        parsed: None,
                        parse_error: Some("failed to read file".to_string()),
                    };
                }
            };
            let content_hash = hash_content(&bytes);

            if incremental {
                if let Some(existing) = &existing {
                    if existing.content_hash == content_hash && file.mtime <= existing.last_indexed_at {
                        return ParseRecord {
                            scanned: file.clone(),
                            content_hash,
                            language,
                            parsed: None,
                            parse_error: None,
                        };
                    }
                }
            }

            let adapter = known_extensions.contains(&extension).then(|| registry.get(extension)).flatten();
            let (parsed, parse_error) = match adapter {
                Some(adapter) => match adapter.parse(&bytes) {
                    Ok(p) => (Some(p), None),
                    Err(e) => {
                        *errors.lock().unwrap() += 1;
                        (None, Some(e))
                    }
                },
                None => (None, None),
            };

            ParseRecord {
                scanned: file.clone(),
                content_hash,
                language,
                parsed,
                parse_error,
            }
        })
        .collect();

    let mut outcome = Pass1Outcome {
        symbol_index: SymbolIndex::default(),
        files_changed: 0,
        parse_errors: *errors.lock().unwrap(),
        module_edge_from: HashMap::new(),
    };

    // First sub-pass: upsert every file row and every symbol so later files'
    // import resolution can see earlier files' exports within this same run.
    let mut file_ids: HashMap<String, FileId> = HashMap::new();
    for record in &records {
        if record.parsed.is_none() && record.parse_error.is_none() {
            // short-circuited (unchanged) file: still need its file_id and its
            // existing symbols registered in the index for call/import resolution.
            if let Some(existing) = store.get_file_by_path(repo_id, &record.scanned.rel_path)? {
                file_ids.insert(record.scanned.rel_path.clone(), existing.file_id);
                for sym in store.list_symbols_for_file(existing.file_id)? {
                    outcome.symbol_index.record(&record.scanned.rel_path, &sym.name, &sym.symbol_id);
                }
            }
            continue;
        }

        outcome.files_changed += 1;
        let directory = FileRecord::derive_directory(&record.scanned.rel_path);
        let file_id = store.upsert_file(&FileRecord {
            file_id: FileId::new(1).unwrap(),
            repo_id: repo_id.to_string(),
            rel_path: record.scanned.rel_path.clone(),
            content_hash: record.content_hash.clone(),
            language: record.language.clone(),
            byte_size: record.scanned.size,
            last_indexed_at: now,
            directory,
        })?;
        file_ids.insert(record.scanned.rel_path.clone(), file_id);

        let previous_symbol_ids: Vec<String> =
            store.list_symbols_for_file(file_id)?.into_iter().map(|s| s.symbol_id).collect();

        let Some(parsed) = &record.parsed else { continue };

        // Every file with a known adapter gets a real module symbol row, so
        // import edges (keyed `from = module_pseudo_id`) are ordinary
        // symbol-to-symbol edges the graph loader and slice engine can reach,
        // instead of dangling references to a string nothing else produces.
        let module_symbol_id = module_pseudo_id(repo_id, &record.scanned.rel_path);
        let previous_module = store.get_symbol(&module_symbol_id)?;
        let mut module_symbol = Symbol::new(
            module_symbol_id.clone(),
            repo_id,
            file_id,
            SymbolKind::Module,
            module_symbol_name(&record.scanned.rel_path),
            record.language.clone().unwrap_or_default(),
            Range::new(0, 0, 0, 0),
            hash_content(record.scanned.rel_path.as_bytes()),
            now,
        )
        .with_exported(true);
        if let Some(previous_module) = previous_module {
            module_symbol.summary = previous_module.summary;
            module_symbol.invariants_json = previous_module.invariants_json;
            module_symbol.side_effects_json = previous_module.side_effects_json;
        }
        store.upsert_symbol(&module_symbol)?;

        let mut new_symbol_ids = Vec::with_capacity(parsed.symbols.len());
        for extracted in &parsed.symbols {
            let fingerprint = ast_fingerprint(&extracted.shape);
            let id = symbol_id(
                repo_id,
                &record.scanned.rel_path,
                extracted.kind.as_str(),
                &extracted.name,
                &fingerprint,
            );
            let previous = store.get_symbol(&id)?;
            let mut symbol = Symbol::new(
                id.clone(),
                repo_id,
                file_id,
                extracted.kind,
                extracted.name.clone(),
                record.language.clone().unwrap_or_default(),
                extracted.range,
                fingerprint,
                now,
            )
            .with_exported(extracted.exported);
            if let Some(v) = extracted.visibility {
                symbol = symbol.with_visibility(v);
            }
            symbol.signature_json = extracted.signature_json.clone();
            if let Some(previous) = previous {
                // stable identity -> carry forward generated explanations.
                symbol.summary = previous.summary;
                symbol.invariants_json = previous.invariants_json;
                symbol.side_effects_json = previous.side_effects_json;
            }
            store.upsert_symbol(&symbol)?;
            outcome.symbol_index.record(&record.scanned.rel_path, &extracted.name, &id);
            new_symbol_ids.push(id);
        }

        let stale: Vec<String> = previous_symbol_ids
            .into_iter()
            .filter(|id| *id != module_symbol_id && !new_symbol_ids.contains(id))
            .collect();
        store.delete_symbols_transaction(repo_id, &stale)?;

        if is_test_path(&record.scanned.rel_path) {
            store.clear_symbol_references_for_file(file_id)?;
            for sym_id in &new_symbol_ids {
                store.record_symbol_reference(sym_id, file_id, "test")?;
            }
        }
    }

    // Second sub-pass: local edges (imports, calls) now that the repo-wide
    // name index reflects every file processed in this run so far.
    for record in &records {
        let Some(parsed) = &record.parsed else { continue };
        let module_from = module_pseudo_id(repo_id, &record.scanned.rel_path);
        outcome.module_edge_from.insert(record.scanned.rel_path.clone(), module_from.clone());

        let file_name_index = outcome.symbol_index.by_file.get(&record.scanned.rel_path).cloned().unwrap_or_default();
        // rule 2 (exact same-file match) wants a single id per name; rules
        // 6/7 want the full candidate list so ambiguity is still detected.
        let same_file_symbols_by_name: HashMap<String, String> = file_name_index
            .iter()
            .filter_map(|(k, v)| v.first().map(|id| (k.clone(), id.clone())))
            .collect();

        let (imported_name_to_symbol_ids, namespace_imports) =
            resolve_imports(store, registry, repo_id, &record.scanned.rel_path, &parsed.imports, known_extensions, now, &module_from)?;

        let ctx = ResolutionContext {
            same_file_symbols_by_name: &same_file_symbols_by_name,
            name_to_symbol_ids: &file_name_index,
            imported_name_to_symbol_ids: &imported_name_to_symbol_ids,
            namespace_imports: &namespace_imports,
        };

        let adapter = Path::new(&record.scanned.rel_path)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(|ext| registry.get(ext));

        for call in &parsed.calls {
            resolve_and_insert_call(store, repo_id, call, &ctx, adapter.as_deref(), now)?;
        }
    }

    Ok(outcome)
}

fn resolve_and_insert_call(
    store: &Store,
    repo_id: &str,
    call: &ExtractedCall,
    ctx: &ResolutionContext,
    adapter: Option<&dyn crate::adapter::LanguageAdapter>,
    now: i64,
) -> IndexResult<()> {
    let Some(caller_name) = &call.caller_name else { return Ok(()) };
    let Some(from_symbol) = ctx.same_file_symbols_by_name.get(caller_name) else {
        return Ok(());
    };

    let Some(resolved) = resolve_call_target(call, ctx, adapter) else {
        return Ok(());
    };

    let edge = match &resolved.target {
        EdgeTarget::Symbol(to) => Edge {
            repo_id: repo_id.to_string(),
            kind: EdgeKind::Call,
            from: from_symbol.clone(),
            to: EdgeTarget::Symbol(to.clone()),
            weight: 1.0,
            confidence: resolved.confidence,
            resolution_strategy: resolved.strategy,
            provenance: "pass1".to_string(),
            created_at: now,
        },
        EdgeTarget::Placeholder(_) => Edge::placeholder(repo_id, EdgeKind::Call, from_symbol.clone(), call.callee.clone(), "pass1", now),
    };
    store.insert_edge(&edge)?;
    Ok(())
}

/// Extension-aware candidate search for an import's target file: tries the
/// literal specifier, then each known extension, then `index.<ext>` — spec
/// §4.4 "candidate search (X, X.ext, X/index.ext across enabled extensions)".
fn resolve_import_target(
    store: &Store,
    repo_id: &str,
    importer_rel_path: &str,
    specifier: &str,
    known_extensions: &[&str],
) -> IndexResult<Option<FileRecord>> {
    if !specifier.starts_with('.') {
        // external package / built-in runtime module: never resolved.
        return Ok(None);
    }
    let importer_dir = FileRecord::derive_directory(importer_rel_path);
    let joined = if importer_dir.is_empty() {
        specifier.trim_start_matches("./").to_string()
    } else {
        normalize_path(&format!("{importer_dir}/{specifier}"))
    };

    let mut candidates = vec![joined.clone()];
    for ext in known_extensions {
        candidates.push(format!("{joined}.{ext}"));
        candidates.push(format!("{joined}/index.{ext}"));
    }

    for candidate in candidates {
        if let Some(found) = store.get_file_by_path(repo_id, &candidate)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "." | "" => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

type NamespaceImports = HashMap<String, HashMap<String, String>>;

fn resolve_imports(
    store: &Store,
    registry: &AdapterRegistry,
    repo_id: &str,
    importer_rel_path: &str,
    imports: &[ExtractedImport],
    known_extensions: &[&str],
    now: i64,
    module_from: &str,
) -> IndexResult<(HashMap<String, Vec<String>>, NamespaceImports)> {
    let mut imported_name_to_symbol_ids: HashMap<String, Vec<String>> = HashMap::new();
    let mut namespace_imports: NamespaceImports = HashMap::new();

    store.delete_outgoing_import_edges(repo_id, module_from)?;

    for import in imports {
        let target = resolve_import_target(store, repo_id, importer_rel_path, &import.source, known_extensions)?;

        let importer_language = Path::new(importer_rel_path)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(crate::adapter::language_by_extension);
        let target_language = target.as_ref().and_then(|t| t.language.as_deref());
        let cross_language_langs = target_language.zip(importer_language).filter(|(t, i)| t != i);

        let provenance = match cross_language_langs {
            Some((target_lang, importer_lang)) => format!("cross-language:{target_lang}->{importer_lang}:pass1"),
            None => "pass1".to_string(),
        };
        let provenance = provenance.as_str();

        for imported in &import.imported_names {
            match &target {
                Some(target_file) => {
                    let exports = store.list_symbols_for_file(target_file.file_id)?;
                    let exported: Vec<&Symbol> = exports.iter().filter(|s| s.exported).collect();

                    if imported.is_namespace {
                        let alias = imported.alias.clone().unwrap_or_else(|| "*".to_string());
                        let map: HashMap<String, String> =
                            exported.iter().map(|s| (s.name.clone(), s.symbol_id.clone())).collect();
                        namespace_imports.insert(alias, map);
                        continue;
                    }

                    let matched: Vec<&&Symbol> = exported.iter().filter(|s| s.name == imported.name).collect();
                    let resolved_id = match matched.len() {
                        1 => Some(matched[0].symbol_id.clone()),
                        0 if imported.name == "default" && exported.len() == 1 => Some(exported[0].symbol_id.clone()),
                        _ => None,
                    };

                    match resolved_id {
                        Some(id) => {
                            let key = imported.alias.clone().unwrap_or_else(|| imported.name.clone());
                            imported_name_to_symbol_ids.entry(key).or_default().push(id.clone());
                            store.insert_edge(&Edge {
                                repo_id: repo_id.to_string(),
                                kind: EdgeKind::Import,
                                from: module_from.to_string(),
                                to: EdgeTarget::Symbol(id),
                                weight: 0.6,
                                confidence: 0.9,
                                resolution_strategy: ResolutionStrategy::Exact,
                                provenance: provenance.to_string(),
                                created_at: now,
                            })?;
                        }
                        None => {
                            store.insert_edge(&Edge::placeholder(
                                repo_id,
                                EdgeKind::Import,
                                module_from.to_string(),
                                format!("unresolved:{}:{}", import.source, imported.name),
                                provenance,
                                now,
                            ))?;
                        }
                    }
                }
                None => {
                    let placeholder_name = if imported.is_namespace {
                        format!("unresolved:{}:* as {}", import.source, imported.alias.clone().unwrap_or_default())
                    } else {
                        format!("unresolved:{}:{}", import.source, imported.name)
                    };
                    store.insert_edge(&Edge::placeholder(
                        repo_id,
                        EdgeKind::Import,
                        module_from.to_string(),
                        placeholder_name,
                        provenance,
                        now,
                    ))?;
                }
            }
        }
    }

    Ok((imported_name_to_symbol_ids, namespace_imports))
}
