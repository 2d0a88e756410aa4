//! Slice engine (C7): `slice_build` turns a task description (free text, a
//! stack trace, a failing test path, edited files, or explicit entry
//! symbols) into a bounded, ranked, deterministically-ordered subgraph.
//! Grounded on the teacher's `indexing::pipeline::IndexingPipeline` staged
//! orchestration (one function per numbered step, threaded through a shared
//! context) — generalized from an indexing pipeline to a read-path one that
//! additionally consults the graph loader (C6), the cache layer (C8), and
//! the semantic re-ranker.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::cache::{CachedCard, GraphSliceCache, SymbolCardCache};
use crate::config::SliceConfig;
use crate::error::{SliceError, SliceResult};
use crate::graph::{self, Direction, GraphData, NeighborhoodRequest};
use crate::model::{Edge, EdgeKind, EdgeTarget, Range, SymbolId, SymbolKind};
use crate::semantic::{BruteForceIndex, EmbeddingProvider};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct StackFrame {
    pub file: String,
    pub line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardDetail {
    Minimal,
    Full,
}

impl Default for CardDetail {
    fn default() -> Self {
        CardDetail::Full
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Budget {
    pub max_cards: usize,
    pub max_estimated_tokens: usize,
}

/// `sliceBuild`'s request shape, spec §4.7: `{taskText, stackTrace,
/// failingTestPath, editedFiles, entrySymbols, knownCardEtags, cardDetail,
/// budget}`.
#[derive(Debug, Clone, Default)]
pub struct SliceRequest {
    pub task_text: Option<String>,
    pub stack_trace: Vec<StackFrame>,
    pub failing_test_path: Option<String>,
    pub edited_files: Vec<String>,
    pub entry_symbols: Vec<SymbolId>,
    pub known_card_etags: HashMap<SymbolId, String>,
    pub card_detail: CardDetail,
    pub budget: Option<Budget>,
    pub max_hops: Option<usize>,
    pub direction: Option<Direction>,
    pub issue_handle: bool,
}

/// A symbol's card, subject to `maxCards`. `body` is `None` when the host
/// already holds this exact version (`knownCardEtags` matched) — only the
/// `etag` round-trips so the host can confirm it's still current.
#[derive(Debug, Clone)]
pub struct Card {
    pub symbol_id: SymbolId,
    pub etag: String,
    pub body: Option<CardBody>,
}

#[derive(Debug, Clone)]
pub struct CardBody {
    pub name: String,
    pub kind: SymbolKind,
    pub file_path: String,
    pub range: Range,
    pub summary: Option<String>,
    pub fan_in: usize,
    pub fan_out: usize,
    pub score: f32,
}

/// `[fromIdx, toIdx, type, weight]` — indices into [`GraphSlice::symbol_index`].
#[derive(Debug, Clone, Copy)]
pub struct SliceEdge {
    pub from_idx: usize,
    pub to_idx: usize,
    pub kind: EdgeKind,
    pub weight: f32,
}

#[derive(Debug, Clone)]
pub struct GraphSlice {
    pub repo_id: String,
    pub version_id: String,
    pub start_symbols: Vec<SymbolId>,
    pub symbol_index: Vec<SymbolId>,
    pub cards: Vec<Card>,
    pub edges: Vec<SliceEdge>,
    pub frontier: Vec<SymbolId>,
}

/// The `sliceBuild(request) -> SliceResult` entry point, spec §4.7's nine
/// steps. `embedding_provider` is the optional re-ranking hook (step 5);
/// pass `None` to skip semantic blending entirely.
#[allow(clippy::too_many_arguments)]
pub fn slice_build(
    store: &Store,
    config: &SliceConfig,
    card_cache: &SymbolCardCache,
    slice_cache: &GraphSliceCache,
    embedding_provider: Option<&dyn EmbeddingProvider>,
    repo_id: &str,
    request: &SliceRequest,
) -> SliceResult<GraphSlice> {
    // Step 1: resolve versionId.
    if store.get_repo(repo_id)?.is_none() {
        return Err(SliceError::InvalidRepo { repo_id: repo_id.to_string() });
    }
    let version = store
        .latest_version(repo_id)?
        .ok_or_else(|| SliceError::NoVersion { repo_id: repo_id.to_string() })?;
    let version_id = version.version_id;

    // Step 2: cache key, short-circuit on hit.
    let cache_key = format!("{repo_id}:{version_id}:{}", canonical_context_key(request));
    if let Some(cached) = slice_cache.get(&cache_key) {
        return Ok(cached);
    }

    // Step 3: derive entry symbols.
    let entry_symbols = derive_entry_symbols(store, repo_id, request)?;
    if entry_symbols.is_empty() {
        return Err(SliceError::NoSymbols { repo_id: repo_id.to_string() });
    }

    // Step 4: load a neighborhood bounded by the budget, with headroom beyond
    // maxCards so ranking has a real candidate pool and a frontier to report.
    let budget = request.budget.unwrap_or(Budget {
        max_cards: config.default_max_cards,
        max_estimated_tokens: config.default_max_estimated_tokens,
    });
    let neighborhood_request = NeighborhoodRequest {
        entry_symbols: entry_symbols.clone(),
        max_hops: request.max_hops.unwrap_or(2),
        direction: request.direction.unwrap_or(Direction::Both),
        max_symbols: budget.max_cards.saturating_mul(3).max(budget.max_cards),
    };
    let (graph_data, _telemetry) = graph::load_neighborhood(store, repo_id, &neighborhood_request)?;

    // Step 5: score and rank, with optional semantic blending.
    let mut scored = score_symbols(store, &graph_data, &entry_symbols, config, request, embedding_provider)?;

    // Step 6: additive agent-feedback adjustment, bounded in [-1, +1].
    for (id, score) in scored.iter_mut() {
        *score += store.get_feedback_weight(id)?.value();
    }
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0)));

    // Step 7: produce the GraphSlice. `top` becomes the card/symbolIndex set;
    // everything beyond it is the frontier.
    let mut top: Vec<(SymbolId, f32)> = scored.iter().take(budget.max_cards).cloned().collect();
    let mut frontier: Vec<SymbolId> = scored.iter().skip(budget.max_cards).map(|(id, _)| id.clone()).collect();

    // Step 8: sort deterministically so two identical requests yield
    // byte-identical output.
    top.sort_by(|a, b| a.0.cmp(&b.0));
    frontier.sort();

    let symbol_index: Vec<SymbolId> = top.iter().map(|(id, _)| id.clone()).collect();
    let index_of: HashMap<&str, usize> = symbol_index.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();

    let cards = build_cards(store, &graph_data, &top, request, card_cache, repo_id, &version_id)?;
    let mut edges = encode_edges(&graph_data.edges, &index_of, config);
    edges.sort_by(|a, b| {
        a.from_idx
            .cmp(&b.from_idx)
            .then(a.to_idx.cmp(&b.to_idx))
            .then_with(|| a.kind.as_str().cmp(b.kind.as_str()))
    });

    let slice = GraphSlice {
        repo_id: repo_id.to_string(),
        version_id,
        start_symbols: entry_symbols,
        symbol_index,
        cards,
        edges,
        frontier,
    };

    // Step 9: cache and (optionally) issue a handle.
    slice_cache.set(cache_key, slice.clone(), estimate_slice_size(&slice));
    if request.issue_handle {
        issue_slice_handle(store, &slice, config)?;
    }

    Ok(slice)
}

fn issue_slice_handle(store: &Store, slice: &GraphSlice, config: &SliceConfig) -> SliceResult<()> {
    let now = crate::utils::get_utc_timestamp();
    let slice_hash = crate::hash::hash_content(slice.symbol_index.join(",").as_bytes());
    let handle = crate::model::SliceHandle {
        handle: crate::hash::hash_content(format!("{}:{}:{now}", slice.repo_id, slice.version_id).as_bytes()),
        repo_id: slice.repo_id.clone(),
        created_at: now,
        expires_at: now + config.cache_ttl_secs as i64,
        min_version: slice.version_id.clone(),
        max_version: slice.version_id.clone(),
        slice_hash,
        spillover: None,
    };
    store.create_slice_handle(&handle)?;
    Ok(())
}

/// Step 3: symbol-name search against `taskText`, plus symbols within
/// stack-trace frame ranges, plus test-file references, plus symbols owned
/// by edited files — used only when `entrySymbols` isn't given explicitly.
fn derive_entry_symbols(store: &Store, repo_id: &str, request: &SliceRequest) -> SliceResult<Vec<SymbolId>> {
    if !request.entry_symbols.is_empty() {
        return Ok(dedup(request.entry_symbols.clone()));
    }

    let mut ids: Vec<SymbolId> = Vec::new();

    if let Some(task_text) = request.task_text.as_deref().filter(|t| !t.trim().is_empty()) {
        let hits = store.search_symbols(repo_id, task_text, 20)?;
        ids.extend(hits.into_iter().map(|h| h.symbol.symbol_id));
    }

    for frame in &request.stack_trace {
        if let Some(file) = store.get_file_by_path(repo_id, &frame.file)? {
            let symbols = store.find_symbols_in_range(repo_id, file.file_id, frame.line, frame.line)?;
            ids.extend(symbols.into_iter().map(|s| s.symbol_id));
        }
    }

    if let Some(test_path) = &request.failing_test_path {
        if let Some(file) = store.get_file_by_path(repo_id, test_path)? {
            ids.extend(store.symbols_referencing_file(file.file_id, "test")?);
        }
    }

    for path in &request.edited_files {
        if let Some(file) = store.get_file_by_path(repo_id, path)? {
            // `list_symbols_for_file` already includes the file's own module
            // row (see pass1's module symbol), so its import edges — which
            // originate from the module, not from any declared symbol — are
            // reachable from this entry set rather than orphaned.
            let owned = store.list_symbols_for_file(file.file_id)?;
            ids.extend(owned.into_iter().map(|s| s.symbol_id));
        }
    }

    Ok(dedup(ids))
}

fn dedup(ids: Vec<SymbolId>) -> Vec<SymbolId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

/// Step 5: lexical score from BFS hop-distance to the nearest entry symbol,
/// optionally blended with embedding cosine similarity by `semantic_alpha`.
fn score_symbols(
    store: &Store,
    graph_data: &GraphData,
    entry_symbols: &[SymbolId],
    config: &SliceConfig,
    request: &SliceRequest,
    embedding_provider: Option<&dyn EmbeddingProvider>,
) -> SliceResult<Vec<(SymbolId, f32)>> {
    let distances = bfs_distances(graph_data, entry_symbols);
    let lexical = |id: &str| -> f32 {
        match distances.get(id) {
            Some(d) => 1.0 / (1.0 + *d as f32),
            None => 0.0,
        }
    };

    let semantic_scores = semantic_rerank(store, graph_data, request, embedding_provider)?;
    let alpha = config.semantic_alpha.clamp(0.0, 1.0);

    let scored = graph_data
        .symbols
        .keys()
        .map(|id| {
            let lex = lexical(id);
            let score = match &semantic_scores {
                Some(sem) => alpha * sem.get(id.as_str()).copied().unwrap_or(0.0) + (1.0 - alpha) * lex,
                None => lex,
            };
            (id.clone(), score)
        })
        .collect();
    Ok(scored)
}

fn semantic_rerank(
    store: &Store,
    graph_data: &GraphData,
    request: &SliceRequest,
    embedding_provider: Option<&dyn EmbeddingProvider>,
) -> SliceResult<Option<HashMap<SymbolId, f32>>> {
    let (provider, task_text) = match (embedding_provider, request.task_text.as_deref().filter(|t| !t.trim().is_empty())) {
        (Some(provider), Some(task_text)) => (provider, task_text),
        _ => return Ok(None),
    };

    let mut vectors = Vec::new();
    for id in graph_data.symbols.keys() {
        if let Some(vector) = store.get_symbol_embedding(id)? {
            vectors.push((id.clone(), vector));
        }
    }
    if vectors.is_empty() {
        return Ok(None);
    }

    let query_vector = provider.embed(task_text)?;
    let index = BruteForceIndex::new(vectors);
    let ranked = index.search(&query_vector, graph_data.symbols.len());
    Ok(Some(ranked.into_iter().collect()))
}

fn bfs_distances(graph_data: &GraphData, entry_symbols: &[SymbolId]) -> HashMap<SymbolId, u32> {
    let mut distance: HashMap<SymbolId, u32> = HashMap::new();
    let mut queue: VecDeque<SymbolId> = VecDeque::new();
    for id in entry_symbols {
        if graph_data.symbols.contains_key(id) && distance.insert(id.clone(), 0).is_none() {
            queue.push_back(id.clone());
        }
    }
    while let Some(current) = queue.pop_front() {
        let next_distance = distance[&current] + 1;
        let neighbors = graph_data
            .adjacency_out
            .get(&current)
            .into_iter()
            .chain(graph_data.adjacency_in.get(&current))
            .flatten();
        for neighbor in neighbors {
            if !distance.contains_key(neighbor) {
                distance.insert(neighbor.clone(), next_distance);
                queue.push_back(neighbor.clone());
            }
        }
    }
    distance
}

fn build_cards(
    store: &Store,
    graph_data: &GraphData,
    ranked: &[(SymbolId, f32)],
    request: &SliceRequest,
    card_cache: &SymbolCardCache,
    repo_id: &str,
    version_id: &str,
) -> SliceResult<Vec<Card>> {
    let file_ids: Vec<_> = ranked
        .iter()
        .filter_map(|(id, _)| graph_data.symbols.get(id).map(|s| s.file_id))
        .collect();
    let files = store.get_files_by_ids(&file_ids)?;

    let mut cards = Vec::with_capacity(ranked.len());
    for (id, score) in ranked {
        let symbol = graph_data
            .symbols
            .get(id)
            .ok_or_else(|| SliceError::Internal(format!("symbol {id} missing from loaded neighborhood")))?;
        let etag = symbol.ast_fingerprint.clone();

        if request.known_card_etags.get(id) == Some(&etag) {
            cards.push(Card { symbol_id: id.clone(), etag, body: None });
            continue;
        }

        let cache_key = format!("{repo_id}:{id}:{version_id}");
        let cached = card_cache.get(&cache_key);
        let (outgoing, incoming) = match cached {
            Some(cached) => (cached.outgoing, cached.incoming),
            None => {
                let outgoing = store.get_edges_from_symbols(repo_id, std::slice::from_ref(id))?;
                let incoming = store.get_edges_to_symbols(repo_id, std::slice::from_ref(id))?;
                let cached_card = CachedCard {
                    symbol: symbol.clone(),
                    outgoing: outgoing.clone(),
                    incoming: incoming.clone(),
                };
                card_cache.set(cache_key, cached_card.clone(), crate::cache::estimate_card_size(&cached_card));
                (outgoing, incoming)
            }
        };

        let file_path = files.get(&symbol.file_id).map(|f| f.rel_path.clone()).unwrap_or_default();
        let summary = if request.card_detail == CardDetail::Full { symbol.summary.clone() } else { None };

        cards.push(Card {
            symbol_id: id.clone(),
            etag,
            body: Some(CardBody {
                name: symbol.name.clone(),
                kind: symbol.kind,
                file_path,
                range: symbol.range,
                summary,
                fan_in: incoming.len(),
                fan_out: outgoing.len(),
                score: *score,
            }),
        });
    }
    Ok(cards)
}

fn encode_edges(edges: &[Edge], index_of: &HashMap<&str, usize>, config: &SliceConfig) -> Vec<SliceEdge> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for edge in edges {
        let Some(&from_idx) = index_of.get(edge.from.as_str()) else { continue };
        let Some(&to_idx) = index_of.get(edge.to.as_str()) else { continue };
        if !seen.insert((from_idx, to_idx, edge.kind)) {
            continue;
        }
        out.push(SliceEdge {
            from_idx,
            to_idx,
            kind: edge.kind,
            weight: edge_weight(edge, config),
        });
    }
    out
}

fn edge_weight(edge: &Edge, config: &SliceConfig) -> f32 {
    let base = match edge.kind {
        EdgeKind::Import => config.edge_weights.import,
        EdgeKind::Call => config.edge_weights.call,
        EdgeKind::Config => config.edge_weights.config,
    };
    base * edge.confidence
}

/// Canonicalizes the request into a cache-key-safe string: every
/// variable-order collection (edited files, entry symbols, known etags) is
/// sorted first so two requests with the same content in different
/// collection order hash identically, mirroring `stableStringify`'s
/// key-sorting guarantee without needing a JSON dependency for this alone.
pub fn canonical_context_key(request: &SliceRequest) -> String {
    let mut parts = Vec::new();
    parts.push(format!("task={}", request.task_text.as_deref().unwrap_or("")));

    let frames: Vec<String> = request.stack_trace.iter().map(|f| format!("{}:{}", f.file, f.line)).collect();
    parts.push(format!("stack=[{}]", frames.join(",")));

    parts.push(format!("test={}", request.failing_test_path.as_deref().unwrap_or("")));

    let mut edited = request.edited_files.clone();
    edited.sort();
    parts.push(format!("edited=[{}]", edited.join(",")));

    let mut entries = request.entry_symbols.clone();
    entries.sort();
    parts.push(format!("entries=[{}]", entries.join(",")));

    let mut etags: Vec<(&SymbolId, &String)> = request.known_card_etags.iter().collect();
    etags.sort_by(|a, b| a.0.cmp(b.0));
    let etags_str: Vec<String> = etags.into_iter().map(|(k, v)| format!("{k}={v}")).collect();
    parts.push(format!("etags=[{}]", etags_str.join(",")));

    parts.push(format!("detail={:?}", request.card_detail));
    if let Some(budget) = request.budget {
        parts.push(format!("budget={}:{}", budget.max_cards, budget.max_estimated_tokens));
    }
    if let Some(hops) = request.max_hops {
        parts.push(format!("hops={hops}"));
    }

    crate::hash::hash_content(parts.join("|").as_bytes())
}

fn estimate_slice_size(slice: &GraphSlice) -> usize {
    128 + slice.symbol_index.iter().map(|id| id.len()).sum::<usize>() + slice.cards.len() * 96 + slice.edges.len() * 24
}
