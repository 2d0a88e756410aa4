//! The six concrete seed scenarios from the testable-properties section,
//! run end-to-end against an on-disk `tempfile` repo — mirroring the
//! teacher's own `tests/` layout (integration tests exercise the full
//! `index_repo` pipeline; unit tests colocated in `#[cfg(test)]` modules
//! cover individual components).

use std::fs;

use codegraph_slicer::adapter::AdapterRegistry;
use codegraph_slicer::config::Settings;
use codegraph_slicer::indexer::{index_repo, IndexMode};
use codegraph_slicer::model::{EdgeTarget, Repository, ResolutionStrategy};
use codegraph_slicer::store::Store;
use codegraph_slicer::utils::{evaluate_benchmark_gate, BenchmarkAggregate, BenchmarkFamily, GateThresholds};
use tempfile::TempDir;

fn open_repo(dir: &TempDir) -> (Store, Repository, AdapterRegistry, Settings) {
    let store = Store::open_in_memory().unwrap();
    let repo = Repository {
        repo_id: "r".to_string(),
        root_path: dir.path().to_string_lossy().to_string(),
        config_blob: serde_json::json!({}),
    };
    store.upsert_repo(&repo).unwrap();
    (store, repo, AdapterRegistry::new(), Settings::default())
}

#[test]
fn two_file_resolution_produces_one_exact_call_edge() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.ts"), "import {b} from './b';\nexport function a() { return b(); }\n").unwrap();
    fs::write(dir.path().join("b.ts"), "export function b() { return 42; }\n").unwrap();

    let (store, repo, registry, settings) = open_repo(&dir);
    index_repo(&store, &registry, &settings, &repo, IndexMode::Full, None).unwrap();

    let symbol_a = store.list_symbols_for_repo("r").unwrap().into_iter().find(|s| s.name == "a").unwrap();
    let symbol_b = store.list_symbols_for_repo("r").unwrap().into_iter().find(|s| s.name == "b").unwrap();

    let call_edges: Vec<_> = store
        .get_edges_from_symbols("r", &[symbol_a.symbol_id.clone()])
        .unwrap()
        .into_iter()
        .filter(|e| e.kind == codegraph_slicer::model::EdgeKind::Call)
        .collect();

    assert_eq!(call_edges.len(), 1);
    assert_eq!(call_edges[0].to, EdgeTarget::Symbol(symbol_b.symbol_id));
    assert_eq!(call_edges[0].resolution_strategy, ResolutionStrategy::Exact);
    assert!(call_edges[0].confidence >= 0.85);
}

#[test]
fn incremental_change_creates_a_new_version_with_stable_symbol_ids() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.ts"), "import {b} from './b';\nexport function a() { return b(); }\n").unwrap();
    fs::write(dir.path().join("b.ts"), "export function b() { return 42; }\n").unwrap();

    let (store, repo, registry, settings) = open_repo(&dir);
    index_repo(&store, &registry, &settings, &repo, IndexMode::Full, None).unwrap();
    let symbol_a_before = store.list_symbols_for_repo("r").unwrap().into_iter().find(|s| s.name == "a").unwrap();
    let symbol_b_before = store.list_symbols_for_repo("r").unwrap().into_iter().find(|s| s.name == "b").unwrap();

    fs::write(dir.path().join("b.ts"), "export function b() { return 7; }\n").unwrap();
    index_repo(&store, &registry, &settings, &repo, IndexMode::Incremental, None).unwrap();

    let symbol_a_after = store.list_symbols_for_repo("r").unwrap().into_iter().find(|s| s.name == "a").unwrap();
    let symbol_b_after = store.list_symbols_for_repo("r").unwrap().into_iter().find(|s| s.name == "b").unwrap();

    assert_eq!(symbol_a_before.symbol_id, symbol_a_after.symbol_id);
    assert_ne!(symbol_b_before.ast_fingerprint, symbol_b_after.ast_fingerprint);

    let call_edges = store.get_edges_from_symbols("r", &[symbol_a_after.symbol_id]).unwrap();
    assert_eq!(call_edges[0].to, EdgeTarget::Symbol(symbol_b_after.symbol_id));
    assert_eq!(store.list_versions("r").unwrap().len(), 2);
}

#[test]
fn cross_language_import_is_tagged_and_left_unresolved() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("app.ts"), "import {greet} from './helper';\nexport function run() { return greet(); }\n").unwrap();
    fs::write(dir.path().join("helper.py"), "def greet():\n    return 'hi'\n").unwrap();

    let (store, repo, registry, settings) = open_repo(&dir);
    index_repo(&store, &registry, &settings, &repo, IndexMode::Full, None).unwrap();

    let module_from = "module:r:app.ts".to_string();
    let edges = store.get_edges_from_symbols("r", &[module_from]).unwrap();
    let import_edge = edges
        .iter()
        .find(|e| e.kind == codegraph_slicer::model::EdgeKind::Import)
        .expect("expected an import edge from the app.ts module node");

    assert!(import_edge.to.is_placeholder());
    assert!(import_edge.provenance.starts_with("cross-language:python->typescript"));
}

#[test]
fn import_edge_is_reachable_through_a_slice_built_from_an_entry_symbol() {
    use codegraph_slicer::cache::{GraphSliceCache, SymbolCardCache};
    use codegraph_slicer::config::SliceConfig;
    use codegraph_slicer::slice::{slice_build, SliceRequest};

    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.ts"), "import {b} from './b';\nexport function a() { return b(); }\n").unwrap();
    fs::write(dir.path().join("b.ts"), "export function b() { return 42; }\n").unwrap();

    let (store, repo, registry, settings) = open_repo(&dir);
    index_repo(&store, &registry, &settings, &repo, IndexMode::Full, None).unwrap();

    let config = SliceConfig::default();
    let card_cache = SymbolCardCache::new(100, 10_000_000, None);
    let slice_cache = GraphSliceCache::new(100, 10_000_000, Some(60));

    // The natural consumer path: a host names the edited file, not the
    // module's internal pseudo-id, and still expects its imports to surface.
    let request = SliceRequest {
        edited_files: vec!["a.ts".into()],
        ..Default::default()
    };
    let slice = slice_build(&store, &config, &card_cache, &slice_cache, None, "r", &request).unwrap();

    let module_id = "module:r:a.ts".to_string();
    assert!(slice.symbol_index.contains(&module_id), "module node should be part of the slice");

    let module_idx = slice.symbol_index.iter().position(|id| id == &module_id).unwrap();
    assert!(
        slice
            .edges
            .iter()
            .any(|e| e.from_idx == module_idx && e.kind == codegraph_slicer::model::EdgeKind::Import),
        "import edge from the module node should be reachable in the resulting slice"
    );
}

#[test]
fn feedback_impact_orders_weights_by_usefulness() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a.ts"), "export function sym1() {}\nexport function sym2() {}\n").unwrap();
    let (store, repo, registry, settings) = open_repo(&dir);
    index_repo(&store, &registry, &settings, &repo, IndexMode::Full, None).unwrap();

    for _ in 0..5 {
        store
            .record_agent_feedback(&codegraph_slicer::model::AgentFeedback {
                repo_id: "r".into(),
                version_id: "v".into(),
                slice_handle: "h".into(),
                useful_symbols: vec!["sym1".into()],
                missing_symbols: vec![],
                submitted_at: 1,
            })
            .unwrap();
    }
    for _ in 0..3 {
        store
            .record_agent_feedback(&codegraph_slicer::model::AgentFeedback {
                repo_id: "r".into(),
                version_id: "v".into(),
                slice_handle: "h".into(),
                useful_symbols: vec!["sym2".into()],
                missing_symbols: vec!["sym1".into()],
                submitted_at: 1,
            })
            .unwrap();
    }

    let weight1 = store.get_feedback_weight("sym1").unwrap().value();
    let weight2 = store.get_feedback_weight("sym2").unwrap().value();
    assert!(weight1 > weight2);
    assert!((-1.0..=1.0).contains(&weight1));
    assert!((-1.0..=1.0).contains(&weight2));
}

#[test]
fn benchmark_gate_scenario_passes_then_fails_on_dropped_p50() {
    let aggregate_passing = BenchmarkAggregate {
        overall_min_token_reduction_pct: 34.0,
        families: vec![BenchmarkFamily {
            family: "security".into(),
            p25: 44.0,
            p50: 58.0,
            min: 34.0,
        }],
    };
    let thresholds = GateThresholds { p50: 50.0, p25: 40.0, floor: 20.0 };
    assert!(evaluate_benchmark_gate(&aggregate_passing, &thresholds).is_ok());

    let mut aggregate_failing = aggregate_passing;
    aggregate_failing.families[0].p50 = 49.0;
    let err = evaluate_benchmark_gate(&aggregate_failing, &thresholds).unwrap_err();
    assert!(err.contains("p50"));
}

#[test]
fn slice_cache_key_ignores_element_order() {
    use codegraph_slicer::slice::{Budget, CardDetail, SliceRequest};

    let base = SliceRequest {
        edited_files: vec!["a.ts".into(), "b.ts".into()],
        entry_symbols: vec!["s1".into(), "s2".into()],
        card_detail: CardDetail::Full,
        budget: Some(Budget { max_cards: 10, max_estimated_tokens: 1000 }),
        ..Default::default()
    };
    let reordered = SliceRequest {
        edited_files: vec!["b.ts".into(), "a.ts".into()],
        entry_symbols: vec!["s2".into(), "s1".into()],
        card_detail: CardDetail::Full,
        budget: Some(Budget { max_cards: 10, max_estimated_tokens: 1000 }),
        ..Default::default()
    };

    assert_eq!(
        codegraph_slicer::slice::canonical_context_key(&base),
        codegraph_slicer::slice::canonical_context_key(&reordered)
    );
}
