//! Overview builder (C9): a directory-aggregated repository summary, cheaper
//! to transmit than a full slice. Grounded on the teacher's
//! `mcp::tools::repository_overview` shape (stats → directories →
//! hotspots, gated by a `level` parameter) layered over the store's
//! `directory_aggregates`/`hotspots` queries (C2).

use std::collections::HashMap;

use crate::error::StoreResult;
use crate::store::{DirectoryAggregate, Hotspots, Store};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OverviewLevel {
    Stats,
    Directories,
    Full,
}

#[derive(Debug, Clone, Default)]
pub struct OverviewRequest {
    pub level: Option<OverviewLevel>,
    pub include_hotspots: bool,
    pub directory_filter: Option<String>,
    pub max_directories: usize,
    pub max_exports_per_directory: usize,
}

impl Default for OverviewLevel {
    fn default() -> Self {
        OverviewLevel::Stats
    }
}

#[derive(Debug, Clone, Default)]
pub struct RepoStats {
    pub file_count: u32,
    pub symbol_count: u32,
    pub edge_count: u32,
    pub version_count: u32,
    pub avg_symbols_per_file: f64,
    pub avg_fan_out: f64,
}

/// A directory row plus its architectural-layer guess and a pointer list of
/// immediate subdirectories (not full `DirectoryInfo`s — the host walks down
/// on demand rather than receiving the whole tree at once).
#[derive(Debug, Clone)]
pub struct DirectoryInfo {
    pub directory: String,
    pub file_count: u32,
    pub symbol_count: u32,
    pub kind_counts: HashMap<String, u32>,
    pub top_fan_in: Vec<(String, u32)>,
    pub top_churn: Vec<(String, u32)>,
    pub layer: ArchitecturalLayer,
    pub subdirectories: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchitecturalLayer {
    Controller,
    Service,
    Model,
    Repository,
    View,
    Test,
    Config,
    Utility,
    Unknown,
}

impl ArchitecturalLayer {
    /// Name-pattern matching over a directory's path segments — the same
    /// "no AST, just naming convention" approach spec §4.9 uses for config
    /// edges, applied here to guess a layer without language-specific rules.
    pub fn classify(directory: &str) -> Self {
        let lower = directory.to_ascii_lowercase();
        let has = |needle: &str| lower.split('/').any(|seg| seg == needle || seg.starts_with(needle));
        if has("test") || has("tests") || has("__tests__") || has("spec") {
            ArchitecturalLayer::Test
        } else if has("controller") || has("controllers") || has("handler") || has("handlers") || has("routes") {
            ArchitecturalLayer::Controller
        } else if has("service") || has("services") || has("usecase") || has("usecases") {
            ArchitecturalLayer::Service
        } else if has("model") || has("models") || has("entity") || has("entities") || has("domain") {
            ArchitecturalLayer::Model
        } else if has("repository") || has("repositories") || has("dao") || has("store") || has("stores") {
            ArchitecturalLayer::Repository
        } else if has("view") || has("views") || has("component") || has("components") || has("pages") || has("ui") {
            ArchitecturalLayer::View
        } else if has("config") || has("configs") || has("settings") {
            ArchitecturalLayer::Config
        } else if has("util") || has("utils") || has("helper") || has("helpers") || has("lib") {
            ArchitecturalLayer::Utility
        } else {
            ArchitecturalLayer::Unknown
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TokenMetrics {
    pub hypothetical_full_cards_tokens: u64,
    pub actual_overview_tokens: u64,
    pub compression_ratio: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RepoOverview {
    pub repo_id: String,
    pub stats: RepoStats,
    pub directories: Option<Vec<DirectoryInfo>>,
    pub hotspots: Option<Hotspots>,
    pub token_metrics: TokenMetrics,
}

/// ~4 bytes/token, the same rough proxy [`crate::cache::estimate_card_size`]
/// uses for cache accounting — good enough for a ratio, not an exact budget.
fn estimate_tokens(bytes: usize) -> u64 {
    (bytes / 4).max(1) as u64
}

pub fn build_overview(store: &Store, repo_id: &str, request: &OverviewRequest) -> StoreResult<RepoOverview> {
    let level = request.level.unwrap_or_default();
    let max_directories = if request.max_directories == 0 { 50 } else { request.max_directories };
    let max_exports = if request.max_exports_per_directory == 0 { 3 } else { request.max_exports_per_directory };

    let files = store.list_files(repo_id)?;
    let symbols = store.list_symbols_for_repo(repo_id)?;
    let versions = store.list_versions(repo_id)?;
    let fan_counts = store.compute_fan_counts(repo_id)?;

    let file_count = files.len() as u32;
    let symbol_count = symbols.len() as u32;
    let edge_count: u32 = fan_counts.values().map(|(_, out)| out).sum();
    let total_fan_out: u64 = fan_counts.values().map(|(_, out)| *out as u64).sum();

    let stats = RepoStats {
        file_count,
        symbol_count,
        edge_count,
        version_count: versions.len() as u32,
        avg_symbols_per_file: if file_count == 0 { 0.0 } else { symbol_count as f64 / file_count as f64 },
        avg_fan_out: if symbol_count == 0 { 0.0 } else { total_fan_out as f64 / symbol_count as f64 },
    };

    let directories = if level >= OverviewLevel::Directories {
        let mut aggregates: Vec<DirectoryAggregate> = store.directory_aggregates(repo_id, max_exports)?;
        if let Some(filter) = &request.directory_filter {
            aggregates.retain(|a| a.directory.starts_with(filter.as_str()));
        }
        aggregates.truncate(max_directories);
        Some(build_directory_infos(aggregates))
    } else {
        None
    };

    let hotspots = if level >= OverviewLevel::Full || request.include_hotspots {
        Some(store.hotspots(repo_id, max_exports.max(5))?)
    } else {
        None
    };

    let hypothetical_full_cards_bytes: usize = symbols.iter().map(|s| 128 + s.name.len() + s.summary.as_ref().map_or(0, String::len)).sum();
    let overview_bytes = estimate_overview_bytes(&stats, &directories, &hotspots);
    let hypothetical_tokens = estimate_tokens(hypothetical_full_cards_bytes);
    let actual_tokens = estimate_tokens(overview_bytes);
    let token_metrics = TokenMetrics {
        hypothetical_full_cards_tokens: hypothetical_tokens,
        actual_overview_tokens: actual_tokens,
        compression_ratio: if actual_tokens == 0 { 0.0 } else { hypothetical_tokens as f64 / actual_tokens as f64 },
    };

    Ok(RepoOverview {
        repo_id: repo_id.to_string(),
        stats,
        directories,
        hotspots,
        token_metrics,
    })
}

fn build_directory_infos(aggregates: Vec<DirectoryAggregate>) -> Vec<DirectoryInfo> {
    let all_dirs: Vec<String> = aggregates.iter().map(|a| a.directory.clone()).collect();
    aggregates
        .into_iter()
        .map(|agg| {
            let prefix = if agg.directory.is_empty() { String::new() } else { format!("{}/", agg.directory) };
            let subdirectories = all_dirs
                .iter()
                .filter(|d| *d != &agg.directory && d.starts_with(&prefix) && !d[prefix.len()..].contains('/'))
                .cloned()
                .collect();
            DirectoryInfo {
                layer: ArchitecturalLayer::classify(&agg.directory),
                directory: agg.directory,
                file_count: agg.file_count,
                symbol_count: agg.symbol_count,
                kind_counts: agg.kind_counts,
                top_fan_in: agg.top_fan_in,
                top_churn: agg.top_churn,
                subdirectories,
            }
        })
        .collect()
}

fn estimate_overview_bytes(stats: &RepoStats, directories: &Option<Vec<DirectoryInfo>>, hotspots: &Option<Hotspots>) -> usize {
    let mut bytes = 96;
    let _ = stats;
    if let Some(dirs) = directories {
        bytes += dirs
            .iter()
            .map(|d| 64 + d.directory.len() + d.kind_counts.len() * 24 + (d.top_fan_in.len() + d.top_churn.len()) * 24)
            .sum::<usize>();
    }
    if let Some(h) = hotspots {
        bytes += (h.most_depended.len() + h.most_changed.len() + h.largest_files.len() + h.most_connected_files.len()) * 32;
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileId, FileRecord, Range, Repository, Symbol, SymbolKind};

    fn setup() -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_repo(&Repository {
                repo_id: "r".into(),
                root_path: "/r".into(),
                config_blob: serde_json::json!({}),
            })
            .unwrap();
        let file_id = store
            .upsert_file(&FileRecord {
                file_id: FileId::new(1).unwrap(),
                repo_id: "r".into(),
                rel_path: "src/controllers/user.ts".into(),
                content_hash: "h".into(),
                language: Some("typescript".into()),
                byte_size: 10,
                last_indexed_at: 0,
                directory: "src/controllers".into(),
            })
            .unwrap();
        store
            .upsert_symbol(&Symbol::new(
                "s1".into(),
                "r",
                file_id,
                SymbolKind::Function,
                "handleRequest",
                "typescript",
                Range::new(1, 0, 2, 0),
                "fp",
                1,
            ))
            .unwrap();
        store
    }

    #[test]
    fn stats_level_omits_directories_and_hotspots() {
        let store = setup();
        let request = OverviewRequest {
            level: Some(OverviewLevel::Stats),
            ..Default::default()
        };
        let overview = build_overview(&store, "r", &request).unwrap();
        assert_eq!(overview.stats.file_count, 1);
        assert_eq!(overview.stats.symbol_count, 1);
        assert!(overview.directories.is_none());
        assert!(overview.hotspots.is_none());
    }

    #[test]
    fn full_level_includes_directories_with_layer_tags() {
        let store = setup();
        let request = OverviewRequest {
            level: Some(OverviewLevel::Full),
            max_directories: 10,
            max_exports_per_directory: 3,
            ..Default::default()
        };
        let overview = build_overview(&store, "r", &request).unwrap();
        let dirs = overview.directories.unwrap();
        assert_eq!(dirs.len(), 1);
        assert_eq!(dirs[0].layer, ArchitecturalLayer::Controller);
        assert!(overview.hotspots.is_some());
    }

    #[test]
    fn compression_ratio_is_positive() {
        let store = setup();
        let request = OverviewRequest {
            level: Some(OverviewLevel::Full),
            ..Default::default()
        };
        let overview = build_overview(&store, "r", &request).unwrap();
        assert!(overview.token_metrics.compression_ratio > 0.0);
    }

    #[test]
    fn architectural_layer_classifies_common_directory_names() {
        assert_eq!(ArchitecturalLayer::classify("src/services"), ArchitecturalLayer::Service);
        assert_eq!(ArchitecturalLayer::classify("src/models"), ArchitecturalLayer::Model);
        assert_eq!(ArchitecturalLayer::classify("src/__tests__"), ArchitecturalLayer::Test);
        assert_eq!(ArchitecturalLayer::classify("src/weird_stuff"), ArchitecturalLayer::Unknown);
    }
}
