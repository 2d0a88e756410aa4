//! Core data model: repositories, files, symbols, edges, versions, and the
//! auxiliary tables that ride along with them (metrics, slice handles,
//! content-addressed blobs, agent feedback).
//!
//! Types here are intentionally plain records — see `DESIGN.md` on "tagged
//! variants over inheritance": there is no polymorphism in this module, just
//! data, serialized straight to and from the store.

use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

/// Surrogate row id for a file within its repo. Not part of the symbol's
/// public identity — `symbolId` (a content hash) is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(NonZeroU32);

impl FileId {
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    pub fn value(&self) -> u32 {
        self.0.get()
    }
}

/// A symbol's public, content-addressed identity — a hex string produced by
/// [`crate::hash::symbol_id`]. Stable across re-indexes as long as the
/// symbol's `(repoId, relPath, kind, name, astFingerprint)` tuple is
/// unchanged.
pub type SymbolId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Function,
    Class,
    Interface,
    Type,
    Method,
    Variable,
    Constructor,
    Module,
    Namespace,
    Enum,
    Property,
    Field,
    Constant,
}

impl SymbolKind {
    /// Ordering used by `searchSymbols`' kind-priority ranking tier:
    /// `class < function < interface < type < method < constructor < module < others`.
    /// Lower value sorts first (higher priority).
    pub fn search_priority(self) -> u8 {
        match self {
            SymbolKind::Class => 0,
            SymbolKind::Function => 1,
            SymbolKind::Interface => 2,
            SymbolKind::Type => 3,
            SymbolKind::Method => 4,
            SymbolKind::Constructor => 5,
            SymbolKind::Module => 6,
            _ => 7,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Interface => "interface",
            SymbolKind::Type => "type",
            SymbolKind::Method => "method",
            SymbolKind::Variable => "variable",
            SymbolKind::Constructor => "constructor",
            SymbolKind::Module => "module",
            SymbolKind::Namespace => "namespace",
            SymbolKind::Enum => "enum",
            SymbolKind::Property => "property",
            SymbolKind::Field => "field",
            SymbolKind::Constant => "constant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "function" => SymbolKind::Function,
            "class" => SymbolKind::Class,
            "interface" => SymbolKind::Interface,
            "type" => SymbolKind::Type,
            "method" => SymbolKind::Method,
            "variable" => SymbolKind::Variable,
            "constructor" => SymbolKind::Constructor,
            "module" => SymbolKind::Module,
            "namespace" => SymbolKind::Namespace,
            "enum" => SymbolKind::Enum,
            "property" => SymbolKind::Property,
            "field" => SymbolKind::Field,
            "constant" => SymbolKind::Constant,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Private,
    Protected,
    Internal,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Protected => "protected",
            Visibility::Internal => "internal",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "public" => Visibility::Public,
            "private" => Visibility::Private,
            "protected" => Visibility::Protected,
            "internal" => Visibility::Internal,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl Range {
    pub fn new(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// Containment-first range comparison used by `findSymbolsInRange`: a
    /// symbol's range fully containing the query range ranks before one that
    /// merely overlaps it.
    pub fn fully_contains(&self, other: &Range) -> bool {
        self.start_line <= other.start_line && self.end_line >= other.end_line
    }

    pub fn overlaps(&self, other: &Range) -> bool {
        self.start_line <= other.end_line && other.start_line <= self.end_line
    }

    /// Distance from this range's start to `line`, used as the final
    /// tiebreaker in range queries.
    pub fn distance_from_start(&self, line: u32) -> u32 {
        self.start_line.abs_diff(line)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub repo_id: String,
    pub root_path: String,
    pub config_blob: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub file_id: FileId,
    pub repo_id: String,
    pub rel_path: String,
    pub content_hash: String,
    pub language: Option<String>,
    pub byte_size: u64,
    pub last_indexed_at: i64,
    pub directory: String,
}

impl FileRecord {
    pub fn derive_directory(rel_path: &str) -> String {
        match rel_path.rfind('/') {
            Some(idx) => rel_path[..idx].to_string(),
            None => String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub symbol_id: SymbolId,
    pub repo_id: String,
    pub file_id: FileId,
    pub kind: SymbolKind,
    pub name: String,
    pub exported: bool,
    pub visibility: Option<Visibility>,
    pub language: String,
    pub range: Range,
    pub ast_fingerprint: String,
    pub signature_json: Option<serde_json::Value>,
    pub summary: Option<String>,
    pub invariants_json: Option<serde_json::Value>,
    pub side_effects_json: Option<serde_json::Value>,
    pub updated_at: i64,
}

impl Symbol {
    /// `visibility = "public"` implies `exported = true` — enforced here so
    /// every construction site gets the invariant for free.
    pub fn new(
        symbol_id: SymbolId,
        repo_id: impl Into<String>,
        file_id: FileId,
        kind: SymbolKind,
        name: impl Into<String>,
        language: impl Into<String>,
        range: Range,
        ast_fingerprint: impl Into<String>,
        updated_at: i64,
    ) -> Self {
        Self {
            symbol_id,
            repo_id: repo_id.into(),
            file_id,
            kind,
            name: name.into(),
            exported: false,
            visibility: None,
            language: language.into(),
            range,
            ast_fingerprint: ast_fingerprint.into(),
            signature_json: None,
            summary: None,
            invariants_json: None,
            side_effects_json: None,
            updated_at,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        if visibility == Visibility::Public {
            self.exported = true;
        }
        self.visibility = Some(visibility);
        self
    }

    pub fn with_exported(mut self, exported: bool) -> Self {
        self.exported = exported;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Import,
    Call,
    Config,
}

impl EdgeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::Import => "import",
            EdgeKind::Call => "call",
            EdgeKind::Config => "config",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "import" => EdgeKind::Import,
            "call" => EdgeKind::Call,
            "config" => EdgeKind::Config,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionStrategy {
    Exact,
    Heuristic,
    Unresolved,
}

impl ResolutionStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            ResolutionStrategy::Exact => "exact",
            ResolutionStrategy::Heuristic => "heuristic",
            ResolutionStrategy::Unresolved => "unresolved",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "exact" => ResolutionStrategy::Exact,
            "heuristic" => ResolutionStrategy::Heuristic,
            "unresolved" => ResolutionStrategy::Unresolved,
            _ => return None,
        })
    }
}

/// An edge's target is either a real symbol or an unresolved placeholder
/// name string (`unresolved:call:<name>`, `unresolved:<path>:<name>`, ...).
/// Keeping the placeholder as a string rather than `Option<SymbolId>` is
/// deliberate: traversal still sees a node to visit, it just can't resolve
/// past it yet (see DESIGN.md, "unresolved edges as first-class placeholders").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeTarget {
    Symbol(SymbolId),
    Placeholder(String),
}

impl EdgeTarget {
    pub fn as_str(&self) -> &str {
        match self {
            EdgeTarget::Symbol(id) => id,
            EdgeTarget::Placeholder(name) => name,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, EdgeTarget::Placeholder(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub repo_id: String,
    pub kind: EdgeKind,
    pub from: SymbolId,
    pub to: EdgeTarget,
    pub weight: f32,
    pub confidence: f32,
    pub resolution_strategy: ResolutionStrategy,
    pub provenance: String,
    pub created_at: i64,
}

impl Edge {
    /// Builds the canonical `unresolved:call:<name>` / `unresolved:<path>:<name>`
    /// placeholder edge described in spec §3 (Edge) and §4.4 (Pass 1).
    pub fn placeholder(
        repo_id: impl Into<String>,
        kind: EdgeKind,
        from: SymbolId,
        placeholder_name: impl Into<String>,
        provenance: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            repo_id: repo_id.into(),
            kind,
            from,
            to: EdgeTarget::Placeholder(placeholder_name.into()),
            weight: 0.5,
            confidence: 0.35_f32.min(0.35),
            resolution_strategy: ResolutionStrategy::Unresolved,
            provenance: provenance.into(),
            created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    pub version_id: String,
    pub repo_id: String,
    pub created_at: i64,
    pub reason: String,
    pub prev_version_hash: Option<String>,
    pub version_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolVersionSnapshot {
    pub version_id: String,
    pub symbol_id: SymbolId,
    pub ast_fingerprint: String,
    pub signature_json: Option<serde_json::Value>,
    pub summary: Option<String>,
    pub invariants_json: Option<serde_json::Value>,
    pub side_effects_json: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolMetrics {
    pub symbol_id: SymbolId,
    pub fan_in: u32,
    pub fan_out: u32,
    pub churn_30d: u32,
    pub test_refs_json: Option<serde_json::Value>,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceHandle {
    pub handle: String,
    pub repo_id: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub min_version: String,
    pub max_version: String,
    pub slice_hash: String,
    pub spillover: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentFeedback {
    pub repo_id: String,
    pub version_id: String,
    pub slice_handle: String,
    pub useful_symbols: Vec<SymbolId>,
    pub missing_symbols: Vec<SymbolId>,
    pub submitted_at: i64,
}

/// Per-symbol aggregate weight bounded to `[-1, +1]`, fed by [`AgentFeedback`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedbackWeight(f32);

impl FeedbackWeight {
    pub const MIN: f32 = -1.0;
    pub const MAX: f32 = 1.0;

    pub fn new(value: f32) -> Self {
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    pub fn add(self, delta: f32) -> Self {
        Self::new(self.0 + delta)
    }
}

impl Default for FeedbackWeight {
    fn default() -> Self {
        Self(0.0)
    }
}
