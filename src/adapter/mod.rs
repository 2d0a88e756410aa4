//! Language adapter contract and registry (C3). An adapter is polymorphic
//! over `{parse, extractSymbols, extractImports, extractCalls}`, optionally
//! `resolveCall`. The registry is the only place that knows which concrete
//! adapters exist; everything else dispatches through the trait object.

mod plugin;
mod registry;
mod rust_adapter;
mod typescript_adapter;

pub use plugin::{check_manifest, AdapterDescriptor, PluginLoadError, PluginManifest, HOST_API_VERSION};
pub use registry::{AdapterEntry, AdapterRegistry, AdapterSource};

use serde::{Deserialize, Serialize};

/// A raw extracted symbol, before `symbolId`/`astFingerprint` derivation
/// (that's the indexer's job — an adapter is pure over its input bytes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedSymbol {
    pub kind: crate::model::SymbolKind,
    pub name: String,
    pub exported: bool,
    pub visibility: Option<crate::model::Visibility>,
    pub range: crate::model::Range,
    /// Normalized structural shape fed to `ast_fingerprint`.
    pub shape: String,
    pub signature_json: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedImport {
    pub imported_names: Vec<ImportedName>,
    /// Raw module specifier as written (`"./b"`, `"./helper.py"`, ...).
    pub source: String,
    pub range: crate::model::Range,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedName {
    pub name: String,
    pub alias: Option<String>,
    /// `true` for `import * as ns from ...`.
    pub is_namespace: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedCall {
    /// Full callee text as written (`foo`, `ns.member`, `this.foo`, ...).
    pub callee: String,
    pub range: crate::model::Range,
    /// `true` for calls through a dynamic expression (`obj[key]()`) which
    /// can never resolve per spec §4.5 rule 9.
    pub is_dynamic: bool,
    /// The enclosing symbol's name, used to key the call's `from` edge.
    pub caller_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub symbols: Vec<ExtractedSymbol>,
    pub imports: Vec<ExtractedImport>,
    pub calls: Vec<ExtractedCall>,
}

/// Capability set every adapter must implement. `resolve_call` is the one
/// open question from spec §9: an adapter hook for namespace/alias
/// resolution whose contract is intentionally thin (return `None` to defer
/// to the core resolution engine's generic rules).
pub trait LanguageAdapter: Send + Sync {
    fn language_id(&self) -> &'static str;

    fn parse(&self, source: &[u8]) -> Result<ParsedFile, String>;

    /// Optional language-specific override of call resolution. Most
    /// adapters return `None` and let `resolve_call_target` (C5) handle it.
    fn resolve_call(&self, _call: &ExtractedCall) -> Option<String> {
        None
    }

    /// Whether this adapter's files participate in Pass 2 cross-file call
    /// resolution (spec §4.4: "TS/JS family in practice").
    fn supports_cross_file_resolution(&self) -> bool {
        false
    }
}

pub use rust_adapter::RustAdapter;
pub use typescript_adapter::TypeScriptAdapter;

/// Extension → language id for extensions that get a full adapter OR merely
/// a language tag (no adapter) for cross-language edge provenance — Python
/// files are tagged `"python"` without a parser, per SPEC_FULL.md §1.
pub fn language_by_extension(extension: &str) -> Option<&'static str> {
    match extension {
        "rs" => Some("rust"),
        "ts" | "tsx" => Some("typescript"),
        "js" | "jsx" | "mjs" | "cjs" => Some("javascript"),
        "py" | "pyi" => Some("python"),
        _ => None,
    }
}
