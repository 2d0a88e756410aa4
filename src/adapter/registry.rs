use std::sync::Arc;

use dashmap::DashMap;

use super::LanguageAdapter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterSource {
    Builtin,
    Plugin { plugin_name: String },
}

#[derive(Clone)]
pub struct AdapterEntry {
    pub adapter: Arc<dyn LanguageAdapter>,
    pub source: AdapterSource,
}

/// `DashMap<extension, AdapterEntry>` so the (out-of-scope) watcher/MCP
/// layer can register plugins concurrently with indexing, per SPEC_FULL.md
/// §4.3. A plugin MAY override a builtin extension.
pub struct AdapterRegistry {
    entries: DashMap<String, AdapterEntry>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        let registry = Self {
            entries: DashMap::new(),
        };
        registry.register_builtin("rs", Arc::new(super::RustAdapter::new()));
        registry.register_builtin("ts", Arc::new(super::TypeScriptAdapter::new()));
        registry.register_builtin("tsx", Arc::new(super::TypeScriptAdapter::new()));
        registry
    }

    fn register_builtin(&self, extension: &str, adapter: Arc<dyn LanguageAdapter>) {
        self.entries.insert(
            extension.to_string(),
            AdapterEntry {
                adapter,
                source: AdapterSource::Builtin,
            },
        );
    }

    /// Registers a plugin-provided adapter, overriding any builtin for the
    /// same extension.
    pub fn register_plugin(&self, extension: &str, adapter: Arc<dyn LanguageAdapter>, plugin_name: &str) {
        self.entries.insert(
            extension.to_string(),
            AdapterEntry {
                adapter,
                source: AdapterSource::Plugin {
                    plugin_name: plugin_name.to_string(),
                },
            },
        );
    }

    pub fn get(&self, extension: &str) -> Option<Arc<dyn LanguageAdapter>> {
        self.entries.get(extension).map(|e| e.adapter.clone())
    }

    pub fn get_adapter_info(&self, extension: &str) -> Option<AdapterSource> {
        self.entries.get(extension).map(|e| e.source.clone())
    }

    pub fn extensions(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_extensions_are_registered() {
        let registry = AdapterRegistry::new();
        assert!(registry.get("ts").is_some());
        assert!(registry.get("rs").is_some());
        assert_eq!(registry.get_adapter_info("ts"), Some(AdapterSource::Builtin));
        assert!(registry.get("vb6").is_none());
    }

    #[test]
    fn plugin_overrides_builtin_and_provenance_reflects_it() {
        let registry = AdapterRegistry::new();
        registry.register_plugin("ts", Arc::new(super::super::TypeScriptAdapter::new()), "acme-ts-plugin");
        assert_eq!(
            registry.get_adapter_info("ts"),
            Some(AdapterSource::Plugin {
                plugin_name: "acme-ts-plugin".to_string()
            })
        );
    }
}
