//! Plugin manifest and host API version gate (§6 "Plugin manifest"). This
//! crate does not dynamically load shared libraries — plugin *discovery* is
//! out of scope (§1, CLI/transport layer) — but the manifest shape and the
//! version check a host performs before registering a plugin's adapters are
//! part of the core contract and live here.

use serde::{Deserialize, Serialize};

/// The API version this crate's adapter contract implements. A plugin
/// manifest must match exactly, per spec §6 "Host rejects mismatched apiVersion".
pub const HOST_API_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterDescriptor {
    pub extension: String,
    pub language_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    pub version: String,
    pub api_version: String,
    pub adapters: Vec<AdapterDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginLoadError {
    ApiVersionMismatch { expected: String, found: String },
}

impl std::fmt::Display for PluginLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PluginLoadError::ApiVersionMismatch { expected, found } => {
                write!(f, "plugin api version {found} incompatible with host version {expected}")
            }
        }
    }
}

/// Validates a manifest against [`HOST_API_VERSION`] before the registry is
/// allowed to register any of its adapters. A plugin load failure never
/// aborts loading the rest (spec §7 "Plugin load failure → skip plugin").
pub fn check_manifest(manifest: &PluginManifest) -> Result<(), PluginLoadError> {
    if manifest.api_version != HOST_API_VERSION {
        return Err(PluginLoadError::ApiVersionMismatch {
            expected: HOST_API_VERSION.to_string(),
            found: manifest.api_version.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_with_matching_version_passes() {
        let manifest = PluginManifest {
            name: "acme".into(),
            version: "0.1.0".into(),
            api_version: HOST_API_VERSION.to_string(),
            adapters: vec![],
        };
        assert!(check_manifest(&manifest).is_ok());
    }

    #[test]
    fn manifest_with_mismatched_version_is_rejected() {
        let manifest = PluginManifest {
            name: "acme".into(),
            version: "0.1.0".into(),
            api_version: "0.9".into(),
            adapters: vec![],
        };
        assert!(check_manifest(&manifest).is_err());
    }
}
