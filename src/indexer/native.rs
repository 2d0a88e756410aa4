//! Native batch engine fast-path (spec §4.4 "Native fast-path"). A packaging
//! concern out of this spec's scope — this crate ships no implementation —
//! but the trait boundary is part of the core contract so the indexer can
//! delegate to one transparently when a host wires one in.

use crate::adapter::ParsedFile;

#[derive(Debug, Clone)]
pub struct NativeFileDescriptor {
    pub rel_path: String,
    pub absolute_path: std::path::PathBuf,
    pub repo_id: String,
    pub language: String,
}

#[derive(Debug, Clone)]
pub struct NativeParseRecord {
    pub rel_path: String,
    pub content_hash: String,
    pub parsed: Option<ParsedFile>,
    pub parse_error: Option<String>,
}

/// A batch parser that can process many files faster than the in-process
/// tree-sitter path. `parse_batch` takes a descriptor batch and returns a
/// parallel array of records in the same order.
pub trait NativeBatchEngine: Send + Sync {
    fn parse_batch(&self, descriptors: &[NativeFileDescriptor]) -> Result<Vec<NativeParseRecord>, String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysFailsEngine;
    impl NativeBatchEngine for AlwaysFailsEngine {
        fn parse_batch(&self, _descriptors: &[NativeFileDescriptor]) -> Result<Vec<NativeParseRecord>, String> {
            Err("native engine unavailable".to_string())
        }
    }

    #[test]
    fn native_engine_failure_is_a_plain_error_for_fallback_to_handle() {
        let engine = AlwaysFailsEngine;
        assert!(engine.parse_batch(&[]).is_err());
    }
}
