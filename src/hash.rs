//! Content hashing and identity derivation (C1).
//!
//! Every identity in this crate — `contentHash`, `astFingerprint`, `symbolId`,
//! `versionHash` — is built from the single primitive [`hash_content`]. Free
//! functions, no internal state: the parity requirement ("byte-identical
//! across native and reference engines") falls out for free because there is
//! only one engine here, and its output is exactly these functions.

use sha2::{Digest, Sha256};

/// Deterministic hex digest of arbitrary bytes. Stable across platforms and
/// across embedded nulls, BOM, CRLF, unicode, and lone surrogates encoded as
/// UTF-8 replacement bytes — anything that reaches this function as `&[u8]`
/// hashes the same way regardless of what it means.
pub fn hash_content(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Structural fingerprint of a symbol's AST subtree, rendered as an
/// already-normalized shape string by the caller (a [`LanguageAdapter`] —
/// see `src/adapter/mod.rs`). This function only hashes; normalization to a
/// reformatting-stable shape is the adapter's job, per spec §4.1.
///
/// [`LanguageAdapter`]: crate::adapter::LanguageAdapter
pub fn ast_fingerprint(shape: &str) -> String {
    hash_content(shape.as_bytes())
}

/// Colon-safe composite identity. Each field is length-prefixed before
/// concatenation so that e.g. `repoId="a:b"` + `relPath="c"` cannot collide
/// with `repoId="a"` + `relPath="b:c"`.
pub fn symbol_id(repo_id: &str, rel_path: &str, kind: &str, name: &str, fingerprint: &str) -> String {
    let mut buf = String::new();
    for field in [repo_id, rel_path, kind, name, fingerprint] {
        buf.push_str(&field.len().to_string());
        buf.push(':');
        buf.push_str(field);
        buf.push('\0');
    }
    hash_content(buf.as_bytes())
}

/// `versionHash = H(prevVersionHash ‖ "|".join(sort(fingerprints)))`.
/// Pure function of its inputs: reordering the caller's input slice has no
/// effect since it is sorted here before hashing.
pub fn version_hash(prev_version_hash: Option<&str>, fingerprints: &[String]) -> String {
    let mut sorted: Vec<&str> = fingerprints.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let joined = sorted.join("|");
    let mut buf = String::new();
    buf.push_str(prev_version_hash.unwrap_or(""));
    buf.push('\u{0}');
    buf.push_str(&joined);
    hash_content(buf.as_bytes())
}

/// Minimal hex encoder so this module doesn't need a dedicated `hex` crate
/// dependency beyond what `sha2`'s ecosystem already implies elsewhere.
mod hex {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";

    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        let bytes = bytes.as_ref();
        let mut out = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            out.push(DIGITS[(b >> 4) as usize] as char);
            out.push(DIGITS[(b & 0x0f) as usize] as char);
        }
        out
    }
}
