//! Error taxonomy (§7). One `thiserror` enum per subsystem, each convertible
//! to the stable `ErrorCode` that any surface layer (out of scope here) can
//! report without caring which subsystem produced it.

use std::path::PathBuf;
use thiserror::Error;

/// Surface-facing error code, per spec §6 "Error codes".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidRepo,
    NoVersion,
    NoSymbols,
    PolicyDenied,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidRepo => "INVALID_REPO",
            ErrorCode::NoVersion => "NO_VERSION",
            ErrorCode::NoSymbols => "NO_SYMBOLS",
            ErrorCode::PolicyDenied => "POLICY_DENIED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no adapter registered for extension {extension} ({path})")]
    NoAdapter { path: PathBuf, extension: String },

    #[error("parse error in {path} ({language}): {reason}")]
    ParseError {
        path: PathBuf,
        language: String,
        reason: String,
    },

    #[error("unknown repo {repo_id}")]
    UnknownRepo { repo_id: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("indexing task panicked: {0}")]
    WorkerPanic(String),
}

impl IndexError {
    pub fn code(&self) -> ErrorCode {
        match self {
            IndexError::UnknownRepo { .. } => ErrorCode::InvalidRepo,
            IndexError::Store(e) => e.code(),
            _ => ErrorCode::InternalError,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("unknown repo {repo_id}")]
    UnknownRepo { repo_id: String },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("database file {path} could not be opened: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("index is corrupted: {reason}")]
    Corrupted { reason: String },
}

impl StoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            StoreError::UnknownRepo { .. } => ErrorCode::InvalidRepo,
            _ => ErrorCode::InternalError,
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("store error during resolution: {0}")]
    Store(#[from] StoreError),

    #[error("ambiguous import target for {name} in {importer}: {candidate_count} candidates")]
    AmbiguousImport {
        importer: String,
        name: String,
        candidate_count: usize,
    },
}

#[derive(Debug, Error)]
pub enum SliceError {
    #[error("unknown repo {repo_id}")]
    InvalidRepo { repo_id: String },

    #[error("repo {repo_id} has no indexed version")]
    NoVersion { repo_id: String },

    #[error("no symbols matched the request for repo {repo_id}")]
    NoSymbols { repo_id: String },

    #[error("policy denied: {reason}")]
    PolicyDenied { reason: String },

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SliceError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SliceError::InvalidRepo { .. } => ErrorCode::InvalidRepo,
            SliceError::NoVersion { .. } => ErrorCode::NoVersion,
            SliceError::NoSymbols { .. } => ErrorCode::NoSymbols,
            SliceError::PolicyDenied { .. } => ErrorCode::PolicyDenied,
            SliceError::Internal(_) | SliceError::Store(_) => ErrorCode::InternalError,
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("store error during sync: {0}")]
    Store(#[from] StoreError),

    #[error("sync artifact is corrupt: hash mismatch (expected {expected}, got {actual})")]
    HashMismatch { expected: String, actual: String },

    #[error("sync artifact body is not valid gzip: {0}")]
    Gzip(#[from] std::io::Error),

    #[error("sync artifact body is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("sync artifact body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(
        "import targets a different repo ({artifact_repo_id}) than requested ({requested_repo_id}); pass force to override"
    )]
    RepoMismatch {
        artifact_repo_id: String,
        requested_repo_id: String,
    },
}

/// Config-schema violations are always fatal, per spec §7.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Figment(#[from] figment::Error),

    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type IndexResult<T> = Result<T, IndexError>;
pub type StoreResult<T> = Result<T, StoreError>;
pub type ResolveResult<T> = Result<T, ResolveError>;
pub type SliceResult<T> = Result<T, SliceError>;
pub type SyncResult<T> = Result<T, SyncError>;
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_error_codes_map_as_specified() {
        assert_eq!(
            SliceError::InvalidRepo { repo_id: "r".into() }.code(),
            ErrorCode::InvalidRepo
        );
        assert_eq!(SliceError::NoVersion { repo_id: "r".into() }.code(), ErrorCode::NoVersion);
        assert_eq!(SliceError::NoSymbols { repo_id: "r".into() }.code(), ErrorCode::NoSymbols);
        assert_eq!(
            SliceError::PolicyDenied { reason: "x".into() }.code(),
            ErrorCode::PolicyDenied
        );
        assert_eq!(SliceError::Internal("x".into()).code(), ErrorCode::InternalError);
    }

    #[test]
    fn error_code_strings_match_spec() {
        assert_eq!(ErrorCode::InvalidRepo.as_str(), "INVALID_REPO");
        assert_eq!(ErrorCode::NoVersion.as_str(), "NO_VERSION");
        assert_eq!(ErrorCode::NoSymbols.as_str(), "NO_SYMBOLS");
        assert_eq!(ErrorCode::PolicyDenied.as_str(), "POLICY_DENIED");
        assert_eq!(ErrorCode::InternalError.as_str(), "INTERNAL_ERROR");
    }
}
