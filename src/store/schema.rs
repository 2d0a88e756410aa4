//! Store schema DDL (§6 "Store schema"), executed once on open inside a
//! single transaction. One string, versioned by `PRAGMA user_version`.

pub const SCHEMA_VERSION: i64 = 1;

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS repos (
    repo_id      TEXT PRIMARY KEY,
    root_path    TEXT NOT NULL,
    config_blob  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS files (
    file_id        INTEGER PRIMARY KEY AUTOINCREMENT,
    repo_id        TEXT NOT NULL REFERENCES repos(repo_id) ON DELETE CASCADE,
    rel_path       TEXT NOT NULL,
    content_hash   TEXT NOT NULL,
    language       TEXT,
    byte_size      INTEGER NOT NULL,
    last_indexed_at INTEGER NOT NULL,
    directory      TEXT NOT NULL,
    UNIQUE(repo_id, rel_path)
);
CREATE INDEX IF NOT EXISTS idx_files_repo_dir ON files(repo_id, directory);

CREATE TABLE IF NOT EXISTS symbols (
    symbol_id          TEXT PRIMARY KEY,
    repo_id            TEXT NOT NULL REFERENCES repos(repo_id) ON DELETE CASCADE,
    file_id            INTEGER NOT NULL REFERENCES files(file_id) ON DELETE CASCADE,
    kind               TEXT NOT NULL,
    name               TEXT NOT NULL,
    exported           INTEGER NOT NULL DEFAULT 0,
    visibility         TEXT,
    language           TEXT NOT NULL,
    start_line         INTEGER NOT NULL,
    start_column       INTEGER NOT NULL,
    end_line           INTEGER NOT NULL,
    end_column         INTEGER NOT NULL,
    ast_fingerprint    TEXT NOT NULL,
    signature_json     TEXT,
    summary            TEXT,
    invariants_json    TEXT,
    side_effects_json  TEXT,
    updated_at         INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_symbols_repo_file ON symbols(repo_id, file_id);
CREATE INDEX IF NOT EXISTS idx_symbols_repo_name ON symbols(repo_id, name);

CREATE TABLE IF NOT EXISTS edges (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    repo_id              TEXT NOT NULL REFERENCES repos(repo_id) ON DELETE CASCADE,
    kind                 TEXT NOT NULL,
    from_symbol          TEXT NOT NULL,
    to_symbol            TEXT,
    to_placeholder       TEXT,
    weight               REAL NOT NULL,
    confidence           REAL NOT NULL,
    resolution_strategy  TEXT NOT NULL,
    provenance           TEXT NOT NULL,
    created_at           INTEGER NOT NULL,
    CHECK ((to_symbol IS NULL) != (to_placeholder IS NULL))
);
CREATE INDEX IF NOT EXISTS idx_edges_from ON edges(repo_id, from_symbol);
CREATE INDEX IF NOT EXISTS idx_edges_to ON edges(repo_id, to_symbol);
CREATE INDEX IF NOT EXISTS idx_edges_placeholder ON edges(repo_id, to_placeholder);

CREATE TABLE IF NOT EXISTS versions (
    version_id        TEXT PRIMARY KEY,
    repo_id            TEXT NOT NULL REFERENCES repos(repo_id) ON DELETE CASCADE,
    created_at         INTEGER NOT NULL,
    reason             TEXT NOT NULL,
    prev_version_hash  TEXT,
    version_hash       TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_versions_repo ON versions(repo_id, created_at);

CREATE TABLE IF NOT EXISTS symbol_versions (
    version_id         TEXT NOT NULL REFERENCES versions(version_id) ON DELETE CASCADE,
    symbol_id          TEXT NOT NULL,
    ast_fingerprint    TEXT NOT NULL,
    signature_json     TEXT,
    summary            TEXT,
    invariants_json    TEXT,
    side_effects_json  TEXT,
    PRIMARY KEY (version_id, symbol_id)
);

CREATE TABLE IF NOT EXISTS metrics (
    symbol_id      TEXT PRIMARY KEY,
    fan_in         INTEGER NOT NULL DEFAULT 0,
    fan_out        INTEGER NOT NULL DEFAULT 0,
    churn_30d      INTEGER NOT NULL DEFAULT 0,
    test_refs_json TEXT,
    updated_at     INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS audit (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    repo_id         TEXT NOT NULL,
    version_id      TEXT,
    mode            TEXT NOT NULL,
    started_at      INTEGER NOT NULL,
    finished_at     INTEGER,
    files_scanned   INTEGER NOT NULL DEFAULT 0,
    files_changed   INTEGER NOT NULL DEFAULT 0,
    symbols_total   INTEGER NOT NULL DEFAULT 0,
    edges_total     INTEGER NOT NULL DEFAULT 0,
    parse_errors    INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_audit_repo ON audit(repo_id, started_at);

CREATE TABLE IF NOT EXISTS slice_handles (
    handle        TEXT PRIMARY KEY,
    repo_id       TEXT NOT NULL,
    created_at    INTEGER NOT NULL,
    expires_at    INTEGER NOT NULL,
    min_version   TEXT NOT NULL,
    max_version   TEXT NOT NULL,
    slice_hash    TEXT NOT NULL,
    spillover     TEXT
);

CREATE TABLE IF NOT EXISTS card_hashes (
    card_hash TEXT PRIMARY KEY,
    card_blob TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tool_policy_hashes (
    policy_hash TEXT PRIMARY KEY,
    policy_blob TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tsconfig_hashes (
    tsconfig_hash TEXT PRIMARY KEY,
    tsconfig_blob TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS symbol_references (
    symbol_id   TEXT NOT NULL,
    file_id     INTEGER NOT NULL REFERENCES files(file_id) ON DELETE CASCADE,
    ref_kind    TEXT NOT NULL,
    PRIMARY KEY (symbol_id, file_id, ref_kind)
);
CREATE INDEX IF NOT EXISTS idx_symbol_references_file ON symbol_references(file_id);

CREATE TABLE IF NOT EXISTS agent_feedback (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    repo_id       TEXT NOT NULL,
    version_id    TEXT NOT NULL,
    slice_handle  TEXT NOT NULL,
    useful_json   TEXT NOT NULL,
    missing_json  TEXT NOT NULL,
    submitted_at  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS symbol_feedback_weights (
    symbol_id TEXT PRIMARY KEY,
    weight    REAL NOT NULL DEFAULT 0.0
);

CREATE TABLE IF NOT EXISTS symbol_embeddings (
    symbol_id  TEXT PRIMARY KEY,
    model      TEXT NOT NULL,
    dim        INTEGER NOT NULL,
    vector     BLOB NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;
