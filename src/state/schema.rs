//! Decision Log Schema
//!
//! SQL schema for the append-only decision store.

/// Current schema version.
pub const SCHEMA_VERSION: i64 = 1;

/// Initial table set. `decisions` is append-only: rows are never updated or
/// deleted by the runtime.
pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS decisions (
    decision_id INTEGER PRIMARY KEY,
    timestamp TEXT NOT NULL,
    reasoning TEXT NOT NULL DEFAULT '',
    action TEXT NOT NULL,
    parameters TEXT NOT NULL DEFAULT '{}',
    result TEXT,
    portfolio_snapshot TEXT NOT NULL DEFAULT 'null',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_decisions_timestamp ON decisions(timestamp);

CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;
