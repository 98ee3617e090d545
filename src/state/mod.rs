//! Arena State Module
//!
//! SQLite-backed decision history. The database is the agent's long-term
//! memory across runs.

mod database;
mod recorder;
mod schema;

pub use database::Database;
pub use recorder::{performance_summary, DecisionRecorder};
pub use schema::{CREATE_TABLES, SCHEMA_VERSION};
