//! `compensa-engine` — environmental compensation rule matching.
//!
//! Pure engine crate: validates raw line items, resolves them against a
//! read-only rule store, and aggregates a batch into processed and unmatched
//! results. Rule loading from CSV is provided but always explicit; no HTTP
//! or CLI dependencies.

pub mod batch;
pub mod config;
pub mod error;
pub mod load;
pub mod model;
pub mod resolve;
pub mod store;
pub mod summary;
pub mod validate;

pub use batch::BatchRunner;
pub use config::{CompensationConfig, UngroupedPolicy};
pub use error::CompensationError;
pub use load::{load_store, LoadReport};
pub use model::{Amount, BatchResult, ItemIssue, MatchResult, Mode, UnmatchedResult, ValidatedItem};
pub use resolve::Resolver;
pub use store::{MemoryRuleStore, RuleStore};
pub use validate::validate;
