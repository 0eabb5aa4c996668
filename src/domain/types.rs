//! Shared domain enumerations aligned with persisted database enums.

use serde::{Deserialize, Serialize};

pub use wavecache_api_types::SwitchKind;

/// Lifecycle state of a cached entry (mirrors Postgres enum `entry_state`).
///
/// Transitions are only ever expressed as conditional store updates:
/// `Invalid → Precomputing` (scheduler claim), `Precomputing → Valid`
/// (successful Update), `Precomputing → Invalid` (failed attempt or stuck
/// reclaim), `Valid → Invalid` (invalidation), and `* → Valid` through the
/// Update upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "entry_state", rename_all = "snake_case")]
pub enum EntryState {
    Valid,
    Invalid,
    Precomputing,
}

impl EntryState {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryState::Valid => "valid",
            EntryState::Invalid => "invalid",
            EntryState::Precomputing => "precomputing",
        }
    }
}
