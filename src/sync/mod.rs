//! Client-side tool state: a local cache that is immediately usable, kept in step
//! with the server by debounced saves.
//!
//! Conflict policy: saves carry the revision the local copy was based on. When the
//! server has moved on, its state wins; the overwritten local payload stays
//! available through `ToolStateSync::take_conflict`.

pub mod cache;
pub mod engine;
pub mod remote;

pub use cache::{CacheKey, CachedState, FileCache, LocalCache, MemoryCache};
pub use engine::ToolStateSync;
pub use remote::{HttpRemote, RemoteError, RemoteState, RemoteTools};

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Nothing loaded yet
    Idle,
    Loading,
    /// Local edits waiting for the debounce timer
    Pending,
    Saving,
    /// Local and server copies agree
    Synced,
    /// The server rejected a stale save; its state was adopted
    Conflict,
    /// The server could not be reached; local edits are kept
    Offline,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("this tool is read-only for you")]
    ReadOnly,

    #[error("server is at revision {server_revision}; local changes were set aside")]
    Conflict { server_revision: i64 },

    #[error("offline: {0}")]
    Offline(String),

    #[error("server error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("local cache error: {0}")]
    Cache(String),

    #[error("nothing loaded for this tool")]
    NotLoaded,
}
