//! Error types for document and history operations.

use stratsync_types::{NoteId, PlayerId};
use thiserror::Error;

/// Errors from inverse generation and history bookkeeping.
///
/// Every variant is an invariant violation: the caller referenced something
/// it could not legitimately have known about, or history bookkeeping broke.
/// Callers treat these as fatal for the session rather than recovering.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocError {
    /// A note delete was recorded for a note the document never had.
    #[error("note not found: {0}")]
    NoteNotFound(NoteId),

    /// A job update was recorded for a player not in the roster.
    #[error("player not found: {0}")]
    PlayerNotFound(PlayerId),

    /// The redo queue alone exceeds the history capacity.
    #[error("future history holds {len} entries, exceeding capacity {capacity}")]
    FutureOverflow { len: usize, capacity: usize },
}
