//! Mutation model and undo history for StratSync strategy documents.
//!
//! Everything in this crate is pure and synchronous. The client crate drives
//! it from the optimistic dispatcher and the event stream loop.
//!
//! # Data Flow
//!
//! ```text
//! local edit ──► History::push(forward, &before)   (inverse computed here)
//!            └─► reduce::apply(&mut doc, &mutation)
//!
//! remote event ──► History::lock(touched ids), History::lock_player(owner)
//!              └─► reduce::apply(&mut doc, &mutation)
//! ```
//!
//! # Semantics
//!
//! - **Reducer**: total. Unknown players and damage ids are dropped with a
//!   warning, never an error.
//! - **Inverse**: `apply(apply(D, M), invert(M, D)) == D` for the fields `M`
//!   tracks. A job change does not restore the entries it cleared.
//! - **History**: `past + future <= capacity`; pushing discards the redo
//!   branch; `lock` purges entry mutations, `lock_player` drops job changes.

pub mod error;
pub mod history;
pub mod inverse;
pub mod ops;
pub mod reduce;

pub use error::DocError;
pub use history::{History, MAX_HISTORY_CAPACITY};
pub use inverse::invert;
pub use ops::{EntryMutation, Mutation, NoteMutation, PlayerJobUpdate, UndoableMutation};
pub use reduce::{apply, reduce};

/// Result type for document and history operations.
pub type Result<T> = std::result::Result<T, DocError>;
