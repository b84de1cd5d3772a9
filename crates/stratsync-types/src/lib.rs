//! Shared identity and document types for StratSync.
//!
//! This crate is the leaf of the workspace: typed ids, job codes, raid
//! reference data, and the strategy document snapshot. It has **no internal
//! stratsync dependencies**.
//!
//! # Document Overview
//!
//! ```text
//! Strategy (StrategyId)
//!     └── raid: Raid (reference data, read-only)
//!     │       └── Gimmick → Damage (DamageId)
//!     └── players: Player (PlayerId, job, order)
//!     │       └── entries: Entry (EntryId, action, use_at)
//!     └── damage_options: DamageId → DamageOption
//!     └── notes: Note (NoteId, content, x, y)
//! ```
//!
//! # Key Types
//!
//! |-------------------|----------------------------------------------|
//! | Type              | Purpose                                      |
//! |-------------------|----------------------------------------------|
//! | [`Strategy`]      | Copy-on-write document snapshot              |
//! | [`Player`]        | Roster slot owning its entries               |
//! | [`Entry`]         | Timed ability use (unique id per document)   |
//! | [`DamageOption`]  | Shared-damage assignment for one damage id   |
//! | [`Note`]          | Free-text annotation                         |
//! | [`Raid`]          | Encounter reference data                     |
//! | [`Job`]           | Job code; changing it invalidates entries    |
//! | [`SessionToken`]  | Server-issued bearer for outbound requests   |
//! |-------------------|----------------------------------------------|

pub mod ids;
pub mod job;
pub mod raid;
pub mod session;
pub mod strategy;

pub use ids::{ActionId, DamageId, EntryId, GimmickId, NoteId, PlayerId, RaidId, StrategyId};
pub use job::Job;
pub use raid::{Damage, DamageTarget, DamageType, Gimmick, GimmickType, Raid};
pub use session::SessionToken;
pub use strategy::{DamageOption, Entry, Note, Player, Strategy};
