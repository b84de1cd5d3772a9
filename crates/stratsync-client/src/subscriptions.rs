//! Server-push event types and session status.
//!
//! Provides [`ServerEvent`], the typed enum of everything the server pushes
//! on a strategy's event stream, and [`SessionStatus`] for UIs that watch the
//! session lifecycle.

use serde::{Deserialize, Serialize};
use stratsync_doc::{EntryMutation, Mutation, NoteMutation, PlayerJobUpdate};
use stratsync_types::{DamageOption, Entry, Job, Note, NoteId, PlayerId, SessionToken};

// ============================================================================
// Event Types
// ============================================================================

/// A roster slot as delivered by the initialization event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: PlayerId,
    #[serde(default)]
    pub job: Option<Job>,
    pub order: i32,
}

/// The first event on every stream: the full editable state plus the
/// session token for outbound requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Initialization {
    pub token: SessionToken,
    pub players: Vec<PlayerRecord>,
    #[serde(default)]
    pub entries: Vec<Entry>,
    #[serde(default)]
    pub damage_options: Vec<DamageOption>,
    /// Absent when the seed snapshot already carries the notes.
    #[serde(default)]
    pub notes: Option<Vec<Note>>,
}

/// Events pushed from the server, in delivery order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Exactly once, first.
    Initialization(Initialization),
    UpsertDamageOption { damage_option: DamageOption },
    MutateEntries(EntryMutation),
    UpdatePlayerJob(PlayerJobUpdate),
    UpsertNote { note: Note },
    DeleteNote { id: NoteId },
}

impl ServerEvent {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Initialization(_) => "initialization",
            ServerEvent::UpsertDamageOption { .. } => "upsert_damage_option",
            ServerEvent::MutateEntries(_) => "mutate_entries",
            ServerEvent::UpdatePlayerJob(_) => "update_player_job",
            ServerEvent::UpsertNote { .. } => "upsert_note",
            ServerEvent::DeleteNote { .. } => "delete_note",
        }
    }

    /// The document mutation this event carries. `None` for initialization.
    pub fn into_mutation(self) -> Option<Mutation> {
        Some(match self {
            ServerEvent::Initialization(_) => return None,
            ServerEvent::UpsertDamageOption { damage_option } => {
                Mutation::UpsertDamageOption(damage_option)
            }
            ServerEvent::MutateEntries(m) => Mutation::MutateEntries(m),
            ServerEvent::UpdatePlayerJob(u) => Mutation::UpdatePlayerJob(u),
            ServerEvent::UpsertNote { note } => Mutation::MutateNote(NoteMutation::Upsert(note)),
            ServerEvent::DeleteNote { id } => Mutation::MutateNote(NoteMutation::Delete(id)),
        })
    }
}

// ============================================================================
// Session Status
// ============================================================================

/// Session lifecycle phase. `Aborted` is terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Disconnected,
    Connecting,
    Ready,
    Aborted,
}

/// Snapshot of session state for UIs.
///
/// Subscribe via [`StratSyncSession::subscribe_status()`](crate::StratSyncSession::subscribe_status).
/// `revision` bumps on every document change, so comparing it is enough to
/// decide whether to re-render.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub revision: u64,
    pub undo_available: bool,
    pub redo_available: bool,
}
