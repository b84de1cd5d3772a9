//! Strategy document mutations.
//!
//! All changes to a [`Strategy`](stratsync_types::Strategy) are expressed as
//! a [`Mutation`]. Mutations are:
//! - **Applied locally** before the server confirms them (optimistic echo)
//! - **Serializable** and map 1:1 onto outbound requests
//! - **Invertible** (the [`UndoableMutation`] subset) for undo/redo

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use stratsync_types::{DamageOption, Entry, EntryId, Job, Note, NoteId, PlayerId};

/// A batch of entry upserts and deletes, applied atomically.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMutation {
    #[serde(default)]
    pub upserts: Vec<Entry>,
    #[serde(default)]
    pub deletes: Vec<EntryId>,
}

impl EntryMutation {
    pub fn new(upserts: Vec<Entry>, deletes: Vec<EntryId>) -> Self {
        Self { upserts, deletes }
    }

    pub fn upsert(entries: impl IntoIterator<Item = Entry>) -> Self {
        Self::new(entries.into_iter().collect(), Vec::new())
    }

    pub fn delete(ids: impl IntoIterator<Item = EntryId>) -> Self {
        Self::new(Vec::new(), ids.into_iter().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }

    /// Every entry id this batch names, upserted or deleted.
    pub fn touched_ids(&self) -> impl Iterator<Item = EntryId> + '_ {
        self.upserts
            .iter()
            .map(|e| e.id)
            .chain(self.deletes.iter().copied())
    }

    /// Drop every upsert and delete that references a locked id.
    pub fn strip_locked(&mut self, locked: &HashSet<EntryId>) {
        self.upserts.retain(|e| !locked.contains(&e.id));
        self.deletes.retain(|id| !locked.contains(id));
    }
}

/// A single note upsert or delete.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteMutation {
    Upsert(Note),
    Delete(NoteId),
}

impl NoteMutation {
    /// The note this mutation targets.
    pub fn note_id(&self) -> NoteId {
        match self {
            NoteMutation::Upsert(note) => note.id,
            NoteMutation::Delete(id) => *id,
        }
    }
}

/// Reassign (or clear) a player's job. Clears that player's entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerJobUpdate {
    pub player: PlayerId,
    #[serde(default)]
    pub job: Option<Job>,
}

/// One atomic change to a strategy document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "mutation", rename_all = "snake_case")]
pub enum Mutation {
    MutateEntries(EntryMutation),
    MutateNote(NoteMutation),
    UpsertDamageOption(DamageOption),
    UpdatePlayerJob(PlayerJobUpdate),
}

impl Mutation {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::MutateEntries(_) => "mutate_entries",
            Mutation::MutateNote(_) => "mutate_note",
            Mutation::UpsertDamageOption(_) => "upsert_damage_option",
            Mutation::UpdatePlayerJob(_) => "update_player_job",
        }
    }

    /// True when applying this mutation cannot change anything.
    pub fn is_noop(&self) -> bool {
        matches!(self, Mutation::MutateEntries(m) if m.is_empty())
    }
}

/// The mutations that may be recorded in undo history.
///
/// Damage option upserts are absent: there is no request that removes an
/// option, so an upsert of a previously unset option has no exact inverse.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "mutation", rename_all = "snake_case")]
pub enum UndoableMutation {
    MutateEntries(EntryMutation),
    MutateNote(NoteMutation),
    UpdatePlayerJob(PlayerJobUpdate),
}

impl UndoableMutation {
    pub fn name(&self) -> &'static str {
        match self {
            UndoableMutation::MutateEntries(_) => "mutate_entries",
            UndoableMutation::MutateNote(_) => "mutate_note",
            UndoableMutation::UpdatePlayerJob(_) => "update_player_job",
        }
    }
}

impl From<UndoableMutation> for Mutation {
    fn from(m: UndoableMutation) -> Self {
        match m {
            UndoableMutation::MutateEntries(m) => Mutation::MutateEntries(m),
            UndoableMutation::MutateNote(m) => Mutation::MutateNote(m),
            UndoableMutation::UpdatePlayerJob(u) => Mutation::UpdatePlayerJob(u),
        }
    }
}

impl From<EntryMutation> for UndoableMutation {
    fn from(m: EntryMutation) -> Self {
        UndoableMutation::MutateEntries(m)
    }
}

impl From<NoteMutation> for UndoableMutation {
    fn from(m: NoteMutation) -> Self {
        UndoableMutation::MutateNote(m)
    }
}

impl From<PlayerJobUpdate> for UndoableMutation {
    fn from(u: PlayerJobUpdate) -> Self {
        UndoableMutation::UpdatePlayerJob(u)
    }
}
