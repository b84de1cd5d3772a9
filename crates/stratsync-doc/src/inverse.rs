//! Backward mutation generation.
//!
//! For a forward mutation and the snapshot as it was *before* the forward
//! mutation is applied, compute the mutation that restores that snapshot:
//!
//! ```text
//! reduce(reduce(doc, forward), invert(forward, doc)) == doc
//! ```
//!
//! for every field the mutation kind tracks. Nothing here mutates the
//! snapshot.

use std::collections::HashMap;

use stratsync_types::{Entry, EntryId, Note, Strategy};

use crate::error::DocError;
use crate::ops::{EntryMutation, NoteMutation, PlayerJobUpdate, UndoableMutation};
use crate::Result;

/// Invert any undoable mutation against the pre-mutation snapshot.
pub fn invert(forward: &UndoableMutation, before: &Strategy) -> Result<UndoableMutation> {
    Ok(match forward {
        UndoableMutation::MutateEntries(m) => {
            UndoableMutation::MutateEntries(invert_entries(m, before))
        }
        UndoableMutation::MutateNote(m) => UndoableMutation::MutateNote(invert_note(m, &before.notes)?),
        UndoableMutation::UpdatePlayerJob(u) => {
            UndoableMutation::UpdatePlayerJob(invert_player_job(u, before)?)
        }
    })
}

/// Invert an entry batch.
///
/// - upsert of an existing id → upsert of its previous value
/// - upsert of a new id → delete
/// - delete of an existing id → upsert restoring it
/// - delete of a missing id → nothing
pub fn invert_entries(forward: &EntryMutation, before: &Strategy) -> EntryMutation {
    let current: HashMap<EntryId, &Entry> = before.entries().map(|e| (e.id, e)).collect();

    let mut backward = EntryMutation::default();

    for entry in &forward.upserts {
        match current.get(&entry.id) {
            Some(existing) => backward.upserts.push((*existing).clone()),
            None => backward.deletes.push(entry.id),
        }
    }

    for id in &forward.deletes {
        if let Some(existing) = current.get(id) {
            backward.upserts.push((*existing).clone());
        }
    }

    backward
}

/// Invert a note mutation.
///
/// Deleting a note that does not exist is an invariant violation: the
/// caller cannot have legitimately known its id.
pub fn invert_note(forward: &NoteMutation, notes: &[Note]) -> Result<NoteMutation> {
    let existing = notes.iter().find(|n| n.id == forward.note_id());

    match (forward, existing) {
        (_, Some(previous)) => Ok(NoteMutation::Upsert(previous.clone())),
        (NoteMutation::Upsert(note), None) => Ok(NoteMutation::Delete(note.id)),
        (NoteMutation::Delete(id), None) => Err(DocError::NoteNotFound(*id)),
    }
}

/// Invert a job update: restore the previous job.
///
/// The entries a job change clears are not restored; the history manager
/// locks them instead.
pub fn invert_player_job(forward: &PlayerJobUpdate, before: &Strategy) -> Result<PlayerJobUpdate> {
    let player = before
        .player(forward.player)
        .ok_or(DocError::PlayerNotFound(forward.player))?;

    Ok(PlayerJobUpdate {
        player: player.id,
        job: player.job,
    })
}
