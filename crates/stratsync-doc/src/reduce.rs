//! The reducer: apply a mutation to a strategy snapshot.
//!
//! Used identically for local optimistic edits and for remote events. The
//! reducer cannot tell "my edit echoed back" from "someone else's edit" and
//! must not try to.
//!
//! Application is copy-on-write: only the sub-collection a mutation touches
//! is cloned (`Arc::make_mut`), so snapshots held elsewhere are unaffected.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use stratsync_types::{DamageOption, Entry, EntryId, Strategy};
use tracing::{trace, warn};

use crate::ops::{EntryMutation, Mutation, NoteMutation, PlayerJobUpdate};

/// Apply `mutation` to `doc` in place.
pub fn apply(doc: &mut Strategy, mutation: &Mutation) {
    trace!(kind = mutation.name(), "applying mutation");
    match mutation {
        Mutation::MutateEntries(m) => apply_entries(doc, m),
        Mutation::MutateNote(m) => apply_note(doc, m),
        Mutation::UpsertDamageOption(option) => apply_damage_option(doc, option),
        Mutation::UpdatePlayerJob(u) => apply_player_job(doc, u),
    }
}

/// Apply `mutation` to a copy of `doc`, leaving `doc` untouched.
pub fn reduce(doc: &Strategy, mutation: &Mutation) -> Strategy {
    let mut next = doc.clone();
    apply(&mut next, mutation);
    next
}

fn apply_entries(doc: &mut Strategy, m: &EntryMutation) {
    if m.is_empty() {
        return;
    }

    // Last upsert of an id wins within one batch. Upserts for players not in
    // the roster are dropped before they can replace anything.
    let mut upserts: Vec<&Entry> = Vec::with_capacity(m.upserts.len());
    let mut position: HashMap<EntryId, usize> = HashMap::new();
    for entry in &m.upserts {
        if doc.player(entry.player).is_none() {
            warn!(entry = %entry.id, player = %entry.player, "dropping entry upsert for unknown player");
            continue;
        }
        match position.get(&entry.id) {
            Some(&i) => upserts[i] = entry,
            None => {
                position.insert(entry.id, upserts.len());
                upserts.push(entry);
            }
        }
    }

    // Upserted ids are removed everywhere before re-adding, so an entry that
    // moves to another player never exists twice.
    let replaced: HashSet<EntryId> = m
        .deletes
        .iter()
        .copied()
        .chain(upserts.iter().map(|e| e.id))
        .collect();

    let touches = |p: &stratsync_types::Player| {
        p.entries.iter().any(|e| replaced.contains(&e.id)) || upserts.iter().any(|e| e.player == p.id)
    };
    if !doc.players.iter().any(touches) {
        return;
    }

    for player in Arc::make_mut(&mut doc.players).iter_mut() {
        if !touches(&*player) {
            continue;
        }
        let entries = Arc::make_mut(&mut player.entries);
        entries.retain(|e| !replaced.contains(&e.id));
        entries.extend(upserts.iter().filter(|e| e.player == player.id).map(|e| (*e).clone()));
    }
}

fn apply_note(doc: &mut Strategy, m: &NoteMutation) {
    match m {
        NoteMutation::Upsert(note) => {
            let notes = Arc::make_mut(&mut doc.notes);
            notes.retain(|n| n.id != note.id);
            notes.push(note.clone());
        }
        NoteMutation::Delete(id) => {
            if doc.note(*id).is_none() {
                return;
            }
            Arc::make_mut(&mut doc.notes).retain(|n| n.id != *id);
        }
    }
}

fn apply_damage_option(doc: &mut Strategy, option: &DamageOption) {
    if !doc.raid.has_damage(option.damage) {
        warn!(damage = %option.damage, "ignoring damage option for unknown damage");
        return;
    }
    Arc::make_mut(&mut doc.damage_options).insert(option.damage, option.clone());
}

fn apply_player_job(doc: &mut Strategy, u: &PlayerJobUpdate) {
    if doc.player(u.player).is_none() {
        warn!(player = %u.player, "ignoring job update for unknown player");
        return;
    }
    if let Some(player) = Arc::make_mut(&mut doc.players)
        .iter_mut()
        .find(|p| p.id == u.player)
    {
        player.job = u.job;
        player.entries = Arc::default();
    }
}
