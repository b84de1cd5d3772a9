//! Bounded, lock-aware undo/redo history.
//!
//! Entries are `(forward, backward)` pairs. The backward half is computed at
//! push time against the snapshot as it was just before the forward mutation
//! ran, so it stays valid only as long as nobody else touches the same ids.
//! [`History::lock`] strips ids that another participant has since mutated;
//! [`History::lock_player`] drops job changes for a player they touched.
//!
//! ```text
//!   past (oldest ........ newest) | future (oldest ........ newest)
//!                          undo ──┘└── redo
//! ```

use std::collections::{HashSet, VecDeque};

use stratsync_types::{EntryId, PlayerId, Strategy};
use tracing::{debug, warn};

use crate::error::DocError;
use crate::inverse::invert;
use crate::ops::UndoableMutation;
use crate::Result;

/// Default bound on `past + future`.
pub const MAX_HISTORY_CAPACITY: usize = 256;

/// One recorded edit and its precomputed inverse.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct HistoryEntry {
    forward: UndoableMutation,
    backward: UndoableMutation,
}

impl HistoryEntry {
    fn is_job_change_of(&self, player: PlayerId) -> bool {
        matches!(&self.forward, UndoableMutation::UpdatePlayerJob(u) if u.player == player)
    }

    fn strip_locked(&mut self, locked: &HashSet<EntryId>) {
        for m in [&mut self.forward, &mut self.backward] {
            if let UndoableMutation::MutateEntries(entries) = m {
                entries.strip_locked(locked);
            }
        }
    }
}

/// Undo/redo queues for one session.
#[derive(Clone, Debug)]
pub struct History {
    past: VecDeque<HistoryEntry>,
    future: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self::with_capacity(MAX_HISTORY_CAPACITY)
    }

    /// A history bounded to `capacity` entries (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            past: VecDeque::with_capacity(capacity.min(MAX_HISTORY_CAPACITY)),
            future: VecDeque::new(),
            capacity,
        }
    }

    /// Record `forward`, inverting it against `before`.
    ///
    /// On error nothing is recorded.
    pub fn push(&mut self, forward: UndoableMutation, before: &Strategy) -> Result<()> {
        let backward = invert(&forward, before)?;
        debug!(kind = forward.name(), past = self.past.len(), "recording history entry");

        self.past.push_back(HistoryEntry { forward, backward });
        self.future.clear();
        self.ensure_capacity()
    }

    /// Step back: returns the backward mutation of the newest entry.
    pub fn undo(&mut self) -> Option<UndoableMutation> {
        let entry = self.past.pop_back()?;
        let backward = entry.backward.clone();
        self.future.push_front(entry);
        Some(backward)
    }

    /// Step forward: returns the forward mutation of the oldest undone entry.
    pub fn redo(&mut self) -> Option<UndoableMutation> {
        let entry = self.future.pop_front()?;
        let forward = entry.forward.clone();
        self.past.push_back(entry);
        Some(forward)
    }

    /// Strip every reference to `ids` from entry-mutation history.
    ///
    /// Note and job entries are left alone.
    pub fn lock(&mut self, ids: impl IntoIterator<Item = EntryId>) {
        let locked: HashSet<EntryId> = ids.into_iter().collect();
        if locked.is_empty() {
            return;
        }
        for entry in self.past.iter_mut().chain(self.future.iter_mut()) {
            entry.strip_locked(&locked);
        }
    }

    /// Drop every recorded job change of `player` from both queues.
    ///
    /// Undoing one would clear entries someone else has since written.
    pub fn lock_player(&mut self, player: PlayerId) {
        let before = self.len();
        self.past.retain(|entry| !entry.is_job_change_of(player));
        self.future.retain(|entry| !entry.is_job_change_of(player));
        if self.len() != before {
            debug!(%player, dropped = before - self.len(), "locked player job history");
        }
    }

    pub fn is_undo_available(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn is_redo_available(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn len(&self) -> usize {
        self.past.len() + self.future.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    pub fn future_len(&self) -> usize {
        self.future.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }

    fn ensure_capacity(&mut self) -> Result<()> {
        if self.future.len() > self.capacity {
            warn!(
                future = self.future.len(),
                capacity = self.capacity,
                "redo queue exceeds history capacity"
            );
            return Err(DocError::FutureOverflow {
                len: self.future.len(),
                capacity: self.capacity,
            });
        }
        while self.len() > self.capacity {
            if self.past.pop_front().is_none() {
                break;
            }
        }
        Ok(())
    }

    #[cfg(test)]
    fn with_future(capacity: usize, future: impl IntoIterator<Item = HistoryEntry>) -> Self {
        let mut history = Self::with_capacity(capacity);
        history.future = future.into_iter().collect();
        history
    }
}
