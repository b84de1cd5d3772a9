//! The strategy document snapshot.
//!
//! A [`Strategy`] is the client's in-memory mirror of the shared document.
//! Each mutable sub-collection sits behind an `Arc`, so cloning a snapshot is
//! cheap and an update (via `Arc::make_mut`) copies only the collection it
//! touches. Consumers that want change detection can compare collections
//! with `Arc::ptr_eq`.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ids::{ActionId, DamageId, EntryId, NoteId, PlayerId, StrategyId};
use crate::job::Job;
use crate::raid::Raid;

/// A timed ability use by one player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub player: PlayerId,
    pub action: ActionId,
    /// Seconds from pull.
    pub use_at: i32,
}

/// A roster slot and the entries planned for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    #[serde(default)]
    pub job: Option<Job>,
    /// Display order within the roster.
    pub order: i32,
    #[serde(default)]
    pub entries: Arc<Vec<Entry>>,
}

impl Player {
    pub fn new(id: PlayerId, job: Option<Job>, order: i32) -> Self {
        Self {
            id,
            job,
            order,
            entries: Arc::default(),
        }
    }

    /// Entries in timeline order (by `use_at`, ties broken by id).
    ///
    /// Storage order is not meaningful; anything that displays entries
    /// should go through this.
    pub fn entries_by_use_at(&self) -> Vec<&Entry> {
        let mut sorted: Vec<&Entry> = self.entries.iter().collect();
        sorted.sort_by_key(|e| (e.use_at, e.id));
        sorted
    }

    pub fn entry_ids(&self) -> impl Iterator<Item = EntryId> + '_ {
        self.entries.iter().map(|e| e.id)
    }
}

/// How a damage instance is split across the party.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageOption {
    pub damage: DamageId,
    #[serde(default)]
    pub num_shared: Option<i32>,
    #[serde(default)]
    pub primary_target: Option<PlayerId>,
}

/// A free-text annotation placed on the timeline canvas.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub content: String,
    pub x: i32,
    pub y: i32,
}

/// The shared strategy document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    pub id: StrategyId,
    pub name: String,
    /// Reference data; never mutated by the sync engine.
    pub raid: Arc<Raid>,
    #[serde(default)]
    pub players: Arc<Vec<Player>>,
    /// Zero or one option per damage id.
    #[serde(default)]
    pub damage_options: Arc<BTreeMap<DamageId, DamageOption>>,
    #[serde(default)]
    pub notes: Arc<Vec<Note>>,
}

impl Strategy {
    /// An empty strategy over the given raid.
    pub fn new(id: StrategyId, name: impl Into<String>, raid: Raid) -> Self {
        Self {
            id,
            name: name.into(),
            raid: Arc::new(raid),
            players: Arc::default(),
            damage_options: Arc::default(),
            notes: Arc::default(),
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Every entry in the document, player by player.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.players.iter().flat_map(|p| p.entries.iter())
    }

    pub fn entry(&self, id: EntryId) -> Option<&Entry> {
        self.entries().find(|e| e.id == id)
    }

    pub fn entry_count(&self) -> usize {
        self.players.iter().map(|p| p.entries.len()).sum()
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn damage_option(&self, damage: DamageId) -> Option<&DamageOption> {
        self.damage_options.get(&damage)
    }

    /// A copy with storage order normalized: players by display order,
    /// entries by timeline order, notes by id.
    ///
    /// Two snapshots holding the same content compare equal after this,
    /// regardless of the order in which edits were applied.
    pub fn canonicalize(&self) -> Strategy {
        let mut players: Vec<Player> = self
            .players
            .iter()
            .map(|p| Player {
                entries: Arc::new(p.entries_by_use_at().into_iter().cloned().collect()),
                ..p.clone()
            })
            .collect();
        players.sort_by_key(|p| (p.order, p.id));

        let mut notes: Vec<Note> = self.notes.to_vec();
        notes.sort_by_key(|n| n.id);

        Strategy {
            players: Arc::new(players),
            notes: Arc::new(notes),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RaidId;

    fn entry(player: PlayerId, use_at: i32) -> Entry {
        Entry {
            id: EntryId::new(),
            player,
            action: ActionId::new(),
            use_at,
        }
    }

    fn strategy_with(players: Vec<Player>) -> Strategy {
        let mut s = Strategy::new(StrategyId::new(), "prog", Raid::empty(RaidId::new(), "M1S"));
        s.players = Arc::new(players);
        s
    }

    #[test]
    fn test_entries_by_use_at_sorts_by_timestamp() {
        let pid = PlayerId::new();
        let late = entry(pid, 90);
        let early = entry(pid, 5);
        let mut player = Player::new(pid, Some(Job::War), 0);
        player.entries = Arc::new(vec![late.clone(), early.clone()]);

        let ordered: Vec<EntryId> = player.entries_by_use_at().iter().map(|e| e.id).collect();
        assert_eq!(ordered, vec![early.id, late.id]);
    }

    #[test]
    fn test_lookups() {
        let pid = PlayerId::new();
        let e = entry(pid, 10);
        let mut player = Player::new(pid, None, 0);
        player.entries = Arc::new(vec![e.clone()]);
        let s = strategy_with(vec![player]);

        assert_eq!(s.entry(e.id), Some(&e));
        assert_eq!(s.entry_count(), 1);
        assert!(s.player(pid).is_some());
        assert!(s.player(PlayerId::new()).is_none());
        assert!(s.note(NoteId::new()).is_none());
    }

    #[test]
    fn test_canonicalize_ignores_storage_order() {
        let a = PlayerId::new();
        let b = PlayerId::new();
        let e1 = entry(a, 1);
        let e2 = entry(a, 2);

        let mut pa = Player::new(a, None, 0);
        pa.entries = Arc::new(vec![e2.clone(), e1.clone()]);
        let pb = Player::new(b, None, 1);
        let left = strategy_with(vec![pb.clone(), pa.clone()]);

        let mut pa2 = pa.clone();
        pa2.entries = Arc::new(vec![e1, e2]);
        let right = Strategy {
            players: Arc::new(vec![pa2, pb]),
            ..left.clone()
        };

        assert_ne!(left, right);
        assert_eq!(left.canonicalize(), right.canonicalize());
    }

    #[test]
    fn test_clone_shares_collections() {
        let s = strategy_with(vec![Player::new(PlayerId::new(), None, 0)]);
        let copy = s.clone();
        assert!(Arc::ptr_eq(&s.players, &copy.players));
        assert!(Arc::ptr_eq(&s.raid, &copy.raid));
    }
}
