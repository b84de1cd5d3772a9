//! Raid reference data: gimmicks and the damage instances they deal.
//!
//! Supplied by the data-loading layer before a session connects. The sync
//! engine reads it (to validate damage option upserts) but never mutates it.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::ids::{DamageId, GimmickId, RaidId};

/// Who a damage instance hits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum DamageTarget {
    #[default]
    Raidwide,
    Tankbuster,
}

/// Damage school.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum DamageType {
    Physical,
    #[default]
    Magical,
    Unique,
}

/// Mechanic category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum GimmickType {
    #[default]
    Raidwide,
    Tankbuster,
    AutoAttack,
    Avoidable,
    Hybrid,
    Enrage,
}

/// One hit of a gimmick. Players may share it (stack) up to `max_shared`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Damage {
    pub id: DamageId,
    pub combined_damage: i32,
    pub max_shared: i32,
    pub num_targets: i32,
    #[serde(default)]
    pub target: DamageTarget,
    #[serde(default, rename = "type")]
    pub kind: DamageType,
}

/// A boss mechanic on the encounter timeline (seconds from pull).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gimmick {
    pub id: GimmickId,
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: GimmickType,
    pub prepare_at: i32,
    #[serde(default)]
    pub cast_at: Option<i32>,
    #[serde(default)]
    pub resolve_at: Option<i32>,
    #[serde(default)]
    pub damages: Vec<Damage>,
}

/// An encounter and its gimmick timeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Raid {
    pub id: RaidId,
    pub name: String,
    /// Encounter length in seconds.
    pub duration: i32,
    /// Party size.
    pub headcount: i32,
    #[serde(default)]
    pub gimmicks: Vec<Gimmick>,
}

impl Raid {
    /// An encounter with no gimmicks; used when reference data is unavailable.
    pub fn empty(id: RaidId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            duration: 0,
            headcount: 0,
            gimmicks: Vec::new(),
        }
    }

    /// All damage instances across every gimmick, in timeline order.
    pub fn damages(&self) -> impl Iterator<Item = &Damage> {
        self.gimmicks.iter().flat_map(|g| g.damages.iter())
    }

    /// Look up a damage instance by id.
    pub fn damage(&self, id: DamageId) -> Option<&Damage> {
        self.damages().find(|d| d.id == id)
    }

    pub fn has_damage(&self, id: DamageId) -> bool {
        self.damage(id).is_some()
    }
}
