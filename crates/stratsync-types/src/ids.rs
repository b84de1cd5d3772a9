//! Typed identifiers for strategies, players, entries, notes, and raid data.
//!
//! All ID types wrap a UUID. Ids minted on the client (entries, notes) are
//! UUIDv7 so they sort by creation time; ids received from the server are
//! taken as-is. They serialize as standard UUID text, display in full for
//! logging, and debug-print as `Type(shorthex)`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A strategy (shared document) identifier.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyId(uuid::Uuid);

/// A roster slot identifier.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(uuid::Uuid);

/// A timed ability entry identifier. Unique across the whole strategy.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(uuid::Uuid);

/// A free-text note identifier.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(uuid::Uuid);

/// A damage instance identifier (raid reference data).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DamageId(uuid::Uuid);

/// An ability identifier (job action reference data).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(uuid::Uuid);

/// A gimmick identifier (raid reference data).
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GimmickId(uuid::Uuid);

/// A raid identifier.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RaidId(uuid::Uuid);

// ── Shared behavior ─────────────────────────────────────────────────────────

macro_rules! impl_typed_id {
    ($T:ident, $name:literal) => {
        impl $T {
            /// Create a new time-ordered ID (UUIDv7).
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7())
            }

            /// First 8 hex characters. Display only, not for lookup.
            pub fn short(&self) -> String {
                self.0.as_simple().to_string()[..8].to_string()
            }

            /// Parse from a hex string (32 chars, no hyphens) or standard UUID format.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                uuid::Uuid::parse_str(s).map(Self)
            }

            /// The underlying UUID.
            pub fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl Default for $T {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<uuid::Uuid> for $T {
            fn from(u: uuid::Uuid) -> Self {
                Self(u)
            }
        }

        impl From<$T> for uuid::Uuid {
            fn from(id: $T) -> uuid::Uuid {
                id.0
            }
        }

        impl std::str::FromStr for $T {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                // Full UUID with hyphens for log readability
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $T {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $name, self.short())
            }
        }
    };
}

impl_typed_id!(StrategyId, "StrategyId");
impl_typed_id!(PlayerId, "PlayerId");
impl_typed_id!(EntryId, "EntryId");
impl_typed_id!(NoteId, "NoteId");
impl_typed_id!(DamageId, "DamageId");
impl_typed_id!(ActionId, "ActionId");
impl_typed_id!(GimmickId, "GimmickId");
impl_typed_id!(RaidId, "RaidId");

// ============================================================================
// Tests
// ============================================================================
