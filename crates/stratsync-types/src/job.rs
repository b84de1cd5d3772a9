//! Job codes assignable to a roster slot.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// A combat job. Entries reference job-specific abilities, so a player's
/// entries are only meaningful under the job that created them.
///
/// Serialized as the upper-case three letter code used by the game client
/// (`"PLD"`, `"WAR"`, ...). Parsing is case-insensitive.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Job {
    Pld,
    War,
    Drk,
    Gnb,
    Whm,
    Ast,
    Sch,
    Sge,
    Mnk,
    Drg,
    Nin,
    Sam,
    Rpr,
    Vpr,
    Brd,
    Mch,
    Dnc,
    Blm,
    Rdm,
    Smn,
    Pct,
    Blu,
    /// Limit break pseudo-job.
    Lb,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_display_and_parse_agree() {
        for job in Job::iter() {
            let code = job.to_string();
            assert_eq!(code.len(), if job == Job::Lb { 2 } else { 3 });
            assert_eq!(Job::from_str(&code).unwrap(), job);
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(Job::from_str("war").unwrap(), Job::War);
        assert_eq!(Job::from_str("Sge").unwrap(), Job::Sge);
        assert!(Job::from_str("XYZ").is_err());
    }

    #[test]
    fn test_serde_uses_upper_case_codes() {
        assert_eq!(serde_json::to_string(&Job::Gnb).unwrap(), "\"GNB\"");
        let parsed: Job = serde_json::from_str("\"PCT\"").unwrap();
        assert_eq!(parsed, Job::Pct);
    }
}
