//! Client configuration, loaded from RON.
//!
//! ```ron
//! (
//!     history_capacity: 128,
//!     connect_timeout_ms: 5000,
//! )
//! ```
//!
//! Missing fields fall back to the defaults in [`constants`](crate::constants).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{CONNECT_TIMEOUT, MAX_HISTORY_CAPACITY};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Tunables for a sync session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Bound on undo + redo entries.
    pub history_capacity: usize,
    /// Time allowed for the event stream to deliver its initialization event.
    pub connect_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            history_capacity: MAX_HISTORY_CAPACITY,
            connect_timeout_ms: CONNECT_TIMEOUT.as_millis() as u64,
        }
    }
}

impl ClientConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron_str(&text)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}
