//! Client configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

use std::time::Duration;

pub use stratsync_doc::MAX_HISTORY_CAPACITY;

/// How long `connect` waits for the stream to open and deliver the
/// initialization event.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default config file name, looked up by the replay tool.
pub const CONFIG_FILE_NAME: &str = "stratsync.ron";
