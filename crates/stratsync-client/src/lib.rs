//! StratSync sync client library.
//!
//! Applies local edits optimistically, consumes the server's ordered event
//! stream, and keeps a lock-aware undo history in step with both. The
//! transport is abstracted behind [`StratSyncRpc`]; sessions run on the
//! current thread inside a `tokio::task::LocalSet`.
//!
//! - [`StratSyncStore`]: sans-I/O state machine, unit-testable without a runtime
//! - [`StratSyncSession`]: async driver owning the stream and outbox tasks

pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod rpc;
pub mod session;
pub mod store;
pub mod subscriptions;

pub use auth::hash_password;
pub use config::{ClientConfig, ConfigError};
pub use error::SessionError;
pub use rpc::{EventStream, RpcError, StratSyncRpc, Submission};
pub use session::StratSyncSession;
pub use store::{ConnectOptions, StratSyncStore};
pub use subscriptions::{Initialization, PlayerRecord, ServerEvent, SessionPhase, SessionStatus};
