use stratsync_doc::DocError;

use crate::rpc::RpcError;

/// Fatal session errors. Each one moves the session to `Aborted`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("transport error: {0}")]
    Transport(#[from] RpcError),
    #[error("history invariant violated: {0}")]
    Invariant(#[from] DocError),
    #[error("timed out waiting for initialization")]
    ConnectTimeout,
    #[error("event stream closed")]
    StreamClosed,
    #[error("session aborted")]
    Aborted,
}
