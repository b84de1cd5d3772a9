//! Transport seam for the sync client.
//!
//! [`StratSyncRpc`] is the set of calls the client makes against a StratSync
//! server. Concrete transports implement it; the session only ever talks to
//! the trait. Futures are `!Send` and must run inside a
//! `tokio::task::LocalSet`.

use async_trait::async_trait;
use futures::stream::LocalBoxStream;
use stratsync_doc::{Mutation, NoteMutation};
use stratsync_types::{
    DamageOption, Entry, EntryId, Job, Note, NoteId, PlayerId, SessionToken, StrategyId,
};

use crate::subscriptions::ServerEvent;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    #[error("Not connected to server")]
    NotConnected,
    #[error("Server rejected request: {0}")]
    Rejected(String),
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Ordered server-push stream for one strategy.
pub type EventStream = LocalBoxStream<'static, Result<ServerEvent, RpcError>>;

/// Calls the client makes against the server.
#[async_trait(?Send)]
pub trait StratSyncRpc {
    /// Open the event stream for `strategy`.
    async fn event(
        &self,
        strategy: StrategyId,
        bearer: Option<&str>,
    ) -> Result<EventStream, RpcError>;

    /// Exchange a password hash for editor rights on this session's token.
    async fn elevate(&self, token: &SessionToken, password_hash: &str) -> Result<(), RpcError>;

    /// Drop every other session on the strategy. Authors only.
    async fn clear_other_sessions(&self, token: &SessionToken) -> Result<(), RpcError>;

    async fn upsert_damage_option(
        &self,
        token: &SessionToken,
        option: &DamageOption,
    ) -> Result<(), RpcError>;

    async fn mutate_entries(
        &self,
        token: &SessionToken,
        upserts: &[Entry],
        deletes: &[EntryId],
    ) -> Result<(), RpcError>;

    async fn update_player_job(
        &self,
        token: &SessionToken,
        player: PlayerId,
        job: Option<Job>,
    ) -> Result<(), RpcError>;

    async fn upsert_note(&self, token: &SessionToken, note: &Note) -> Result<(), RpcError>;

    async fn delete_note(&self, token: &SessionToken, id: NoteId) -> Result<(), RpcError>;
}

/// An optimistic edit waiting to be sent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission {
    pub token: SessionToken,
    pub mutation: Mutation,
}

impl Submission {
    /// Send this edit through the matching request.
    pub async fn send<R: StratSyncRpc + ?Sized>(&self, rpc: &R) -> Result<(), RpcError> {
        let token = &self.token;
        match &self.mutation {
            Mutation::MutateEntries(m) => rpc.mutate_entries(token, &m.upserts, &m.deletes).await,
            Mutation::MutateNote(NoteMutation::Upsert(note)) => rpc.upsert_note(token, note).await,
            Mutation::MutateNote(NoteMutation::Delete(id)) => rpc.delete_note(token, *id).await,
            Mutation::UpsertDamageOption(option) => rpc.upsert_damage_option(token, option).await,
            Mutation::UpdatePlayerJob(u) => rpc.update_player_job(token, u.player, u.job).await,
        }
    }
}
