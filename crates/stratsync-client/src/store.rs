//! Sans-I/O session state for one strategy.
//!
//! [`StratSyncStore`] owns the live document, the undo history and the
//! session flags. It never awaits: edits are applied synchronously and any
//! outbound request is queued as a [`Submission`] for the async driver
//! ([`StratSyncSession`](crate::StratSyncSession)) to send.
//!
//! # State Machine
//!
//! ```text
//! +--------------+  begin_connect()   +------------+  initialization  +---------+
//! | Disconnected | -----------------> | Connecting | ---------------> |  Ready  |
//! +--------------+                    +-----+------+                  +----+----+
//!                                           | anything else                | second init,
//!                                           v                              | transport error,
//!                                     +-----------+                        | stream end
//!                                     |  Aborted  | <----------------------+
//!                                     +-----------+   (terminal)
//! ```
//!
//! Edits are only accepted in `Ready` with a token and editor rights. Anything
//! else is dropped silently and leaves history untouched.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use stratsync_doc::{
    EntryMutation, History, Mutation, NoteMutation, PlayerJobUpdate, UndoableMutation, apply,
};
use stratsync_types::{DamageOption, Entry, Job, Player, PlayerId, SessionToken, Strategy};
use tracing::{debug, error, info, trace, warn};

use crate::constants::MAX_HISTORY_CAPACITY;
use crate::error::SessionError;
use crate::rpc::Submission;
use crate::subscriptions::{Initialization, ServerEvent, SessionPhase, SessionStatus};

/// How the user is joining the strategy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// The user owns the strategy and is elevated from the start.
    pub is_author: bool,
    /// The strategy accepts elevation by password.
    pub editable: bool,
    /// Bearer credential forwarded when opening the event stream.
    pub bearer: Option<String>,
}

/// Session state machine for one connection.
#[derive(Debug)]
pub struct StratSyncStore {
    doc: Strategy,
    history: History,
    history_capacity: usize,
    options: ConnectOptions,
    token: Option<SessionToken>,
    is_author: bool,
    elevatable: bool,
    elevated: bool,
    phase: SessionPhase,
    abort_cause: Option<SessionError>,
    /// Bumped on every document change.
    revision: u64,
    outbox: Vec<Submission>,
}

impl StratSyncStore {
    /// A disconnected store over `seed` (raid reference data, optionally notes).
    pub fn new(seed: Strategy) -> Self {
        Self::with_history_capacity(seed, MAX_HISTORY_CAPACITY)
    }

    pub fn with_history_capacity(seed: Strategy, history_capacity: usize) -> Self {
        Self {
            doc: seed,
            history: History::with_capacity(history_capacity),
            history_capacity,
            options: ConnectOptions::default(),
            token: None,
            is_author: false,
            elevatable: false,
            elevated: false,
            phase: SessionPhase::Disconnected,
            abort_cause: None,
            revision: 0,
            outbox: Vec::new(),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    /// Move to `Connecting`. The next event must be an initialization.
    pub fn begin_connect(&mut self, options: ConnectOptions) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Disconnected => {
                debug!(strategy = %self.doc.id, is_author = options.is_author, "connecting");
                self.options = options;
                self.phase = SessionPhase::Connecting;
                Ok(())
            }
            SessionPhase::Aborted => Err(SessionError::Aborted),
            phase => Err(SessionError::ProtocolViolation(format!(
                "connect requested while {phase:?}"
            ))),
        }
    }

    /// Apply one event from the stream, in delivery order.
    ///
    /// Protocol violations abort the session and are returned.
    pub fn apply_event(&mut self, event: ServerEvent) -> Result<(), SessionError> {
        match (self.phase, event) {
            (SessionPhase::Aborted, _) => Err(SessionError::Aborted),
            (SessionPhase::Connecting, ServerEvent::Initialization(init)) => {
                self.initialize(init);
                Ok(())
            }
            (SessionPhase::Connecting, event) => Err(self.abort_with(
                SessionError::ProtocolViolation(format!(
                    "expected initialization, got {}",
                    event.name()
                )),
            )),
            (SessionPhase::Ready, ServerEvent::Initialization(_)) => Err(self.abort_with(
                SessionError::ProtocolViolation("duplicate initialization event".into()),
            )),
            (SessionPhase::Ready, event) => {
                self.apply_remote(event);
                Ok(())
            }
            (SessionPhase::Disconnected, event) => Err(self.abort_with(
                SessionError::ProtocolViolation(format!(
                    "{} event before connect",
                    event.name()
                )),
            )),
        }
    }

    fn initialize(&mut self, init: Initialization) {
        let Initialization {
            token,
            players,
            entries,
            damage_options,
            notes,
        } = init;

        let mut by_player: HashMap<PlayerId, Vec<Entry>> = HashMap::new();
        for entry in entries {
            by_player.entry(entry.player).or_default().push(entry);
        }

        let mut roster: Vec<Player> = players
            .into_iter()
            .map(|record| {
                let mut player = Player::new(record.id, record.job, record.order);
                player.entries = Arc::new(by_player.remove(&record.id).unwrap_or_default());
                player
            })
            .collect();
        roster.sort_by_key(|p| (p.order, p.id));

        if !by_player.is_empty() {
            warn!(
                dropped = by_player.values().map(Vec::len).sum::<usize>(),
                "initialization carried entries for players not in the roster"
            );
        }

        let options: BTreeMap<_, DamageOption> = damage_options
            .into_iter()
            .filter(|o| self.doc.raid.has_damage(o.damage))
            .map(|o| (o.damage, o))
            .collect();

        self.doc.players = Arc::new(roster);
        self.doc.damage_options = Arc::new(options);
        if let Some(notes) = notes {
            self.doc.notes = Arc::new(notes);
        }

        self.token = Some(token);
        self.history = History::with_capacity(self.history_capacity);
        self.is_author = self.options.is_author;
        self.elevatable = !self.is_author && self.options.editable;
        self.elevated = self.is_author;
        self.phase = SessionPhase::Ready;
        self.revision += 1;

        info!(
            strategy = %self.doc.id,
            players = self.doc.players.len(),
            entries = self.doc.entry_count(),
            elevated = self.elevated,
            "session initialized"
        );
    }

    fn apply_remote(&mut self, event: ServerEvent) {
        match &event {
            ServerEvent::MutateEntries(m) => {
                // Owners are resolved before the reducer moves anything.
                let mut owners: HashSet<PlayerId> = m.upserts.iter().map(|e| e.player).collect();
                for id in m.touched_ids() {
                    if let Some(entry) = self.doc.entry(id) {
                        owners.insert(entry.player);
                    }
                }
                self.history.lock(m.touched_ids());
                for player in owners {
                    self.history.lock_player(player);
                }
            }
            ServerEvent::UpdatePlayerJob(u) => {
                self.lock_player_entries(u.player);
                self.history.lock_player(u.player);
            }
            _ => {}
        }

        let kind = event.name();
        if let Some(mutation) = event.into_mutation() {
            apply(&mut self.doc, &mutation);
            self.revision += 1;
            trace!(kind, revision = self.revision, "applied remote event");
        }
    }

    /// User-level abort.
    pub fn abort(&mut self) {
        self.abort_with(SessionError::Aborted);
    }

    /// Abort with `cause` and hand it back for propagation.
    ///
    /// One-way: the first cause sticks.
    pub fn abort_with(&mut self, cause: SessionError) -> SessionError {
        if self.phase != SessionPhase::Aborted {
            error!(strategy = %self.doc.id, "session aborted: {cause}");
            self.phase = SessionPhase::Aborted;
            self.abort_cause = Some(cause.clone());
            self.outbox.clear();
        }
        cause
    }

    /// Record a successful elevation.
    pub fn mark_elevated(&mut self) {
        if self.token.is_some() && self.phase == SessionPhase::Ready {
            self.elevated = true;
        }
    }

    // ── Optimistic dispatch ──────────────────────────────────────────────

    /// True when edits will be applied and sent.
    pub fn can_edit(&self) -> bool {
        self.phase == SessionPhase::Ready && self.elevated && self.token.is_some()
    }

    /// Apply `mutation` locally and return the request to send, if any.
    ///
    /// Nothing changes when the session cannot edit. No-ops and `local`
    /// edits produce no submission.
    pub fn dispatch(&mut self, mutation: Mutation, local: bool) -> Option<Submission> {
        let token = match &self.token {
            Some(token) if self.can_edit() => token.clone(),
            _ => {
                debug!(kind = mutation.name(), phase = ?self.phase, "dropping edit: session not editable");
                return None;
            }
        };
        if mutation.is_noop() {
            return None;
        }

        apply(&mut self.doc, &mutation);
        self.revision += 1;
        (!local).then_some(Submission { token, mutation })
    }

    /// Dispatch and queue the resulting submission for the session driver.
    fn submit(&mut self, mutation: Mutation, local: bool) {
        if let Some(submission) = self.dispatch(mutation, local) {
            self.outbox.push(submission);
        }
    }

    /// Record `forward` against the current document. A failure is an
    /// invariant violation and aborts the session.
    fn record(&mut self, forward: UndoableMutation) -> Result<(), SessionError> {
        self.history
            .push(forward, &self.doc)
            .map_err(|e| self.abort_with(SessionError::Invariant(e)))
    }

    fn lock_player_entries(&mut self, player: PlayerId) {
        if let Some(p) = self.doc.player(player) {
            self.history.lock(p.entry_ids());
        }
    }

    pub fn mutate_entries(&mut self, m: EntryMutation, local: bool) -> Result<(), SessionError> {
        if m.is_empty() || !self.can_edit() {
            return Ok(());
        }
        self.record(m.clone().into())?;
        self.submit(Mutation::MutateEntries(m), local);
        Ok(())
    }

    /// Note edits are always sent.
    pub fn mutate_note(&mut self, m: NoteMutation) -> Result<(), SessionError> {
        if !self.can_edit() {
            return Ok(());
        }
        self.record(m.clone().into())?;
        self.submit(Mutation::MutateNote(m), false);
        Ok(())
    }

    /// Not recorded in history. Options for damage outside the raid are
    /// dropped without being sent.
    pub fn upsert_damage_option(&mut self, option: DamageOption, local: bool) -> bool {
        if !self.can_edit() {
            return false;
        }
        if !self.doc.raid.has_damage(option.damage) {
            warn!(damage = %option.damage, "dropping damage option for unknown damage");
            return false;
        }
        self.submit(Mutation::UpsertDamageOption(option), local);
        true
    }

    /// Change a player's job. Clears their entries and locks them in history.
    pub fn update_player_job(
        &mut self,
        player: PlayerId,
        job: Option<Job>,
        local: bool,
    ) -> Result<(), SessionError> {
        if !self.can_edit() {
            return Ok(());
        }
        let update = PlayerJobUpdate { player, job };
        self.lock_player_entries(player);
        self.record(update.clone().into())?;
        self.submit(Mutation::UpdatePlayerJob(update), local);
        Ok(())
    }

    /// Apply and send the newest entry's backward mutation.
    pub fn undo(&mut self) -> Option<UndoableMutation> {
        if !self.can_edit() {
            return None;
        }
        let backward = self.history.undo()?;
        self.reapply(&backward);
        Some(backward)
    }

    /// Apply and send the oldest undone entry's forward mutation.
    pub fn redo(&mut self) -> Option<UndoableMutation> {
        if !self.can_edit() {
            return None;
        }
        let forward = self.history.redo()?;
        self.reapply(&forward);
        Some(forward)
    }

    /// Apply and send a mutation taken from history.
    fn reapply(&mut self, mutation: &UndoableMutation) {
        if let UndoableMutation::UpdatePlayerJob(u) = mutation {
            self.lock_player_entries(u.player);
        }
        self.submit(mutation.clone().into(), false);
    }

    /// Drain queued outbound requests.
    pub fn take_submissions(&mut self) -> Vec<Submission> {
        std::mem::take(&mut self.outbox)
    }

    // ── Accessors ────────────────────────────────────────────────────────

    pub fn doc(&self) -> &Strategy {
        &self.doc
    }

    /// Cheap copy of the current document.
    pub fn snapshot(&self) -> Strategy {
        self.doc.clone()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    pub fn token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_aborted(&self) -> bool {
        self.phase == SessionPhase::Aborted
    }

    pub fn abort_cause(&self) -> Option<&SessionError> {
        self.abort_cause.as_ref()
    }

    pub fn is_author(&self) -> bool {
        self.is_author
    }

    pub fn is_elevated(&self) -> bool {
        self.elevated
    }

    pub fn is_elevatable(&self) -> bool {
        self.elevatable
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            phase: self.phase,
            revision: self.revision,
            undo_available: self.history.is_undo_available(),
            redo_available: self.history.is_redo_available(),
        }
    }
}
