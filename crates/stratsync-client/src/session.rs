//! Async driver for a [`StratSyncStore`].
//!
//! A session owns one connection: it opens the event stream, feeds events to
//! the store in arrival order, and sends optimistic edits through an ordered
//! outbox. Everything runs on the current thread; construct sessions inside a
//! `tokio::task::LocalSet`.
//!
//! ```text
//!   edit methods ──► StratSyncStore (Rc<RefCell>) ──► outbox mpsc ──► sender task ──► R
//!                         ▲                                          (spawn_local)
//!   event stream ─────────┘  stream task (spawn_local, cancelled by close())
//! ```
//!
//! Failures are fail-stop: a rejected submission, a broken or finished
//! stream, or a protocol violation aborts the session. Optimistic changes
//! already applied are kept. Reconnecting means connecting a new session.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use futures::StreamExt;
use stratsync_doc::{EntryMutation, NoteMutation, UndoableMutation};
use stratsync_types::{DamageOption, Job, PlayerId, Strategy, StrategyId};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::auth::hash_password;
use crate::config::ClientConfig;
use crate::error::SessionError;
use crate::rpc::{EventStream, StratSyncRpc, Submission};
use crate::store::{ConnectOptions, StratSyncStore};
use crate::subscriptions::SessionStatus;

type SharedStore = Rc<RefCell<StratSyncStore>>;
type StatusSender = Rc<watch::Sender<SessionStatus>>;

/// A live connection to one strategy.
pub struct StratSyncSession<R: StratSyncRpc + 'static> {
    rpc: Rc<R>,
    store: SharedStore,
    status_tx: StatusSender,
    outbox_tx: mpsc::UnboundedSender<Submission>,
    cancel: CancellationToken,
}

impl<R: StratSyncRpc + 'static> StratSyncSession<R> {
    /// Open the event stream and wait for initialization.
    ///
    /// Fails if the stream cannot be opened, does not deliver an
    /// initialization event within the configured timeout, or delivers
    /// something else first. Must be called within a `LocalSet`.
    pub async fn connect(
        rpc: R,
        seed: Strategy,
        options: ConnectOptions,
        config: &ClientConfig,
    ) -> Result<Self, SessionError> {
        let strategy = seed.id;
        let bearer = options.bearer.clone();

        let mut store = StratSyncStore::with_history_capacity(seed, config.history_capacity);
        store.begin_connect(options)?;
        let (status_tx, _) = watch::channel(store.status());
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();

        let session = Self {
            rpc: Rc::new(rpc),
            store: Rc::new(RefCell::new(store)),
            status_tx: Rc::new(status_tx),
            outbox_tx,
            cancel: CancellationToken::new(),
        };

        log::info!("Opening event stream for strategy {strategy}");
        let opened = tokio::time::timeout(
            config.connect_timeout(),
            session.open(strategy, bearer.as_deref()),
        )
        .await;
        let stream = match opened {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(session.fail(e)),
            Err(_) => return Err(session.fail(SessionError::ConnectTimeout)),
        };
        log::info!("Strategy {strategy} ready");

        tokio::task::spawn_local(run_stream(
            stream,
            Rc::clone(&session.store),
            Rc::clone(&session.status_tx),
            session.cancel.clone(),
        ));
        tokio::task::spawn_local(run_outbox(
            Rc::clone(&session.rpc),
            outbox_rx,
            Rc::clone(&session.store),
            Rc::clone(&session.status_tx),
        ));

        Ok(session)
    }

    async fn open(
        &self,
        strategy: StrategyId,
        bearer: Option<&str>,
    ) -> Result<EventStream, SessionError> {
        let mut stream = self.rpc.event(strategy, bearer).await?;
        let first = stream.next().await.ok_or(SessionError::StreamClosed)??;
        let applied = self.store.borrow_mut().apply_event(first);
        self.publish();
        applied.map(|()| stream)
    }

    fn fail(&self, cause: SessionError) -> SessionError {
        let cause = self.store.borrow_mut().abort_with(cause);
        self.publish();
        cause
    }

    fn publish(&self) {
        publish(&self.store, &self.status_tx);
    }

    /// Queue whatever the store produced and publish the new status.
    fn flush(&self) {
        let submissions = self.store.borrow_mut().take_submissions();
        for submission in submissions {
            if self.outbox_tx.send(submission).is_err() {
                log::warn!("Outbox closed, dropping submission");
            }
        }
        self.publish();
    }

    // ── Edits ────────────────────────────────────────────────────────────

    pub fn mutate_entries(&self, m: EntryMutation, local: bool) -> Result<(), SessionError> {
        let result = self.store.borrow_mut().mutate_entries(m, local);
        self.flush();
        result
    }

    pub fn mutate_note(&self, m: NoteMutation) -> Result<(), SessionError> {
        let result = self.store.borrow_mut().mutate_note(m);
        self.flush();
        result
    }

    pub fn upsert_damage_option(&self, option: DamageOption, local: bool) -> bool {
        let applied = self.store.borrow_mut().upsert_damage_option(option, local);
        self.flush();
        applied
    }

    pub fn update_player_job(
        &self,
        player: PlayerId,
        job: Option<Job>,
        local: bool,
    ) -> Result<(), SessionError> {
        let result = self.store.borrow_mut().update_player_job(player, job, local);
        self.flush();
        result
    }

    pub fn undo(&self) -> Option<UndoableMutation> {
        let undone = self.store.borrow_mut().undo();
        self.flush();
        undone
    }

    pub fn redo(&self) -> Option<UndoableMutation> {
        let redone = self.store.borrow_mut().redo();
        self.flush();
        redone
    }

    // ── Session management ───────────────────────────────────────────────

    /// Request editor rights. Returns whether the session is elevated.
    pub async fn elevate(&self, password: &str) -> bool {
        let token = {
            let store = self.store.borrow();
            match store.token() {
                None => return false,
                Some(_) if store.is_elevated() => return true,
                Some(token) => token.clone(),
            }
        };

        match self.rpc.elevate(&token, &hash_password(password)).await {
            Ok(()) => {
                self.store.borrow_mut().mark_elevated();
                self.publish();
                let elevated = self.store.borrow().is_elevated();
                log::info!("Elevation accepted (elevated={elevated})");
                elevated
            }
            Err(e) => {
                log::warn!("Elevation rejected: {e}");
                false
            }
        }
    }

    /// Drop every other participant's session. Authors only.
    pub async fn clear_other_sessions(&self) -> bool {
        let token = {
            let store = self.store.borrow();
            match store.token() {
                Some(token) if store.is_author() => token.clone(),
                _ => return false,
            }
        };

        match self.rpc.clear_other_sessions(&token).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to clear other sessions: {e}");
                false
            }
        }
    }

    /// Abort the session. Edits are ignored from here on.
    pub fn abort(&self) {
        self.store.borrow_mut().abort();
        self.publish();
    }

    /// Stop consuming the event stream. Use when this session is superseded.
    pub fn close(&self) {
        log::debug!("Closing session");
        self.cancel.cancel();
    }

    // ── Observation ──────────────────────────────────────────────────────

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        self.store.borrow().status()
    }

    /// Cheap copy of the current document.
    pub fn snapshot(&self) -> Strategy {
        self.store.borrow().snapshot()
    }

    /// Borrow the store. Do not hold the borrow across an `.await`.
    pub fn store(&self) -> Ref<'_, StratSyncStore> {
        self.store.borrow()
    }
}

impl<R: StratSyncRpc + 'static> Drop for StratSyncSession<R> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn publish(store: &RefCell<StratSyncStore>, status_tx: &watch::Sender<SessionStatus>) {
    status_tx.send_replace(store.borrow().status());
}

/// Apply events until the stream fails, ends, or the session is closed.
async fn run_stream(
    mut stream: EventStream,
    store: SharedStore,
    status_tx: StatusSender,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::debug!("Event stream cancelled");
                return;
            }
            next = stream.next() => next,
        };

        let result = match next {
            Some(Ok(event)) => store.borrow_mut().apply_event(event),
            Some(Err(e)) => Err(store.borrow_mut().abort_with(e.into())),
            None => Err(store.borrow_mut().abort_with(SessionError::StreamClosed)),
        };
        publish(&store, &status_tx);

        if let Err(e) = result {
            log::warn!("Event stream stopped: {e}");
            return;
        }
    }
}

/// Send queued edits one at a time, in the order they were made.
async fn run_outbox<R: StratSyncRpc + ?Sized>(
    rpc: Rc<R>,
    mut rx: mpsc::UnboundedReceiver<Submission>,
    store: SharedStore,
    status_tx: StatusSender,
) {
    while let Some(submission) = rx.recv().await {
        if let Err(e) = submission.send(&*rpc).await {
            log::error!("Failed to send {}: {e}", submission.mutation.name());
            store.borrow_mut().abort_with(e.into());
            publish(&store, &status_tx);
            return;
        }
    }
    log::debug!("Outbox shutting down: channel closed");
}
