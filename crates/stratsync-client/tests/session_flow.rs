//! Integration tests for StratSyncSession against an in-memory transport.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::mpsc;
use tokio::task::LocalSet;

use stratsync_client::{
    ClientConfig, ConnectOptions, EventStream, Initialization, PlayerRecord, RpcError,
    ServerEvent, SessionError, SessionPhase, StratSyncRpc, StratSyncSession, hash_password,
};
use stratsync_doc::{EntryMutation, NoteMutation};
use stratsync_types::{
    ActionId, DamageOption, Entry, EntryId, Job, Note, NoteId, PlayerId, Raid, RaidId,
    SessionToken, Strategy, StrategyId,
};

/// Helper to run async test code that requires LocalSet
fn run_local<F: std::future::Future<Output = ()>>(f: F) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let local = LocalSet::new();
    rt.block_on(local.run_until(f));
}

/// Yield to spawned tasks until `cond` holds.
async fn until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

// ============================================================================
// Mock transport
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
enum Call {
    Event {
        strategy: StrategyId,
        bearer: Option<String>,
    },
    Elevate {
        token: String,
        password_hash: String,
    },
    ClearOtherSessions,
    UpsertDamageOption(DamageOption),
    MutateEntries {
        upserts: Vec<Entry>,
        deletes: Vec<EntryId>,
    },
    UpdatePlayerJob(PlayerId, Option<Job>),
    UpsertNote(Note),
    DeleteNote(NoteId),
}

#[derive(Default)]
struct MockState {
    events: Option<mpsc::UnboundedReceiver<Result<ServerEvent, RpcError>>>,
    stall: bool,
    fail_submissions: bool,
    accepted_hash: Option<String>,
    calls: Vec<Call>,
}

#[derive(Clone, Default)]
struct MockRpc {
    state: Rc<RefCell<MockState>>,
}

impl MockRpc {
    fn with_stream() -> (Self, mpsc::UnboundedSender<Result<ServerEvent, RpcError>>) {
        let (tx, rx) = mpsc::unbounded();
        let mock = Self::default();
        mock.state.borrow_mut().events = Some(rx);
        (mock, tx)
    }

    fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    fn submissions(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::Event { .. } | Call::Elevate { .. }))
            .collect()
    }

    fn record(&self, call: Call) -> Result<(), RpcError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(call);
        if state.fail_submissions {
            Err(RpcError::Transport("connection reset".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait(?Send)]
impl StratSyncRpc for MockRpc {
    async fn event(
        &self,
        strategy: StrategyId,
        bearer: Option<&str>,
    ) -> Result<EventStream, RpcError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Event {
            strategy,
            bearer: bearer.map(str::to_owned),
        });
        if state.stall {
            return Ok(futures::stream::pending::<Result<ServerEvent, RpcError>>().boxed_local());
        }
        let rx = state.events.take().ok_or(RpcError::NotConnected)?;
        Ok(rx.boxed_local())
    }

    async fn elevate(&self, token: &SessionToken, password_hash: &str) -> Result<(), RpcError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Elevate {
            token: token.as_str().to_owned(),
            password_hash: password_hash.to_owned(),
        });
        if state.accepted_hash.as_deref() == Some(password_hash) {
            Ok(())
        } else {
            Err(RpcError::Rejected("bad password".into()))
        }
    }

    async fn clear_other_sessions(&self, _token: &SessionToken) -> Result<(), RpcError> {
        self.state.borrow_mut().calls.push(Call::ClearOtherSessions);
        Ok(())
    }

    async fn upsert_damage_option(
        &self,
        _token: &SessionToken,
        option: &DamageOption,
    ) -> Result<(), RpcError> {
        self.record(Call::UpsertDamageOption(option.clone()))
    }

    async fn mutate_entries(
        &self,
        _token: &SessionToken,
        upserts: &[Entry],
        deletes: &[EntryId],
    ) -> Result<(), RpcError> {
        self.record(Call::MutateEntries {
            upserts: upserts.to_vec(),
            deletes: deletes.to_vec(),
        })
    }

    async fn update_player_job(
        &self,
        _token: &SessionToken,
        player: PlayerId,
        job: Option<Job>,
    ) -> Result<(), RpcError> {
        self.record(Call::UpdatePlayerJob(player, job))
    }

    async fn upsert_note(&self, _token: &SessionToken, note: &Note) -> Result<(), RpcError> {
        self.record(Call::UpsertNote(note.clone()))
    }

    async fn delete_note(&self, _token: &SessionToken, id: NoteId) -> Result<(), RpcError> {
        self.record(Call::DeleteNote(id))
    }
}

// ============================================================================
// Fixtures
// ============================================================================

struct Roster {
    tank: PlayerId,
    healer: PlayerId,
}

fn seed() -> Strategy {
    Strategy::new(
        StrategyId::new(),
        "week one prog",
        Raid::empty(RaidId::new(), "M3S"),
    )
}

fn init(roster: &Roster) -> ServerEvent {
    ServerEvent::Initialization(Initialization {
        token: SessionToken::new("session-token"),
        players: vec![
            PlayerRecord {
                id: roster.tank,
                job: Some(Job::Pld),
                order: 0,
            },
            PlayerRecord {
                id: roster.healer,
                job: Some(Job::Whm),
                order: 1,
            },
        ],
        entries: vec![],
        damage_options: vec![],
        notes: None,
    })
}

fn entry(player: PlayerId, use_at: i32) -> Entry {
    Entry {
        id: EntryId::new(),
        player,
        action: ActionId::new(),
        use_at,
    }
}

fn author() -> ConnectOptions {
    ConnectOptions {
        is_author: true,
        editable: true,
        bearer: Some("jwt".into()),
    }
}

fn guest() -> ConnectOptions {
    ConnectOptions {
        is_author: false,
        editable: true,
        bearer: None,
    }
}

async fn connect(
    options: ConnectOptions,
) -> (
    StratSyncSession<MockRpc>,
    MockRpc,
    mpsc::UnboundedSender<Result<ServerEvent, RpcError>>,
    Roster,
) {
    let roster = Roster {
        tank: PlayerId::new(),
        healer: PlayerId::new(),
    };
    let (mock, tx) = MockRpc::with_stream();
    tx.unbounded_send(Ok(init(&roster))).unwrap();
    let session = StratSyncSession::connect(mock.clone(), seed(), options, &ClientConfig::default())
        .await
        .expect("connect failed");
    (session, mock, tx, roster)
}

// ============================================================================
// Connection lifecycle
// ============================================================================

#[test]
fn test_connect_opens_stream_with_bearer() {
    run_local(async {
        let seed = seed();
        let strategy = seed.id;
        let roster = Roster {
            tank: PlayerId::new(),
            healer: PlayerId::new(),
        };
        let (mock, tx) = MockRpc::with_stream();
        tx.unbounded_send(Ok(init(&roster))).unwrap();

        let session = StratSyncSession::connect(mock.clone(), seed, author(), &ClientConfig::default())
            .await
            .unwrap();

        assert_eq!(
            mock.calls(),
            vec![Call::Event {
                strategy,
                bearer: Some("jwt".into())
            }]
        );
        let status = session.status();
        assert_eq!(status.phase, SessionPhase::Ready);
        assert!(!status.undo_available);
        assert_eq!(session.snapshot().players.len(), 2);
        assert!(session.store().is_elevated());
    });
}

#[test]
fn test_non_initialization_first_event_fails_connect() {
    run_local(async {
        let (mock, tx) = MockRpc::with_stream();
        tx.unbounded_send(Ok(ServerEvent::DeleteNote { id: NoteId::new() }))
            .unwrap();

        let err = StratSyncSession::connect(mock, seed(), author(), &ClientConfig::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SessionError::ProtocolViolation(_)));
    });
}

#[test]
fn test_stream_closing_before_initialization_fails_connect() {
    run_local(async {
        let (mock, tx) = MockRpc::with_stream();
        drop(tx);

        let err = StratSyncSession::connect(mock, seed(), author(), &ClientConfig::default())
            .await
            .err()
            .unwrap();
        assert_eq!(err, SessionError::StreamClosed);
    });
}

#[test]
fn test_stream_open_failure_is_transport_error() {
    run_local(async {
        let mock = MockRpc::default();
        let err = StratSyncSession::connect(mock, seed(), author(), &ClientConfig::default())
            .await
            .err()
            .unwrap();
        assert_eq!(err, SessionError::Transport(RpcError::NotConnected));
    });
}

#[test]
fn test_connect_times_out_without_initialization() {
    run_local(async {
        let mock = MockRpc::default();
        mock.state.borrow_mut().stall = true;
        let config = ClientConfig {
            connect_timeout_ms: 20,
            ..ClientConfig::default()
        };

        let err = StratSyncSession::connect(mock, seed(), author(), &config)
            .await
            .err()
            .unwrap();
        assert_eq!(err, SessionError::ConnectTimeout);
    });
}

#[test]
fn test_stream_end_aborts_session() {
    run_local(async {
        let (session, _mock, tx, roster) = connect(author()).await;
        let mut status = session.subscribe_status();
        drop(tx);

        let aborted = tokio::time::timeout(
            Duration::from_secs(1),
            status.wait_for(|s| s.phase == SessionPhase::Aborted),
        )
        .await
        .is_ok();
        assert!(aborted);
        assert_eq!(
            session.store().abort_cause(),
            Some(&SessionError::StreamClosed)
        );

        // Aborted sessions ignore edits.
        session
            .mutate_entries(EntryMutation::upsert([entry(roster.tank, 5)]), false)
            .unwrap();
        assert_eq!(session.snapshot().entry_count(), 0);
    });
}

#[test]
fn test_stream_error_aborts_session() {
    run_local(async {
        let (session, _mock, tx, _roster) = connect(author()).await;
        tx.unbounded_send(Err(RpcError::Transport("eof".into())))
            .unwrap();

        until(|| session.status().phase == SessionPhase::Aborted).await;
        assert_eq!(
            session.store().abort_cause(),
            Some(&SessionError::Transport(RpcError::Transport("eof".into())))
        );
    });
}

#[test]
fn test_second_initialization_aborts_session() {
    run_local(async {
        let (session, _mock, tx, roster) = connect(author()).await;
        tx.unbounded_send(Ok(init(&roster))).unwrap();

        until(|| session.status().phase == SessionPhase::Aborted).await;
        assert!(matches!(
            session.store().abort_cause(),
            Some(SessionError::ProtocolViolation(_))
        ));
    });
}

#[test]
fn test_close_stops_consuming_events() {
    run_local(async {
        let (session, _mock, tx, roster) = connect(author()).await;
        session.close();
        tokio::task::yield_now().await;

        tx.unbounded_send(Ok(ServerEvent::MutateEntries(EntryMutation::upsert([
            entry(roster.healer, 30),
        ]))))
        .ok();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(session.snapshot().entry_count(), 0);
        assert_eq!(session.status().phase, SessionPhase::Ready);
    });
}

// ============================================================================
// Edits
// ============================================================================

#[test]
fn test_edit_is_applied_immediately_and_sent() {
    run_local(async {
        let (session, mock, _tx, roster) = connect(author()).await;
        let e = entry(roster.tank, 12);

        session
            .mutate_entries(EntryMutation::upsert([e.clone()]), false)
            .unwrap();
        assert_eq!(session.snapshot().entry(e.id), Some(&e));
        assert!(session.status().undo_available);

        until(|| !mock.submissions().is_empty()).await;
        assert_eq!(
            mock.submissions(),
            vec![Call::MutateEntries {
                upserts: vec![e],
                deletes: vec![],
            }]
        );
    });
}

#[test]
fn test_submissions_are_sent_in_order() {
    run_local(async {
        let (session, mock, _tx, roster) = connect(author()).await;
        let e = entry(roster.tank, 12);
        let note = Note {
            id: NoteId::new(),
            content: "pot at 6:00".into(),
            x: 4,
            y: 8,
        };

        session
            .mutate_entries(EntryMutation::upsert([e.clone()]), false)
            .unwrap();
        session.mutate_note(NoteMutation::Upsert(note.clone())).unwrap();
        session
            .update_player_job(roster.healer, Some(Job::Ast), false)
            .unwrap();
        session.undo().unwrap();

        until(|| mock.submissions().len() == 4).await;
        assert_eq!(
            mock.submissions(),
            vec![
                Call::MutateEntries {
                    upserts: vec![e],
                    deletes: vec![],
                },
                Call::UpsertNote(note),
                Call::UpdatePlayerJob(roster.healer, Some(Job::Ast)),
                Call::UpdatePlayerJob(roster.healer, Some(Job::Whm)),
            ]
        );
    });
}

#[test]
fn test_local_edit_is_not_sent() {
    run_local(async {
        let (session, mock, _tx, roster) = connect(author()).await;
        session
            .mutate_entries(EntryMutation::upsert([entry(roster.tank, 1)]), true)
            .unwrap();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(mock.submissions().is_empty());
        assert_eq!(session.snapshot().entry_count(), 1);
    });
}

#[test]
fn test_failed_submission_aborts_without_rollback() {
    run_local(async {
        let (session, mock, _tx, roster) = connect(author()).await;
        mock.state.borrow_mut().fail_submissions = true;
        let e = entry(roster.tank, 12);

        session
            .mutate_entries(EntryMutation::upsert([e.clone()]), false)
            .unwrap();
        until(|| session.status().phase == SessionPhase::Aborted).await;

        assert_eq!(session.snapshot().entry(e.id), Some(&e));
        assert!(matches!(
            session.store().abort_cause(),
            Some(SessionError::Transport(_))
        ));
    });
}

#[test]
fn test_remote_edit_locks_history_before_local_undo() {
    run_local(async {
        let (session, mock, tx, roster) = connect(author()).await;
        let mut status = session.subscribe_status();
        let e1 = entry(roster.tank, 10);
        let e2 = entry(roster.tank, 20);

        session
            .mutate_entries(EntryMutation::upsert([e1.clone(), e2.clone()]), true)
            .unwrap();
        let revision = session.status().revision;

        let moved = Entry {
            use_at: 11,
            ..e1.clone()
        };
        tx.unbounded_send(Ok(ServerEvent::MutateEntries(EntryMutation::upsert([
            moved.clone(),
        ]))))
        .unwrap();
        status
            .wait_for(|s| s.revision > revision)
            .await
            .unwrap();

        session.undo().unwrap();
        let doc = session.snapshot();
        assert_eq!(doc.entry(e1.id), Some(&moved));
        assert_eq!(doc.entry(e2.id), None);

        until(|| !mock.submissions().is_empty()).await;
        assert_eq!(
            mock.submissions(),
            vec![Call::MutateEntries {
                upserts: vec![],
                deletes: vec![e2.id],
            }]
        );
    });
}

#[test]
fn test_guest_edits_are_ignored_until_elevated() {
    run_local(async {
        let (session, mock, _tx, roster) = connect(guest()).await;
        assert!(session.store().is_elevatable());

        session
            .mutate_entries(EntryMutation::upsert([entry(roster.tank, 1)]), false)
            .unwrap();
        assert_eq!(session.snapshot().entry_count(), 0);
        assert!(!session.status().undo_available);

        mock.state.borrow_mut().accepted_hash = Some(hash_password("hunter2"));
        assert!(session.elevate("hunter2").await);

        session
            .mutate_entries(EntryMutation::upsert([entry(roster.tank, 1)]), false)
            .unwrap();
        assert_eq!(session.snapshot().entry_count(), 1);
    });
}

// ============================================================================
// Session management
// ============================================================================

#[test]
fn test_elevate_sends_password_hash() {
    run_local(async {
        let (session, mock, _tx, _roster) = connect(guest()).await;
        mock.state.borrow_mut().accepted_hash = Some(hash_password("correct horse"));

        assert!(!session.elevate("wrong").await);
        assert!(!session.store().is_elevated());
        assert_eq!(session.status().phase, SessionPhase::Ready);

        assert!(session.elevate("correct horse").await);
        assert!(session.store().is_elevated());

        let elevations: Vec<Call> = mock
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Elevate { .. }))
            .collect();
        assert_eq!(
            elevations,
            vec![
                Call::Elevate {
                    token: "session-token".into(),
                    password_hash: hash_password("wrong"),
                },
                Call::Elevate {
                    token: "session-token".into(),
                    password_hash: hash_password("correct horse"),
                },
            ]
        );

        // Already elevated: no further round trip.
        assert!(session.elevate("anything").await);
        assert_eq!(mock.calls().len(), 3);
    });
}

#[test]
fn test_clear_other_sessions_is_author_only() {
    run_local(async {
        let (guest_session, guest_mock, _tx, _roster) = connect(guest()).await;
        assert!(!guest_session.clear_other_sessions().await);
        assert!(!guest_mock.calls().contains(&Call::ClearOtherSessions));

        let (author_session, author_mock, _tx, _roster) = connect(author()).await;
        assert!(author_session.clear_other_sessions().await);
        assert!(author_mock.calls().contains(&Call::ClearOtherSessions));
    });
}

#[test]
fn test_user_abort_is_published() {
    run_local(async {
        let (session, _mock, _tx, _roster) = connect(author()).await;
        let status = session.subscribe_status();
        session.abort();
        assert_eq!(status.borrow().phase, SessionPhase::Aborted);
    });
}
