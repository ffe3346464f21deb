use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use cw_ambient::{AmbientSeries, FixedLogger};
use cw_core::{
    BalanceMode, CwError, ErrorInfo, MassUnit, RunStatus, SessionConfig, SessionContext,
    WeighingScheme,
};
use cw_seq::{
    Balance, CancellationToken, NoopObserver, NotStartedReason, SequenceObserver, SequenceOutcome,
    SequenceRequest, SequenceState, SimulatedBalance, SteppedClock, WeighingSequencer,
};
use cw_store::{SaveTarget, WeighingStore};
use tempfile::tempdir;

const SCHEME: &str = "A B C";

fn session(dir: &std::path::Path) -> SessionContext {
    let mut config = SessionConfig::default();
    config.persistence.fallback_dir = dir.join("fallback");
    SessionContext::new("client", dir, config)
}

fn balance(mode: BalanceMode) -> SimulatedBalance {
    let masses = BTreeMap::from([
        ("A".to_string(), 100.0),
        ("B".to_string(), 100.002),
        ("C".to_string(), 99.997),
    ]);
    SimulatedBalance::new("sim-balance", mode, MassUnit::Gram, masses, 7).with_drift(1e-5)
}

fn request(run_id: u32) -> SequenceRequest {
    SequenceRequest {
        scheme: WeighingScheme::parse(SCHEME).expect("scheme"),
        run_id,
        nominal_mass_g: 100.0,
        allocated_positions: None,
    }
}

#[derive(Default)]
struct Recorder {
    states: Vec<SequenceState>,
    readings: usize,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl SequenceObserver for Recorder {
    fn on_reading(&mut self, _value: f64, _unit: MassUnit) {
        self.readings += 1;
        if let Some((limit, token)) = &self.cancel_after {
            if self.readings >= *limit {
                token.cancel();
            }
        }
    }

    fn on_state(&mut self, state: SequenceState) {
        self.states.push(state);
    }
}

/// Simulator whose `fail_on`-th read is an instrument error. With `block`
/// set, the primary document and the fallback folder are made unwritable
/// at that moment.
struct FailingBalance {
    inner: SimulatedBalance,
    fail_on: usize,
    reads: usize,
    block: Option<(PathBuf, PathBuf)>,
}

impl FailingBalance {
    fn new(fail_on: usize) -> Self {
        Self {
            inner: balance(BalanceMode::ManualEntry),
            fail_on,
            reads: 0,
            block: None,
        }
    }
}

impl Balance for FailingBalance {
    fn identity(&self) -> &str {
        self.inner.identity()
    }

    fn mode(&self) -> BalanceMode {
        self.inner.mode()
    }

    fn unit(&self) -> MassUnit {
        self.inner.unit()
    }

    fn load(&mut self, group: &str, position: usize) -> Result<(), CwError> {
        self.inner.load(group, position)
    }

    fn unload(&mut self, group: &str, position: usize) -> Result<(), CwError> {
        self.inner.unload(group, position)
    }

    fn read_stabilized(&mut self) -> Result<Option<f64>, CwError> {
        self.reads += 1;
        if self.reads < self.fail_on {
            return self.inner.read_stabilized();
        }
        if let Some((document, fallback)) = self.block.take() {
            std::fs::remove_file(&document).expect("remove document");
            std::fs::create_dir_all(&document).expect("document dir");
            std::fs::write(&fallback, b"not a directory").expect("fallback blocker");
        }
        Err(CwError::Instrument(ErrorInfo::new(
            "serial-timeout",
            "balance stopped answering",
        )))
    }
}

#[test]
fn complete_run_fills_grid_with_minute_times() {
    let dir = tempdir().expect("tmp dir");
    let session = session(dir.path());
    let url = session.document_path("100g");
    let mut store = WeighingStore::open(&url, SCHEME).expect("open");
    let mut sequencer = WeighingSequencer::new(
        &session,
        balance(BalanceMode::ManualEntry),
        FixedLogger::steady(20.0, 50.0),
        SteppedClock::new(Duration::from_secs(30)),
    );
    let mut recorder = Recorder::default();
    let outcome = sequencer
        .run(&mut store, &request(1), &CancellationToken::new(), &mut recorder)
        .expect("run");

    assert_eq!(
        outcome,
        SequenceOutcome::Complete {
            run_id: 1,
            ambient_ok: Some(true),
            saved_to: SaveTarget::Primary,
        }
    );
    assert_eq!(sequencer.state(), SequenceState::Complete);
    assert_eq!(recorder.readings, 12);
    assert_eq!(recorder.states.last(), Some(&SequenceState::Complete));
    assert_eq!(sequencer.balance().handling_counts(), (12, 12));

    let reopened = WeighingStore::open(&url, SCHEME).expect("reopen");
    let run = reopened.measurement_run(1).expect("read").expect("run present");
    assert_eq!(run.metadata.status, RunStatus::Complete);
    assert_eq!(run.metadata.positions.get("B"), Some(&2));
    let (times, _) = run.flatten().expect("full grid");
    assert_eq!(times.len(), 12);
    assert_eq!(times[0], 0.0);
    assert!((times[1] - 0.5).abs() < 1e-12);
    assert!((times[11] - 5.5).abs() < 1e-12);
    assert_eq!(
        run.metadata.ambient_post.and_then(|post| post.ambient_ok),
        Some(true)
    );
}

#[test]
fn closed_gate_leaves_document_untouched() {
    let dir = tempdir().expect("tmp dir");
    let session = session(dir.path());
    let url = session.document_path("100g");
    let mut store = WeighingStore::open(&url, SCHEME).expect("open");
    let mut sequencer = WeighingSequencer::new(
        &session,
        balance(BalanceMode::ManualEntry),
        FixedLogger::steady(25.0, 50.0),
        SteppedClock::new(Duration::from_secs(30)),
    );
    let outcome = sequencer
        .run(&mut store, &request(1), &CancellationToken::new(), &mut NoopObserver)
        .expect("run");
    assert_eq!(
        outcome,
        SequenceOutcome::NotStarted(NotStartedReason::AmbientGateClosed)
    );
    assert!(outcome.interrupts_session());
    assert!(!url.exists());
    assert!(store.run_ids().is_empty());
    assert_eq!(sequencer.balance().readings(), 0);
}

#[test]
fn auto_loading_without_allocation_is_refused() {
    let dir = tempdir().expect("tmp dir");
    let session = session(dir.path());
    let mut store = WeighingStore::open(session.document_path("100g"), SCHEME).expect("open");
    let mut sequencer = WeighingSequencer::new(
        &session,
        balance(BalanceMode::AutoLoading),
        FixedLogger::steady(20.0, 50.0),
        SteppedClock::new(Duration::from_secs(30)),
    );
    let mut req = request(1);
    let outcome = sequencer
        .run(&mut store, &req, &CancellationToken::new(), &mut NoopObserver)
        .expect("run");
    assert_eq!(
        outcome,
        SequenceOutcome::NotStarted(NotStartedReason::PositionsUnavailable)
    );

    req.allocated_positions = Some(vec![4, 4, 2]);
    let outcome = sequencer
        .run(&mut store, &req, &CancellationToken::new(), &mut NoopObserver)
        .expect("run");
    assert_eq!(
        outcome,
        SequenceOutcome::NotStarted(NotStartedReason::PositionsUnavailable)
    );

    req.allocated_positions = Some(vec![4, 1, 2]);
    let outcome = sequencer
        .run(&mut store, &req, &CancellationToken::new(), &mut NoopObserver)
        .expect("run");
    assert!(matches!(outcome, SequenceOutcome::Complete { .. }));
    let run = store.measurement_run(1).expect("read").expect("run");
    assert_eq!(run.metadata.positions.get("A"), Some(&4));
    assert_eq!(run.metadata.balance_mode, BalanceMode::AutoLoading);
}

#[test]
fn cancel_mid_run_keeps_partial_grid_incomplete() {
    let dir = tempdir().expect("tmp dir");
    let session = session(dir.path());
    let url = session.document_path("100g");
    let mut store = WeighingStore::open(&url, SCHEME).expect("open");
    let mut sequencer = WeighingSequencer::new(
        &session,
        balance(BalanceMode::ManualEntry),
        FixedLogger::steady(20.0, 50.0),
        SteppedClock::new(Duration::from_secs(30)),
    );
    let cancel = CancellationToken::new();
    let mut recorder = Recorder {
        cancel_after: Some((4, cancel.clone())),
        ..Recorder::default()
    };
    let outcome = sequencer
        .run(&mut store, &request(1), &cancel, &mut recorder)
        .expect("run");
    assert_eq!(outcome, SequenceOutcome::Aborted { run_id: 1, readings: 4 });
    assert_eq!(sequencer.state(), SequenceState::Aborted);

    let reopened = WeighingStore::open(&url, SCHEME).expect("reopen");
    let run = reopened.measurement_run(1).expect("read").expect("run kept");
    assert_eq!(run.metadata.status, RunStatus::Incomplete);
    assert_eq!(run.readings_taken(), 4);
    assert!(run.flatten().is_none());
}

#[test]
fn cancel_before_first_reading_discards_record() {
    let dir = tempdir().expect("tmp dir");
    let session = session(dir.path());
    let url = session.document_path("100g");
    let mut store = WeighingStore::open(&url, SCHEME).expect("open");
    let mut sequencer = WeighingSequencer::new(
        &session,
        balance(BalanceMode::ManualEntry),
        FixedLogger::steady(20.0, 50.0),
        SteppedClock::new(Duration::from_secs(30)),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = sequencer
        .run(&mut store, &request(3), &cancel, &mut NoopObserver)
        .expect("run");
    assert_eq!(outcome, SequenceOutcome::Aborted { run_id: 3, readings: 0 });
    assert!(store.measurement_run(3).expect("read").is_none());
}

#[test]
fn missing_post_series_leaves_ambient_unknown() {
    let dir = tempdir().expect("tmp dir");
    let session = session(dir.path());
    let mut store = WeighingStore::open(session.document_path("100g"), SCHEME).expect("open");
    let mut logger = FixedLogger::steady(20.0, 50.0);
    logger.series = None;
    let mut sequencer = WeighingSequencer::new(
        &session,
        balance(BalanceMode::ManualEntry),
        logger,
        SteppedClock::new(Duration::from_secs(30)),
    );
    let outcome = sequencer
        .run(&mut store, &request(1), &CancellationToken::new(), &mut NoopObserver)
        .expect("run");
    assert!(matches!(
        outcome,
        SequenceOutcome::Complete { ambient_ok: None, .. }
    ));

    let mut logger = FixedLogger::steady(20.0, 50.0);
    logger.series = Some(AmbientSeries {
        temperature: vec![19.5, 20.5],
        humidity: vec![50.0],
    });
    let mut sequencer = WeighingSequencer::new(
        &session,
        balance(BalanceMode::ManualEntry),
        logger,
        SteppedClock::new(Duration::from_secs(30)),
    );
    let outcome = sequencer
        .run(&mut store, &request(2), &CancellationToken::new(), &mut NoopObserver)
        .expect("run");
    assert!(matches!(
        outcome,
        SequenceOutcome::Complete { ambient_ok: Some(false), .. }
    ));
}

#[test]
fn unwritable_primary_falls_back_every_reading() {
    let dir = tempdir().expect("tmp dir");
    let blocker = dir.path().join("blocked");
    std::fs::write(&blocker, b"not a directory").expect("blocker");
    let session = session(dir.path());
    let url = blocker.join("client_100g.json");
    let mut store = WeighingStore::open(&url, SCHEME).expect("open");
    let mut sequencer = WeighingSequencer::new(
        &session,
        balance(BalanceMode::ManualEntry),
        FixedLogger::steady(20.0, 50.0),
        SteppedClock::new(Duration::from_secs(30)),
    );
    let outcome = sequencer
        .run(&mut store, &request(1), &CancellationToken::new(), &mut NoopObserver)
        .expect("run");
    let fallback = dir.path().join("fallback").join("client_100g.json");
    assert_eq!(
        outcome,
        SequenceOutcome::Complete {
            run_id: 1,
            ambient_ok: Some(true),
            saved_to: SaveTarget::Fallback(fallback.clone()),
        }
    );
    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&fallback).expect("fallback written"))
            .expect("json");
    assert!(saved["Circular Weighings"][SCHEME]["measurement_run_1"].is_object());
}

#[test]
fn failed_read_unloads_and_keeps_partial_grid() {
    let dir = tempdir().expect("tmp dir");
    let session = session(dir.path());
    let url = session.document_path("100g");
    let mut store = WeighingStore::open(&url, SCHEME).expect("open");
    let mut sequencer = WeighingSequencer::new(
        &session,
        FailingBalance::new(5),
        FixedLogger::steady(20.0, 50.0),
        SteppedClock::new(Duration::from_secs(30)),
    );
    let err = sequencer
        .run(&mut store, &request(1), &CancellationToken::new(), &mut NoopObserver)
        .expect_err("read failure");
    assert!(matches!(err, CwError::Instrument(_)));
    assert_eq!(err.info().code, "serial-timeout");
    assert!(!err.info().context.contains_key("seal_error"));
    assert_eq!(sequencer.state(), SequenceState::Aborted);
    assert_eq!(sequencer.balance().inner.handling_counts(), (5, 5));

    let reopened = WeighingStore::open(&url, SCHEME).expect("reopen");
    let run = reopened.measurement_run(1).expect("read").expect("run kept");
    assert_eq!(run.metadata.status, RunStatus::Incomplete);
    assert_eq!(run.readings_taken(), 4);
}

#[test]
fn failed_seal_keeps_the_read_error() {
    let dir = tempdir().expect("tmp dir");
    let session = session(dir.path());
    let url = session.document_path("100g");
    let mut store = WeighingStore::open(&url, SCHEME).expect("open");
    let mut balance = FailingBalance::new(3);
    balance.block = Some((url.clone(), session.config.persistence.fallback_dir.clone()));
    let mut sequencer = WeighingSequencer::new(
        &session,
        balance,
        FixedLogger::steady(20.0, 50.0),
        SteppedClock::new(Duration::from_secs(30)),
    );
    let err = sequencer
        .run(&mut store, &request(1), &CancellationToken::new(), &mut NoopObserver)
        .expect_err("read failure");
    assert!(matches!(err, CwError::Instrument(_)));
    assert_eq!(err.info().code, "serial-timeout");
    assert!(err.info().context.contains_key("seal_error"));
    assert_eq!(sequencer.balance().inner.handling_counts(), (3, 3));
}
