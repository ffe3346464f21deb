//! Measurement sequencing state machine.
//!
//! `Init -> Cycling(cycle, position) -> Complete | Aborted`. The pre-run
//! ambient gate and the position allocation are both checked before any
//! record exists, so a refused run leaves the document untouched. Once
//! cycling, the document is persisted after every reading.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;
use cw_ambient::{check_post, check_pre, AmbientLogger};
use cw_core::{
    AmbientPre, CwError, MassUnit, MeasurementRun, Observation, RunMetadata, RunStatus,
    SessionContext, WeighingScheme,
};
use cw_store::{SaveTarget, WeighingStore};
use tracing::{debug, info, warn};

use crate::balance::Balance;
use crate::cancel::CancellationToken;
use crate::clock::{elapsed_minutes, Clock};

/// Where the sequencer currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceState {
    /// Nothing recorded yet.
    Init,
    /// About to take the reading at `(cycle, position)`, both 0-based.
    Cycling {
        /// Current cycle.
        cycle: usize,
        /// Current weight-group position in the scheme.
        position: usize,
    },
    /// Every cell filled and the run sealed.
    Complete,
    /// Stopped before the grid was filled.
    Aborted,
}

/// One run to be measured.
#[derive(Debug, Clone)]
pub struct SequenceRequest {
    /// Scheme being weighed.
    pub scheme: WeighingScheme,
    /// Run identifier within the scheme entry.
    pub run_id: u32,
    /// Nominal mass in grams, recorded in the run metadata.
    pub nominal_mass_g: f64,
    /// Externally allocated positions, one per weight group. Required for
    /// auto-loading balances and ignored otherwise.
    pub allocated_positions: Option<Vec<usize>>,
}

/// Why a run was declined before any record was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotStartedReason {
    /// Pre-run ambient conditions were unavailable or out of bounds.
    AmbientGateClosed,
    /// An auto-loading balance had no valid position allocation.
    PositionsUnavailable,
}

/// Result of one sequencer run.
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceOutcome {
    /// Declined in `Init`; the document was not modified.
    NotStarted(NotStartedReason),
    /// All readings taken and the run sealed complete.
    Complete {
        /// Run identifier.
        run_id: u32,
        /// Post-run ambient verdict.
        ambient_ok: Option<bool>,
        /// Where the final save landed.
        saved_to: SaveTarget,
    },
    /// Stopped by a cancellation request or an operator decline.
    Aborted {
        /// Run identifier.
        run_id: u32,
        /// Readings recorded before the abort.
        readings: usize,
    },
}

impl SequenceOutcome {
    /// True when the outcome interrupts the remaining runs of a scheme.
    pub fn interrupts_session(&self) -> bool {
        !matches!(self, SequenceOutcome::Complete { .. })
    }
}

/// Progress callbacks; every method defaults to doing nothing.
pub trait SequenceObserver {
    /// Called before the group at `(cycle, position)` is loaded.
    fn on_progress(&mut self, _cycle: usize, _position: usize, _num_cycles: usize, _num_wtgrps: usize) {}

    /// Called after each stable reading.
    fn on_reading(&mut self, _value: f64, _unit: MassUnit) {}

    /// Called on every state transition.
    fn on_state(&mut self, _state: SequenceState) {}
}

/// Observer that ignores every callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SequenceObserver for NoopObserver {}

enum LoopEnd {
    Filled,
    Cancelled,
}

/// Drives a balance through the readings of one run at a time.
pub struct WeighingSequencer<'a, B, L, C> {
    session: &'a SessionContext,
    balance: B,
    logger: L,
    clock: C,
    state: SequenceState,
}

impl<'a, B, L, C> WeighingSequencer<'a, B, L, C>
where
    B: Balance,
    L: AmbientLogger,
    C: Clock,
{
    /// Creates a sequencer bound to the session's configuration.
    pub fn new(session: &'a SessionContext, balance: B, logger: L, clock: C) -> Self {
        Self {
            session,
            balance,
            logger,
            clock,
            state: SequenceState::Init,
        }
    }

    /// Current state.
    pub fn state(&self) -> SequenceState {
        self.state
    }

    /// The balance being driven.
    pub fn balance(&self) -> &B {
        &self.balance
    }

    /// Consumes the sequencer, returning its collaborators.
    pub fn into_parts(self) -> (B, L, C) {
        (self.balance, self.logger, self.clock)
    }

    fn transition(&mut self, state: SequenceState, observer: &mut dyn SequenceObserver) {
        self.state = state;
        observer.on_state(state);
    }

    fn persist(&self, store: &WeighingStore) -> Result<SaveTarget, CwError> {
        store.save_with_fallback(&self.session.config.persistence.fallback_dir)
    }

    fn positions_for(&self, request: &SequenceRequest) -> Option<Vec<usize>> {
        let n = request.scheme.num_wtgrps();
        if !self.balance.mode().requires_position_allocation() {
            return Some((1..=n).collect());
        }
        let allocated = request.allocated_positions.as_ref()?;
        let mut seen = allocated.clone();
        seen.sort_unstable();
        seen.dedup();
        if allocated.len() != n || seen.len() != n || seen.first() == Some(&0) {
            return None;
        }
        Some(allocated.clone())
    }

    /// Measures one run of `request.scheme` into `store`.
    ///
    /// Cancellation is observed at reading boundaries only. Collaborator
    /// failures are returned as errors after any partial grid has been
    /// sealed `Incomplete` and persisted.
    pub fn run(
        &mut self,
        store: &mut WeighingStore,
        request: &SequenceRequest,
        cancel: &CancellationToken,
        observer: &mut dyn SequenceObserver,
    ) -> Result<SequenceOutcome, CwError> {
        self.transition(SequenceState::Init, observer);
        let scheme = &request.scheme;

        let Some(pre) = check_pre(&self.logger, &self.session.config.ambient) else {
            warn!(run_id = request.run_id, "ambient gate closed, run not started");
            return Ok(SequenceOutcome::NotStarted(NotStartedReason::AmbientGateClosed));
        };
        let Some(positions) = self.positions_for(request) else {
            warn!(run_id = request.run_id, "no position allocation, run not started");
            return Ok(SequenceOutcome::NotStarted(NotStartedReason::PositionsUnavailable));
        };

        let mut run = MeasurementRun::new(scheme, self.metadata(request, &positions, pre));
        store.put_measurement_run(request.run_id, &run)?;
        self.persist(store)?;
        info!(
            scheme_entry = scheme.scheme_entry(),
            run_id = request.run_id,
            balance = self.balance.identity(),
            "circular weighing started"
        );

        let end = self.cycle(store, request, &positions, &mut run, cancel, observer);
        match end {
            Ok(LoopEnd::Filled) => self.seal_complete(store, request.run_id, run, observer),
            Ok(LoopEnd::Cancelled) => self.seal_aborted(store, request.run_id, run, observer),
            Err(err) => {
                warn!(run_id = request.run_id, error = %err, "collaborator failure during run");
                match self.seal_aborted(store, request.run_id, run, observer) {
                    Ok(_) => Err(err),
                    Err(seal) => Err(err.with_context("seal_error", seal.to_string())),
                }
            }
        }
    }

    fn metadata(
        &self,
        request: &SequenceRequest,
        positions: &[usize],
        pre: AmbientPre,
    ) -> RunMetadata {
        let positions: BTreeMap<String, usize> = request
            .scheme
            .weight_groups()
            .iter()
            .cloned()
            .zip(positions.iter().copied())
            .collect();
        RunMetadata {
            run_id: request.run_id,
            balance: self.balance.identity().to_string(),
            balance_mode: self.balance.mode(),
            unit: self.balance.unit(),
            nominal_mass_g: request.nominal_mass_g,
            positions,
            created_at: Utc::now(),
            ambient_pre: Some(pre),
            ambient_post: None,
            status: RunStatus::InProgress,
        }
    }

    fn cycle(
        &mut self,
        store: &mut WeighingStore,
        request: &SequenceRequest,
        positions: &[usize],
        run: &mut MeasurementRun,
        cancel: &CancellationToken,
        observer: &mut dyn SequenceObserver,
    ) -> Result<LoopEnd, CwError> {
        let scheme = &request.scheme;
        let mut first: Option<Instant> = None;
        for cycle in 0..scheme.num_cycles() {
            for (position, group) in scheme.weight_groups().iter().enumerate() {
                if cancel.is_cancelled() {
                    return Ok(LoopEnd::Cancelled);
                }
                self.transition(SequenceState::Cycling { cycle, position }, observer);
                observer.on_progress(cycle, position, scheme.num_cycles(), scheme.num_wtgrps());

                let slot = positions[position];
                self.balance.load(group, slot)?;
                let step = self.take_reading(
                    store,
                    request.run_id,
                    run,
                    (cycle, position),
                    &mut first,
                    observer,
                );
                let unloaded = self.balance.unload(group, slot);
                match step {
                    Err(err) => {
                        if let Err(unload) = unloaded {
                            warn!(
                                group = group.as_str(),
                                slot,
                                error = %unload,
                                "unload after failure failed"
                            );
                            return Err(err.with_context("unload_error", unload.to_string()));
                        }
                        return Err(err);
                    }
                    Ok(false) => {
                        unloaded?;
                        return Ok(LoopEnd::Cancelled);
                    }
                    Ok(true) => unloaded?,
                }
            }
        }
        Ok(LoopEnd::Filled)
    }

    /// Reads the loaded group and persists it; `false` when the read was declined.
    fn take_reading(
        &mut self,
        store: &mut WeighingStore,
        run_id: u32,
        run: &mut MeasurementRun,
        (cycle, position): (usize, usize),
        first: &mut Option<Instant>,
        observer: &mut dyn SequenceObserver,
    ) -> Result<bool, CwError> {
        let Some(value) = self.balance.read_stabilized()? else {
            return Ok(false);
        };
        let now = self.clock.now();
        let start = *first.get_or_insert(now);
        let minutes = elapsed_minutes(start, now);
        observer.on_reading(value, self.balance.unit());
        debug!(cycle, position, value, minutes, "reading");

        run.record(cycle, position, Observation(minutes, value))?;
        store.put_measurement_run(run_id, run)?;
        self.persist(store)?;
        Ok(true)
    }

    fn seal_complete(
        &mut self,
        store: &mut WeighingStore,
        run_id: u32,
        mut run: MeasurementRun,
        observer: &mut dyn SequenceObserver,
    ) -> Result<SequenceOutcome, CwError> {
        let post = run
            .metadata
            .ambient_pre
            .as_ref()
            .map(|pre| check_post(&self.logger, &self.session.config.ambient, pre));
        let ambient_ok = post.as_ref().and_then(|post| post.ambient_ok);
        run.metadata.ambient_post = post;
        run.metadata.status = RunStatus::Complete;
        store.put_measurement_run(run_id, &run)?;
        let saved_to = self.persist(store)?;
        self.transition(SequenceState::Complete, observer);
        info!(run_id, ?ambient_ok, "circular weighing complete");
        Ok(SequenceOutcome::Complete {
            run_id,
            ambient_ok,
            saved_to,
        })
    }

    fn seal_aborted(
        &mut self,
        store: &mut WeighingStore,
        run_id: u32,
        mut run: MeasurementRun,
        observer: &mut dyn SequenceObserver,
    ) -> Result<SequenceOutcome, CwError> {
        let readings = run.readings_taken();
        if readings > 0 {
            run.metadata.status = RunStatus::Incomplete;
            store.put_measurement_run(run_id, &run)?;
        } else {
            store.discard_measurement_run(run_id)?;
        }
        self.persist(store)?;
        self.transition(SequenceState::Aborted, observer);
        warn!(run_id, readings, "circular weighing aborted");
        Ok(SequenceOutcome::Aborted { run_id, readings })
    }
}
