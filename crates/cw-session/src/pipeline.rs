use cw_accept::{
    counts_as_good, reconstruct_ledger, CriteriaProvider, RunAcceptanceTracker, RunAttempt,
    SchemeReport,
};
use cw_ambient::AmbientLogger;
use cw_core::{CwError, SessionContext, WeighingScheme};
use cw_seq::{
    Balance, CancellationToken, Clock, SequenceObserver, SequenceOutcome, SequenceRequest,
    WeighingSequencer,
};
use cw_store::WeighingStore;
use tracing::{info, warn};

use crate::analysis::analyse_and_record;

/// One scheme entry to be weighed in a session.
#[derive(Debug, Clone)]
pub struct SchemeJob {
    /// Scheme being weighed.
    pub scheme: WeighingScheme,
    /// Nominal mass in grams, used for the criteria lookup.
    pub nominal_mass_g: f64,
    /// Good runs required.
    pub target_good_runs: u32,
    /// Positions allocated for an auto-loading balance.
    pub allocated_positions: Option<Vec<usize>>,
}

/// Weighs runs of `job.scheme` until the good-run target is met, the
/// bad-run budget is spent or a run is refused or aborted.
///
/// The ledger is rebuilt from `store` first, so an interrupted session
/// resumes with the next free run id. Missing acceptance criteria fail
/// before any run is measured.
pub fn weigh_scheme_entry<B, L, C>(
    session: &SessionContext,
    store: &mut WeighingStore,
    sequencer: &mut WeighingSequencer<'_, B, L, C>,
    job: &SchemeJob,
    criteria: &dyn CriteriaProvider,
    cancel: &CancellationToken,
    observer: &mut dyn SequenceObserver,
) -> Result<SchemeReport, CwError>
where
    B: Balance,
    L: AmbientLogger,
    C: Clock,
{
    let mode = sequencer.balance().mode();
    let policy = &session.config.acceptance;
    criteria.lookup(sequencer.balance().identity(), job.nominal_mass_g)?;

    let ledger = reconstruct_ledger(store, policy)?;
    let mut tracker = RunAcceptanceTracker::new(job.target_good_runs, ledger);
    let report = tracker.drive(|run_id| {
        let request = SequenceRequest {
            scheme: job.scheme.clone(),
            run_id,
            nominal_mass_g: job.nominal_mass_g,
            allocated_positions: job.allocated_positions.clone(),
        };
        match sequencer.run(store, &request, cancel, observer)? {
            SequenceOutcome::NotStarted(reason) => {
                warn!(run_id, ?reason, "run not started");
                Ok(RunAttempt::Interrupted { recorded: false })
            }
            SequenceOutcome::Aborted { readings, .. } => Ok(RunAttempt::Interrupted {
                recorded: readings > 0,
            }),
            SequenceOutcome::Complete { .. } => {
                match analyse_and_record(store, &job.scheme, run_id, session, criteria) {
                    Ok((record, _)) => {
                        let meta = &record.metadata;
                        if counts_as_good(meta.accepted, meta.exclude, mode, policy) {
                            Ok(RunAttempt::Good)
                        } else {
                            Ok(RunAttempt::Bad)
                        }
                    }
                    Err(CwError::Numerical(info)) => {
                        warn!(run_id, error = %info, "analysis failed, run counted as bad");
                        Ok(RunAttempt::Bad)
                    }
                    Err(other) => Err(other),
                }
            }
        }
    })?;
    info!(
        scheme_entry = job.scheme.scheme_entry(),
        outcome = ?report.outcome,
        good_runs = report.good_runs,
        bad_runs = report.bad_runs,
        "scheme entry finished"
    );
    Ok(report)
}
