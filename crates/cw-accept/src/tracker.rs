//! Bounded loop requesting runs until enough are good.

use cw_core::CwError;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ledger::RunLedger;

/// Rejected runs tolerated per scheme entry and session.
pub const BAD_RUN_BUDGET: u32 = 6;

/// What became of one requested run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunAttempt {
    /// Analysed and counted towards the target.
    Good,
    /// Analysed and rejected.
    Bad,
    /// Not started or aborted; stops the session for this scheme entry.
    Interrupted {
        /// Whether a record was left under the requested id.
        recorded: bool,
    },
}

/// Final state of a scheme entry for this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemeOutcome {
    /// The good-run target was reached.
    Completed,
    /// The bad-run budget ran out first.
    Failed,
    /// A run was refused or aborted.
    Interrupted,
}

/// Summary returned to the caller instead of raising on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeReport {
    /// How the loop ended.
    pub outcome: SchemeOutcome,
    /// Good runs, including those found in the document.
    pub good_runs: u32,
    /// Runs rejected during this session.
    pub bad_runs: u32,
    /// Identifier the next run would use.
    pub next_run_id: u32,
}

/// Drives runs of one scheme entry towards `target` good runs.
#[derive(Debug, Clone)]
pub struct RunAcceptanceTracker {
    target: u32,
    ledger: RunLedger,
    bad_runs: u32,
}

impl RunAcceptanceTracker {
    /// Starts from a reconstructed ledger.
    pub fn new(target: u32, ledger: RunLedger) -> Self {
        Self {
            target,
            ledger,
            bad_runs: 0,
        }
    }

    /// Current ledger.
    pub fn ledger(&self) -> RunLedger {
        self.ledger
    }

    /// Rejected runs so far.
    pub fn bad_runs(&self) -> u32 {
        self.bad_runs
    }

    fn report(&self, outcome: SchemeOutcome) -> SchemeReport {
        SchemeReport {
            outcome,
            good_runs: self.ledger.good_runs,
            bad_runs: self.bad_runs,
            next_run_id: self.ledger.next_run_id,
        }
    }

    /// Calls `attempt(run_id)` until the target is reached, the bad-run
    /// budget is spent or a run is interrupted.
    pub fn drive<F>(&mut self, mut attempt: F) -> Result<SchemeReport, CwError>
    where
        F: FnMut(u32) -> Result<RunAttempt, CwError>,
    {
        while self.ledger.good_runs < self.target {
            if self.bad_runs >= BAD_RUN_BUDGET {
                warn!(
                    bad_runs = self.bad_runs,
                    good_runs = self.ledger.good_runs,
                    target = self.target,
                    "bad-run budget exhausted"
                );
                return Ok(self.report(SchemeOutcome::Failed));
            }
            let run_id = self.ledger.next_run_id;
            match attempt(run_id)? {
                RunAttempt::Good => {
                    self.ledger.good_runs += 1;
                    self.ledger.next_run_id += 1;
                }
                RunAttempt::Bad => {
                    self.bad_runs += 1;
                    self.ledger.next_run_id += 1;
                }
                RunAttempt::Interrupted { recorded } => {
                    if recorded {
                        self.ledger.next_run_id += 1;
                    }
                    warn!(run_id, "run interrupted, stopping scheme entry");
                    return Ok(self.report(SchemeOutcome::Interrupted));
                }
            }
        }
        info!(good_runs = self.ledger.good_runs, bad_runs = self.bad_runs, "good-run target reached");
        Ok(self.report(SchemeOutcome::Completed))
    }
}
