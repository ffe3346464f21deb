//! Good-run ledger rebuilt from a persisted document.

use cw_core::{AcceptancePolicy, CwError, RunStatus};
use cw_store::WeighingStore;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::verdict::counts_as_good;

/// Progress of a scheme entry towards its good-run target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLedger {
    /// Runs counted towards the target.
    pub good_runs: u32,
    /// Identifier the next run should use.
    pub next_run_id: u32,
}

impl Default for RunLedger {
    fn default() -> Self {
        Self {
            good_runs: 0,
            next_run_id: 1,
        }
    }
}

/// Scans runs `1, 2, ...` until the first missing id.
///
/// Only complete runs with an analysis record can count as good. Each run is
/// judged under the balance mode recorded in its own metadata.
pub fn reconstruct_ledger(
    store: &WeighingStore,
    policy: &AcceptancePolicy,
) -> Result<RunLedger, CwError> {
    let mut ledger = RunLedger::default();
    while let Some(run) = store.measurement_run(ledger.next_run_id)? {
        if run.metadata.status == RunStatus::Complete {
            if let Some(analysis) = store.analysis_record(ledger.next_run_id)? {
                let meta = &analysis.metadata;
                let mode = run.metadata.balance_mode;
                if counts_as_good(meta.accepted, meta.exclude, mode, policy) {
                    ledger.good_runs += 1;
                }
            }
        }
        ledger.next_run_id += 1;
    }
    info!(
        scheme_entry = store.scheme_entry(),
        good_runs = ledger.good_runs,
        next_run_id = ledger.next_run_id,
        "reconstructed run ledger"
    );
    Ok(ledger)
}
