#![deny(missing_docs)]
#![doc = "Run acceptance for circular weighings: criteria lookup, per-run verdicts, ledger reconstruction and the bounded good-run loop."]

pub mod criteria;
pub mod ledger;
/// Good-run loop with a fixed bad-run budget.
pub mod tracker;
/// Acceptance verdicts and good-run counting.
pub mod verdict;

pub use criteria::{AcceptanceCriteria, CriteriaProvider, CriteriaTable};
pub use ledger::{reconstruct_ledger, RunLedger};
pub use tracker::{RunAcceptanceTracker, RunAttempt, SchemeOutcome, SchemeReport, BAD_RUN_BUDGET};
pub use verdict::{closure_within, counts_as_good, evaluate, Evidence, Verdict};
