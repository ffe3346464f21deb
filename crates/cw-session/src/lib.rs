#![deny(missing_docs)]
#![doc = "Weighing-session pipeline: measure runs, analyse them, judge acceptance and persist the results until a scheme entry has enough good runs."]

/// Analysis of stored runs into analysis records.
pub mod analysis;
/// Ledger-driven loop over runs of one scheme entry.
pub mod pipeline;

pub use analysis::analyse_and_record;
pub use pipeline::{weigh_scheme_entry, SchemeJob};
