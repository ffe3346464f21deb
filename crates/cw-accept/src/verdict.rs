//! Per-run acceptance verdicts.

use cw_core::{AcceptancePolicy, BalanceMode, MassDifference};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::criteria::AcceptanceCriteria;

/// Analysis results a verdict is based on.
#[derive(Debug, Clone, Copy)]
pub struct Evidence<'a> {
    /// Stdev of the selected drift order in micrograms.
    pub stdev_ug: f64,
    /// Post-run ambient verdict.
    pub ambient_ok: Option<bool>,
    /// Drift-corrected pairwise differences.
    pub differences: &'a [MassDifference],
}

/// Acceptance outcome of one analysed run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Stdev below the limit, ambient known good and the loop closed.
    pub accepted: bool,
    /// Unattended run whose stdev exceeds the exclude factor.
    pub exclude: bool,
    /// Sum of the signed differences around the loop.
    pub loop_closure: f64,
    /// Whether the loop closure was within tolerance.
    pub closure_ok: bool,
}

/// Loop closure within `tolerance`, relative to the summed magnitudes
/// floored at one.
pub fn closure_within(differences: &[MassDifference], closure: f64, tolerance: f64) -> bool {
    let scale = differences
        .iter()
        .map(|d| d.difference().abs())
        .sum::<f64>()
        .max(1.0);
    closure.is_finite() && closure.abs() <= tolerance * scale
}

/// Judges one run against its criteria.
pub fn evaluate(
    evidence: &Evidence<'_>,
    criteria: &AcceptanceCriteria,
    mode: BalanceMode,
    policy: &AcceptancePolicy,
) -> Verdict {
    let loop_closure = cw_core::loop_closure(evidence.differences);
    let closure_ok = closure_within(evidence.differences, loop_closure, policy.closure_tolerance);
    let stdev_ok = evidence.stdev_ug < criteria.max_stdev_ug;
    let accepted = stdev_ok && evidence.ambient_ok == Some(true) && closure_ok;
    let exclude =
        mode.is_unattended() && evidence.stdev_ug > policy.exclude_factor * criteria.max_stdev_ug;
    debug!(
        stdev_ug = evidence.stdev_ug,
        max_stdev_ug = criteria.max_stdev_ug,
        ambient_ok = ?evidence.ambient_ok,
        loop_closure,
        accepted,
        exclude,
        "run verdict"
    );
    Verdict {
        accepted,
        exclude,
        loop_closure,
        closure_ok,
    }
}

/// Whether a run with the given stored verdict counts towards the target.
///
/// Unattended runs that failed acceptance are tolerated unless excluded;
/// excluded runs count only when the policy says so.
pub fn counts_as_good(
    accepted: Option<bool>,
    exclude: bool,
    mode: BalanceMode,
    policy: &AcceptancePolicy,
) -> bool {
    if exclude {
        return policy.count_excluded_runs;
    }
    accepted == Some(true) || mode.is_unattended()
}
