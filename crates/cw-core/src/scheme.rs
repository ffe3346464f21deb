//! Scheme-entry parsing and cycle bookkeeping.
//!
//! A scheme entry is a whitespace separated list of weight groups, each group
//! being one or more weight identifiers joined by `+`, e.g. `"1a 1b+1c 1d"`.
//! The number of groups fixes the number of cycles through a lookup table.

use serde::{Deserialize, Serialize};

use crate::errors::{CwError, ErrorInfo};

/// Smallest supported number of weight groups.
pub const MIN_WEIGHT_GROUPS: usize = 2;
/// Largest supported number of weight groups.
pub const MAX_WEIGHT_GROUPS: usize = 5;

/// Number of cycles required for a circular weighing of `num_wtgrps` groups.
pub fn cycles_for(num_wtgrps: usize) -> Option<usize> {
    match num_wtgrps {
        2 => Some(5),
        3 => Some(4),
        4 => Some(3),
        5 => Some(3),
        _ => None,
    }
}

/// Ordered weight groups of one circular weighing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeighingScheme {
    scheme_entry: String,
    weight_groups: Vec<String>,
    num_cycles: usize,
}

impl WeighingScheme {
    /// Parses a scheme entry into its weight groups.
    pub fn parse(scheme_entry: &str) -> Result<Self, CwError> {
        let weight_groups: Vec<String> =
            scheme_entry.split_whitespace().map(str::to_string).collect();
        let num_cycles = cycles_for(weight_groups.len()).ok_or_else(|| {
            CwError::Configuration(
                ErrorInfo::new(
                    "scheme-group-count",
                    "no drift-cycle count is defined for this number of weight groups",
                )
                .with_context("scheme_entry", scheme_entry)
                .with_context("num_wtgrps", weight_groups.len().to_string())
                .with_hint("use between 2 and 5 weight groups"),
            )
        })?;
        for group in &weight_groups {
            if group.split('+').any(|id| id.is_empty()) {
                return Err(CwError::Configuration(
                    ErrorInfo::new("scheme-empty-weight", "weight group has an empty identifier")
                        .with_context("scheme_entry", scheme_entry)
                        .with_context("group", group.as_str()),
                ));
            }
        }
        Ok(Self {
            scheme_entry: weight_groups.join(" "),
            weight_groups,
            num_cycles,
        })
    }

    /// Normalised scheme entry (groups separated by single spaces).
    pub fn scheme_entry(&self) -> &str {
        &self.scheme_entry
    }

    /// Weight groups in loading order.
    pub fn weight_groups(&self) -> &[String] {
        &self.weight_groups
    }

    /// Number of weight groups.
    pub fn num_wtgrps(&self) -> usize {
        self.weight_groups.len()
    }

    /// Number of cycles through all groups.
    pub fn num_cycles(&self) -> usize {
        self.num_cycles
    }

    /// Total number of readings, `num_cycles * num_wtgrps`.
    pub fn num_readings(&self) -> usize {
        self.num_cycles * self.num_wtgrps()
    }

    /// Weight identifiers making up the group at `index`.
    pub fn weights_in(&self, index: usize) -> Vec<&str> {
        self.weight_groups
            .get(index)
            .map(|group| group.split('+').collect())
            .unwrap_or_default()
    }

    /// Index pairs `(plus, minus)` for which differences are reported.
    ///
    /// Adjacent groups in loading order, closing the loop for three or more
    /// groups. Two groups yield a single pair.
    pub fn pairs(&self) -> Vec<(usize, usize)> {
        let n = self.num_wtgrps();
        if n == 2 {
            return vec![(0, 1)];
        }
        (0..n).map(|i| (i, (i + 1) % n)).collect()
    }
}
