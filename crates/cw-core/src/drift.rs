//! Drift model orders and the time basis used to fit them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{CwError, ErrorInfo};

/// Polynomial order of the drift term added to the least-squares model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DriftOrder {
    /// Group effects only.
    #[serde(rename = "no drift")]
    NoDrift,
    /// Adds a `t` regressor.
    #[serde(rename = "linear drift")]
    Linear,
    /// Adds `t` and `t^2` regressors.
    #[serde(rename = "quadratic drift")]
    Quadratic,
    /// Adds `t`, `t^2` and `t^3` regressors.
    #[serde(rename = "cubic drift")]
    Cubic,
}

impl DriftOrder {
    /// All orders in ascending polynomial degree.
    pub const ALL: [DriftOrder; 4] = [
        DriftOrder::NoDrift,
        DriftOrder::Linear,
        DriftOrder::Quadratic,
        DriftOrder::Cubic,
    ];

    /// Number of drift regressor columns.
    pub fn degree(&self) -> usize {
        match self {
            DriftOrder::NoDrift => 0,
            DriftOrder::Linear => 1,
            DriftOrder::Quadratic => 2,
            DriftOrder::Cubic => 3,
        }
    }

    /// Returns the order with the given degree, if any.
    pub fn from_degree(degree: usize) -> Option<Self> {
        Self::ALL.get(degree).copied()
    }

    /// Label used as document key.
    pub fn label(&self) -> &'static str {
        match self {
            DriftOrder::NoDrift => "no drift",
            DriftOrder::Linear => "linear drift",
            DriftOrder::Quadratic => "quadratic drift",
            DriftOrder::Cubic => "cubic drift",
        }
    }
}

impl fmt::Display for DriftOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DriftOrder {
    type Err = CwError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s.trim().to_ascii_lowercase();
        let order = match normalised.as_str() {
            "0" | "none" | "no drift" | "no-drift" => DriftOrder::NoDrift,
            "1" | "linear" | "linear drift" => DriftOrder::Linear,
            "2" | "quadratic" | "quadratic drift" => DriftOrder::Quadratic,
            "3" | "cubic" | "cubic drift" => DriftOrder::Cubic,
            _ => {
                return Err(CwError::Configuration(
                    ErrorInfo::new("unknown-drift", "unrecognised drift order")
                        .with_context("drift", s),
                ))
            }
        };
        Ok(order)
    }
}

/// Time basis of the drift regressors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Trend {
    /// Unit-spaced reading indices were synthesised.
    Reading,
    /// Elapsed minutes since the first reading.
    Minute,
}

impl Trend {
    /// Label describing the time basis.
    pub fn label(&self) -> &'static str {
        match self {
            Trend::Reading => "reading",
            Trend::Minute => "minute",
        }
    }
}
