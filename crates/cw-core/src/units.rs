//! Mass units reported by balances.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{CwError, ErrorInfo};

/// Unit in which a balance reports its readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MassUnit {
    /// Kilograms.
    #[serde(rename = "kg")]
    Kilogram,
    /// Grams.
    #[serde(rename = "g")]
    Gram,
    /// Milligrams.
    #[serde(rename = "mg")]
    Milligram,
    /// Micrograms.
    #[serde(rename = "ug", alias = "µg")]
    Microgram,
}

impl MassUnit {
    /// Multiplier converting a value in this unit to micrograms.
    pub fn micrograms_per_unit(&self) -> f64 {
        match self {
            MassUnit::Kilogram => 1e9,
            MassUnit::Gram => 1e6,
            MassUnit::Milligram => 1e3,
            MassUnit::Microgram => 1.0,
        }
    }

    /// Converts `value` expressed in this unit to micrograms.
    pub fn to_micrograms(&self, value: f64) -> f64 {
        value * self.micrograms_per_unit()
    }

    /// Short symbol used in documents and logs.
    pub fn symbol(&self) -> &'static str {
        match self {
            MassUnit::Kilogram => "kg",
            MassUnit::Gram => "g",
            MassUnit::Milligram => "mg",
            MassUnit::Microgram => "ug",
        }
    }
}

impl fmt::Display for MassUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for MassUnit {
    type Err = CwError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "kg" => Ok(MassUnit::Kilogram),
            "g" => Ok(MassUnit::Gram),
            "mg" => Ok(MassUnit::Milligram),
            "ug" | "µg" | "μg" => Ok(MassUnit::Microgram),
            other => Err(CwError::Configuration(
                ErrorInfo::new("unknown-unit", "unrecognised mass unit")
                    .with_context("unit", other)
                    .with_hint("expected one of kg, g, mg, ug"),
            )),
        }
    }
}
