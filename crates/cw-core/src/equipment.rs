//! Balance capability modes.

use serde::{Deserialize, Serialize};

/// How a balance is loaded and read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BalanceMode {
    /// Operator loads weights and types the displayed value.
    ManualEntry,
    /// Operator loads weights, readings come over a computer interface.
    ComputerInterface,
    /// A mass handler loads weights from externally allocated positions.
    AutoLoading,
}

impl BalanceMode {
    /// Whether the weight-group positions must be allocated before cycling.
    pub fn requires_position_allocation(&self) -> bool {
        matches!(self, BalanceMode::AutoLoading)
    }

    /// Whether the balance runs unattended (enables the exclude rule).
    pub fn is_unattended(&self) -> bool {
        matches!(self, BalanceMode::AutoLoading)
    }
}
