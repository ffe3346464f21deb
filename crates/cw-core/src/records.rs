//! Persisted measurement and analysis records.
//!
//! Both records are keyed by `(scheme_entry, run_id)` inside the document
//! container `"Circular Weighings"`; the record names are produced by
//! [`measurement_key`] and [`analysis_key`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::drift::{DriftOrder, Trend};
use crate::equipment::BalanceMode;
use crate::errors::{CwError, ErrorInfo};
use crate::scheme::WeighingScheme;
use crate::units::MassUnit;

/// Top-level container holding every scheme entry of a document.
pub const ROOT_CONTAINER: &str = "Circular Weighings";

/// Document key of the measurement run with the given id.
pub fn measurement_key(run_id: u32) -> String {
    format!("measurement_run_{run_id}")
}

/// Document key of the analysis of the run with the given id.
pub fn analysis_key(run_id: u32) -> String {
    format!("analysis_run_{run_id}")
}

/// One timed balance reading, serialised as `[time, reading]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation(pub f64, pub f64);

impl Observation {
    /// Minutes elapsed since the first reading of the run.
    pub fn time(&self) -> f64 {
        self.0
    }

    /// Balance reading in the run's unit.
    pub fn reading(&self) -> f64 {
        self.1
    }
}

/// Completion state of a measurement run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    /// Readings are still being collected (or the session crashed).
    InProgress,
    /// Every cell of the grid was filled and the post-run ambient check ran.
    Complete,
    /// The run was aborted after at least one reading.
    Incomplete,
}

/// Ambient conditions captured before a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbientPre {
    /// Timestamp reported by the logger for the averaged reading.
    pub start_time: DateTime<Utc>,
    /// Averaged temperature in degrees Celsius.
    pub temperature: f64,
    /// Averaged relative humidity in percent.
    pub humidity: f64,
}

/// Ambient envelope observed over the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbientPost {
    /// `[min, max]` temperature since the run started.
    pub temperature_range: Option<[f64; 2]>,
    /// `[min, max]` humidity since the run started.
    pub humidity_range: Option<[f64; 2]>,
    /// `Some(true)` within limits, `Some(false)` outside, `None` when no
    /// series could be retrieved.
    pub ambient_ok: Option<bool>,
}

/// Descriptive metadata of a measurement run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Run identifier within the scheme entry, starting at 1.
    pub run_id: u32,
    /// Identity of the balance used.
    pub balance: String,
    /// Loading and reading mode of the balance.
    pub balance_mode: BalanceMode,
    /// Unit of the readings.
    pub unit: MassUnit,
    /// Nominal mass of the weighing in grams.
    pub nominal_mass_g: f64,
    /// Weight group to balance position.
    pub positions: BTreeMap<String, usize>,
    /// Wall-clock time the run was created.
    pub created_at: DateTime<Utc>,
    /// Ambient conditions before the run.
    pub ambient_pre: Option<AmbientPre>,
    /// Ambient envelope over the run.
    #[serde(default)]
    pub ambient_post: Option<AmbientPost>,
    /// Completion state.
    pub status: RunStatus,
}

/// A single circular weighing attempt: a `[cycle][position]` grid of readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRun {
    /// Grid of observations, `None` for cells not yet read.
    pub data: Vec<Vec<Option<Observation>>>,
    /// Run metadata.
    pub metadata: RunMetadata,
}

impl MeasurementRun {
    /// Creates an empty grid sized for `scheme`.
    pub fn new(scheme: &WeighingScheme, metadata: RunMetadata) -> Self {
        Self {
            data: vec![vec![None; scheme.num_wtgrps()]; scheme.num_cycles()],
            metadata,
        }
    }

    /// Writes one observation into the grid.
    pub fn record(
        &mut self,
        cycle: usize,
        position: usize,
        observation: Observation,
    ) -> Result<(), CwError> {
        let cell = self
            .data
            .get_mut(cycle)
            .and_then(|row| row.get_mut(position))
            .ok_or_else(|| {
                CwError::Precondition(
                    ErrorInfo::new("grid-out-of-range", "reading outside the run grid")
                        .with_context("cycle", cycle.to_string())
                        .with_context("position", position.to_string()),
                )
            })?;
        *cell = Some(observation);
        Ok(())
    }

    /// Number of cells holding a reading.
    pub fn readings_taken(&self) -> usize {
        self.data.iter().flatten().filter(|cell| cell.is_some()).count()
    }

    /// True once the run has been sealed complete.
    pub fn is_complete(&self) -> bool {
        self.metadata.status == RunStatus::Complete
    }

    /// Times and readings in reading order, or `None` if any cell is empty.
    pub fn flatten(&self) -> Option<(Vec<f64>, Vec<f64>)> {
        let mut times = Vec::new();
        let mut readings = Vec::new();
        for cell in self.data.iter().flatten() {
            let observation = (*cell)?;
            times.push(observation.time());
            readings.push(observation.reading());
        }
        Some((times, readings))
    }
}

/// Signed difference between two weight groups, serialised as
/// `[plus, minus, difference, residual]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MassDifference(pub String, pub String, pub f64, pub f64);

impl MassDifference {
    /// Group on the plus side.
    pub fn plus(&self) -> &str {
        &self.0
    }

    /// Group on the minus side.
    pub fn minus(&self) -> &str {
        &self.1
    }

    /// `plus - minus` in the run's unit.
    pub fn difference(&self) -> f64 {
        self.2
    }

    /// Standard uncertainty of the difference.
    pub fn residual(&self) -> f64 {
        self.3
    }
}

/// Sum of the signed differences around a closed loop of weight groups.
///
/// Fewer than three differences cannot form a loop, so the closure is zero.
pub fn loop_closure(differences: &[MassDifference]) -> f64 {
    if differences.len() < 3 {
        return 0.0;
    }
    differences.iter().map(MassDifference::difference).sum()
}

/// Fitted drift coefficient and its standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftCoefficient {
    /// Coefficient value (unit per trend step to the given power).
    pub value: f64,
    /// Standard deviation from the variance-covariance matrix.
    pub stdev: f64,
}

/// Metadata of an analysis record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// Run the analysis refers to.
    pub run_id: u32,
    /// Time basis used for the drift regressors.
    pub trend: Trend,
    /// Unit of the differences.
    pub unit: MassUnit,
    /// Residual standard deviation of every fitted order.
    pub stdev: BTreeMap<DriftOrder, f64>,
    /// Order whose coefficients produced the differences.
    pub selected_drift: DriftOrder,
    /// Drift coefficients of the selected order.
    pub drift_coefficients: BTreeMap<String, DriftCoefficient>,
    /// Selected stdev in micrograms.
    pub stdev_ug: f64,
    /// Acceptance limit on the stdev, in micrograms.
    pub max_stdev_ug: Option<f64>,
    /// Reference balance standard deviation, in micrograms.
    pub balance_stdev_ug: Option<f64>,
    /// Post-run ambient verdict copied from the measurement run.
    pub ambient_ok: Option<bool>,
    /// Sum of the signed differences around the loop.
    pub loop_closure: f64,
    /// Whether the acceptance criteria were met.
    pub accepted: Option<bool>,
    /// Whether the run is excluded from the good-run count.
    #[serde(default)]
    pub exclude: bool,
    /// Time the analysis was produced.
    pub analysed_at: DateTime<Utc>,
}

/// Drift-corrected differences of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Pairwise differences.
    pub data: Vec<MassDifference>,
    /// Analysis metadata.
    pub metadata: AnalysisMetadata,
}
