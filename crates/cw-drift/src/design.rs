use cw_core::{CwError, DriftOrder, ErrorInfo, Trend};
use nalgebra::DMatrix;

/// Nested regression design matrices for drift orders 0 to 3.
///
/// Row `k` of every matrix describes reading `k` (cycle `k / n`, position
/// `k % n`). The first `n` columns one-hot encode the weight group; each
/// higher order appends one more power of the time regressor, so
/// `matrix(Cubic)` contains `matrix(Quadratic)` as its leading columns.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrices {
    trend: Trend,
    times: Vec<f64>,
    num_wtgrps: usize,
    matrices: Vec<DMatrix<f64>>,
}

impl DesignMatrices {
    /// Builds the four matrices for `num_cycles * num_wtgrps` readings.
    ///
    /// Absent or all-zero `times` are replaced by unit-spaced reading indices.
    pub fn build(
        num_cycles: usize,
        num_wtgrps: usize,
        times: Option<&[f64]>,
    ) -> Result<Self, CwError> {
        let num_readings = num_cycles * num_wtgrps;
        let (trend, times) = match times {
            Some(values) if values.iter().any(|t| *t != 0.0) => {
                if values.len() != num_readings {
                    return Err(CwError::Numerical(
                        ErrorInfo::new("design-time-length", "time vector does not match readings")
                            .with_context("expected", num_readings.to_string())
                            .with_context("actual", values.len().to_string()),
                    ));
                }
                (Trend::Minute, values.to_vec())
            }
            _ => (
                Trend::Reading,
                (0..num_readings).map(|idx| idx as f64).collect(),
            ),
        };

        let base = DMatrix::<f64>::from_fn(num_readings, num_wtgrps, |row, col| {
            if row % num_wtgrps == col {
                1.0
            } else {
                0.0
            }
        });

        let mut matrices = Vec::with_capacity(DriftOrder::ALL.len());
        let mut current = base;
        matrices.push(current.clone());
        for power in 1..DriftOrder::ALL.len() {
            let col = current.ncols();
            current = current.insert_column(col, 0.0);
            for (row, t) in times.iter().enumerate() {
                current[(row, col)] = t.powi(power as i32);
            }
            matrices.push(current.clone());
        }

        Ok(Self {
            trend,
            times,
            num_wtgrps,
            matrices,
        })
    }

    /// Time basis of the drift columns.
    pub fn trend(&self) -> Trend {
        self.trend
    }

    /// Time values used for the drift columns.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Number of weight-group columns.
    pub fn num_wtgrps(&self) -> usize {
        self.num_wtgrps
    }

    /// Number of rows (readings).
    pub fn num_readings(&self) -> usize {
        self.times.len()
    }

    /// Design matrix for the given drift order.
    pub fn matrix(&self, order: DriftOrder) -> &DMatrix<f64> {
        &self.matrices[order.degree()]
    }
}
