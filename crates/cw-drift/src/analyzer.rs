use std::collections::BTreeMap;

use cw_core::records::loop_closure;
use cw_core::{
    CwError, DriftCoefficient, DriftOrder, ErrorInfo, MassDifference, MeasurementRun, Trend,
    WeighingScheme,
};
use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

use crate::design::DesignMatrices;

/// Smallest accepted ratio between the extreme singular values of the
/// column-normalised design matrix.
const RANK_TOLERANCE: f64 = 1e-10;

/// Relative margin a higher order must beat a lower one by to be auto-selected.
const SELECTION_MARGIN: f64 = 1e-9;

fn numerical_error(code: &str, message: impl Into<String>, order: DriftOrder) -> CwError {
    CwError::Numerical(ErrorInfo::new(code, message).with_context("drift", order.label()))
}

/// Least-squares fit of one drift order.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftFit {
    /// Order of the drift polynomial.
    pub order: DriftOrder,
    /// Fitted parameters: one per weight group followed by the drift terms.
    pub coefficients: DVector<f64>,
    /// `y - M x` for every reading.
    pub residuals: DVector<f64>,
    /// Residual standard deviation.
    pub stdev: f64,
    /// Degrees of freedom, `num_readings - (num_wtgrps + degree)`.
    pub dof: usize,
    /// Unscaled inverse normal matrix `(MᵀM)⁻¹`.
    pub inverse_normal: DMatrix<f64>,
}

impl DriftFit {
    /// Variance-covariance matrix of the coefficients.
    pub fn varcovar(&self) -> DMatrix<f64> {
        &self.inverse_normal * (self.stdev * self.stdev)
    }

    /// Standard uncertainty of `x[plus] - x[minus]`.
    pub fn difference_uncertainty(&self, plus: usize, minus: usize) -> f64 {
        let c = &self.inverse_normal;
        let variance = c[(plus, plus)] + c[(minus, minus)] - 2.0 * c[(plus, minus)];
        self.stdev * variance.max(0.0).sqrt()
    }
}

/// Fits `readings = M_d x` for a single drift order by the normal equations.
pub fn fit_order(
    design: &DesignMatrices,
    readings: &DVector<f64>,
    order: DriftOrder,
) -> Result<DriftFit, CwError> {
    let matrix = design.matrix(order);
    let params = matrix.ncols();
    let num_readings = matrix.nrows();
    if num_readings < params + 1 {
        return Err(CwError::Numerical(
            ErrorInfo::new("drift-dof", "not enough readings to fit this drift order")
                .with_context("drift", order.label())
                .with_context("num_readings", num_readings.to_string())
                .with_context("params", params.to_string()),
        ));
    }
    ensure_full_rank(matrix, order)?;

    let transpose = matrix.transpose();
    let normal = &transpose * matrix;
    let inverse_normal = normal
        .try_inverse()
        .ok_or_else(|| numerical_error("drift-singular", "normal matrix is singular", order))?;
    let coefficients = &inverse_normal * (&transpose * readings);
    let residuals = readings - matrix * &coefficients;
    let dof = num_readings - params;
    let stdev = (residuals.norm_squared() / dof as f64).sqrt();
    if !stdev.is_finite() {
        return Err(numerical_error(
            "drift-non-finite",
            "fit produced a non-finite residual deviation",
            order,
        ));
    }
    debug!(drift = order.label(), stdev, dof, "fitted drift model");
    Ok(DriftFit {
        order,
        coefficients,
        residuals,
        stdev,
        dof,
        inverse_normal,
    })
}

fn ensure_full_rank(matrix: &DMatrix<f64>, order: DriftOrder) -> Result<(), CwError> {
    let mut scaled = matrix.clone();
    for mut column in scaled.column_iter_mut() {
        let norm = column.norm();
        if norm == 0.0 {
            return Err(numerical_error(
                "drift-singular",
                "design matrix has an empty column",
                order,
            ));
        }
        column /= norm;
    }
    let singular = scaled.singular_values();
    let max = singular.max();
    let min = singular.min();
    if max <= 0.0 || min / max < RANK_TOLERANCE {
        return Err(numerical_error(
            "drift-singular",
            "design matrix is rank deficient",
            order,
        ));
    }
    Ok(())
}

/// Complete drift analysis of one circular weighing.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftAnalysis {
    /// Time basis of the drift regressors.
    pub trend: Trend,
    /// Every fitted order.
    pub fits: BTreeMap<DriftOrder, DriftFit>,
    /// Order used for the differences.
    pub selected: DriftOrder,
    /// Pairwise differences of the selected order.
    pub differences: Vec<MassDifference>,
    /// Drift coefficients of the selected order keyed by term.
    pub drift_coefficients: BTreeMap<String, DriftCoefficient>,
}

impl DriftAnalysis {
    /// Residual standard deviation of every fitted order.
    pub fn stdevs(&self) -> BTreeMap<DriftOrder, f64> {
        self.fits
            .iter()
            .map(|(order, fit)| (*order, fit.stdev))
            .collect()
    }

    /// Fit of the selected order.
    pub fn selected_fit(&self) -> &DriftFit {
        &self.fits[&self.selected]
    }

    /// Residual standard deviation of the selected order.
    pub fn selected_stdev(&self) -> f64 {
        self.selected_fit().stdev
    }

    /// Sum of the signed differences around the loop.
    pub fn loop_closure(&self) -> f64 {
        loop_closure(&self.differences)
    }
}

/// Analyses a measurement run, which must hold a reading in every cell.
pub fn analyse_run(
    scheme: &WeighingScheme,
    run: &MeasurementRun,
    selection: Option<DriftOrder>,
) -> Result<DriftAnalysis, CwError> {
    let (times, readings) = run.flatten().ok_or_else(|| {
        CwError::Precondition(
            ErrorInfo::new("run-grid-incomplete", "measurement run has empty cells")
                .with_context("scheme_entry", scheme.scheme_entry())
                .with_context("run_id", run.metadata.run_id.to_string()),
        )
    })?;
    analyse(scheme, &readings, Some(&times), selection)
}

/// Fits the requested drift orders and derives pairwise differences.
///
/// Every order is fitted so its residual deviation can be reported. A forced
/// `selection` must fit; the other orders are best effort and an order that
/// fails is left out of `fits`. With `selection == None` the remaining order
/// with the smallest deviation is selected.
pub fn analyse(
    scheme: &WeighingScheme,
    readings: &[f64],
    times: Option<&[f64]>,
    selection: Option<DriftOrder>,
) -> Result<DriftAnalysis, CwError> {
    if readings.len() != scheme.num_readings() {
        return Err(CwError::Numerical(
            ErrorInfo::new("reading-count", "reading count does not match the scheme")
                .with_context("scheme_entry", scheme.scheme_entry())
                .with_context("expected", scheme.num_readings().to_string())
                .with_context("actual", readings.len().to_string()),
        ));
    }
    let design = DesignMatrices::build(scheme.num_cycles(), scheme.num_wtgrps(), times)?;
    let y = DVector::from_column_slice(readings);

    let mut fits = BTreeMap::new();
    let mut last_error = None;
    for order in DriftOrder::ALL {
        match fit_order(&design, &y, order) {
            Ok(fit) => {
                fits.insert(order, fit);
            }
            Err(err) if selection == Some(order) => return Err(err),
            Err(err) => {
                warn!(drift = order.label(), error = %err, "drift order skipped");
                last_error = Some(err);
            }
        }
    }
    if fits.is_empty() {
        return Err(last_error.unwrap_or_else(|| {
            CwError::numerical("drift-no-fit", "no drift order could be fitted")
        }));
    }

    let selected = match selection {
        Some(order) => order,
        None => auto_select(&fits, readings),
    };
    let fit = &fits[&selected];

    let groups = scheme.weight_groups();
    let differences = scheme
        .pairs()
        .into_iter()
        .map(|(plus, minus)| {
            MassDifference(
                groups[plus].clone(),
                groups[minus].clone(),
                fit.coefficients[plus] - fit.coefficients[minus],
                fit.difference_uncertainty(plus, minus),
            )
        })
        .collect();

    let n = scheme.num_wtgrps();
    let drift_coefficients = (1..=selected.degree())
        .filter_map(DriftOrder::from_degree)
        .map(|term| {
            let idx = n + term.degree() - 1;
            (
                term.label().to_string(),
                DriftCoefficient {
                    value: fit.coefficients[idx],
                    stdev: fit.stdev * fit.inverse_normal[(idx, idx)].max(0.0).sqrt(),
                },
            )
        })
        .collect();

    Ok(DriftAnalysis {
        trend: design.trend(),
        fits,
        selected,
        differences,
        drift_coefficients,
    })
}

fn auto_select(fits: &BTreeMap<DriftOrder, DriftFit>, readings: &[f64]) -> DriftOrder {
    let scale = readings.iter().fold(1.0_f64, |acc, y| acc.max(y.abs()));
    let margin = SELECTION_MARGIN * scale;
    let mut best: Option<(DriftOrder, f64)> = None;
    for (order, fit) in fits {
        match best {
            Some((_, stdev)) if fit.stdev + margin >= stdev => {}
            _ => best = Some((*order, fit.stdev)),
        }
    }
    best.map(|(order, _)| order).unwrap_or(DriftOrder::NoDrift)
}
