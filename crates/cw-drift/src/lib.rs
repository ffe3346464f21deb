#![deny(missing_docs)]
#![doc = "Drift-corrected least-squares analysis of circular weighings: nested design matrices for drift orders 0-3, per-order fits, automatic order selection and pairwise group differences with their uncertainties."]

/// Least-squares fitting and difference extraction.
pub mod analyzer;
/// Regression design matrices.
pub mod design;

pub use analyzer::{analyse, analyse_run, fit_order, DriftAnalysis, DriftFit};
pub use design::DesignMatrices;
