#![deny(missing_docs)]
#![doc = "Core types for the circular weighing engine: error taxonomy, units, weighing schemes, persisted records and session configuration."]

/// YAML session configuration.
pub mod config;
/// Drift orders and time bases.
pub mod drift;
/// Balance capability modes.
pub mod equipment;
pub mod errors;
pub mod records;
pub mod scheme;
pub mod session;
pub mod units;

pub use config::{
    AcceptancePolicy, AmbientLimits, BalanceSpec, CriteriaBracket, PersistenceConfig,
    SessionConfig,
};
pub use drift::{DriftOrder, Trend};
pub use equipment::BalanceMode;
pub use errors::{CwError, ErrorInfo};
pub use records::{
    analysis_key, loop_closure, measurement_key, AmbientPost, AmbientPre, AnalysisMetadata,
    AnalysisRecord, DriftCoefficient, MassDifference, MeasurementRun, Observation, RunMetadata,
    RunStatus, ROOT_CONTAINER,
};
pub use scheme::WeighingScheme;
pub use session::SessionContext;
pub use units::MassUnit;
