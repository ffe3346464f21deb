#![deny(missing_docs)]
#![doc = "Ambient-condition gating for circular weighing runs: a pre-run bounds check and a post-run envelope check against configured limits."]

/// Pre- and post-run checks.
pub mod gate;
/// Logger collaborator trait and stand-in loggers.
pub mod logger;

pub use gate::{check_post, check_pre};
pub use logger::{AmbientLogger, AmbientReading, AmbientSeries, FixedLogger, SimulatedLogger};
