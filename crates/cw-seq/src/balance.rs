//! Balance abstraction and its loading/reading variants.
//!
//! A [`Balance`] hides how a weight group reaches the pan and how a stable
//! reading is obtained. Manual and computer-interfaced balances delegate
//! loading to an [`Operator`]; auto-loading balances drive a [`MassHandler`]
//! through the externally allocated positions.

use std::collections::BTreeMap;

use cw_core::{BalanceMode, CwError, ErrorInfo, MassUnit};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// A weighing instrument as seen by the sequencer.
pub trait Balance {
    /// Identity recorded in run metadata.
    fn identity(&self) -> &str;

    /// Loading and reading mode.
    fn mode(&self) -> BalanceMode;

    /// Unit of every reading returned by [`Balance::read_stabilized`].
    fn unit(&self) -> MassUnit;

    /// Places `group` on the pan from `position` (1-based).
    fn load(&mut self, group: &str, position: usize) -> Result<(), CwError>;

    /// Removes `group` from the pan back to `position`.
    fn unload(&mut self, group: &str, position: usize) -> Result<(), CwError>;

    /// Blocks until the reading is stable.
    ///
    /// `Ok(None)` means the operator declined to provide a reading and the
    /// run should be aborted.
    fn read_stabilized(&mut self) -> Result<Option<f64>, CwError>;
}

/// Person at the balance for manual and computer-interfaced weighings.
pub trait Operator {
    /// Asks for `group` to be placed on the pan; blocks until confirmed.
    fn request_load(&mut self, group: &str, position: usize) -> Result<(), CwError>;

    /// Asks for `group` to be removed from the pan.
    fn request_unload(&mut self, group: &str, position: usize) -> Result<(), CwError>;

    /// Asks for the displayed value; `None` when the operator cancels.
    fn enter_reading(&mut self, unit: MassUnit) -> Result<Option<f64>, CwError>;
}

/// Instrument interface that reports a stable reading on request.
pub trait Instrument {
    /// Waits for stability and returns the reading, `None` on user abort.
    fn stable_reading(&mut self) -> Result<Option<f64>, CwError>;
}

/// Mechanical handler of an auto-loading balance.
pub trait MassHandler {
    /// Moves the weight at `position` onto the pan.
    fn load_position(&mut self, position: usize) -> Result<(), CwError>;

    /// Returns the weight on the pan to `position`.
    fn unload_position(&mut self, position: usize) -> Result<(), CwError>;
}

/// Operator loads and types the displayed value.
#[derive(Debug)]
pub struct ManualBalance<O> {
    identity: String,
    unit: MassUnit,
    operator: O,
}

impl<O: Operator> ManualBalance<O> {
    /// Wraps an operator for a manual-entry balance.
    pub fn new(identity: impl Into<String>, unit: MassUnit, operator: O) -> Self {
        Self {
            identity: identity.into(),
            unit,
            operator,
        }
    }
}

impl<O: Operator> Balance for ManualBalance<O> {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn mode(&self) -> BalanceMode {
        BalanceMode::ManualEntry
    }

    fn unit(&self) -> MassUnit {
        self.unit
    }

    fn load(&mut self, group: &str, position: usize) -> Result<(), CwError> {
        self.operator.request_load(group, position)
    }

    fn unload(&mut self, group: &str, position: usize) -> Result<(), CwError> {
        self.operator.request_unload(group, position)
    }

    fn read_stabilized(&mut self) -> Result<Option<f64>, CwError> {
        self.operator.enter_reading(self.unit)
    }
}

/// Operator loads, readings come from the instrument interface.
#[derive(Debug)]
pub struct ComputerBalance<O, I> {
    identity: String,
    unit: MassUnit,
    operator: O,
    instrument: I,
}

impl<O: Operator, I: Instrument> ComputerBalance<O, I> {
    /// Pairs an operator with an instrument interface.
    pub fn new(identity: impl Into<String>, unit: MassUnit, operator: O, instrument: I) -> Self {
        Self {
            identity: identity.into(),
            unit,
            operator,
            instrument,
        }
    }
}

impl<O: Operator, I: Instrument> Balance for ComputerBalance<O, I> {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn mode(&self) -> BalanceMode {
        BalanceMode::ComputerInterface
    }

    fn unit(&self) -> MassUnit {
        self.unit
    }

    fn load(&mut self, group: &str, position: usize) -> Result<(), CwError> {
        self.operator.request_load(group, position)
    }

    fn unload(&mut self, group: &str, position: usize) -> Result<(), CwError> {
        self.operator.request_unload(group, position)
    }

    fn read_stabilized(&mut self) -> Result<Option<f64>, CwError> {
        self.instrument.stable_reading()
    }
}

/// Unattended balance driven through a mass handler.
#[derive(Debug)]
pub struct AutoLoadingBalance<H, I> {
    identity: String,
    unit: MassUnit,
    handler: H,
    instrument: I,
}

impl<H: MassHandler, I: Instrument> AutoLoadingBalance<H, I> {
    /// Pairs a mass handler with an instrument interface.
    pub fn new(identity: impl Into<String>, unit: MassUnit, handler: H, instrument: I) -> Self {
        Self {
            identity: identity.into(),
            unit,
            handler,
            instrument,
        }
    }
}

impl<H: MassHandler, I: Instrument> Balance for AutoLoadingBalance<H, I> {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn mode(&self) -> BalanceMode {
        BalanceMode::AutoLoading
    }

    fn unit(&self) -> MassUnit {
        self.unit
    }

    fn load(&mut self, _group: &str, position: usize) -> Result<(), CwError> {
        self.handler.load_position(position)
    }

    fn unload(&mut self, _group: &str, position: usize) -> Result<(), CwError> {
        self.handler.unload_position(position)
    }

    fn read_stabilized(&mut self) -> Result<Option<f64>, CwError> {
        self.instrument.stable_reading()
    }
}

/// Balance simulator producing true masses plus linear drift and noise.
///
/// The mass of a group is the sum of its `+`-joined weights. Drift grows by
/// `drift_per_reading` with every reading taken.
#[derive(Debug)]
pub struct SimulatedBalance {
    identity: String,
    mode: BalanceMode,
    unit: MassUnit,
    masses: BTreeMap<String, f64>,
    offset: f64,
    drift_per_reading: f64,
    noise: f64,
    rng: StdRng,
    loaded: Option<String>,
    readings: usize,
    loads: usize,
    unloads: usize,
}

impl SimulatedBalance {
    /// Creates a simulator in `unit` with the given weight masses (same unit).
    pub fn new(
        identity: impl Into<String>,
        mode: BalanceMode,
        unit: MassUnit,
        masses: BTreeMap<String, f64>,
        seed: u64,
    ) -> Self {
        Self {
            identity: identity.into(),
            mode,
            unit,
            masses,
            offset: 0.0,
            drift_per_reading: 0.0,
            noise: 0.0,
            rng: StdRng::seed_from_u64(seed),
            loaded: None,
            readings: 0,
            loads: 0,
            unloads: 0,
        }
    }

    /// Adds a constant zero offset to every reading.
    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    /// Adds a linear drift per reading taken.
    pub fn with_drift(mut self, drift_per_reading: f64) -> Self {
        self.drift_per_reading = drift_per_reading;
        self
    }

    /// Adds uniform noise in `[-noise, noise]`.
    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise.abs();
        self
    }

    /// Number of readings returned so far.
    pub fn readings(&self) -> usize {
        self.readings
    }

    /// Number of load and unload requests served.
    pub fn handling_counts(&self) -> (usize, usize) {
        (self.loads, self.unloads)
    }

    fn group_mass(&self, group: &str) -> Result<f64, CwError> {
        group.split('+').try_fold(0.0, |sum, weight| {
            self.masses.get(weight).map(|mass| sum + mass).ok_or_else(|| {
                CwError::Configuration(
                    ErrorInfo::new("sim-unknown-weight", "simulated balance has no such weight")
                        .with_context("weight", weight)
                        .with_context("group", group),
                )
            })
        })
    }
}

impl Balance for SimulatedBalance {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn mode(&self) -> BalanceMode {
        self.mode
    }

    fn unit(&self) -> MassUnit {
        self.unit
    }

    fn load(&mut self, group: &str, position: usize) -> Result<(), CwError> {
        if let Some(previous) = &self.loaded {
            return Err(CwError::Instrument(
                ErrorInfo::new("sim-pan-occupied", "pan already holds a weight group")
                    .with_context("loaded", previous.as_str())
                    .with_context("requested", group),
            ));
        }
        debug!(group, position, "simulated load");
        self.loaded = Some(group.to_string());
        self.loads += 1;
        Ok(())
    }

    fn unload(&mut self, group: &str, position: usize) -> Result<(), CwError> {
        debug!(group, position, "simulated unload");
        self.loaded = None;
        self.unloads += 1;
        Ok(())
    }

    fn read_stabilized(&mut self) -> Result<Option<f64>, CwError> {
        let group = self.loaded.clone().ok_or_else(|| {
            CwError::Instrument(ErrorInfo::new("sim-pan-empty", "reading requested with an empty pan"))
        })?;
        let mass = self.group_mass(&group)?;
        let noise = if self.noise > 0.0 {
            self.rng.gen_range(-self.noise..=self.noise)
        } else {
            0.0
        };
        let value = mass + self.offset + self.drift_per_reading * self.readings as f64 + noise;
        self.readings += 1;
        Ok(Some(value))
    }
}
