use std::cell::RefCell;

use chrono::{DateTime, Utc};
use cw_core::{CwError, ErrorInfo};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Averaged instantaneous reading returned by an ambient logger.
#[derive(Debug, Clone, PartialEq)]
pub struct AmbientReading {
    /// Logger timestamp of the averaged sample.
    pub timestamp: DateTime<Utc>,
    /// Temperature in degrees Celsius, if the sensor reported one.
    pub temperature: Option<f64>,
    /// Relative humidity in percent, if the sensor reported one.
    pub humidity: Option<f64>,
}

/// Time series recorded by an ambient logger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmbientSeries {
    /// Temperature samples.
    pub temperature: Vec<f64>,
    /// Humidity samples.
    pub humidity: Vec<f64>,
}

/// Remote temperature/humidity logger.
///
/// Both queries are single blocking attempts; callers treat an error as a
/// closed gate and never retry.
pub trait AmbientLogger {
    /// Averaged current temperature and humidity of `sensor`.
    fn averaged_now(&self, sensor: &str) -> Result<AmbientReading, CwError>;

    /// Samples recorded by `sensor` since `since`.
    fn averaged_since(&self, sensor: &str, since: DateTime<Utc>) -> Result<AmbientSeries, CwError>;
}

/// Logger returning scripted values.
#[derive(Debug, Clone, Default)]
pub struct FixedLogger {
    /// Reading returned by [`AmbientLogger::averaged_now`]; `None` fails the query.
    pub now: Option<AmbientReading>,
    /// Series returned by [`AmbientLogger::averaged_since`]; `None` fails the query.
    pub series: Option<AmbientSeries>,
}

impl FixedLogger {
    /// Logger reporting constant conditions with a flat series.
    pub fn steady(temperature: f64, humidity: f64) -> Self {
        Self {
            now: Some(AmbientReading {
                timestamp: Utc::now(),
                temperature: Some(temperature),
                humidity: Some(humidity),
            }),
            series: Some(AmbientSeries {
                temperature: vec![temperature; 3],
                humidity: vec![humidity; 3],
            }),
        }
    }
}

fn unreachable_logger(sensor: &str) -> CwError {
    CwError::Instrument(
        ErrorInfo::new("logger-unreachable", "ambient logger did not answer")
            .with_context("sensor", sensor),
    )
}

impl AmbientLogger for FixedLogger {
    fn averaged_now(&self, sensor: &str) -> Result<AmbientReading, CwError> {
        self.now.clone().ok_or_else(|| unreachable_logger(sensor))
    }

    fn averaged_since(&self, sensor: &str, _since: DateTime<Utc>) -> Result<AmbientSeries, CwError> {
        self.series.clone().ok_or_else(|| unreachable_logger(sensor))
    }
}

/// Logger producing jittered conditions around a set point.
#[derive(Debug)]
pub struct SimulatedLogger {
    temperature: f64,
    humidity: f64,
    jitter: f64,
    samples_per_query: usize,
    rng: RefCell<StdRng>,
}

impl SimulatedLogger {
    /// Creates a logger around the given set point with a deterministic seed.
    pub fn new(temperature: f64, humidity: f64, jitter: f64, seed: u64) -> Self {
        Self {
            temperature,
            humidity,
            jitter: jitter.abs(),
            samples_per_query: 12,
            rng: RefCell::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn sample(&self, centre: f64, scale: f64) -> f64 {
        if self.jitter == 0.0 {
            return centre;
        }
        let offset: f64 = self.rng.borrow_mut().gen_range(-1.0..1.0);
        centre + offset * self.jitter * scale
    }
}

impl AmbientLogger for SimulatedLogger {
    fn averaged_now(&self, _sensor: &str) -> Result<AmbientReading, CwError> {
        Ok(AmbientReading {
            timestamp: Utc::now(),
            temperature: Some(self.sample(self.temperature, 1.0)),
            humidity: Some(self.sample(self.humidity, 10.0)),
        })
    }

    fn averaged_since(&self, _sensor: &str, _since: DateTime<Utc>) -> Result<AmbientSeries, CwError> {
        let mut series = AmbientSeries::default();
        for _ in 0..self.samples_per_query {
            series.temperature.push(self.sample(self.temperature, 1.0));
            series.humidity.push(self.sample(self.humidity, 10.0));
        }
        Ok(series)
    }
}
