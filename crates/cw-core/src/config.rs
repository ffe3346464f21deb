use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::equipment::BalanceMode;
use crate::errors::{CwError, ErrorInfo};
use crate::units::MassUnit;

/// YAML-configurable parameters governing a weighing session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Ambient gate limits.
    #[serde(default)]
    pub ambient: AmbientLimits,
    /// Acceptance policy knobs.
    #[serde(default)]
    pub acceptance: AcceptancePolicy,
    /// Persistence behaviour.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Known balances and their acceptance-criteria brackets.
    #[serde(default)]
    pub balances: Vec<BalanceSpec>,
}

impl SessionConfig {
    /// Loads a configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self, CwError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            CwError::Configuration(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&contents).map_err(|err| match err {
            CwError::Serde(info) => {
                CwError::Serde(info.with_context("path", path.display().to_string()))
            }
            other => other,
        })
    }

    /// Parses a configuration from YAML text.
    pub fn from_yaml_str(contents: &str) -> Result<Self, CwError> {
        serde_yaml::from_str(contents)
            .map_err(|err| CwError::Serde(ErrorInfo::new("config-parse", err.to_string())))
    }

    /// Looks up a balance by identity.
    pub fn balance(&self, id: &str) -> Result<&BalanceSpec, CwError> {
        self.balances.iter().find(|spec| spec.id == id).ok_or_else(|| {
            CwError::Configuration(
                ErrorInfo::new("unknown-balance", "balance has no configuration entry")
                    .with_context("balance", id),
            )
        })
    }
}

/// Temperature and humidity limits checked before and after a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbientLimits {
    /// Logger sensor to query.
    #[serde(default = "default_sensor")]
    pub sensor: String,
    /// Lowest acceptable temperature in degrees Celsius.
    #[serde(default = "default_min_temperature")]
    pub min_temperature: f64,
    /// Highest acceptable temperature in degrees Celsius.
    #[serde(default = "default_max_temperature")]
    pub max_temperature: f64,
    /// Lowest acceptable relative humidity in percent.
    #[serde(default = "default_min_humidity")]
    pub min_humidity: f64,
    /// Highest acceptable relative humidity in percent.
    #[serde(default = "default_max_humidity")]
    pub max_humidity: f64,
    /// Largest tolerated temperature excursion over a run.
    #[serde(default = "default_max_temperature_change")]
    pub max_temperature_change: f64,
    /// Largest tolerated humidity excursion over a run.
    #[serde(default = "default_max_humidity_change")]
    pub max_humidity_change: f64,
}

fn default_sensor() -> String {
    "1".to_string()
}

fn default_min_temperature() -> f64 {
    18.1
}

fn default_max_temperature() -> f64 {
    21.9
}

fn default_min_humidity() -> f64 {
    33.0
}

fn default_max_humidity() -> f64 {
    67.0
}

fn default_max_temperature_change() -> f64 {
    0.5
}

fn default_max_humidity_change() -> f64 {
    15.0
}

impl Default for AmbientLimits {
    fn default() -> Self {
        Self {
            sensor: default_sensor(),
            min_temperature: default_min_temperature(),
            max_temperature: default_max_temperature(),
            min_humidity: default_min_humidity(),
            max_humidity: default_max_humidity(),
            max_temperature_change: default_max_temperature_change(),
            max_humidity_change: default_max_humidity_change(),
        }
    }
}

/// Acceptance policy shared by every balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptancePolicy {
    /// Multiple of the stdev limit above which an unattended run is excluded.
    #[serde(default = "default_exclude_factor")]
    pub exclude_factor: f64,
    /// Relative tolerance on the loop closure (scaled by the sum of
    /// absolute differences, floored at 1).
    #[serde(default = "default_closure_tolerance")]
    pub closure_tolerance: f64,
    /// Count excluded runs towards the good-run target.
    #[serde(default)]
    pub count_excluded_runs: bool,
}

fn default_exclude_factor() -> f64 {
    3.0
}

fn default_closure_tolerance() -> f64 {
    1e-6
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        Self {
            exclude_factor: default_exclude_factor(),
            closure_tolerance: default_closure_tolerance(),
            count_excluded_runs: false,
        }
    }
}

/// Where documents go when the primary target cannot be written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Local directory receiving fallback copies.
    #[serde(default = "default_fallback_dir")]
    pub fallback_dir: PathBuf,
}

fn default_fallback_dir() -> PathBuf {
    PathBuf::from("fallback")
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            fallback_dir: default_fallback_dir(),
        }
    }
}

/// Configuration entry for one balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSpec {
    /// Balance identity as recorded in measurement runs.
    pub id: String,
    /// Loading and reading mode.
    pub mode: BalanceMode,
    /// Unit the balance reports in.
    pub unit: MassUnit,
    /// Acceptance criteria by nominal-mass bracket.
    #[serde(default)]
    pub brackets: Vec<CriteriaBracket>,
}

/// Acceptance criteria applying to nominal masses in `[min, max]` grams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaBracket {
    /// Lower bound of the nominal mass bracket, inclusive.
    pub min_nominal_g: f64,
    /// Upper bound of the nominal mass bracket, inclusive.
    pub max_nominal_g: f64,
    /// Largest acceptable residual stdev of the selected drift, in micrograms.
    pub max_stdev_from_circweigh: f64,
    /// Reference balance standard deviation, in micrograms.
    pub balance_stdev: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = SessionConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config.ambient, AmbientLimits::default());
        assert_eq!(config.acceptance.exclude_factor, 3.0);
        assert!(!config.acceptance.count_excluded_runs);
        assert_eq!(config.persistence.fallback_dir, PathBuf::from("fallback"));
    }

    #[test]
    fn parses_balance_table() {
        let yaml = r#"
ambient:
  max_temperature_change: 0.3
balances:
  - id: AX10005
    mode: auto-loading
    unit: mg
    brackets:
      - { min_nominal_g: 1000, max_nominal_g: 10000, max_stdev_from_circweigh: 20, balance_stdev: 5 }
"#;
        let config = SessionConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.ambient.max_temperature_change, 0.3);
        assert_eq!(config.ambient.max_humidity, 67.0);
        let balance = config.balance("AX10005").unwrap();
        assert_eq!(balance.mode, BalanceMode::AutoLoading);
        assert_eq!(balance.unit, MassUnit::Milligram);
        assert_eq!(balance.brackets.len(), 1);
        assert!(config.balance("missing").unwrap_err().is_configuration());
    }

    #[test]
    fn malformed_yaml_is_a_serde_error() {
        let err = SessionConfig::from_yaml_str("balances: 7").unwrap_err();
        assert_eq!(err.info().code, "config-parse");
    }
}
