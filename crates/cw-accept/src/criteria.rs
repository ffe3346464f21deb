//! Acceptance-criteria lookup by balance and nominal mass.

use cw_core::{CriteriaBracket, CwError, ErrorInfo, SessionConfig};
use serde::{Deserialize, Serialize};

/// Limits applying to one weighing, in micrograms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcceptanceCriteria {
    /// Largest acceptable stdev of the selected drift order.
    pub max_stdev_ug: f64,
    /// Reference standard deviation of the balance.
    pub balance_stdev_ug: f64,
}

impl From<&CriteriaBracket> for AcceptanceCriteria {
    fn from(bracket: &CriteriaBracket) -> Self {
        Self {
            max_stdev_ug: bracket.max_stdev_from_circweigh,
            balance_stdev_ug: bracket.balance_stdev,
        }
    }
}

/// Source of acceptance criteria.
pub trait CriteriaProvider {
    /// Criteria for `balance` at `nominal_mass_g`.
    ///
    /// Fails with a configuration error when the balance is unknown or no
    /// bracket covers the nominal mass.
    fn lookup(&self, balance: &str, nominal_mass_g: f64) -> Result<AcceptanceCriteria, CwError>;
}

/// Criteria brackets taken from the session configuration.
#[derive(Debug, Clone)]
pub struct CriteriaTable<'a> {
    config: &'a SessionConfig,
}

impl<'a> CriteriaTable<'a> {
    /// Wraps the balances section of `config`.
    pub fn new(config: &'a SessionConfig) -> Self {
        Self { config }
    }
}

impl CriteriaProvider for CriteriaTable<'_> {
    fn lookup(&self, balance: &str, nominal_mass_g: f64) -> Result<AcceptanceCriteria, CwError> {
        let spec = self.config.balance(balance)?;
        spec.brackets
            .iter()
            .find(|b| nominal_mass_g >= b.min_nominal_g && nominal_mass_g <= b.max_nominal_g)
            .map(AcceptanceCriteria::from)
            .ok_or_else(|| {
                CwError::Configuration(
                    ErrorInfo::new("criteria-missing", "no acceptance bracket covers this nominal mass")
                        .with_context("balance", balance)
                        .with_context("nominal_mass_g", nominal_mass_g.to_string())
                        .with_hint("add a bracket to the balance entry of the session config"),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
balances:
  - id: AX10005
    mode: computer-interface
    unit: g
    brackets:
      - { min_nominal_g: 1.0, max_nominal_g: 10.0, max_stdev_from_circweigh: 0.5, balance_stdev: 0.2 }
      - { min_nominal_g: 10.0, max_nominal_g: 100.0, max_stdev_from_circweigh: 2.0, balance_stdev: 0.8 }
"#;

    #[test]
    fn first_matching_bracket_wins() {
        let config = SessionConfig::from_yaml_str(CONFIG).expect("config");
        let table = CriteriaTable::new(&config);
        let low = table.lookup("AX10005", 10.0).expect("criteria");
        assert_eq!(low.max_stdev_ug, 0.5);
        let high = table.lookup("AX10005", 50.0).expect("criteria");
        assert_eq!(high.balance_stdev_ug, 0.8);
    }

    #[test]
    fn gaps_and_unknown_balances_are_configuration_errors() {
        let config = SessionConfig::from_yaml_str(CONFIG).expect("config");
        let table = CriteriaTable::new(&config);
        let err = table.lookup("AX10005", 500.0).expect_err("no bracket");
        assert_eq!(err.info().code, "criteria-missing");
        assert!(err.is_configuration());
        let err = table.lookup("MDE", 5.0).expect_err("unknown balance");
        assert_eq!(err.info().code, "unknown-balance");
    }
}
