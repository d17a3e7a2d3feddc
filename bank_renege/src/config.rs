use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Scenario parameters, fixed for the whole run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BankConfig {
    /// Number of customers the source generates
    pub customers: usize,
    /// Mean time between arrivals
    pub interval: f64,
    /// Clerks at the counter
    pub capacity: usize,
    /// Mean time spent at the counter
    pub service_time: f64,
    /// Patience is drawn uniformly from `[min_patience, max_patience)`
    pub min_patience: f64,
    pub max_patience: f64,
    pub seed: u64,
}

impl Default for BankConfig {
    fn default() -> Self {
        BankConfig {
            customers: 5,
            interval: 10.0,
            capacity: 1,
            service_time: 12.0,
            min_patience: 1.0,
            max_patience: 3.0,
            seed: 42,
        }
    }
}

impl BankConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BankConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.interval > 0.0) || !self.interval.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "interval must be positive, got {}",
                self.interval
            )));
        }
        if !(self.service_time > 0.0) || !self.service_time.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "service_time must be positive, got {}",
                self.service_time
            )));
        }
        if self.capacity == 0 {
            return Err(ConfigError::Invalid("capacity must be at least 1".to_string()));
        }
        if !(self.min_patience >= 0.0) || !self.max_patience.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "patience bounds must be finite and non-negative, got [{}, {})",
                self.min_patience, self.max_patience
            )));
        }
        if self.max_patience < self.min_patience {
            return Err(ConfigError::Invalid(format!(
                "max_patience {} is below min_patience {}",
                self.max_patience, self.min_patience
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_scenario() {
        let config = BankConfig::default();
        assert_eq!(config.customers, 5);
        assert_eq!(config.capacity, 1);
        assert_eq!(config.seed, 42);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = BankConfig::from_toml_str("customers = 20\nseed = 7\n").unwrap();
        assert_eq!(config.customers, 20);
        assert_eq!(config.seed, 7);
        assert_eq!(config.interval, 10.0);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = BankConfig::from_toml_str("clerks = 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cases = [
            "interval = 0.0",
            "service_time = -1.0",
            "capacity = 0",
            "min_patience = -0.5",
            "min_patience = 3.0\nmax_patience = 1.0",
        ];
        for case in cases {
            let err = BankConfig::from_toml_str(case).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{case} should be invalid");
        }
    }

    #[test]
    fn equal_patience_bounds_are_allowed() {
        let config = BankConfig::from_toml_str("min_patience = 0.0\nmax_patience = 0.0").unwrap();
        assert_eq!(config.max_patience, 0.0);
    }

    #[test]
    fn shipped_config_is_the_default() {
        let path = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/configs/bank_renege.toml"));
        assert_eq!(BankConfig::load(path).unwrap(), BankConfig::default());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = BankConfig::load(Path::new("/nonexistent/bank.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/bank.toml"));
    }
}
