//! Configuration management
//!
//! Settings are read from a TOML file. Every field has a default, so an
//! empty file (or no file at all) describes the standard study.

use crate::universe::{Bank, BankUniverse};
use recife_valuation::BetaConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    /// The file is not valid TOML for this schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The values are inconsistent
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Study period
    #[serde(default)]
    pub period: PeriodSettings,

    /// Output location
    #[serde(default)]
    pub output: OutputSettings,

    /// Market data series
    #[serde(default)]
    pub market: MarketSettings,

    /// Beta estimation
    #[serde(default)]
    pub beta: BetaSettings,

    /// Banks to analyze; replaces the default universe when present
    #[serde(default = "BankUniverse::default_banks")]
    pub banks: Vec<Bank>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            period: PeriodSettings::default(),
            output: OutputSettings::default(),
            market: MarketSettings::default(),
            beta: BetaSettings::default(),
            banks: BankUniverse::default_banks(),
        }
    }
}

/// Study period, in fiscal years
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSettings {
    /// First fiscal year downloaded
    #[serde(default = "default_start_year")]
    pub start_year: i32,

    /// Last fiscal year downloaded
    #[serde(default = "default_end_year")]
    pub end_year: i32,
}

const fn default_start_year() -> i32 {
    2010
}

const fn default_end_year() -> i32 {
    2024
}

impl Default for PeriodSettings {
    fn default() -> Self {
        Self {
            start_year: default_start_year(),
            end_year: default_end_year(),
        }
    }
}

/// Output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Directory receiving the report bundle
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

/// Market data settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSettings {
    /// Market index ticker
    #[serde(default = "default_index_ticker")]
    pub index_ticker: String,

    /// SGS series of the daily risk-free rate
    #[serde(default = "default_selic_series")]
    pub selic_series: u32,
}

fn default_index_ticker() -> String {
    "^BVSP".to_string()
}

const fn default_selic_series() -> u32 {
    11
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            index_ticker: default_index_ticker(),
            selic_series: default_selic_series(),
        }
    }
}

/// Beta estimation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetaSettings {
    /// Minimum aligned monthly returns
    #[serde(default = "default_min_observations")]
    pub min_observations: usize,
}

const fn default_min_observations() -> usize {
    12
}

impl Default for BetaSettings {
    fn default() -> Self {
        Self {
            min_observations: default_min_observations(),
        }
    }
}

impl AppConfig {
    /// Load and validate a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period.start_year > self.period.end_year {
            return Err(ConfigError::Validation(format!(
                "start_year {} is after end_year {}",
                self.period.start_year, self.period.end_year
            )));
        }
        if self.banks.is_empty() {
            return Err(ConfigError::Validation("no banks configured".to_string()));
        }
        if let Some(bank) = self
            .banks
            .iter()
            .find(|b| b.ticker.trim().is_empty() || b.cnpj.trim().is_empty())
        {
            return Err(ConfigError::Validation(format!(
                "bank '{}' needs a ticker and a CNPJ",
                bank.name
            )));
        }
        if self.market.index_ticker.trim().is_empty() {
            return Err(ConfigError::Validation("empty index ticker".to_string()));
        }
        if self.beta.min_observations < 3 {
            return Err(ConfigError::Validation(
                "beta.min_observations must be at least 3".to_string(),
            ));
        }
        Ok(())
    }

    /// Banks to analyze.
    pub fn universe(&self) -> BankUniverse {
        BankUniverse::from_banks(self.banks.clone())
    }

    /// Beta estimator configuration.
    pub const fn beta_config(&self) -> BetaConfig {
        BetaConfig {
            min_observations: self.beta.min_observations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.period.start_year, 2010);
        assert_eq!(config.period.end_year, 2024);
        assert_eq!(config.output.dir, PathBuf::from("output"));
        assert_eq!(config.market.index_ticker, "^BVSP");
        assert_eq!(config.market.selic_series, 11);
        assert_eq!(config.beta_config().min_observations, 12);
        assert_eq!(config.universe().len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(AppConfig::from_toml_str("").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_partial_document() {
        let config = AppConfig::from_toml_str(
            r#"
            [period]
            start_year = 2015

            [[banks]]
            name = "Itaú Unibanco"
            ticker = "ITUB4.SA"
            cnpj = "60.872.504/0001-23"
            "#,
        )
        .unwrap();

        assert_eq!(config.period.start_year, 2015);
        assert_eq!(config.period.end_year, 2024);
        assert_eq!(config.banks.len(), 1);
        assert_eq!(config.universe().banks()[0].ticker, "ITUB4.SA");
    }

    #[rstest]
    #[case("[period]\nstart_year = 2025\nend_year = 2020")]
    #[case("banks = []")]
    #[case("[[banks]]\nname = \"X\"\nticker = \"\"\ncnpj = \"1\"")]
    #[case("[beta]\nmin_observations = 2")]
    #[case("[market]\nindex_ticker = \" \"")]
    fn test_invalid_documents(#[case] content: &str) {
        assert!(matches!(
            AppConfig::from_toml_str(content),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            AppConfig::from_toml_str("[period\nstart_year = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recife.toml");
        std::fs::write(&path, "[output]\ndir = \"reports\"\n").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.output.dir, PathBuf::from("reports"));

        assert!(matches!(
            AppConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::Read(_))
        ));
    }

    #[test]
    fn test_roundtrip_serialization() {
        let config = AppConfig::default();
        let text = toml::to_string(&config).unwrap();
        assert_eq!(AppConfig::from_toml_str(&text).unwrap(), config);
    }
}
