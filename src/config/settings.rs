//! Application settings loading from a TOML file.
//!
//! Every field is optional in the file; absent fields fall back to the
//! defaults below. The settings carry the business constants of the
//! cash-flow engine (timezone, operating hours, fallback goal, opening
//! float, reconciliation tolerance) so that none of them is hard-coded in the
//! business logic.

use crate::errors::{Error, Result};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

/// Environment variable naming the settings file
pub const CONFIG_PATH_ENV: &str = "CASHFLOW_CONFIG";

/// Settings file used when `CASHFLOW_CONFIG` is not set
pub const DEFAULT_CONFIG_PATH: &str = "cashflow.toml";

/// Raw structure of the settings file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    business_timezone: Option<String>,
    opening_hour: Option<u32>,
    closing_hour: Option<u32>,
    default_monthly_goal: Option<Decimal>,
    default_opening_float: Option<Decimal>,
    weeks_per_month: Option<Decimal>,
    cash_tolerance: Option<Decimal>,
    #[serde(default)]
    payment_methods: PaymentMethodSynonyms,
}

/// Extra keywords appended to the built-in payment method synonym table
#[derive(Debug, Default, Clone, Deserialize, PartialEq, Eq)]
pub struct PaymentMethodSynonyms {
    /// Keywords that identify cash payments
    #[serde(default)]
    pub cash: Vec<String>,
    /// Keywords that identify card/TPV payments
    #[serde(default)]
    pub card: Vec<String>,
    /// Keywords that identify bank transfers
    #[serde(default)]
    pub transfer: Vec<String>,
    /// Keywords that identify checks
    #[serde(default)]
    pub check: Vec<String>,
}

/// Validated application settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Fixed timezone in which the clinic's operating day is defined
    pub business_timezone: Tz,
    /// First business hour (inclusive)
    pub opening_hour: u32,
    /// Last business hour (inclusive); the bucket starting at this hour is the last one
    pub closing_hour: u32,
    /// Goal used when no monthly goal row exists
    pub default_monthly_goal: Decimal,
    /// Starter cash used when no prior closing exists
    pub default_opening_float: Decimal,
    /// Average weeks per month, used to derive weekly targets
    pub weeks_per_month: Decimal,
    /// Largest cash difference still accepted at closing
    pub cash_tolerance: Decimal,
    /// Extra payment method keywords
    pub payment_methods: PaymentMethodSynonyms,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            business_timezone: chrono_tz::Europe::Madrid,
            opening_hour: 9,
            closing_hour: 16,
            default_monthly_goal: Decimal::new(10_000, 0),
            default_opening_float: Decimal::ZERO,
            weeks_per_month: Decimal::new(433, 2),
            cash_tolerance: Decimal::new(1, 2),
            payment_methods: PaymentMethodSynonyms::default(),
        }
    }
}

impl TryFrom<SettingsFile> for Settings {
    type Error = Error;

    fn try_from(file: SettingsFile) -> Result<Self> {
        let defaults = Self::default();

        let business_timezone = match file.business_timezone {
            Some(name) => name.parse::<Tz>().map_err(|e| Error::Config {
                message: format!("Unknown business timezone '{name}': {e}"),
            })?,
            None => defaults.business_timezone,
        };

        let settings = Self {
            business_timezone,
            opening_hour: file.opening_hour.unwrap_or(defaults.opening_hour),
            closing_hour: file.closing_hour.unwrap_or(defaults.closing_hour),
            default_monthly_goal: file
                .default_monthly_goal
                .unwrap_or(defaults.default_monthly_goal),
            default_opening_float: file
                .default_opening_float
                .unwrap_or(defaults.default_opening_float),
            weeks_per_month: file.weeks_per_month.unwrap_or(defaults.weeks_per_month),
            cash_tolerance: file.cash_tolerance.unwrap_or(defaults.cash_tolerance),
            payment_methods: file.payment_methods,
        };
        settings.validate()?;
        Ok(settings)
    }
}

impl Settings {
    fn validate(&self) -> Result<()> {
        if self.closing_hour > 23 {
            return Err(Error::Config {
                message: format!("closing_hour must be 0-23, got {}", self.closing_hour),
            });
        }
        if self.opening_hour > self.closing_hour {
            return Err(Error::Config {
                message: format!(
                    "opening_hour ({}) must not be after closing_hour ({})",
                    self.opening_hour, self.closing_hour
                ),
            });
        }
        if self.default_monthly_goal.is_sign_negative() {
            return Err(Error::Config {
                message: "default_monthly_goal cannot be negative".to_string(),
            });
        }
        if self.default_opening_float.is_sign_negative() {
            return Err(Error::Config {
                message: "default_opening_float cannot be negative".to_string(),
            });
        }
        if self.weeks_per_month <= Decimal::ZERO {
            return Err(Error::Config {
                message: "weeks_per_month must be positive".to_string(),
            });
        }
        if self.cash_tolerance.is_sign_negative() {
            return Err(Error::Config {
                message: "cash_tolerance cannot be negative".to_string(),
            });
        }
        Ok(())
    }
}

/// Parses settings from TOML text.
///
/// # Errors
/// Returns `Error::Config` if the TOML is malformed, contains unknown keys, or
/// holds values that fail validation.
pub fn parse_settings(contents: &str) -> Result<Settings> {
    let file: SettingsFile = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse settings: {e}"),
    })?;
    Settings::try_from(file)
}

/// Loads settings from a TOML file
///
/// # Arguments
/// * `path` - Path to the settings file
///
/// # Returns
/// * `Ok(Settings)` - Parsed settings, or the defaults if the file does not exist
/// * `Err(Error::Io)` - The file exists but could not be read
/// * `Err(Error::Config)` - The file could not be parsed or validated
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::info!("Settings file {:?} not found, using defaults", path);
        return Ok(Settings::default());
    }
    tracing::debug!("Loading settings from {:?}", path);
    let contents = std::fs::read_to_string(path)?;
    parse_settings(&contents)
}

/// Loads settings from the path in `CASHFLOW_CONFIG`, or `./cashflow.toml`.
pub fn load_default_settings() -> Result<Settings> {
    let path =
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    load_settings(path)
}
