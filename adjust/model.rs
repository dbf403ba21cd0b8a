use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// --- Public Data Structures ---
// These define the caller-facing knobs of an adjustment run. The configuration is
// serializable so it can be embedded in a larger TOML document by the caller.

/// The scale on which the corrected association is reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkFunction {
    /// Differences in case probability. The corrected coefficients are reported as-is.
    #[default]
    Identity,
    /// Log relative risk. Corrected coefficients are divided by the prevalence.
    Log,
    /// Log odds. Corrected coefficients are divided by `prevalence * (1 - prevalence)`.
    Logit,
}

impl LinkFunction {
    pub fn name(&self) -> &'static str {
        match self {
            LinkFunction::Identity => "identity",
            LinkFunction::Log => "log",
            LinkFunction::Logit => "logit",
        }
    }
}

impl fmt::Display for LinkFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LinkFunction {
    type Err = ConfigError;

    /// Parses a link name. Matching ignores ASCII case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "identity" => Ok(LinkFunction::Identity),
            "log" => Ok(LinkFunction::Log),
            "logit" => Ok(LinkFunction::Logit),
            _ => Err(ConfigError::UnsupportedLink(s.to_string())),
        }
    }
}

/// How inputs that fall outside their plausible ranges are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Out-of-range sensitivity, specificity, cutpoint and class means pass
    /// through unchanged, as do negative or oversized trim counts. The only hard
    /// failures are an unsupported link, `S + C = 1`, mismatched lengths and
    /// errors raised by the fitter. Suspicious values are logged as warnings.
    #[default]
    Permissive,
    /// Rejects non-finite data, probabilities outside (0, 1), identical class
    /// means, trim counts outside the group they trim, and empty trimmed groups.
    Strict,
}

/// Configuration for a single adjustment run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjustmentConfig {
    pub link: LinkFunction,
    pub validation: ValidationMode,
}

impl AdjustmentConfig {
    pub fn new(link: LinkFunction) -> Self {
        Self {
            link,
            validation: ValidationMode::default(),
        }
    }

    pub fn strict(self) -> Self {
        Self {
            validation: ValidationMode::Strict,
            ..self
        }
    }

    /// Parses a configuration from TOML. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Errors raised while interpreting caller configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unsupported link function '{0}'. Expected one of: identity, log, logit.")]
    UnsupportedLink(String),
    #[error("Failed to parse TOML adjustment configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize adjustment configuration to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
}
