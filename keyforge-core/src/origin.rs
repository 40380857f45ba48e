//! Provenance of a token configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KeyConfigError;

/// Sentinel passed by config loaders that found no configuration at all.
pub const EMPTY_ORIGIN: &str = "empty";

/// Where the token configuration came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    /// Structured configuration (config file, server directives).
    Config,
    /// Environment variables.
    Env,
    /// Not recorded yet.
    #[default]
    Unknown,
}

impl ConfigOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Env => "env",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ConfigOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConfigOrigin {
    type Err = KeyConfigError;

    /// Accepts `config` and `env` only; `unknown` cannot be set explicitly.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "config" => Ok(Self::Config),
            "env" => Ok(Self::Env),
            EMPTY_ORIGIN => Err(KeyConfigError::EmptyTokenConfigOrigin),
            other => Err(KeyConfigError::UnsupportedTokenConfigOrigin {
                origin: other.to_string(),
            }),
        }
    }
}
