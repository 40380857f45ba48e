//! Error types for key resolution and token configuration.

use std::path::PathBuf;

use thiserror::Error;

use crate::key::KeyFamily;

/// Errors raised while resolving key material or validating token configuration.
///
/// Every variant is terminal for the operation that produced it. Callers
/// loading configuration at startup should treat any of these as fatal.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KeyConfigError {
    /// A key was inserted with an empty key identifier.
    #[error("key id not found: key identifier is empty")]
    EmptyKeyIdentifier,

    /// Key material decoded, but its algorithm is not RSA or a supported ECDSA curve.
    #[error("unsupported key type {kind} for key id {kid}")]
    UnsupportedKeyType { kid: String, kind: String },

    /// A raw configuration value is not key material at all.
    #[error("unsupported config key type: {label}")]
    UnsupportedConfigKeyType { label: String },

    /// The key family conflicts with the family already committed to the registry.
    #[error("mixed config key types: {committed} and {attempted}")]
    MixedConfigKeyType {
        committed: KeyFamily,
        attempted: KeyFamily,
    },

    /// A family-specific source produced a key of another family.
    #[error("key id {kid}: expected {expected} key, found {found} key")]
    UnexpectedKeyFamily {
        kid: String,
        expected: KeyFamily,
        found: KeyFamily,
    },

    /// No RSA private key is available for signing.
    #[error("no RSA private key found")]
    RsaKeysNotFound,

    /// No ECDSA private key is available for signing.
    #[error("no ECDSA private key found")]
    EcdsaKeysNotFound,

    /// The origin sentinel `empty` was supplied.
    #[error("token config origin is empty")]
    EmptyTokenConfigOrigin,

    /// The origin is neither `config` nor `env`.
    #[error("unsupported token config origin: {origin}")]
    UnsupportedTokenConfigOrigin { origin: String },

    /// Raw key bytes could not be decoded.
    #[error("failed to parse key {kid}: {message}")]
    KeyParse { kid: String, message: String },

    /// A configured key file or directory could not be read.
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An environment variable held a value that cannot be used.
    #[error("invalid value for {var}: {message}")]
    InvalidEnvValue { var: String, message: String },

    /// The configured sign method is not recognized.
    #[error("unsupported token sign method: {method}")]
    UnsupportedSignMethod { method: String },

    /// The configured sign method does not fit the loaded keys.
    #[error("token sign method {method} cannot be used with {family} keys")]
    SignMethodMismatch { method: String, family: KeyFamily },

    /// TOML configuration could not be parsed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON configuration could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration directory not available.
    #[error("configuration directory not available")]
    ConfigDirUnavailable,
}

impl KeyConfigError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(kid: &str, message: impl std::fmt::Display) -> Self {
        Self::KeyParse {
            kid: kid.to_string(),
            message: message.to_string(),
        }
    }

    /// The "no private key" error matching a registry family.
    pub fn keys_not_found(family: Option<KeyFamily>) -> Self {
        match family {
            Some(KeyFamily::Ecdsa) => Self::EcdsaKeysNotFound,
            _ => Self::RsaKeysNotFound,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, KeyConfigError>;
