//! Key sources.
//!
//! This module provides:
//! - [`KeySource`] - Trait for anything that turns configuration into keys
//! - [`ExplicitSource`] / [`SecretSource`] - Single values and per-kid maps
//! - [`DirectorySource`] - One level of a key directory
//! - [`EnvSource`] - `JWT_*` environment variables
//!
//! Sources only discover and decode keys. Precedence between sources and
//! insertion into the registry happen in [`crate::load`].

use std::fmt;
use std::path::Path;

use crate::error::{KeyConfigError, Result};
use crate::key::{KeyEntry, KeyFamily};
use crate::kid::KeyRole;
use crate::origin::ConfigOrigin;
use crate::pem::parse_key_pem;

mod directory;
mod env;
mod explicit;

pub use directory::{DirectorySource, ScanEntry, ScanOutcome};
pub use env::{
    ECDSA_ENV_VARS, ENV_TOKEN_LIFETIME, ENV_TOKEN_NAME, ENV_TOKEN_SECRET, EnvKeyVars, EnvSource,
    Environment, RSA_ENV_VARS,
};
pub use explicit::{ExplicitSource, SecretSource};

/// Precedence stage of a source. Earlier stages win over later ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceStage {
    /// Single values and per-kid maps from structured config.
    ConfigExplicit,
    /// Key directory named in structured config.
    ConfigDirectory,
    /// Single values and per-kid variables from the environment.
    EnvExplicit,
    /// Key directory named in the environment.
    EnvDirectory,
}

impl SourceStage {
    /// The configuration origin this stage belongs to.
    pub fn origin(&self) -> ConfigOrigin {
        match self {
            Self::ConfigExplicit | Self::ConfigDirectory => ConfigOrigin::Config,
            Self::EnvExplicit | Self::EnvDirectory => ConfigOrigin::Env,
        }
    }
}

impl fmt::Display for SourceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ConfigExplicit => "config",
            Self::ConfigDirectory => "config directory",
            Self::EnvExplicit => "environment",
            Self::EnvDirectory => "environment directory",
        };
        write!(f, "{}", name)
    }
}

/// Why a candidate did not make it into the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The derived kid contains characters outside `[A-Za-z0-9_]`.
    InvalidKeyId { candidate: String },
    /// A directory entry that is not a `.key` file.
    NotKeyFile,
    /// A `<kid>/` directory without `private.key` or `public.key`.
    NoKeyFiles,
    /// An earlier stage already provided this kid.
    Shadowed { kid: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKeyId { candidate } => write!(f, "invalid key id {:?}", candidate),
            Self::NotKeyFile => write!(f, "not a .key file"),
            Self::NoKeyFiles => write!(f, "no private.key or public.key"),
            Self::Shadowed { kid } => write!(f, "kid {} already provided", kid),
        }
    }
}

/// A decoded key and where it came from.
#[derive(Debug, Clone)]
pub struct ResolvedKey {
    pub kid: String,
    pub entry: KeyEntry,
    /// Human-readable location, e.g. a path or variable name.
    pub source: String,
    /// Private or public half, when the directory layout names it.
    pub role: Option<KeyRole>,
}

/// One item discovered by a source.
#[derive(Debug, Clone)]
pub enum Candidate {
    Key(ResolvedKey),
    Skipped { source: String, reason: SkipReason },
}

/// Something that yields key candidates for one stage.
///
/// `collect` returns every candidate in the order it should be applied.
/// Any key that fails to decode is a hard error for the whole source.
pub trait KeySource {
    /// The precedence stage this source belongs to.
    fn stage(&self) -> SourceStage;

    /// Discover and decode keys.
    fn collect(&self) -> Result<Vec<Candidate>>;
}

/// Decode key text, checking that it matches the family the source serves.
pub(crate) fn decode_key(kid: &str, raw: &[u8], expected: KeyFamily) -> Result<KeyEntry> {
    let entry = parse_key_pem(kid, raw)?;
    let found = entry.family();
    if found != expected {
        return Err(KeyConfigError::UnexpectedKeyFamily {
            kid: kid.to_string(),
            expected,
            found,
        });
    }
    Ok(entry)
}

/// Read and decode a key file.
pub(crate) fn read_key_file(kid: &str, path: &Path, expected: KeyFamily) -> Result<KeyEntry> {
    let raw = std::fs::read(path).map_err(|e| KeyConfigError::io(path, e))?;
    decode_key(kid, &raw, expected)
}
