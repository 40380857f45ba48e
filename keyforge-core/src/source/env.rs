//! Keys and token settings from environment variables.
//!
//! For RSA keys (ECDSA uses `JWT_ECDSA_*` the same way):
//!
//! ```text
//! JWT_RSA_FILE="<path>"           key file for kid "0"
//! JWT_RSA_KEY="<PEM>"             key for kid "0"
//! JWT_RSA_FILE_<KID>="<path>"     key file for <kid>
//! JWT_RSA_KEY_<KID>="<PEM>"       key for <kid>
//! JWT_RSA_DIR="<path>"            key directory
//! ```
//!
//! Kids taken from variable names are lowercased. Bare variables are applied
//! before per-kid ones, so `JWT_RSA_KEY_0` overrides `JWT_RSA_KEY`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use tracing::debug;

use crate::error::Result;
use crate::key::KeyFamily;
use crate::kid::kid_from_env_suffix;

use super::{Candidate, ExplicitSource, KeySource, SkipReason, SourceStage};

/// Shared secret for HMAC signing.
pub const ENV_TOKEN_SECRET: &str = "JWT_TOKEN_SECRET";

/// Token lifetime in seconds.
pub const ENV_TOKEN_LIFETIME: &str = "JWT_TOKEN_LIFETIME";

/// Token name.
pub const ENV_TOKEN_NAME: &str = "JWT_TOKEN_NAME";

/// Variable names for one key family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvKeyVars {
    pub family: KeyFamily,
    /// Key directory.
    pub dir: &'static str,
    /// Key file, also the prefix for `<file>_<KID>`.
    pub file: &'static str,
    /// PEM value, also the prefix for `<key>_<KID>`.
    pub key: &'static str,
}

pub const RSA_ENV_VARS: EnvKeyVars = EnvKeyVars {
    family: KeyFamily::Rsa,
    dir: "JWT_RSA_DIR",
    file: "JWT_RSA_FILE",
    key: "JWT_RSA_KEY",
};

pub const ECDSA_ENV_VARS: EnvKeyVars = EnvKeyVars {
    family: KeyFamily::Ecdsa,
    dir: "JWT_ECDSA_DIR",
    file: "JWT_ECDSA_FILE",
    key: "JWT_ECDSA_KEY",
};

/// A snapshot of environment variables.
///
/// Empty values are treated as unset. Debug output lists variable names only.
#[derive(Clone, Default)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// An empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current process environment, ignoring non-UTF-8 entries.
    pub fn from_process() -> Self {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }

    /// Set a variable.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// A variable's value, if set and non-empty.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Variables named `<prefix>_<suffix>`, yielding `(name, suffix, value)`.
    fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str, &'a str)> + 'a {
        self.vars.iter().filter_map(move |(name, value)| {
            let suffix = name.strip_prefix(prefix)?.strip_prefix('_')?;
            (!value.is_empty()).then_some((name.as_str(), suffix, value.as_str()))
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("vars", &self.vars.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Explicit key variables for one family.
///
/// The directory variable is not handled here; it becomes a separate
/// [`DirectorySource`](super::DirectorySource) via [`EnvSource::dir`].
#[derive(Debug, Clone)]
pub struct EnvSource<'a> {
    env: &'a Environment,
    vars: EnvKeyVars,
}

impl<'a> EnvSource<'a> {
    pub fn new(env: &'a Environment, vars: EnvKeyVars) -> Self {
        Self { env, vars }
    }

    /// The key directory named by the environment, if any.
    pub fn dir(&self) -> Option<PathBuf> {
        self.env.get(self.vars.dir).map(PathBuf::from)
    }

    fn explicit(&self) -> (ExplicitSource, Vec<Candidate>) {
        let vars = self.vars;
        let mut source = ExplicitSource::new(SourceStage::EnvExplicit, vars.family);
        let mut skipped = Vec::new();

        if let Some(path) = self.env.get(vars.file) {
            source = source.with_file(vars.file, path);
        }
        if let Some(pem) = self.env.get(vars.key) {
            source = source.with_key(vars.key, pem);
        }

        for (prefix, is_file) in [(vars.file, true), (vars.key, false)] {
            for (name, suffix, value) in self.env.with_prefix(prefix) {
                let Some(kid) = kid_from_env_suffix(suffix) else {
                    debug!("ignoring {}: invalid key id {:?}", name, suffix);
                    skipped.push(Candidate::Skipped {
                        source: name.to_string(),
                        reason: SkipReason::InvalidKeyId {
                            candidate: suffix.to_string(),
                        },
                    });
                    continue;
                };
                if is_file {
                    source.add_file(name, kid, value);
                } else {
                    source.add_key(name, kid, value);
                }
            }
        }

        (source, skipped)
    }
}

impl KeySource for EnvSource<'_> {
    fn stage(&self) -> SourceStage {
        SourceStage::EnvExplicit
    }

    fn collect(&self) -> Result<Vec<Candidate>> {
        let (source, skipped) = self.explicit();
        let mut candidates = source.collect()?;
        candidates.extend(skipped);
        Ok(candidates)
    }
}
