//! Key identifier (`kid`) rules.
//!
//! Identifiers taken from file names, directory names, and environment
//! variable suffixes may only contain ASCII letters, digits, and underscores.
//! Candidates outside that set are skipped rather than rejected, since a key
//! directory commonly holds unrelated files.
//!
//! Identifiers given explicitly in structured configuration are used as-is.

use std::fmt;

/// The key id used when no explicit id is given.
pub const DEFAULT_KEY_ID: &str = "0";

/// Whether a key is the private or public half, as recorded by its file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyRole {
    Private,
    Public,
}

impl KeyRole {
    /// Suffix appended to the base kid in the registry.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Private => "_private",
            Self::Public => "_public",
        }
    }

    /// The file name carrying this role inside a `<kid>/` directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Private => "private.key",
            Self::Public => "public.key",
        }
    }
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Private => write!(f, "private"),
            Self::Public => write!(f, "public"),
        }
    }
}

/// A kid derived from a directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedKid {
    /// The identifier stored in the registry.
    pub kid: String,
    /// The role recorded by the name, if any.
    pub role: Option<KeyRole>,
}

/// Check that every character is an ASCII letter, digit, or underscore.
pub fn is_valid_kid(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Accept a candidate kid unchanged, or `None` when it must be skipped.
pub fn derive_kid(candidate: &str) -> Option<&str> {
    is_valid_kid(candidate).then_some(candidate)
}

/// Split a `_private`/`_public` suffix off a kid.
pub fn split_role(kid: &str) -> (&str, Option<KeyRole>) {
    for role in [KeyRole::Private, KeyRole::Public] {
        if let Some(base) = kid.strip_suffix(role.suffix()) {
            if !base.is_empty() {
                return (base, Some(role));
            }
        }
    }
    (kid, None)
}

/// Kid for a flat `<kid>.key` file name.
pub fn kid_from_key_file(file_name: &str) -> Option<DerivedKid> {
    let stem = file_name.strip_suffix(".key")?;
    let kid = derive_kid(stem)?;
    let (_, role) = split_role(kid);
    Some(DerivedKid {
        kid: kid.to_string(),
        role,
    })
}

/// Kid for a `<dir>/private.key` or `<dir>/public.key` pair member.
pub fn kid_from_subdirectory(dir_name: &str, role: KeyRole) -> Option<DerivedKid> {
    let base = derive_kid(dir_name)?;
    Some(DerivedKid {
        kid: format!("{}{}", base, role.suffix()),
        role: Some(role),
    })
}

/// Kid for an environment variable suffix. Environment kids are lowercased.
pub fn kid_from_env_suffix(suffix: &str) -> Option<String> {
    let kid = suffix.to_lowercase();
    is_valid_kid(&kid).then_some(kid)
}
