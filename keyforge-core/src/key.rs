//! Key material types and family classification.
//!
//! This module defines:
//! - [`KeyFamily`] - The classification of a key (`secret`, `rsa`, `ecdsa`)
//! - [`KeyEntry`] - One decoded key held by the registry
//! - [`SharedSecret`] - An HMAC secret that never prints its value
//! - [`classify`] - Maps a key entry onto its family

use std::fmt;

use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Classification of key material. A registry holds keys of one family only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyFamily {
    /// Shared secret used for HMAC signing.
    Secret,
    /// RSA key pair or public key.
    Rsa,
    /// ECDSA key pair or public key.
    Ecdsa,
}

impl KeyFamily {
    /// The family tag as used in configuration and diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Secret => "secret",
            Self::Rsa => "rsa",
            Self::Ecdsa => "ecdsa",
        }
    }
}

impl fmt::Display for KeyFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A shared secret for HMAC signing.
///
/// The inner value is only accessible via [`expose()`](SharedSecret::expose)
/// and is zeroed when dropped. Debug and Display show `[REDACTED]`.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SharedSecret(String);

impl SharedSecret {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret holds no characters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SharedSecret([REDACTED])")
    }
}

impl fmt::Display for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for SharedSecret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SharedSecret {}

/// Supported ECDSA curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EcdsaCurve {
    P256,
    P384,
}

impl EcdsaCurve {
    /// NIST curve name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::P256 => "P-256",
            Self::P384 => "P-384",
        }
    }
}

/// An ECDSA private key on one of the supported curves.
#[derive(Clone, PartialEq, Eq)]
pub enum EcdsaPrivateKey {
    P256(p256::SecretKey),
    P384(p384::SecretKey),
}

impl EcdsaPrivateKey {
    pub fn curve(&self) -> EcdsaCurve {
        match self {
            Self::P256(_) => EcdsaCurve::P256,
            Self::P384(_) => EcdsaCurve::P384,
        }
    }

    /// Derive the matching public key.
    pub fn public_key(&self) -> EcdsaPublicKey {
        match self {
            Self::P256(key) => EcdsaPublicKey::P256(key.public_key()),
            Self::P384(key) => EcdsaPublicKey::P384(key.public_key()),
        }
    }
}

/// An ECDSA public key on one of the supported curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcdsaPublicKey {
    P256(p256::PublicKey),
    P384(p384::PublicKey),
}

impl EcdsaPublicKey {
    pub fn curve(&self) -> EcdsaCurve {
        match self {
            Self::P256(_) => EcdsaCurve::P256,
            Self::P384(_) => EcdsaCurve::P384,
        }
    }
}

/// One key held by the registry.
#[derive(Clone, PartialEq, Eq)]
pub enum KeyEntry {
    /// HMAC shared secret.
    Secret(SharedSecret),
    /// RSA private key; the public half is derived on demand.
    RsaPrivate(RsaPrivateKey),
    /// RSA public key.
    RsaPublic(RsaPublicKey),
    /// ECDSA private key; the public half is derived on demand.
    EcdsaPrivate(EcdsaPrivateKey),
    /// ECDSA public key.
    EcdsaPublic(EcdsaPublicKey),
}

impl KeyEntry {
    /// The family this entry belongs to.
    pub fn family(&self) -> KeyFamily {
        classify(self)
    }

    /// Whether this entry can sign (RSA or ECDSA private key).
    pub fn is_private(&self) -> bool {
        matches!(self, Self::RsaPrivate(_) | Self::EcdsaPrivate(_))
    }

    /// The public key for verification.
    ///
    /// Private keys yield their derived public key, public keys yield a copy
    /// of themselves, and shared secrets have no public half.
    pub fn public_key(&self) -> Option<KeyEntry> {
        match self {
            Self::Secret(_) => None,
            Self::RsaPrivate(key) => Some(Self::RsaPublic(key.to_public_key())),
            Self::RsaPublic(key) => Some(Self::RsaPublic(key.clone())),
            Self::EcdsaPrivate(key) => Some(Self::EcdsaPublic(key.public_key())),
            Self::EcdsaPublic(key) => Some(Self::EcdsaPublic(*key)),
        }
    }

    /// Short human-readable description, safe to log.
    pub fn describe(&self) -> String {
        match self {
            Self::Secret(_) => "shared secret".to_string(),
            Self::RsaPrivate(_) => "RSA private key".to_string(),
            Self::RsaPublic(_) => "RSA public key".to_string(),
            Self::EcdsaPrivate(key) => format!("ECDSA {} private key", key.curve().name()),
            Self::EcdsaPublic(key) => format!("ECDSA {} public key", key.curve().name()),
        }
    }
}

impl fmt::Debug for KeyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyEntry({})", self.describe())
    }
}

impl From<SharedSecret> for KeyEntry {
    fn from(secret: SharedSecret) -> Self {
        Self::Secret(secret)
    }
}

impl From<RsaPrivateKey> for KeyEntry {
    fn from(key: RsaPrivateKey) -> Self {
        Self::RsaPrivate(key)
    }
}

impl From<RsaPublicKey> for KeyEntry {
    fn from(key: RsaPublicKey) -> Self {
        Self::RsaPublic(key)
    }
}

impl From<EcdsaPrivateKey> for KeyEntry {
    fn from(key: EcdsaPrivateKey) -> Self {
        Self::EcdsaPrivate(key)
    }
}

impl From<EcdsaPublicKey> for KeyEntry {
    fn from(key: EcdsaPublicKey) -> Self {
        Self::EcdsaPublic(key)
    }
}

/// Determine the family of a key entry.
pub fn classify(entry: &KeyEntry) -> KeyFamily {
    match entry {
        KeyEntry::Secret(_) => KeyFamily::Secret,
        KeyEntry::RsaPrivate(_) | KeyEntry::RsaPublic(_) => KeyFamily::Rsa,
        KeyEntry::EcdsaPrivate(_) | KeyEntry::EcdsaPublic(_) => KeyFamily::Ecdsa,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pem::parse_key_pem;

    const RSA_PRIVATE: &str = include_str!("../tests/fixtures/rsa_private_pkcs1.pem");
    const RSA_PUBLIC: &str = include_str!("../tests/fixtures/rsa_public.pem");
    const EC_PRIVATE: &str = include_str!("../tests/fixtures/ec_p256_private_sec1.pem");
    const EC_PUBLIC: &str = include_str!("../tests/fixtures/ec_p256_public.pem");

    #[test]
    fn test_classify_secret() {
        let entry = KeyEntry::from(SharedSecret::new("hunter2"));
        assert_eq!(classify(&entry), KeyFamily::Secret);
        assert!(entry.public_key().is_none());
        assert!(!entry.is_private());
    }

    #[test]
    fn test_rsa_private_and_derived_public_are_rsa() {
        let private = parse_key_pem("k1", RSA_PRIVATE.as_bytes()).unwrap();
        assert_eq!(classify(&private), KeyFamily::Rsa);
        assert!(private.is_private());

        let public = private.public_key().unwrap();
        assert_eq!(classify(&public), KeyFamily::Rsa);
        assert!(!public.is_private());

        let expected = parse_key_pem("k1", RSA_PUBLIC.as_bytes()).unwrap();
        assert_eq!(public, expected);
    }

    #[test]
    fn test_ecdsa_private_and_derived_public_are_ecdsa() {
        let private = parse_key_pem("k1", EC_PRIVATE.as_bytes()).unwrap();
        assert_eq!(classify(&private), KeyFamily::Ecdsa);

        let public = private.public_key().unwrap();
        assert_eq!(classify(&public), KeyFamily::Ecdsa);
        assert_eq!(public, parse_key_pem("k1", EC_PUBLIC.as_bytes()).unwrap());
    }

    #[test]
    fn test_shared_secret_is_redacted() {
        let secret = SharedSecret::new("hunter2");
        assert_eq!(format!("{}", secret), "[REDACTED]");
        assert_eq!(format!("{:?}", secret), "SharedSecret([REDACTED])");
        assert_eq!(
            format!("{:?}", KeyEntry::from(secret)),
            "KeyEntry(shared secret)"
        );
    }

    #[test]
    fn test_family_serializes_lowercase() {
        let json = serde_json::to_string(&KeyFamily::Ecdsa).unwrap();
        assert_eq!(json, "\"ecdsa\"");
    }
}
