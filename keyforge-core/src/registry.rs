//! The canonical `kid -> key` mapping.
//!
//! Invariants:
//! - every entry shares the family committed by the first successful insert
//! - the first asymmetric insert publishes its public key at the default kid
//!   `"0"` unless something is already stored there
//! - a later insert at the same kid replaces the earlier entry
//!
//! Entries are kept in a `BTreeMap`, so iteration follows kid order and
//! [`KeyRegistry::first_private_key`] is deterministic.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::error::{KeyConfigError, Result};
use crate::key::{KeyEntry, KeyFamily, classify};
use crate::kid::DEFAULT_KEY_ID;

/// Registry of keys for one token configuration.
#[derive(Debug, Clone, Default)]
pub struct KeyRegistry {
    family: Option<KeyFamily>,
    keys: BTreeMap<String, KeyEntry>,
    /// Set while the default kid holds a copy published by another insert.
    derived_default: bool,
}

impl KeyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key under `kid`.
    ///
    /// Fails when the kid is empty or the key's family differs from the
    /// committed family; the registry is unchanged on failure.
    pub fn insert(&mut self, kid: &str, entry: KeyEntry) -> Result<()> {
        if kid.is_empty() {
            return Err(KeyConfigError::EmptyKeyIdentifier);
        }

        let family = classify(&entry);
        match self.family {
            Some(committed) if committed != family => {
                return Err(KeyConfigError::MixedConfigKeyType {
                    committed,
                    attempted: family,
                });
            }
            Some(_) => {}
            None => {
                debug!("committing registry to {} keys", family);
                self.family = Some(family);
            }
        }

        let public = entry.public_key();
        trace!("inserting {} at kid {}", entry.describe(), kid);
        self.keys.insert(kid.to_string(), entry);
        if kid == DEFAULT_KEY_ID {
            self.derived_default = false;
        }

        if let Some(public) = public {
            self.maybe_set_default(public);
        }
        Ok(())
    }

    /// Publish `public` at the default kid if nothing is stored there yet.
    ///
    /// Returns whether the default was set. Only the first caller wins.
    pub fn maybe_set_default(&mut self, public: KeyEntry) -> bool {
        if self.keys.contains_key(DEFAULT_KEY_ID) {
            return false;
        }
        debug!("using {} as default key", public.describe());
        self.keys.insert(DEFAULT_KEY_ID.to_string(), public);
        self.derived_default = true;
        true
    }

    /// The committed family and the full mapping.
    pub fn get_all(&self) -> (Option<KeyFamily>, &BTreeMap<String, KeyEntry>) {
        (self.family, &self.keys)
    }

    /// The committed family, if any key has been inserted.
    pub fn family(&self) -> Option<KeyFamily> {
        self.family
    }

    /// Look up the entry stored at `kid`.
    pub fn get(&self, kid: &str) -> Option<&KeyEntry> {
        self.keys.get(kid)
    }

    /// The verification key for `kid`.
    ///
    /// A private key at `kid` yields its derived public key.
    pub fn public_key(&self, kid: &str) -> Option<KeyEntry> {
        self.keys.get(kid).and_then(KeyEntry::public_key)
    }

    /// Whether `kid` holds a key placed there by a source, as opposed to a
    /// default copied from another insert.
    pub fn is_provided(&self, kid: &str) -> bool {
        self.keys.contains_key(kid) && !(kid == DEFAULT_KEY_ID && self.derived_default)
    }

    /// Whether the default kid holds a copy published by another insert.
    pub fn has_derived_default(&self) -> bool {
        self.derived_default
    }

    /// The signing key with the lowest kid.
    ///
    /// Only named kids are considered; the default kid is skipped even when
    /// it holds a private key.
    pub fn first_private_key(&self) -> Result<(&KeyEntry, &str)> {
        self.keys
            .iter()
            .find(|(kid, entry)| kid.as_str() != DEFAULT_KEY_ID && entry.is_private())
            .map(|(kid, entry)| (entry, kid.as_str()))
            .ok_or_else(|| KeyConfigError::keys_not_found(self.family))
    }

    /// Kids in order.
    pub fn kids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::SharedSecret;
    use crate::pem::parse_key_pem;

    const RSA_PRIVATE: &str = include_str!("../tests/fixtures/rsa_private_pkcs1.pem");
    const RSA2_PRIVATE: &str = include_str!("../tests/fixtures/rsa2_private_pkcs1.pem");
    const RSA_PUBLIC: &str = include_str!("../tests/fixtures/rsa_public.pem");
    const EC_PRIVATE: &str = include_str!("../tests/fixtures/ec_p256_private_sec1.pem");
    const EC_PUBLIC: &str = include_str!("../tests/fixtures/ec_p256_public.pem");

    fn key(pem: &str) -> KeyEntry {
        parse_key_pem("test", pem.as_bytes()).unwrap()
    }

    #[test]
    fn test_private_key_publishes_default() {
        let mut registry = KeyRegistry::new();
        registry.insert("k1", key(RSA_PRIVATE)).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.get("k1").unwrap().is_private());
        assert_eq!(registry.get("0").unwrap(), &key(RSA_PUBLIC));
        assert!(registry.has_derived_default());
        assert!(!registry.is_provided("0"));
        assert_eq!(registry.family(), Some(KeyFamily::Rsa));
    }

    #[test]
    fn test_private_key_exposes_public_at_same_kid() {
        let mut registry = KeyRegistry::new();
        registry.insert("k1", key(RSA_PRIVATE)).unwrap();
        assert_eq!(registry.public_key("k1").unwrap(), key(RSA_PUBLIC));
    }

    #[test]
    fn test_first_writer_keeps_default() {
        let mut registry = KeyRegistry::new();
        registry.insert("k1", key(RSA_PRIVATE)).unwrap();
        registry.insert("k2", key(RSA2_PRIVATE)).unwrap();

        assert_eq!(registry.get("0").unwrap(), &key(RSA_PUBLIC));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_explicit_default_replaces_derived_copy() {
        let mut registry = KeyRegistry::new();
        registry.insert("k1", key(RSA_PRIVATE)).unwrap();
        registry.insert("0", key(RSA2_PRIVATE)).unwrap();

        assert!(registry.get("0").unwrap().is_private());
        assert!(registry.is_provided("0"));
        assert!(!registry.has_derived_default());
    }

    #[test]
    fn test_empty_kid_rejected() {
        let mut registry = KeyRegistry::new();
        let err = registry.insert("", key(RSA_PRIVATE)).unwrap_err();
        assert!(matches!(err, KeyConfigError::EmptyKeyIdentifier));
        assert!(registry.is_empty());
        assert_eq!(registry.family(), None);
    }

    #[test]
    fn test_mixed_families_rejected_in_either_order() {
        let pairs = [
            (key(RSA_PRIVATE), key(EC_PRIVATE)),
            (key(EC_PUBLIC), key(RSA_PUBLIC)),
            (KeyEntry::from(SharedSecret::new("s")), key(RSA_PRIVATE)),
            (key(EC_PRIVATE), KeyEntry::from(SharedSecret::new("s"))),
        ];
        for (first, second) in pairs {
            let mut registry = KeyRegistry::new();
            let committed = first.family();
            registry.insert("a", first).unwrap();
            let before = registry.len();

            let err = registry.insert("b", second).unwrap_err();
            assert!(matches!(
                err,
                KeyConfigError::MixedConfigKeyType { committed: c, .. } if c == committed
            ));
            assert_eq!(registry.len(), before);
            assert!(registry.get("b").is_none());
        }
    }

    #[test]
    fn test_last_writer_wins() {
        let mut registry = KeyRegistry::new();
        registry.insert("k", key(RSA_PUBLIC)).unwrap();
        registry.insert("k", key(RSA2_PRIVATE)).unwrap();
        assert!(registry.get("k").unwrap().is_private());
    }

    #[test]
    fn test_secret_does_not_publish_default() {
        let mut registry = KeyRegistry::new();
        registry
            .insert("k1", KeyEntry::from(SharedSecret::new("s")))
            .unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("0").is_none());
    }

    #[test]
    fn test_first_private_key_skips_derived_default() {
        let mut registry = KeyRegistry::new();
        registry.maybe_set_default(key(RSA_PUBLIC));
        registry.insert("pub", key(RSA_PUBLIC)).unwrap();

        let err = registry.first_private_key().unwrap_err();
        assert!(matches!(err, KeyConfigError::RsaKeysNotFound));

        let mut registry = KeyRegistry::new();
        registry.insert("pub", key(EC_PUBLIC)).unwrap();
        let err = registry.first_private_key().unwrap_err();
        assert!(matches!(err, KeyConfigError::EcdsaKeysNotFound));
    }

    #[test]
    fn test_first_private_key_is_lowest_named_kid() {
        let mut registry = KeyRegistry::new();
        registry.insert("0", key(RSA_PRIVATE)).unwrap();
        registry.insert("zeta", key(RSA2_PRIVATE)).unwrap();
        registry.insert("alpha", key(RSA_PRIVATE)).unwrap();

        let (entry, kid) = registry.first_private_key().unwrap();
        assert_eq!(kid, "alpha");
        assert!(entry.is_private());
    }

    #[test]
    fn test_first_private_key_ignores_default_kid() {
        let mut registry = KeyRegistry::new();
        registry.insert("0", key(EC_PRIVATE)).unwrap();
        registry.insert("verify", key(EC_PUBLIC)).unwrap();

        let err = registry.first_private_key().unwrap_err();
        assert!(matches!(err, KeyConfigError::EcdsaKeysNotFound));
    }
}
