//! Decoding raw PEM key material into [`KeyEntry`] values.
//!
//! The PEM label decides how the DER body is read. PKCS#8 and SPKI bodies
//! carry an algorithm identifier, which is inspected before parsing so that
//! a corrupt RSA key is reported as a parse error while an Ed25519 key is
//! reported as an unsupported key type.

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::spki::SubjectPublicKeyInfoRef;
use rsa::pkcs8::{AlgorithmIdentifierRef, DecodePrivateKey, DecodePublicKey, ObjectIdentifier, PrivateKeyInfo};
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::error::{KeyConfigError, Result};
use crate::key::{EcdsaPrivateKey, EcdsaPublicKey, KeyEntry};

const RSA_ENCRYPTION_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const EC_PUBLIC_KEY_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const SECP256R1_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SECP384R1_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");

/// Label emitted by `openssl ecparam -genkey` ahead of the key block.
const EC_PARAMETERS_LABEL: &str = "EC PARAMETERS";

/// Layout of a PEM block, derived from its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PemKind {
    /// `RSA PRIVATE KEY`
    RsaPrivatePkcs1,
    /// `RSA PUBLIC KEY`
    RsaPublicPkcs1,
    /// `EC PRIVATE KEY`
    EcPrivateSec1,
    /// `PRIVATE KEY`
    PrivatePkcs8,
    /// `PUBLIC KEY`
    PublicSpki,
}

/// Map a PEM label onto the key layout it announces.
///
/// Labels that do not describe key material (certificates, CSRs, encrypted
/// keys) fail with [`KeyConfigError::UnsupportedConfigKeyType`].
pub fn classify_pem_label(label: &str) -> Result<PemKind> {
    match label {
        "RSA PRIVATE KEY" => Ok(PemKind::RsaPrivatePkcs1),
        "RSA PUBLIC KEY" => Ok(PemKind::RsaPublicPkcs1),
        "EC PRIVATE KEY" => Ok(PemKind::EcPrivateSec1),
        "PRIVATE KEY" => Ok(PemKind::PrivatePkcs8),
        "PUBLIC KEY" => Ok(PemKind::PublicSpki),
        other => Err(KeyConfigError::UnsupportedConfigKeyType {
            label: other.to_string(),
        }),
    }
}

/// Decode PEM text into a key entry for `kid`.
pub fn parse_key_pem(kid: &str, raw: &[u8]) -> Result<KeyEntry> {
    let blocks = pem::parse_many(raw).map_err(|e| KeyConfigError::parse(kid, e))?;

    let block = blocks
        .iter()
        .find(|block| block.tag() != EC_PARAMETERS_LABEL)
        .ok_or_else(|| KeyConfigError::UnsupportedConfigKeyType {
            label: if blocks.is_empty() {
                "non-PEM value".to_string()
            } else {
                EC_PARAMETERS_LABEL.to_string()
            },
        })?;

    let der = block.contents();
    match classify_pem_label(block.tag())? {
        PemKind::RsaPrivatePkcs1 => RsaPrivateKey::from_pkcs1_der(der)
            .map(KeyEntry::RsaPrivate)
            .map_err(|e| KeyConfigError::parse(kid, e)),
        PemKind::RsaPublicPkcs1 => RsaPublicKey::from_pkcs1_der(der)
            .map(KeyEntry::RsaPublic)
            .map_err(|e| KeyConfigError::parse(kid, e)),
        PemKind::EcPrivateSec1 => parse_sec1(kid, der),
        PemKind::PrivatePkcs8 => parse_pkcs8(kid, der),
        PemKind::PublicSpki => parse_spki(kid, der),
    }
}

fn parse_sec1(kid: &str, der: &[u8]) -> Result<KeyEntry> {
    if let Ok(key) = p256::SecretKey::from_sec1_der(der) {
        return Ok(KeyEntry::EcdsaPrivate(EcdsaPrivateKey::P256(key)));
    }
    p384::SecretKey::from_sec1_der(der)
        .map(|key| KeyEntry::EcdsaPrivate(EcdsaPrivateKey::P384(key)))
        .map_err(|e| KeyConfigError::parse(kid, format!("SEC1 key is not P-256 or P-384: {}", e)))
}

fn parse_pkcs8(kid: &str, der: &[u8]) -> Result<KeyEntry> {
    let info = PrivateKeyInfo::try_from(der).map_err(|e| KeyConfigError::parse(kid, e))?;
    match algorithm_of(kid, &info.algorithm)? {
        Algorithm::Rsa => RsaPrivateKey::from_pkcs8_der(der)
            .map(KeyEntry::RsaPrivate)
            .map_err(|e| KeyConfigError::parse(kid, e)),
        Algorithm::P256 => p256::SecretKey::from_pkcs8_der(der)
            .map(|key| KeyEntry::EcdsaPrivate(EcdsaPrivateKey::P256(key)))
            .map_err(|e| KeyConfigError::parse(kid, e)),
        Algorithm::P384 => p384::SecretKey::from_pkcs8_der(der)
            .map(|key| KeyEntry::EcdsaPrivate(EcdsaPrivateKey::P384(key)))
            .map_err(|e| KeyConfigError::parse(kid, e)),
    }
}

fn parse_spki(kid: &str, der: &[u8]) -> Result<KeyEntry> {
    let info = SubjectPublicKeyInfoRef::try_from(der).map_err(|e| KeyConfigError::parse(kid, e))?;
    match algorithm_of(kid, &info.algorithm)? {
        Algorithm::Rsa => RsaPublicKey::from_public_key_der(der)
            .map(KeyEntry::RsaPublic)
            .map_err(|e| KeyConfigError::parse(kid, e)),
        Algorithm::P256 => p256::PublicKey::from_public_key_der(der)
            .map(|key| KeyEntry::EcdsaPublic(EcdsaPublicKey::P256(key)))
            .map_err(|e| KeyConfigError::parse(kid, e)),
        Algorithm::P384 => p384::PublicKey::from_public_key_der(der)
            .map(|key| KeyEntry::EcdsaPublic(EcdsaPublicKey::P384(key)))
            .map_err(|e| KeyConfigError::parse(kid, e)),
    }
}

enum Algorithm {
    Rsa,
    P256,
    P384,
}

fn algorithm_of(kid: &str, algorithm: &AlgorithmIdentifierRef<'_>) -> Result<Algorithm> {
    let unsupported = |kind: String| KeyConfigError::UnsupportedKeyType {
        kid: kid.to_string(),
        kind,
    };

    if algorithm.oid == RSA_ENCRYPTION_OID {
        return Ok(Algorithm::Rsa);
    }
    if algorithm.oid != EC_PUBLIC_KEY_OID {
        return Err(unsupported(format!("algorithm {}", algorithm.oid)));
    }

    let curve = algorithm
        .parameters_oid()
        .map_err(|e| KeyConfigError::parse(kid, format!("missing EC curve parameter: {}", e)))?;
    if curve == SECP256R1_OID {
        Ok(Algorithm::P256)
    } else if curve == SECP384R1_OID {
        Ok(Algorithm::P384)
    } else {
        Err(unsupported(format!("ECDSA curve {}", curve)))
    }
}
