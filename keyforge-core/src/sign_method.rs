//! Token signing method selector.

use std::fmt;
use std::str::FromStr;

use crate::error::KeyConfigError;
use crate::key::{EcdsaCurve, KeyFamily};

/// JWS algorithm used to sign tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignMethod {
    HS256,
    HS384,
    HS512,
    RS256,
    RS384,
    RS512,
    ES256,
    ES384,
}

impl SignMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
        }
    }

    /// The key family this method signs with.
    pub fn family(&self) -> KeyFamily {
        match self {
            Self::HS256 | Self::HS384 | Self::HS512 => KeyFamily::Secret,
            Self::RS256 | Self::RS384 | Self::RS512 => KeyFamily::Rsa,
            Self::ES256 | Self::ES384 => KeyFamily::Ecdsa,
        }
    }

    /// The curve an ECDSA method requires.
    pub fn curve(&self) -> Option<EcdsaCurve> {
        match self {
            Self::ES256 => Some(EcdsaCurve::P256),
            Self::ES384 => Some(EcdsaCurve::P384),
            _ => None,
        }
    }

    /// Fail unless this method signs with `family` keys.
    pub fn check_family(&self, family: KeyFamily) -> Result<(), KeyConfigError> {
        if self.family() != family {
            return Err(KeyConfigError::SignMethodMismatch {
                method: self.as_str().to_string(),
                family,
            });
        }
        Ok(())
    }
}

impl fmt::Display for SignMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SignMethod {
    type Err = KeyConfigError;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HS256" => Ok(Self::HS256),
            "HS384" => Ok(Self::HS384),
            "HS512" => Ok(Self::HS512),
            "RS256" => Ok(Self::RS256),
            "RS384" => Ok(Self::RS384),
            "RS512" => Ok(Self::RS512),
            "ES256" => Ok(Self::ES256),
            "ES384" => Ok(Self::ES384),
            _ => Err(KeyConfigError::UnsupportedSignMethod {
                method: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_family() {
        let method: SignMethod = "rs256".parse().unwrap();
        assert_eq!(method, SignMethod::RS256);
        assert_eq!(method.family(), KeyFamily::Rsa);
        assert_eq!("ES384".parse::<SignMethod>().unwrap().curve(), Some(EcdsaCurve::P384));
    }

    #[test]
    fn test_unknown_method() {
        let err = "ES512".parse::<SignMethod>().unwrap_err();
        assert!(matches!(err, KeyConfigError::UnsupportedSignMethod { ref method } if method == "ES512"));
    }

    #[test]
    fn test_family_mismatch() {
        assert!(SignMethod::HS256.check_family(KeyFamily::Secret).is_ok());
        let err = SignMethod::HS256.check_family(KeyFamily::Rsa).unwrap_err();
        assert!(matches!(err, KeyConfigError::SignMethodMismatch { family: KeyFamily::Rsa, .. }));
    }
}
