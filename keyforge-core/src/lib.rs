//! # Keyforge Core
//!
//! Key material resolution for token signing and verification.
//!
//! This crate provides:
//! - A keyed registry of shared secrets, RSA and ECDSA keys, committed to a
//!   single key family
//! - Key sources for config values, per-kid maps, key directories and
//!   `JWT_*` environment variables, applied with a fixed precedence
//! - [`CommonTokenConfig`], the token settings loaded from TOML or JSON,
//!   and its read-only [`LoadedTokenConfig`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use keyforge_core::{CommonTokenConfig, KeyEntry};
//!
//! fn signing_key() -> Result<(), keyforge_core::KeyConfigError> {
//!     let config = CommonTokenConfig::load()?.freeze()?;
//!     let (key, kid) = config.get_private_key()?;
//!     println!("signing with {} ({})", kid, key.describe());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod key;
pub mod kid;
pub mod load;
pub mod origin;
pub mod pem;
pub mod registry;
pub mod sign_method;
pub mod source;

// Re-export commonly used types at crate root
pub use config::{
    AsymmetricKeyConfig,
    CommonTokenConfig,
    EcdsaSignMethodConfig,
    HmacSignMethodConfig,
    LoadedTokenConfig,
    RsaSignMethodConfig,
    DEFAULT_TOKEN_LIFETIME,
    DEFAULT_TOKEN_NAME,
};

pub use error::{KeyConfigError, Result};

pub use key::{
    EcdsaCurve,
    EcdsaPrivateKey,
    EcdsaPublicKey,
    KeyEntry,
    KeyFamily,
    SharedSecret,
    classify,
};

pub use kid::{DEFAULT_KEY_ID, DerivedKid, KeyRole, derive_kid, is_valid_kid};

pub use load::{LoadOutcome, LoadReport, apply_sources};

pub use origin::{ConfigOrigin, EMPTY_ORIGIN};

pub use pem::parse_key_pem;

pub use registry::KeyRegistry;

pub use sign_method::SignMethod;

pub use source::{
    DirectorySource,
    Environment,
    KeySource,
    ScanOutcome,
    SkipReason,
    SourceStage,
};
