//! Common token configuration.
//!
//! [`CommonTokenConfig`] carries the settings shared by token issuers and
//! validators, and owns the key registry built from them. Settings are filled
//! by deserializing structured configuration; [`CommonTokenConfig::load_keys`]
//! then resolves key material once, and [`CommonTokenConfig::freeze`] hands
//! back a read-only [`LoadedTokenConfig`] for the signing side.
//!
//! # Example
//!
//! ```rust,ignore
//! use keyforge_core::CommonTokenConfig;
//!
//! let config = CommonTokenConfig::from_toml_str(r#"
//!     token_sign_method = "RS256"
//!     token_rsa_dir = "/etc/jwt/keys"
//! "#)?;
//! let loaded = config.freeze()?;
//! let (signing_key, kid) = loaded.get_private_key()?;
//! ```

use std::collections::BTreeMap;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{KeyConfigError, Result};
use crate::key::{KeyEntry, KeyFamily, SharedSecret};
use crate::load::{LoadReport, apply_sources};
use crate::origin::ConfigOrigin;
use crate::registry::KeyRegistry;
use crate::sign_method::SignMethod;
use crate::source::{
    DirectorySource, ECDSA_ENV_VARS, ENV_TOKEN_LIFETIME, ENV_TOKEN_NAME, ENV_TOKEN_SECRET,
    EnvKeyVars, EnvSource, Environment, ExplicitSource, KeySource, RSA_ENV_VARS, SecretSource,
    SourceStage,
};

/// Token name used when none is configured.
pub const DEFAULT_TOKEN_NAME: &str = "access_token";

/// Token lifetime in seconds used when none is configured.
pub const DEFAULT_TOKEN_LIFETIME: u64 = 900;

/// Configuration for signing with a shared secret.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HmacSignMethodConfig {
    #[serde(default, skip_serializing)]
    pub token_secret: Option<SharedSecret>,
}

impl HmacSignMethodConfig {
    fn secret(&self) -> Option<&SharedSecret> {
        self.token_secret.as_ref().filter(|s| !s.is_empty())
    }
}

/// Configuration field names of one asymmetric family, for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct KeyFieldNames {
    pub files: &'static str,
    pub keys: &'static str,
    pub file: &'static str,
    pub key: &'static str,
}

/// Shared behavior of the RSA and ECDSA key settings.
///
/// `file`/`key` map to the default kid `"0"` and are applied before the
/// per-kid `files`/`keys` maps, so an explicit `"0"` entry overrides them.
pub trait AsymmetricKeyConfig {
    const FAMILY: KeyFamily;
    const FIELDS: KeyFieldNames;
    const ENV: EnvKeyVars;

    fn dir(&self) -> Option<&Path>;
    fn files(&self) -> Option<&BTreeMap<String, PathBuf>>;
    fn keys(&self) -> Option<&BTreeMap<String, String>>;
    fn file(&self) -> Option<&Path>;
    fn key(&self) -> Option<&str>;

    /// Whether any field of this family is set.
    fn is_configured(&self) -> bool {
        self.dir().is_some()
            || self.file().is_some()
            || self.key().is_some()
            || self.files().is_some()
            || self.keys().is_some()
    }

    /// Single values and per-kid maps as a key source.
    fn explicit_source(&self) -> ExplicitSource {
        let fields = Self::FIELDS;
        let mut source = ExplicitSource::new(SourceStage::ConfigExplicit, Self::FAMILY);
        if let Some(path) = self.file() {
            source = source.with_file(fields.file, path);
        }
        if let Some(pem) = self.key() {
            source = source.with_key(fields.key, pem);
        }
        for (kid, path) in self.files().into_iter().flatten() {
            source.add_file(format!("{}.{}", fields.files, kid), kid.as_str(), path);
        }
        for (kid, pem) in self.keys().into_iter().flatten() {
            source.add_key(format!("{}.{}", fields.keys, kid), kid.as_str(), pem.as_str());
        }
        source
    }

    /// The configured key directory as a key source.
    fn directory_source(&self) -> Option<DirectorySource> {
        self.dir()
            .map(|dir| DirectorySource::new(SourceStage::ConfigDirectory, Self::FAMILY, dir))
    }
}

fn non_empty_path(path: &Option<PathBuf>) -> Option<&Path> {
    path.as_deref().filter(|p| !p.as_os_str().is_empty())
}

fn non_empty_str(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// RSA key settings.
///
/// `token_rsa_dir` names a key directory (see [`DirectorySource`]),
/// `token_rsa_files` maps kids to key files, `token_rsa_keys` maps kids to
/// PEM text, and `token_rsa_file`/`token_rsa_key` provide the key for kid
/// `"0"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RsaSignMethodConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_rsa_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_rsa_files: Option<BTreeMap<String, PathBuf>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_rsa_keys: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_rsa_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_rsa_key: Option<String>,
}

impl AsymmetricKeyConfig for RsaSignMethodConfig {
    const FAMILY: KeyFamily = KeyFamily::Rsa;
    const FIELDS: KeyFieldNames = KeyFieldNames {
        files: "token_rsa_files",
        keys: "token_rsa_keys",
        file: "token_rsa_file",
        key: "token_rsa_key",
    };
    const ENV: EnvKeyVars = RSA_ENV_VARS;

    fn dir(&self) -> Option<&Path> {
        non_empty_path(&self.token_rsa_dir)
    }

    fn files(&self) -> Option<&BTreeMap<String, PathBuf>> {
        self.token_rsa_files.as_ref()
    }

    fn keys(&self) -> Option<&BTreeMap<String, String>> {
        self.token_rsa_keys.as_ref()
    }

    fn file(&self) -> Option<&Path> {
        non_empty_path(&self.token_rsa_file)
    }

    fn key(&self) -> Option<&str> {
        non_empty_str(&self.token_rsa_key)
    }
}

/// ECDSA key settings, laid out like [`RsaSignMethodConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EcdsaSignMethodConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_ecdsa_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_ecdsa_files: Option<BTreeMap<String, PathBuf>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_ecdsa_keys: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_ecdsa_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_ecdsa_key: Option<String>,
}

impl AsymmetricKeyConfig for EcdsaSignMethodConfig {
    const FAMILY: KeyFamily = KeyFamily::Ecdsa;
    const FIELDS: KeyFieldNames = KeyFieldNames {
        files: "token_ecdsa_files",
        keys: "token_ecdsa_keys",
        file: "token_ecdsa_file",
        key: "token_ecdsa_key",
    };
    const ENV: EnvKeyVars = ECDSA_ENV_VARS;

    fn dir(&self) -> Option<&Path> {
        non_empty_path(&self.token_ecdsa_dir)
    }

    fn files(&self) -> Option<&BTreeMap<String, PathBuf>> {
        self.token_ecdsa_files.as_ref()
    }

    fn keys(&self) -> Option<&BTreeMap<String, String>> {
        self.token_ecdsa_keys.as_ref()
    }

    fn file(&self) -> Option<&Path> {
        non_empty_path(&self.token_ecdsa_file)
    }

    fn key(&self) -> Option<&str> {
        non_empty_str(&self.token_ecdsa_key)
    }
}

/// Token settings shared by token issuers and validators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonTokenConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_sign_method: Option<String>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub token_name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_origin: Option<String>,

    /// The expiration time of a token in seconds.
    #[serde(skip_serializing_if = "is_zero")]
    pub token_lifetime: u64,

    #[serde(rename = "token_eval_expr", skip_serializing_if = "Vec::is_empty")]
    pub eval_expr: Vec<String>,

    #[serde(flatten)]
    pub hmac: HmacSignMethodConfig,

    #[serde(flatten)]
    pub rsa: RsaSignMethodConfig,

    #[serde(flatten)]
    pub ecdsa: EcdsaSignMethodConfig,

    /// Whether the key material came from config or the environment.
    #[serde(skip)]
    origin: ConfigOrigin,

    #[serde(skip)]
    registry: KeyRegistry,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

impl CommonTokenConfig {
    /// An empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Parse configuration from JSON text.
    pub fn from_json_str(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Read configuration from a file. `.json` files are parsed as JSON,
    /// anything else as TOML.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| KeyConfigError::io(path, e))?;
        debug!("reading token configuration from {:?}", path);

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&contents)
        } else {
            Self::from_toml_str(&contents)
        }
    }

    /// The platform-specific default location of the configuration file.
    pub fn default_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("com", "raibid-labs", "keyforge")
            .ok_or(KeyConfigError::ConfigDirUnavailable)?;
        Ok(dirs.config_dir().join("token.toml"))
    }

    /// Load configuration from the default location, or start empty when
    /// the file does not exist.
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from_path(path)
        } else {
            debug!("no token configuration at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Whether any RSA key field is configured.
    pub fn has_rsa_keys(&self) -> bool {
        self.rsa.is_configured()
    }

    /// Whether any ECDSA key field is configured.
    pub fn has_ecdsa_keys(&self) -> bool {
        self.ecdsa.is_configured()
    }

    /// Where the key material came from; `unknown` until recorded.
    pub fn get_origin(&self) -> ConfigOrigin {
        self.origin
    }

    /// Record the origin. Accepts `config` or `env`; a later call replaces
    /// an earlier one.
    pub fn set_origin(&mut self, name: &str) -> Result<()> {
        self.origin = name.parse()?;
        Ok(())
    }

    /// The committed key family and all keys.
    pub fn get_keys(&self) -> (Option<KeyFamily>, &BTreeMap<String, KeyEntry>) {
        self.registry.get_all()
    }

    /// The key registry.
    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    /// Add a key directly, bypassing the configured sources.
    pub fn add_key(&mut self, kid: &str, entry: KeyEntry) -> Result<()> {
        self.registry.insert(kid, entry)
    }

    /// The signing key and its kid.
    pub fn get_private_key(&self) -> Result<(&KeyEntry, &str)> {
        self.registry.first_private_key()
    }

    /// The parsed `token_sign_method`, if set.
    pub fn parse_sign_method(&self) -> Result<Option<SignMethod>> {
        self.token_sign_method
            .as_deref()
            .filter(|m| !m.is_empty())
            .map(str::parse)
            .transpose()
    }

    /// Resolve key material from config and the process environment.
    ///
    /// A populated registry makes this a no-op.
    pub fn load_keys(&mut self) -> Result<LoadReport> {
        self.load_keys_with_env(&Environment::from_process())
    }

    /// Resolve key material from config and `env`.
    ///
    /// Sources are applied config first (values and maps, then directory),
    /// then environment (variables, then directory). On error the registry
    /// stays empty.
    pub fn load_keys_with_env(&mut self, env: &Environment) -> Result<LoadReport> {
        self.apply_token_defaults(env)?;

        if !self.registry.is_empty() {
            debug!("token keys already loaded, skipping");
            return Ok(LoadReport::default());
        }

        let config_secret = self.hmac.secret().map(|secret| {
            SecretSource::new(SourceStage::ConfigExplicit, "token_secret", secret.clone())
        });
        let env_secret = env.get(ENV_TOKEN_SECRET).map(|secret| {
            SecretSource::new(SourceStage::EnvExplicit, ENV_TOKEN_SECRET, SharedSecret::new(secret))
        });
        let rsa_explicit = self.rsa.explicit_source();
        let ecdsa_explicit = self.ecdsa.explicit_source();
        let rsa_dir = self.rsa.directory_source();
        let ecdsa_dir = self.ecdsa.directory_source();
        let rsa_env = EnvSource::new(env, RsaSignMethodConfig::ENV);
        let ecdsa_env = EnvSource::new(env, EcdsaSignMethodConfig::ENV);
        let rsa_env_dir = env_directory(&rsa_env, KeyFamily::Rsa);
        let ecdsa_env_dir = env_directory(&ecdsa_env, KeyFamily::Ecdsa);

        let mut sources: Vec<&dyn KeySource> = Vec::new();
        if let Some(source) = &config_secret {
            sources.push(source);
        }
        sources.push(&rsa_explicit);
        sources.push(&ecdsa_explicit);
        sources.extend(rsa_dir.iter().map(|s| s as &dyn KeySource));
        sources.extend(ecdsa_dir.iter().map(|s| s as &dyn KeySource));
        if let Some(source) = &env_secret {
            sources.push(source);
        }
        sources.push(&rsa_env);
        sources.push(&ecdsa_env);
        sources.extend(rsa_env_dir.iter().map(|s| s as &dyn KeySource));
        sources.extend(ecdsa_env_dir.iter().map(|s| s as &dyn KeySource));

        let mut registry = KeyRegistry::new();
        let report = apply_sources(&mut registry, &sources)?;

        if registry.is_empty() {
            warn!("no token keys configured");
        } else if self.origin == ConfigOrigin::Unknown {
            if let Some(stage) = report.first_inserting_stage() {
                self.origin = stage.origin();
            }
        }
        if let Some(family) = registry.family() {
            info!("token keys loaded: {} {} entries from {}", registry.len(), family, self.origin);
        }

        self.registry = registry;
        Ok(report)
    }

    /// Load keys, validate the sign method against them, and return a
    /// read-only configuration.
    pub fn freeze(self) -> Result<LoadedTokenConfig> {
        self.freeze_with_env(&Environment::from_process())
    }

    /// [`freeze`](Self::freeze) with an explicit environment.
    pub fn freeze_with_env(mut self, env: &Environment) -> Result<LoadedTokenConfig> {
        self.load_keys_with_env(env)?;

        let sign_method = self.parse_sign_method()?;
        if let (Some(method), Some(family)) = (sign_method, self.registry.family()) {
            method.check_family(family)?;
            if let Some(curve) = method.curve() {
                let mismatched = self.get_keys().1.values().any(|entry| match entry {
                    KeyEntry::EcdsaPrivate(key) => key.curve() != curve,
                    KeyEntry::EcdsaPublic(key) => key.curve() != curve,
                    _ => false,
                });
                if mismatched {
                    return Err(KeyConfigError::SignMethodMismatch {
                        method: method.to_string(),
                        family,
                    });
                }
            }
        }

        Ok(LoadedTokenConfig {
            inner: Arc::new(self),
            sign_method,
        })
    }

    fn apply_token_defaults(&mut self, env: &Environment) -> Result<()> {
        if self.token_name.is_empty() {
            self.token_name = env.get(ENV_TOKEN_NAME).unwrap_or(DEFAULT_TOKEN_NAME).to_string();
        }
        if self.token_lifetime == 0 {
            self.token_lifetime = match env.get(ENV_TOKEN_LIFETIME) {
                Some(value) => value.parse().map_err(|e| KeyConfigError::InvalidEnvValue {
                    var: ENV_TOKEN_LIFETIME.to_string(),
                    message: format!("{}", e),
                })?,
                None => DEFAULT_TOKEN_LIFETIME,
            };
        }
        Ok(())
    }
}

fn env_directory(source: &EnvSource<'_>, family: KeyFamily) -> Option<DirectorySource> {
    source
        .dir()
        .map(|dir| DirectorySource::new(SourceStage::EnvDirectory, family, dir))
}

/// A token configuration whose keys are loaded and will not change.
///
/// Cheap to clone; clones share the same registry.
#[derive(Debug, Clone)]
pub struct LoadedTokenConfig {
    inner: Arc<CommonTokenConfig>,
    sign_method: Option<SignMethod>,
}

impl LoadedTokenConfig {
    /// The validated sign method, if one was configured.
    pub fn sign_method(&self) -> Option<SignMethod> {
        self.sign_method
    }
}

impl Deref for LoadedTokenConfig {
    type Target = CommonTokenConfig;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSA_PRIVATE: &str = include_str!("../tests/fixtures/rsa_private_pkcs1.pem");
    const RSA_PUBLIC: &str = include_str!("../tests/fixtures/rsa_public.pem");

    #[test]
    fn test_origin_defaults_to_unknown() {
        let config = CommonTokenConfig::new();
        assert_eq!(config.get_origin(), ConfigOrigin::Unknown);
        assert_eq!(config.get_origin().to_string(), "unknown");
    }

    #[test]
    fn test_bogus_origin_leaves_unknown() {
        let mut config = CommonTokenConfig::new();
        let err = config.set_origin("bogus").unwrap_err();
        assert!(matches!(err, KeyConfigError::UnsupportedTokenConfigOrigin { .. }));
        assert_eq!(config.get_origin(), ConfigOrigin::Unknown);

        let err = config.set_origin("empty").unwrap_err();
        assert!(matches!(err, KeyConfigError::EmptyTokenConfigOrigin));
    }

    #[test]
    fn test_set_origin_last_call_wins() {
        let mut config = CommonTokenConfig::new();
        config.set_origin("config").unwrap();
        config.set_origin("env").unwrap();
        assert_eq!(config.get_origin(), ConfigOrigin::Env);
    }

    #[test]
    fn test_has_keys_flags() {
        let mut config = CommonTokenConfig::new();
        assert!(!config.has_rsa_keys());
        assert!(!config.has_ecdsa_keys());

        config.rsa.token_rsa_key = Some(String::new());
        assert!(!config.has_rsa_keys());

        config.ecdsa.token_ecdsa_files = Some(BTreeMap::new());
        assert!(config.has_ecdsa_keys());

        config.rsa.token_rsa_dir = Some(PathBuf::from("/keys"));
        assert!(config.has_rsa_keys());
    }

    #[test]
    fn test_token_defaults() {
        let mut config = CommonTokenConfig::new();
        config.load_keys_with_env(&Environment::new()).unwrap();
        assert_eq!(config.token_name, DEFAULT_TOKEN_NAME);
        assert_eq!(config.token_lifetime, DEFAULT_TOKEN_LIFETIME);
        assert!(config.registry().is_empty());
        assert_eq!(config.get_origin(), ConfigOrigin::Unknown);
    }

    #[test]
    fn test_token_settings_from_env() {
        let env: Environment = [(ENV_TOKEN_NAME, "jwt"), (ENV_TOKEN_LIFETIME, "3600")]
            .into_iter()
            .collect();
        let mut config = CommonTokenConfig::new();
        config.load_keys_with_env(&env).unwrap();
        assert_eq!(config.token_name, "jwt");
        assert_eq!(config.token_lifetime, 3600);
    }

    #[test]
    fn test_invalid_lifetime_from_env() {
        let env: Environment = [(ENV_TOKEN_LIFETIME, "soon")].into_iter().collect();
        let err = CommonTokenConfig::new().load_keys_with_env(&env).unwrap_err();
        assert!(matches!(err, KeyConfigError::InvalidEnvValue { ref var, .. } if var == ENV_TOKEN_LIFETIME));
    }

    #[test]
    fn test_load_keys_is_idempotent() {
        let mut config = CommonTokenConfig::new();
        config.rsa.token_rsa_key = Some(RSA_PRIVATE.to_string());

        let first = config.load_keys_with_env(&Environment::new()).unwrap();
        assert_eq!(first.inserted().collect::<Vec<_>>(), vec!["0"]);

        config.rsa.token_rsa_key = Some(RSA_PUBLIC.to_string());
        let second = config.load_keys_with_env(&Environment::new()).unwrap();
        assert!(second.is_empty());
        assert!(config.registry().get("0").unwrap().is_private());
    }

    #[test]
    fn test_secret_from_config() {
        let config = CommonTokenConfig::from_toml_str(
            r#"
            token_sign_method = "HS512"
            token_secret = "0123456789abcdef"
            "#,
        )
        .unwrap();

        let loaded = config.freeze_with_env(&Environment::new()).unwrap();
        let (family, keys) = loaded.get_keys();
        assert_eq!(family, Some(KeyFamily::Secret));
        assert_eq!(keys.len(), 1);
        assert!(matches!(keys.get("0"), Some(KeyEntry::Secret(s)) if s.expose() == "0123456789abcdef"));
        assert_eq!(loaded.sign_method(), Some(SignMethod::HS512));
        assert_eq!(loaded.get_origin(), ConfigOrigin::Config);
    }

    #[test]
    fn test_sign_method_must_match_keys() {
        let mut config = CommonTokenConfig::new();
        config.token_sign_method = Some("ES256".to_string());
        config.rsa.token_rsa_key = Some(RSA_PRIVATE.to_string());

        let err = config.freeze_with_env(&Environment::new()).unwrap_err();
        assert!(matches!(err, KeyConfigError::SignMethodMismatch { family: KeyFamily::Rsa, .. }));
    }

    #[test]
    fn test_failed_load_leaves_registry_empty() {
        let mut config = CommonTokenConfig::new();
        config.rsa.token_rsa_keys = Some(BTreeMap::from([
            ("a".to_string(), RSA_PRIVATE.to_string()),
            ("b".to_string(), "garbage".to_string()),
        ]));

        assert!(config.load_keys_with_env(&Environment::new()).is_err());
        assert!(config.registry().is_empty());
    }

    #[test]
    fn test_secret_is_not_serialized() {
        let config = CommonTokenConfig::from_toml_str(r#"token_secret = "hunter2""#).unwrap();
        assert!(config.hmac.token_secret.is_some());

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("token_secret"));
    }

    #[test]
    fn test_json_field_names() {
        let config = CommonTokenConfig::from_json_str(
            r#"{
                "token_name": "session",
                "token_lifetime": 60,
                "token_eval_expr": ["accept roles admin"],
                "token_rsa_files": {"k1": "/keys/k1.pem"}
            }"#,
        )
        .unwrap();
        assert_eq!(config.token_name, "session");
        assert_eq!(config.token_lifetime, 60);
        assert_eq!(config.eval_expr, vec!["accept roles admin"]);
        assert!(config.has_rsa_keys());
        assert!(!config.has_ecdsa_keys());

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["token_rsa_files"]["k1"], "/keys/k1.pem");
        assert!(json.get("token_secret").is_none());
    }
}
