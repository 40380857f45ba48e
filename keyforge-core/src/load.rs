//! Running key sources into a registry.
//!
//! Sources are applied in stage order. Inside a stage the last writer wins;
//! across stages a kid provided by an earlier stage is kept and the later
//! candidate is reported as shadowed. The public key copied to the default
//! kid does not count as provided.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::error::{KeyConfigError, Result};
use crate::kid::KeyRole;
use crate::registry::KeyRegistry;
use crate::source::{Candidate, KeySource, SkipReason, SourceStage};

/// What happened to one candidate during loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Inserted {
        kid: String,
        source: String,
        stage: SourceStage,
        role: Option<KeyRole>,
    },
    Skipped {
        source: String,
        reason: SkipReason,
        stage: SourceStage,
    },
}

/// Record of a key loading run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub outcomes: Vec<LoadOutcome>,
}

impl LoadReport {
    /// Kids inserted, in application order.
    pub fn inserted(&self) -> impl Iterator<Item = &str> {
        self.outcomes.iter().filter_map(|o| match o {
            LoadOutcome::Inserted { kid, .. } => Some(kid.as_str()),
            LoadOutcome::Skipped { .. } => None,
        })
    }

    /// The role recorded for an inserted kid, if its source named one.
    pub fn role(&self, kid: &str) -> Option<KeyRole> {
        self.outcomes.iter().rev().find_map(|o| match o {
            LoadOutcome::Inserted { kid: k, role, .. } if k == kid => *role,
            _ => None,
        })
    }

    /// Skipped candidates with their reasons.
    pub fn skipped(&self) -> impl Iterator<Item = (&str, &SkipReason)> {
        self.outcomes.iter().filter_map(|o| match o {
            LoadOutcome::Skipped { source, reason, .. } => Some((source.as_str(), reason)),
            LoadOutcome::Inserted { .. } => None,
        })
    }

    /// The earliest stage that inserted anything.
    pub fn first_inserting_stage(&self) -> Option<SourceStage> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                LoadOutcome::Inserted { stage, .. } => Some(*stage),
                LoadOutcome::Skipped { .. } => None,
            })
            .min()
    }

    /// Whether nothing was inserted or skipped.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Apply `sources` to `registry` in stage order.
///
/// Stops at the first error. The registry may then hold a partial result
/// and must be discarded.
pub fn apply_sources(registry: &mut KeyRegistry, sources: &[&dyn KeySource]) -> Result<LoadReport> {
    let mut ordered: Vec<&dyn KeySource> = sources.to_vec();
    ordered.sort_by_key(|source| source.stage());

    let mut report = LoadReport::default();
    let mut provided_earlier: BTreeSet<String> = BTreeSet::new();
    let mut provided_now: BTreeSet<String> = BTreeSet::new();
    let mut current = None;

    for source in ordered {
        let stage = source.stage();
        if current != Some(stage) {
            provided_earlier.append(&mut provided_now);
            current = Some(stage);
        }

        for candidate in source.collect()? {
            match candidate {
                Candidate::Key(key) => {
                    let family = key.entry.family();
                    if let Some(committed) = registry.family().filter(|c| *c != family) {
                        return Err(KeyConfigError::MixedConfigKeyType {
                            committed,
                            attempted: family,
                        });
                    }
                    if provided_earlier.contains(&key.kid) {
                        debug!("{} from {} shadowed by an earlier source", key.kid, key.source);
                        report.outcomes.push(LoadOutcome::Skipped {
                            reason: SkipReason::Shadowed {
                                kid: key.kid.clone(),
                            },
                            source: key.source,
                            stage,
                        });
                        continue;
                    }
                    match key.role {
                        Some(role) => debug!(
                            "loaded {} for kid {} ({} half) from {}",
                            key.entry.describe(),
                            key.kid,
                            role,
                            key.source
                        ),
                        None => debug!("loaded {} for kid {} from {}", key.entry.describe(), key.kid, key.source),
                    }
                    registry.insert(&key.kid, key.entry)?;
                    provided_now.insert(key.kid.clone());
                    report.outcomes.push(LoadOutcome::Inserted {
                        kid: key.kid,
                        source: key.source,
                        stage,
                        role: key.role,
                    });
                }
                Candidate::Skipped { source, reason } => {
                    report.outcomes.push(LoadOutcome::Skipped {
                        source,
                        reason,
                        stage,
                    });
                }
            }
        }
    }

    info!(
        "loaded {} keys ({} skipped)",
        registry.len(),
        report.skipped().count()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{KeyFamily, SharedSecret};
    use crate::source::{ExplicitSource, SecretSource};

    const RSA_PRIVATE: &str = include_str!("../tests/fixtures/rsa_private_pkcs1.pem");
    const RSA2_PRIVATE: &str = include_str!("../tests/fixtures/rsa2_private_pkcs1.pem");
    const RSA_PUBLIC: &str = include_str!("../tests/fixtures/rsa_public.pem");
    const EC_PUBLIC: &str = include_str!("../tests/fixtures/ec_p256_public.pem");

    fn rsa(stage: SourceStage, entries: &[(&str, &str)]) -> ExplicitSource {
        let mut source = ExplicitSource::new(stage, KeyFamily::Rsa);
        for (kid, pem) in entries {
            source.add_key(format!("test.{}", kid), *kid, *pem);
        }
        source
    }

    #[test]
    fn test_later_stage_only_fills_gaps() {
        let config = rsa(SourceStage::ConfigExplicit, &[("a", RSA_PRIVATE)]);
        let env = rsa(SourceStage::EnvExplicit, &[("a", RSA2_PRIVATE), ("b", RSA_PUBLIC)]);

        let mut registry = KeyRegistry::new();
        let report = apply_sources(&mut registry, &[&env, &config]).unwrap();

        assert_eq!(report.inserted().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(
            registry.get("a").unwrap(),
            &crate::pem::parse_key_pem("a", RSA_PRIVATE.as_bytes()).unwrap()
        );
        let skipped: Vec<_> = report.skipped().collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].1, &SkipReason::Shadowed { kid: "a".to_string() });
        assert_eq!(report.first_inserting_stage(), Some(SourceStage::ConfigExplicit));
    }

    #[test]
    fn test_derived_default_can_be_claimed_later() {
        let config = rsa(SourceStage::ConfigExplicit, &[("a", RSA_PRIVATE)]);
        let env = rsa(SourceStage::EnvExplicit, &[("0", RSA2_PRIVATE)]);

        let mut registry = KeyRegistry::new();
        apply_sources(&mut registry, &[&config, &env]).unwrap();
        assert!(registry.get("0").unwrap().is_private());
    }

    #[test]
    fn test_mixed_families_across_sources_fail() {
        let secret = SecretSource::new(
            SourceStage::ConfigExplicit,
            "token_secret",
            SharedSecret::new("s"),
        );
        let mut ecdsa = ExplicitSource::new(SourceStage::ConfigExplicit, KeyFamily::Ecdsa);
        ecdsa.add_key("token_ecdsa_keys.e", "e", EC_PUBLIC);

        let mut registry = KeyRegistry::new();
        let err = apply_sources(&mut registry, &[&secret, &ecdsa]).unwrap_err();
        assert!(matches!(
            err,
            KeyConfigError::MixedConfigKeyType {
                committed: KeyFamily::Secret,
                attempted: KeyFamily::Ecdsa
            }
        ));
    }

    #[test]
    fn test_shadowed_candidate_of_other_family_fails() {
        let config = rsa(SourceStage::ConfigExplicit, &[("0", RSA_PUBLIC)]);
        let mut env = ExplicitSource::new(SourceStage::EnvExplicit, KeyFamily::Ecdsa);
        env.add_key("JWT_ECDSA_KEY", "0", EC_PUBLIC);

        let mut registry = KeyRegistry::new();
        let err = apply_sources(&mut registry, &[&config, &env]).unwrap_err();
        assert!(matches!(
            err,
            KeyConfigError::MixedConfigKeyType {
                committed: KeyFamily::Rsa,
                attempted: KeyFamily::Ecdsa
            }
        ));
    }

    #[test]
    fn test_no_sources_is_empty_report() {
        let mut registry = KeyRegistry::new();
        let report = apply_sources(&mut registry, &[]).unwrap();
        assert!(report.is_empty());
        assert!(registry.is_empty());
    }
}
