//! Explicitly configured keys: single values and per-kid maps.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::error::Result;
use crate::key::{KeyEntry, KeyFamily, SharedSecret};
use crate::kid::DEFAULT_KEY_ID;

use super::{Candidate, KeySource, ResolvedKey, SourceStage, decode_key, read_key_file};

/// Keys given by value or by file path.
///
/// Application order: the single file, then the single key (both at the
/// default kid), then the per-kid file map, then the per-kid key map. A
/// per-kid entry for `"0"` therefore overrides the single values.
///
/// Every value carries a label naming where it was configured, used in
/// diagnostics.
#[derive(Clone)]
pub struct ExplicitSource {
    stage: SourceStage,
    family: KeyFamily,
    file: Option<(String, PathBuf)>,
    key: Option<(String, String)>,
    files: BTreeMap<String, (String, PathBuf)>,
    keys: BTreeMap<String, (String, String)>,
}

impl ExplicitSource {
    /// Create an empty source for `family` keys.
    pub fn new(stage: SourceStage, family: KeyFamily) -> Self {
        Self {
            stage,
            family,
            file: None,
            key: None,
            files: BTreeMap::new(),
            keys: BTreeMap::new(),
        }
    }

    /// Key file for the default kid.
    pub fn with_file(mut self, label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.file = Some((label.into(), path.into()));
        self
    }

    /// PEM text for the default kid.
    pub fn with_key(mut self, label: impl Into<String>, pem: impl Into<String>) -> Self {
        self.key = Some((label.into(), pem.into()));
        self
    }

    /// Key file for `kid`.
    pub fn add_file(
        &mut self,
        label: impl Into<String>,
        kid: impl Into<String>,
        path: impl Into<PathBuf>,
    ) {
        self.files.insert(kid.into(), (label.into(), path.into()));
    }

    /// PEM text for `kid`.
    pub fn add_key(&mut self, label: impl Into<String>, kid: impl Into<String>, pem: impl Into<String>) {
        self.keys.insert(kid.into(), (label.into(), pem.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.file.is_none() && self.key.is_none() && self.files.is_empty() && self.keys.is_empty()
    }
}

impl fmt::Debug for ExplicitSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExplicitSource")
            .field("stage", &self.stage)
            .field("family", &self.family)
            .field("file", &self.file)
            .field("key", &self.key.as_ref().map(|(label, _)| label))
            .field("files", &self.files)
            .field("keys", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn resolved(kid: &str, entry: KeyEntry, label: &str) -> Candidate {
    Candidate::Key(ResolvedKey {
        kid: kid.to_string(),
        entry,
        source: label.to_string(),
        role: None,
    })
}

impl KeySource for ExplicitSource {
    fn stage(&self) -> SourceStage {
        self.stage
    }

    fn collect(&self) -> Result<Vec<Candidate>> {
        let mut candidates = Vec::new();

        if let Some((label, path)) = &self.file {
            let entry = read_key_file(DEFAULT_KEY_ID, path, self.family)?;
            candidates.push(resolved(DEFAULT_KEY_ID, entry, label));
        }

        if let Some((label, pem)) = &self.key {
            let entry = decode_key(DEFAULT_KEY_ID, pem.as_bytes(), self.family)?;
            candidates.push(resolved(DEFAULT_KEY_ID, entry, label));
        }

        for (kid, (label, path)) in &self.files {
            let entry = read_key_file(kid, path, self.family)?;
            candidates.push(resolved(kid, entry, label));
        }

        for (kid, (label, pem)) in &self.keys {
            let entry = decode_key(kid, pem.as_bytes(), self.family)?;
            candidates.push(resolved(kid, entry, label));
        }

        Ok(candidates)
    }
}

/// A shared secret for the default kid.
#[derive(Debug, Clone)]
pub struct SecretSource {
    stage: SourceStage,
    label: String,
    secret: SharedSecret,
}

impl SecretSource {
    pub fn new(stage: SourceStage, label: impl Into<String>, secret: SharedSecret) -> Self {
        Self {
            stage,
            label: label.into(),
            secret,
        }
    }
}

impl KeySource for SecretSource {
    fn stage(&self) -> SourceStage {
        self.stage
    }

    fn collect(&self) -> Result<Vec<Candidate>> {
        Ok(vec![Candidate::Key(ResolvedKey {
            kid: DEFAULT_KEY_ID.to_string(),
            entry: KeyEntry::Secret(self.secret.clone()),
            source: self.label.clone(),
            role: None,
        })])
    }
}
