//! Key directory scanning.
//!
//! A key directory is read one level deep:
//!
//! ```text
//! <dir>
//!    +-- <kid_1>
//!          +-- private.key      -> "kid_1_private"
//!    +-- <kid_2>
//!          +-- public.key       -> "kid_2_public"
//!    +-- kid_3.key              -> "kid_3"
//!    +-- kid.5.key              (skipped, "." is not a valid kid character)
//!    +-- README.txt             (skipped, not a .key file)
//! ```
//!
//! Unrelated entries are skipped. A `.key` file with a valid kid that cannot
//! be read or decoded fails the whole scan.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{KeyConfigError, Result};
use crate::key::KeyFamily;
use crate::kid::{DerivedKid, KeyRole, kid_from_key_file, kid_from_subdirectory};

use super::{Candidate, KeySource, ResolvedKey, SkipReason, SourceStage, read_key_file};

/// What happened to one directory entry.
#[derive(Debug)]
pub enum ScanOutcome {
    /// The entry decoded into a key.
    Loaded(ResolvedKey),
    /// The entry is not a key candidate.
    Skipped(SkipReason),
    /// The entry is a key candidate that could not be loaded.
    Failed(KeyConfigError),
}

/// A directory entry and its outcome.
#[derive(Debug)]
pub struct ScanEntry {
    pub path: PathBuf,
    pub outcome: ScanOutcome,
}

/// Keys found in one directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    stage: SourceStage,
    family: KeyFamily,
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(stage: SourceStage, family: KeyFamily, dir: impl Into<PathBuf>) -> Self {
        Self {
            stage,
            family,
            dir: dir.into(),
        }
    }

    /// The scanned directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Classify every entry of the directory, in file name order.
    ///
    /// Only failing to list the directory itself is an error here; per-entry
    /// failures are reported as [`ScanOutcome::Failed`].
    pub fn scan(&self) -> Result<Vec<ScanEntry>> {
        let mut paths = std::fs::read_dir(&self.dir)
            .map_err(|e| KeyConfigError::io(&self.dir, e))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|e| KeyConfigError::io(&self.dir, e))?;
        paths.sort();

        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            if path.is_dir() {
                entries.extend(self.scan_subdirectory(&path));
            } else {
                let outcome = self.scan_file(&path);
                entries.push(ScanEntry { path, outcome });
            }
        }
        Ok(entries)
    }

    fn scan_file(&self, path: &Path) -> ScanOutcome {
        let name = file_name(path);
        if !name.ends_with(".key") {
            return ScanOutcome::Skipped(SkipReason::NotKeyFile);
        }
        let Some(derived) = kid_from_key_file(&name) else {
            return ScanOutcome::Skipped(SkipReason::InvalidKeyId { candidate: name });
        };
        self.load(derived, path)
    }

    fn scan_subdirectory(&self, path: &Path) -> Vec<ScanEntry> {
        let name = file_name(path);
        let mut entries = Vec::new();

        for role in [KeyRole::Private, KeyRole::Public] {
            let key_path = path.join(role.file_name());
            if !key_path.is_file() {
                continue;
            }
            let outcome = match kid_from_subdirectory(&name, role) {
                Some(derived) => self.load(derived, &key_path),
                None => ScanOutcome::Skipped(SkipReason::InvalidKeyId {
                    candidate: name.clone(),
                }),
            };
            entries.push(ScanEntry {
                path: key_path,
                outcome,
            });
        }

        if entries.is_empty() {
            entries.push(ScanEntry {
                path: path.to_path_buf(),
                outcome: ScanOutcome::Skipped(SkipReason::NoKeyFiles),
            });
        }
        entries
    }

    fn load(&self, derived: DerivedKid, path: &Path) -> ScanOutcome {
        match read_key_file(&derived.kid, path, self.family) {
            Ok(entry) => ScanOutcome::Loaded(ResolvedKey {
                kid: derived.kid,
                entry,
                source: path.display().to_string(),
                role: derived.role,
            }),
            Err(e) => ScanOutcome::Failed(e),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl KeySource for DirectorySource {
    fn stage(&self) -> SourceStage {
        self.stage
    }

    fn collect(&self) -> Result<Vec<Candidate>> {
        let mut candidates = Vec::new();
        for entry in self.scan()? {
            match entry.outcome {
                ScanOutcome::Loaded(key) => candidates.push(Candidate::Key(key)),
                ScanOutcome::Skipped(reason) => {
                    debug!("skipping {:?} in key directory: {}", entry.path, reason);
                    candidates.push(Candidate::Skipped {
                        source: entry.path.display().to_string(),
                        reason,
                    });
                }
                ScanOutcome::Failed(e) => return Err(e),
            }
        }
        Ok(candidates)
    }
}
