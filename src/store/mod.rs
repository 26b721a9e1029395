//! Baseline store
//!
//! Golden text keyed by (test case, artifact kind). Baselines are
//! write-once: the store creates missing entries but never replaces one,
//! and it never rewrites the bytes it is given.

use std::cell::RefCell;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap as HashMap;

use crate::case::ArtifactKind;
use crate::error::StoreError;

/// Key-value view of the golden corpus
pub trait BaselineStore {
    fn exists(&self, case: &str, kind: ArtifactKind) -> bool;

    /// Fetch the golden text, or `StoreError::NotFound`.
    fn read(&self, case: &str, kind: ArtifactKind) -> Result<String, StoreError>;

    /// Create a baseline. Fails with `StoreError::AlreadyExists` rather than
    /// overwrite.
    fn write(&self, case: &str, kind: ArtifactKind, text: &str) -> Result<(), StoreError>;

    /// Delete zero-length baselines and return where they were.
    fn prune_empty(&self) -> Result<Vec<PathBuf>, StoreError>;
}

/// File name of a baseline, e.g. `quicksort.semant.ast`
pub fn file_name(case: &str, kind: ArtifactKind) -> String {
    format!("{}.{}", case, kind.extension())
}

/// Baselines stored as `<dir>/<case>.<extension>`
#[derive(Debug, Clone)]
pub struct FsBaselineStore {
    dir: PathBuf,
}

impl FsBaselineStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, case: &str, kind: ArtifactKind) -> PathBuf {
        self.dir.join(file_name(case, kind))
    }
}

impl BaselineStore for FsBaselineStore {
    fn exists(&self, case: &str, kind: ArtifactKind) -> bool {
        self.path(case, kind).is_file()
    }

    fn read(&self, case: &str, kind: ArtifactKind) -> Result<String, StoreError> {
        let path = self.path(case, kind);
        match fs::read(&path) {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound {
                case: case.to_string(),
                kind,
                path,
            }),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn write(&self, case: &str, kind: ArtifactKind, text: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.path(case, kind);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists {
                    case: case.to_string(),
                    kind,
                    path,
                });
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        file.write_all(text.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|source| StoreError::Io { path, source })
    }

    /// Also catches empty files left behind by an interrupted run or an
    /// older generator.
    fn prune_empty(&self) -> Result<Vec<PathBuf>, StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.dir.clone(),
            source,
        };

        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(e)),
        };

        let mut removed = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_err)?;
            let path = entry.path();
            let is_baseline = path.file_name().and_then(|n| n.to_str()).is_some_and(|name| {
                ArtifactKind::ALL
                    .iter()
                    .any(|kind| name.ends_with(&format!(".{}", kind.extension())))
            });
            if !is_baseline {
                continue;
            }
            let metadata = entry.metadata().map_err(io_err)?;
            if metadata.is_file() && metadata.len() == 0 {
                fs::remove_file(&path).map_err(|source| StoreError::Io {
                    path: path.clone(),
                    source,
                })?;
                tracing::info!(path = %path.display(), "pruned empty baseline");
                removed.push(path);
            }
        }
        removed.sort();
        Ok(removed)
    }
}

/// In-memory store for exercising the comparison engine without a disk
#[derive(Debug, Default)]
pub struct MemoryBaselineStore {
    entries: RefCell<HashMap<(String, ArtifactKind), String>>,
}

impl MemoryBaselineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a baseline, builder style
    pub fn with(self, case: &str, kind: ArtifactKind, text: &str) -> Self {
        self.entries
            .borrow_mut()
            .insert((case.to_string(), kind), text.to_string());
        self
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl BaselineStore for MemoryBaselineStore {
    fn exists(&self, case: &str, kind: ArtifactKind) -> bool {
        self.entries
            .borrow()
            .contains_key(&(case.to_string(), kind))
    }

    fn read(&self, case: &str, kind: ArtifactKind) -> Result<String, StoreError> {
        self.entries
            .borrow()
            .get(&(case.to_string(), kind))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                case: case.to_string(),
                kind,
                path: PathBuf::from(file_name(case, kind)),
            })
    }

    fn write(&self, case: &str, kind: ArtifactKind, text: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.borrow_mut();
        let key = (case.to_string(), kind);
        if entries.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                case: case.to_string(),
                kind,
                path: PathBuf::from(file_name(case, kind)),
            });
        }
        entries.insert(key, text.to_string());
        Ok(())
    }

    fn prune_empty(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut entries = self.entries.borrow_mut();
        let mut removed: Vec<PathBuf> = entries
            .iter()
            .filter(|(_, text)| text.is_empty())
            .map(|((case, kind), _)| PathBuf::from(file_name(case, *kind)))
            .collect();
        entries.retain(|_, text| !text.is_empty());
        removed.sort();
        Ok(removed)
    }
}
