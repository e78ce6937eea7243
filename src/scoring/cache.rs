//! Process-wide cache of the loaded scorer.
//!
//! The artifact is read once and shared behind an `Arc`. When the file's
//! modification time changes the next lookup reloads it and swaps the
//! reference; requests already holding the old `Arc` finish with it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;
use tracing::{info, warn};

use super::artifact::ModelArtifact;
use super::{AnomalyScorer, ScoreError};

struct Loaded {
    scorer: Arc<AnomalyScorer>,
    modified: Option<SystemTime>,
}

pub struct ModelCache {
    path: Option<PathBuf>,
    slot: RwLock<Option<Loaded>>,
}

impl ModelCache {
    /// Cache backed by an artifact file, loaded lazily.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            slot: RwLock::new(None),
        }
    }

    /// Cache holding a scorer built in memory; never touches disk.
    pub fn preloaded(scorer: AnomalyScorer) -> Self {
        Self {
            path: None,
            slot: RwLock::new(Some(Loaded {
                scorer: Arc::new(scorer),
                modified: None,
            })),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.read().is_some()
    }

    /// Current scorer, loading or reloading the artifact when needed.
    pub fn get(&self) -> Result<Arc<AnomalyScorer>, ScoreError> {
        let Some(path) = self.path.as_deref() else {
            return self.slot.read().as_ref().map(|l| l.scorer.clone()).ok_or_else(|| {
                ScoreError::ModelUnavailable {
                    path: "<memory>".to_string(),
                    reason: "cache was invalidated".to_string(),
                }
            });
        };

        let on_disk = modified_time(path);
        if let Some(loaded) = self.slot.read().as_ref() {
            if on_disk.is_none() || loaded.modified == on_disk {
                return Ok(loaded.scorer.clone());
            }
            info!(path = %path.display(), "model artifact changed on disk, reloading");
        }
        self.reload()
    }

    /// Load the artifact from disk and replace the cached scorer.
    pub fn reload(&self) -> Result<Arc<AnomalyScorer>, ScoreError> {
        let Some(path) = self.path.as_deref() else {
            return self.get();
        };

        let modified = modified_time(path);
        let scorer = match ModelArtifact::load(path).and_then(ModelArtifact::into_scorer) {
            Ok(scorer) => Arc::new(scorer),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load model artifact");
                return Err(e);
            }
        };

        *self.slot.write() = Some(Loaded {
            scorer: scorer.clone(),
            modified,
        });
        Ok(scorer)
    }

    /// Drop the cached scorer; the next [`get`](Self::get) reloads from disk.
    pub fn invalidate(&self) {
        *self.slot.write() = None;
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
