//! On-disk model artifact (versioned JSON).

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::forest::IsolationForest;
use super::{AnomalyScorer, ScoreError};

/// Bumped whenever the serialized layout changes.
pub const FORMAT_VERSION: u32 = 1;

pub const DETECTOR_ISOLATION_FOREST: &str = "isolation_forest";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub detector: String,
    /// Column order the model was fitted on.
    pub feature_names: Vec<String>,
    pub contamination: f64,
    pub training_rows: usize,
    pub trained_at: DateTime<Utc>,
    pub model: IsolationForest,
}

impl ModelArtifact {
    pub fn new(model: IsolationForest, feature_names: Vec<String>, contamination: f64, training_rows: usize) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            detector: DETECTOR_ISOLATION_FOREST.to_string(),
            feature_names,
            contamination,
            training_rows,
            trained_at: Utc::now(),
            model,
        }
    }

    /// Read an artifact from disk. Any I/O, parse, version or tree-structure
    /// problem is reported as [`ScoreError::ModelUnavailable`].
    pub fn load(path: &Path) -> Result<Self, ScoreError> {
        let unavailable = |reason: String| ScoreError::ModelUnavailable {
            path: path.display().to_string(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| unavailable(e.to_string()))?;
        let artifact: Self = serde_json::from_str(&content).map_err(|e| unavailable(e.to_string()))?;

        if artifact.format_version != FORMAT_VERSION {
            return Err(unavailable(format!(
                "unsupported format version {} (expected {})",
                artifact.format_version, FORMAT_VERSION
            )));
        }
        if artifact.detector != DETECTOR_ISOLATION_FOREST {
            return Err(unavailable(format!("unknown detector {:?}", artifact.detector)));
        }
        artifact.model.check().map_err(|e| unavailable(e.to_string()))?;

        info!(
            path = %path.display(),
            trees = artifact.model.n_estimators(),
            rows = artifact.training_rows,
            contamination = artifact.contamination,
            "loaded model artifact"
        );
        Ok(artifact)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write model artifact: {}", path.display()))?;
        info!(path = %path.display(), "saved model artifact");
        Ok(())
    }

    /// Wrap the fitted model in a scorer, checking the feature contract.
    pub fn into_scorer(self) -> Result<AnomalyScorer, ScoreError> {
        if self.model.n_features() != self.feature_names.len() {
            return Err(ScoreError::FeatureShape {
                expected: self.feature_names,
                got: vec![format!("{} model columns", self.model.n_features())],
            });
        }
        AnomalyScorer::new(Arc::new(self.model), self.feature_names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_ORDER;
    use crate::scoring::forest::ForestParams;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tiny_artifact() -> ModelArtifact {
        let rows: Vec<Vec<f64>> = (0..32)
            .map(|i| (0..FEATURE_ORDER.len()).map(|j| (i * j) as f64).collect())
            .collect();
        let params = ForestParams {
            n_estimators: 10,
            ..Default::default()
        };
        let model = IsolationForest::fit(&rows, &params, &mut StdRng::seed_from_u64(5)).unwrap();
        let names = FEATURE_ORDER.iter().map(|s| s.to_string()).collect();
        ModelArtifact::new(model, names, params.contamination, rows.len())
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models").join("model.json");
        let artifact = tiny_artifact();
        artifact.save(&path).unwrap();

        let loaded = ModelArtifact::load(&path).unwrap();
        assert_eq!(loaded.feature_names, artifact.feature_names);
        assert_eq!(loaded.training_rows, 32);
        assert_eq!(loaded.model.n_estimators(), 10);

        let probe = vec![3.0; FEATURE_ORDER.len()];
        let diff = loaded.model.decision_function(&probe) - artifact.model.decision_function(&probe);
        assert!(diff.abs() < 1e-9);
        assert!(loaded.into_scorer().is_ok());
    }

    #[test]
    fn test_missing_file_unavailable() {
        let err = ModelArtifact::load(Path::new("definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ScoreError::ModelUnavailable { .. }));
    }

    #[test]
    fn test_garbage_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            ModelArtifact::load(&path),
            Err(ScoreError::ModelUnavailable { .. })
        ));
    }

    #[test]
    fn test_version_mismatch_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let mut artifact = tiny_artifact();
        artifact.format_version = FORMAT_VERSION + 1;
        artifact.save(&path).unwrap();

        match ModelArtifact::load(&path) {
            Err(ScoreError::ModelUnavailable { reason, .. }) => {
                assert!(reason.contains("format version"));
            }
            other => panic!("expected ModelUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_corrupt_tree_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let mut json = serde_json::to_value(tiny_artifact()).unwrap();
        let split = json["model"]["trees"]
            .as_array_mut()
            .unwrap()
            .iter_mut()
            .flat_map(|tree| tree["nodes"].as_array_mut().unwrap().iter_mut())
            .find(|node| node["kind"] == "split")
            .unwrap();
        split["feature"] = serde_json::json!(99);
        std::fs::write(&path, json.to_string()).unwrap();

        match ModelArtifact::load(&path) {
            Err(ScoreError::ModelUnavailable { reason, .. }) => {
                assert!(reason.contains("corrupt model"), "{}", reason);
            }
            other => panic!("expected ModelUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_feature_names_rejected() {
        let mut artifact = tiny_artifact();
        artifact.feature_names.reverse();
        assert!(matches!(
            artifact.into_scorer(),
            Err(ScoreError::FeatureShape { .. })
        ));
    }
}
