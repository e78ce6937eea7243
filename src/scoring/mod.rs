//! Anomaly scoring -- a trained outlier detector behind a `{score, classify}`
//! capability, plus the versioned artifact it is loaded from.

pub mod artifact;
pub mod cache;
pub mod forest;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::features::{FeatureVector, FEATURE_COUNT, FEATURE_ORDER};

pub use self::artifact::ModelArtifact;
pub use self::cache::ModelCache;
pub use self::forest::{ForestParams, IsolationForest};

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("model unavailable at {path}: {reason}")]
    ModelUnavailable { path: String, reason: String },

    #[error("feature shape mismatch: model expects {expected:?}, got {got:?}")]
    FeatureShape {
        expected: Vec<String>,
        got: Vec<String>,
    },
}

/// Capability interface of an unsupervised detector.
///
/// `score` follows the decision-function convention (more negative = more
/// anomalous); `classify` is the hard outlier label.
pub trait OutlierDetector: Send + Sync {
    fn score(&self, x: &[f64]) -> f64;
    fn classify(&self, x: &[f64]) -> bool;
}

impl OutlierDetector for IsolationForest {
    fn score(&self, x: &[f64]) -> f64 {
        self.decision_function(x)
    }

    fn classify(&self, x: &[f64]) -> bool {
        self.is_outlier(x)
    }
}

/// Global verdict for one feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalScore {
    pub anomaly_score: f64,
    pub is_anomaly: bool,
}

/// A detector bound to the feature names it was trained on.
pub struct AnomalyScorer {
    detector: Arc<dyn OutlierDetector>,
    feature_names: Vec<String>,
}

impl AnomalyScorer {
    /// Bind a detector to its training-time feature order. The order must be
    /// exactly [`FEATURE_ORDER`].
    pub fn new(detector: Arc<dyn OutlierDetector>, feature_names: Vec<String>) -> Result<Self, ScoreError> {
        if feature_names.iter().map(String::as_str).ne(FEATURE_ORDER) {
            return Err(ScoreError::FeatureShape {
                expected: FEATURE_ORDER.iter().map(|s| s.to_string()).collect(),
                got: feature_names,
            });
        }
        Ok(Self {
            detector,
            feature_names,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn score(&self, features: &FeatureVector) -> GlobalScore {
        let x = features.to_array();
        let anomaly_score = self.detector.score(&x);
        let is_anomaly = self.detector.classify(&x);
        debug!(anomaly_score, is_anomaly, "feature vector scored");
        GlobalScore {
            anomaly_score,
            is_anomaly,
        }
    }

    /// Score raw values given in [`FEATURE_ORDER`].
    pub fn score_raw(&self, values: &[f64]) -> Result<GlobalScore, ScoreError> {
        if values.len() != FEATURE_COUNT {
            return Err(ScoreError::FeatureShape {
                expected: self.feature_names.clone(),
                got: (0..values.len()).map(|i| format!("column_{}", i)).collect(),
            });
        }
        Ok(GlobalScore {
            anomaly_score: self.detector.score(values),
            is_anomaly: self.detector.classify(values),
        })
    }
}

impl std::fmt::Debug for AnomalyScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnomalyScorer")
            .field("feature_names", &self.feature_names)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Detector returning a fixed verdict.
    pub struct FixedDetector {
        pub score: f64,
        pub outlier: bool,
    }

    impl OutlierDetector for FixedDetector {
        fn score(&self, _x: &[f64]) -> f64 {
            self.score
        }

        fn classify(&self, _x: &[f64]) -> bool {
            self.outlier
        }
    }

    pub fn fixed_scorer(score: f64, outlier: bool) -> AnomalyScorer {
        AnomalyScorer::new(
            Arc::new(FixedDetector { score, outlier }),
            FEATURE_ORDER.iter().map(|s| s.to_string()).collect(),
        )
        .unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::features::extract;
    use crate::topology::fixtures::star;

    #[test]
    fn test_scorer_passes_verdict_through() {
        let scorer = fixed_scorer(-0.12, true);
        let verdict = scorer.score(&extract(&star()));
        assert_eq!(verdict.anomaly_score, -0.12);
        assert!(verdict.is_anomaly);
    }

    #[test]
    fn test_reordered_features_rejected() {
        let mut names: Vec<String> = FEATURE_ORDER.iter().map(|s| s.to_string()).collect();
        names.swap(0, 1);
        let err = AnomalyScorer::new(Arc::new(FixedDetector { score: 0.0, outlier: false }), names)
            .unwrap_err();
        assert!(matches!(err, ScoreError::FeatureShape { .. }));
    }

    #[test]
    fn test_short_feature_list_rejected() {
        let names = vec!["num_nodes".to_string()];
        assert!(AnomalyScorer::new(Arc::new(FixedDetector { score: 0.0, outlier: false }), names).is_err());
    }

    #[test]
    fn test_raw_length_checked() {
        let scorer = fixed_scorer(0.1, false);
        assert!(matches!(
            scorer.score_raw(&[1.0, 2.0, 3.0]),
            Err(ScoreError::FeatureShape { .. })
        ));
        let ok = scorer.score_raw(&[0.0; FEATURE_COUNT]).unwrap();
        assert!(!ok.is_anomaly);
    }
}
