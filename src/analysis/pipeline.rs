use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use super::{annotate, AnalysisResult};
use crate::features::extract;
use crate::scoring::{ModelCache, ScoreError};
use crate::simulate::{SimulationError, Simulator};
use crate::topology::{validate, Topology, TopologyError};

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error(transparent)]
    Validation(#[from] TopologyError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error(transparent)]
    Scoring(#[from] ScoreError),

    #[error("analysis task failed: {0}")]
    Internal(String),
}

/// Runs validate -> simulate -> extract -> score -> annotate for one topology.
///
/// Holds no per-request state; the model cache is the only shared resource.
#[derive(Clone)]
pub struct Analyzer {
    simulator: Arc<dyn Simulator>,
    models: Arc<ModelCache>,
}

impl Analyzer {
    pub fn new(simulator: Arc<dyn Simulator>, models: Arc<ModelCache>) -> Self {
        Self { simulator, models }
    }

    pub fn models(&self) -> &Arc<ModelCache> {
        &self.models
    }

    pub async fn analyze(&self, topology: &Topology) -> Result<AnalysisResult, AnalyzeError> {
        let report = validate(topology)?;
        for warning in &report.warnings {
            warn!(%warning, "topology warning");
        }

        let simulation = self.simulator.run(topology).await?;
        let features = extract(topology);
        features.check_finite()?;

        // Artifact I/O happens at most once per change; keep it off the runtime threads.
        let models = self.models.clone();
        let scorer = tokio::task::spawn_blocking(move || models.get())
            .await
            .map_err(|e| AnalyzeError::Internal(e.to_string()))??;
        let global = scorer.score(&features);

        info!(
            backend = self.simulator.name(),
            nodes = topology.nodes.len(),
            links = topology.links.len(),
            flows = topology.flows.len(),
            utilization = features.utilization_ratio,
            anomaly_score = global.anomaly_score,
            is_anomaly = global.is_anomaly,
            "analysis complete"
        );

        Ok(annotate(topology, &features, global, simulation))
    }
}
