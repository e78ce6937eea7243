use std::sync::Arc;

use crate::analysis::Analyzer;
use crate::config::AnalyzerConfig;
use crate::scoring::ModelCache;
use crate::simulate;

#[derive(Clone)]
pub struct AppState {
    pub analyzer: Analyzer,
}

impl AppState {
    pub fn new(analyzer: Analyzer) -> Self {
        Self { analyzer }
    }

    /// Wire the configured simulator and a lazily loaded model cache.
    pub fn from_config(config: &AnalyzerConfig) -> Self {
        let simulator = simulate::from_config(&config.simulation);
        let models = Arc::new(ModelCache::new(&config.model.path));
        Self::new(Analyzer::new(simulator, models))
    }
}
