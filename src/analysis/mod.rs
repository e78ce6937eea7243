//! Risk annotation -- turns one global anomaly verdict into per-node and
//! per-link risk, plus chart-ready metric series.

pub mod pipeline;

use serde::{Deserialize, Serialize};

use crate::features::FeatureVector;
use crate::scoring::GlobalScore;
use crate::simulate::SimulationSummary;
use crate::topology::{Delay, Topology};

pub use self::pipeline::{AnalyzeError, Analyzer};

/// Multipliers applied to the throughput proxy to sketch a short time trace.
pub const THROUGHPUT_TRACE: [f64; 5] = [0.9, 1.0, 0.95, 0.85, 0.8];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRisk {
    pub id: String,
    pub risk: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRisk {
    pub src: String,
    pub dst: String,
    pub bandwidth: f64,
    pub delay: Delay,
    pub utilization: f64,
    pub risk: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedTopology {
    pub nodes: Vec<NodeRisk>,
    pub links: Vec<LinkRisk>,
}

/// Single chart point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub x: Vec<u32>,
    pub y: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub latency_vs_flows: Point,
    pub loss_vs_flows: Point,
    pub throughput_vs_time: Series,
}

/// Full response of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub simulation: SimulationSummary,
    pub global: GlobalScore,
    pub topology: AnnotatedTopology,
    pub metrics: Metrics,
}

/// Bounded risk in `[0, 1]` derived from an anomaly score.
/// `f64::min` discards NaN, so a NaN score maps to full risk.
pub fn risk_from_score(anomaly_score: f64) -> f64 {
    anomaly_score.abs().min(1.0)
}

/// Build the chart series from the feature vector.
pub fn chart_metrics(features: &FeatureVector) -> Metrics {
    Metrics {
        latency_vs_flows: Point {
            x: features.flow_count,
            y: features.simulated_latency,
        },
        loss_vs_flows: Point {
            x: features.flow_count,
            y: features.simulated_loss,
        },
        throughput_vs_time: Series {
            x: (1..=THROUGHPUT_TRACE.len() as u32).collect(),
            y: THROUGHPUT_TRACE.iter().map(|m| features.throughput * m).collect(),
        },
    }
}

/// Annotate a topology with the global verdict.
///
/// The same risk is broadcast to every node and link, and every link carries
/// the global utilization ratio. The input topology is not modified.
pub fn annotate(
    topology: &Topology,
    features: &FeatureVector,
    global: GlobalScore,
    simulation: SimulationSummary,
) -> AnalysisResult {
    let risk = risk_from_score(global.anomaly_score);

    let nodes = topology
        .nodes
        .iter()
        .map(|id| NodeRisk {
            id: id.clone(),
            risk,
        })
        .collect();

    let links = topology
        .links
        .iter()
        .map(|link| LinkRisk {
            src: link.src.clone(),
            dst: link.dst.clone(),
            bandwidth: link.bandwidth,
            delay: link.delay.clone(),
            utilization: features.utilization_ratio,
            risk,
        })
        .collect();

    AnalysisResult {
        simulation,
        global,
        topology: AnnotatedTopology { nodes, links },
        metrics: chart_metrics(features),
    }
}
