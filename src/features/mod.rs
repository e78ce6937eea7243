//! Feature extraction -- topology -> fixed-order numeric feature vector.
//!
//! The field order of [`FeatureVector`] is the contract with the trained
//! model: the training corpus, the model artifact and the scorer all use
//! [`FEATURE_ORDER`]. The `simulated_*`, `queue_length` and `throughput`
//! fields are derived proxies, not measurements.

use serde::{Deserialize, Serialize};

use crate::topology::{Topology, TopologyError};

pub const FEATURE_COUNT: usize = 15;

/// Column order shared by the extractor, the training corpus and the model.
pub const FEATURE_ORDER: [&str; FEATURE_COUNT] = [
    "num_nodes",
    "num_links",
    "avg_bandwidth",
    "max_bandwidth",
    "avg_delay",
    "max_delay",
    "flow_count",
    "avg_flow_rate",
    "max_flow_rate",
    "total_flow_rate",
    "utilization_ratio",
    "simulated_latency",
    "simulated_loss",
    "queue_length",
    "throughput",
];

/// Upper bound of the loss proxy.
const MAX_SIMULATED_LOSS: f64 = 0.5;
/// Loss proxy grows by this much per unit of utilization.
const LOSS_PER_UTILIZATION: f64 = 0.2;
/// Queue proxy: packets queued per flow per unit of utilization.
const QUEUE_PER_FLOW: f64 = 50.0;
/// Throughput proxy never drops below this, so charts stay positive.
const MIN_THROUGHPUT: f64 = 0.1;

/// Numeric summary of a topology, in model input order.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    // Topology size
    pub num_nodes: f64,
    pub num_links: f64,

    // Link capacity & delay
    pub avg_bandwidth: f64,
    pub max_bandwidth: f64,
    pub avg_delay: f64,
    pub max_delay: f64,

    // Traffic load
    pub flow_count: f64,
    pub avg_flow_rate: f64,
    pub max_flow_rate: f64,
    pub total_flow_rate: f64,

    // Derived behavior proxies
    pub utilization_ratio: f64,
    pub simulated_latency: f64,
    pub simulated_loss: f64,
    pub queue_length: f64,
    pub throughput: f64,
}

impl FeatureVector {
    /// Values in [`FEATURE_ORDER`].
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.num_nodes,
            self.num_links,
            self.avg_bandwidth,
            self.max_bandwidth,
            self.avg_delay,
            self.max_delay,
            self.flow_count,
            self.avg_flow_rate,
            self.max_flow_rate,
            self.total_flow_rate,
            self.utilization_ratio,
            self.simulated_latency,
            self.simulated_loss,
            self.queue_length,
            self.throughput,
        ]
    }

    pub fn to_vector(&self) -> Vec<f64> {
        self.to_array().to_vec()
    }

    /// Rebuild a vector from values in [`FEATURE_ORDER`]; `None` on a length mismatch.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        let v: &[f64; FEATURE_COUNT] = values.try_into().ok()?;
        Some(Self {
            num_nodes: v[0],
            num_links: v[1],
            avg_bandwidth: v[2],
            max_bandwidth: v[3],
            avg_delay: v[4],
            max_delay: v[5],
            flow_count: v[6],
            avg_flow_rate: v[7],
            max_flow_rate: v[8],
            total_flow_rate: v[9],
            utilization_ratio: v[10],
            simulated_latency: v[11],
            simulated_loss: v[12],
            queue_length: v[13],
            throughput: v[14],
        })
    }

    /// Reject vectors carrying `inf` or NaN, which only extreme (but finite)
    /// inputs can produce.
    pub fn check_finite(&self) -> Result<(), TopologyError> {
        match self.named().find(|(_, v)| !v.is_finite()) {
            Some((feature, value)) => Err(TopologyError::NonFiniteFeature { feature, value }),
            None => Ok(()),
        }
    }

    /// (name, value) pairs in model order.
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> {
        FEATURE_ORDER.into_iter().zip(self.to_array())
    }
}

/// Mean and max of a sample; an empty sample reduces over a single `0.0`.
fn mean_max(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (mean, max)
}

/// Extract the feature vector of a parsed topology.
///
/// Total on any parsed topology: empty collections reduce to zero and the
/// utilization ratio is zero whenever link capacity is zero. Extreme inputs
/// can still yield non-finite values; see [`FeatureVector::check_finite`].
pub fn extract(topology: &Topology) -> FeatureVector {
    let num_nodes = topology.nodes.len() as f64;
    let num_links = topology.links.len() as f64;

    let bandwidths: Vec<f64> = topology.links.iter().map(|l| l.bandwidth).collect();
    let delays: Vec<f64> = topology.links.iter().map(|l| l.delay.as_millis()).collect();
    let (avg_bandwidth, max_bandwidth) = mean_max(&bandwidths);
    let (avg_delay, max_delay) = mean_max(&delays);

    let rates: Vec<f64> = topology.flows.iter().map(|f| f.rate).collect();
    let flow_count = rates.len() as f64;
    let (avg_flow_rate, max_flow_rate) = mean_max(&rates);
    let total_flow_rate: f64 = rates.iter().sum();

    let capacity = avg_bandwidth * num_links;
    let utilization_ratio = if capacity.is_finite() && capacity > 0.0 {
        total_flow_rate / capacity
    } else {
        0.0
    };

    let simulated_latency = avg_delay * (1.0 + utilization_ratio);
    let simulated_loss = (utilization_ratio * LOSS_PER_UTILIZATION).min(MAX_SIMULATED_LOSS);
    let queue_length = flow_count * utilization_ratio * QUEUE_PER_FLOW;
    let throughput = (capacity - total_flow_rate).max(MIN_THROUGHPUT);

    FeatureVector {
        num_nodes,
        num_links,
        avg_bandwidth,
        max_bandwidth,
        avg_delay,
        max_delay,
        flow_count,
        avg_flow_rate,
        max_flow_rate,
        total_flow_rate,
        utilization_ratio,
        simulated_latency,
        simulated_loss,
        queue_length,
        throughput,
    }
}
