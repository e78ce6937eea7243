//! Structural validation of a topology before it is analyzed.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Topology, TopologyError};

/// Links below this capacity are reported but not rejected.
pub const LOW_BANDWIDTH_WARNING: f64 = 2.0;

/// Outcome of a successful validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub warnings: Vec<String>,
}

/// Validate a topology.
///
/// Empty `links` or `flows` are valid degenerate inputs. Structural problems
/// (too few nodes, duplicate ids, dangling endpoints, non-positive capacities,
/// totals that overflow `f64`) fail with a [`TopologyError`]; thin links only
/// produce warnings.
pub fn validate(topology: &Topology) -> Result<ValidationReport, TopologyError> {
    if topology.nodes.len() < 2 {
        return Err(TopologyError::TooFewNodes {
            count: topology.nodes.len(),
        });
    }

    let mut known = HashSet::with_capacity(topology.nodes.len());
    for id in &topology.nodes {
        if !known.insert(id.as_str()) {
            return Err(TopologyError::DuplicateNode { id: id.clone() });
        }
    }

    let resolve = |entity: &'static str, src: &str, dst: &str| {
        for endpoint in [src, dst] {
            if !known.contains(endpoint) {
                return Err(TopologyError::UnknownNode {
                    entity,
                    src: src.to_string(),
                    dst: dst.to_string(),
                    missing: endpoint.to_string(),
                });
            }
        }
        Ok(())
    };

    let mut warnings = Vec::new();
    for link in &topology.links {
        resolve("link", &link.src, &link.dst)?;
        if !link.bandwidth.is_finite() || link.bandwidth <= 0.0 {
            return Err(TopologyError::InvalidBandwidth {
                src: link.src.clone(),
                dst: link.dst.clone(),
                bandwidth: link.bandwidth,
            });
        }
        if link.bandwidth < LOW_BANDWIDTH_WARNING {
            warnings.push(format!("Low bandwidth on {} → {}", link.src, link.dst));
        }
    }

    for flow in &topology.flows {
        resolve("flow", &flow.src, &flow.dst)?;
        if !flow.rate.is_finite() || flow.rate <= 0.0 {
            return Err(TopologyError::InvalidRate {
                src: flow.src.clone(),
                dst: flow.dst.clone(),
                rate: flow.rate,
            });
        }
    }

    let totals = [
        ("link bandwidth", topology.links.iter().map(|l| l.bandwidth).sum::<f64>()),
        ("link delay", topology.links.iter().map(|l| l.delay.as_millis()).sum::<f64>()),
        ("flow rate", topology.flows.iter().map(|f| f.rate).sum::<f64>()),
    ];
    for (quantity, total) in totals {
        if !total.is_finite() {
            return Err(TopologyError::Overflow { quantity });
        }
    }

    debug!(
        nodes = topology.nodes.len(),
        links = topology.links.len(),
        flows = topology.flows.len(),
        warnings = warnings.len(),
        "topology validated"
    );

    Ok(ValidationReport {
        valid: true,
        warnings,
    })
}
