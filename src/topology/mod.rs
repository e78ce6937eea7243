//! Topology model -- nodes, links, traffic flows, and structural validation.

pub mod delay;
pub mod validate;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::delay::Delay;
pub use self::validate::{validate, ValidationReport};

/// Node identifiers starting with this prefix are switching elements.
pub const SWITCH_PREFIX: &str = "s";

#[derive(Debug, Error, PartialEq)]
pub enum TopologyError {
    #[error("At least 2 nodes required (got {count})")]
    TooFewNodes { count: usize },

    #[error("duplicate node id: {id}")]
    DuplicateNode { id: String },

    #[error("{entity} {src} → {dst} references unknown node {missing}")]
    UnknownNode {
        entity: &'static str,
        src: String,
        dst: String,
        missing: String,
    },

    #[error("link {src} → {dst} has invalid bandwidth {bandwidth}")]
    InvalidBandwidth { src: String, dst: String, bandwidth: f64 },

    #[error("flow {src} → {dst} has invalid rate {rate}")]
    InvalidRate { src: String, dst: String, rate: f64 },

    #[error("total {quantity} overflows")]
    Overflow { quantity: &'static str },

    #[error("feature {feature} is not finite ({value})")]
    NonFiniteFeature { feature: &'static str, value: f64 },

    #[error("invalid delay {raw:?}: {reason}")]
    InvalidDelay { raw: String, reason: String },

    #[error("malformed topology document: {0}")]
    Malformed(String),
}

/// Role of a node, derived from its identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Switch,
    Host,
}

impl NodeKind {
    pub fn of(id: &str) -> Self {
        if id.starts_with(SWITCH_PREFIX) {
            NodeKind::Switch
        } else {
            NodeKind::Host
        }
    }
}

/// A bidirectional link between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub src: String,
    pub dst: String,
    #[serde(rename = "bw")]
    pub bandwidth: f64,
    pub delay: Delay,
}

/// One-directional traffic demand between two end-hosts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub src: String,
    pub dst: String,
    pub rate: f64,
}

/// User-authored network topology.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub nodes: Vec<String>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub flows: Vec<Flow>,
}

impl Topology {
    /// Parse a topology document from JSON.
    pub fn from_json(json: &str) -> Result<Self, TopologyError> {
        serde_json::from_str(json).map_err(|e| TopologyError::Malformed(e.to_string()))
    }

    pub fn switches(&self) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .map(String::as_str)
            .filter(|id| NodeKind::of(id) == NodeKind::Switch)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .map(String::as_str)
            .filter(|id| NodeKind::of(id) == NodeKind::Host)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document() {
        let json = r#"{
            "nodes": ["h1", "h2", "s1"],
            "links": [
                {"src": "h1", "dst": "s1", "bw": 10, "delay": "5ms"},
                {"src": "h2", "dst": "s1", "bw": 10, "delay": "5ms"}
            ],
            "flows": [{"src": "h1", "dst": "h2", "rate": 5}]
        }"#;
        let topo = Topology::from_json(json).unwrap();
        assert_eq!(topo, fixtures::star());
        assert_eq!(topo.links[0].delay.as_millis(), 5.0);
    }

    #[test]
    fn test_missing_collections_default_empty() {
        let topo = Topology::from_json(r#"{"nodes": ["h1", "h2"]}"#).unwrap();
        assert!(topo.links.is_empty());
        assert!(topo.flows.is_empty());
    }

    #[test]
    fn test_bad_delay_is_malformed() {
        let json = r#"{"nodes": ["h1", "s1"], "links": [{"src": "h1", "dst": "s1", "bw": 10, "delay": "fast"}]}"#;
        assert!(matches!(
            Topology::from_json(json),
            Err(TopologyError::Malformed(_))
        ));
    }

    #[test]
    fn test_node_kinds() {
        let topo = fixtures::star();
        assert_eq!(topo.switches().collect::<Vec<_>>(), vec!["s1"]);
        assert_eq!(topo.hosts().collect::<Vec<_>>(), vec!["h1", "h2"]);
        assert_eq!(NodeKind::of("switch-core"), NodeKind::Switch);
        assert_eq!(NodeKind::of("web"), NodeKind::Host);
    }
}
