//! Rule-based remediation suggestions for an analysis result.
//!
//! Accepts arbitrary JSON so that callers can post back what `/analyze`
//! returned; anything without a boolean `global.is_anomaly` is rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::analysis::AnalysisResult;

/// Links below this bandwidth get an upgrade suggestion when anomalous.
pub const UPGRADE_BANDWIDTH_BELOW: f64 = 5.0;

#[derive(Debug, Error, PartialEq)]
pub enum SuggestError {
    #[error("Invalid analysis input. Call /analyze first. ({0})")]
    Precondition(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionKind {
    Bandwidth,
    Topology,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    pub target: String,
    pub suggestion: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    pub recommendations: Vec<Suggestion>,
}

/// Minimal view of a link needed by the rules.
struct LinkView<'a> {
    src: &'a str,
    dst: &'a str,
    bandwidth: f64,
}

fn rules<'a>(is_anomaly: bool, links: impl Iterator<Item = LinkView<'a>>) -> Recommendations {
    if !is_anomaly {
        return Recommendations::default();
    }

    let mut recommendations: Vec<Suggestion> = links
        .filter(|link| link.bandwidth < UPGRADE_BANDWIDTH_BELOW)
        .map(|link| Suggestion {
            kind: SuggestionKind::Bandwidth,
            target: format!("{} → {}", link.src, link.dst),
            suggestion: "Increase link bandwidth".to_string(),
        })
        .collect();

    recommendations.push(Suggestion {
        kind: SuggestionKind::Topology,
        target: "network".to_string(),
        suggestion: "Add redundancy or reduce traffic load".to_string(),
    });

    debug!(count = recommendations.len(), "suggestions built");
    Recommendations { recommendations }
}

/// Suggestions for a typed analysis result.
pub fn suggest(analysis: &AnalysisResult) -> Recommendations {
    rules(
        analysis.global.is_anomaly,
        analysis.topology.links.iter().map(|l| LinkView {
            src: &l.src,
            dst: &l.dst,
            bandwidth: l.bandwidth,
        }),
    )
}

/// Suggestions for an untyped analysis document.
pub fn suggest_value(analysis: &Value) -> Result<Recommendations, SuggestError> {
    let is_anomaly = analysis
        .get("global")
        .ok_or_else(|| SuggestError::Precondition("missing `global`".into()))?
        .get("is_anomaly")
        .and_then(Value::as_bool)
        .ok_or_else(|| SuggestError::Precondition("missing boolean `global.is_anomaly`".into()))?;

    if !is_anomaly {
        return Ok(Recommendations::default());
    }

    let links = analysis
        .pointer("/topology/links")
        .and_then(Value::as_array)
        .ok_or_else(|| SuggestError::Precondition("missing `topology.links`".into()))?;

    let mut views = Vec::with_capacity(links.len());
    for (i, link) in links.iter().enumerate() {
        let field = |name: &str| {
            link.get(name)
                .ok_or_else(|| SuggestError::Precondition(format!("link {} missing `{}`", i, name)))
        };
        let src = field("src")?.as_str();
        let dst = field("dst")?.as_str();
        let bandwidth = field("bandwidth")?.as_f64();
        match (src, dst, bandwidth) {
            (Some(src), Some(dst), Some(bandwidth)) => views.push(LinkView { src, dst, bandwidth }),
            _ => {
                return Err(SuggestError::Precondition(format!(
                    "link {} has malformed fields",
                    i
                )))
            }
        }
    }

    Ok(rules(true, views.into_iter()))
}
