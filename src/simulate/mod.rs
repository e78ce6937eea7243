//! Simulation adapter -- produces a small latency/loss/throughput summary
//! for a topology.
//!
//! The summary is telemetry for the caller and is never fed to the scorer.
//! Backends are pluggable through [`Simulator`].

pub mod command;
pub mod synthetic;

use std::ops::RangeInclusive;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{SimulationBackend, SimulationConfig};
use crate::topology::Topology;

pub use self::command::CommandSimulator;
pub use self::synthetic::SyntheticSimulator;

pub const LATENCY_MS_RANGE: RangeInclusive<f64> = 5.0..=30.0;
pub const LOSS_RATIO_RANGE: RangeInclusive<f64> = 0.0..=0.3;
pub const THROUGHPUT_MBPS_RANGE: RangeInclusive<f64> = 5.0..=50.0;
pub const QUEUE_OCCUPANCY_RANGE: RangeInclusive<f64> = 10.0..=100.0;
/// Duration of one emulated traffic run.
pub const SIMULATION_TIME_SEC: f64 = 6.0;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("emulation command not configured")]
    NotConfigured,

    #[error("failed to stage topology file: {0}")]
    Staging(String),

    #[error("failed to spawn emulation command {command}: {reason}")]
    Spawn { command: String, reason: String },

    #[error("emulation timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("emulation exited with code {code}: {stderr}")]
    Failed { code: i32, stderr: String },

    #[error("unparsable emulation output: {0}")]
    BadOutput(String),

    #[error("{field} = {value} outside plausible range {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Summary of one emulated traffic run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub avg_latency_ms: f64,
    pub packet_loss_ratio: f64,
    pub avg_throughput_mbps: f64,
    pub queue_occupancy: f64,
    pub simulation_time_sec: f64,
}

impl SimulationSummary {
    /// Check every field against its documented range.
    pub fn check_ranges(&self) -> Result<(), SimulationError> {
        let checks = [
            ("avg_latency_ms", self.avg_latency_ms, &LATENCY_MS_RANGE),
            ("packet_loss_ratio", self.packet_loss_ratio, &LOSS_RATIO_RANGE),
            ("avg_throughput_mbps", self.avg_throughput_mbps, &THROUGHPUT_MBPS_RANGE),
            ("queue_occupancy", self.queue_occupancy, &QUEUE_OCCUPANCY_RANGE),
        ];
        for (field, value, range) in checks {
            if !range.contains(&value) {
                return Err(SimulationError::OutOfRange {
                    field,
                    value,
                    min: *range.start(),
                    max: *range.end(),
                });
            }
        }
        if !(self.simulation_time_sec.is_finite() && self.simulation_time_sec >= 0.0) {
            return Err(SimulationError::OutOfRange {
                field: "simulation_time_sec",
                value: self.simulation_time_sec,
                min: 0.0,
                max: f64::MAX,
            });
        }
        Ok(())
    }
}

/// A backend that runs (or stands in for) a traffic emulation.
#[async_trait::async_trait]
pub trait Simulator: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    async fn run(&self, topology: &Topology) -> Result<SimulationSummary, SimulationError>;
}

/// Build the configured backend.
pub fn from_config(config: &SimulationConfig) -> Arc<dyn Simulator> {
    match config.backend {
        SimulationBackend::Synthetic => Arc::new(SyntheticSimulator::new(config.seed)),
        SimulationBackend::Command => Arc::new(CommandSimulator::from_config(config)),
    }
}
