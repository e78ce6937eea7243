//! Stand-in backend drawing plausible values without emulating anything.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::{
    SimulationError, SimulationSummary, Simulator, LATENCY_MS_RANGE, LOSS_RATIO_RANGE,
    QUEUE_OCCUPANCY_RANGE, SIMULATION_TIME_SEC, THROUGHPUT_MBPS_RANGE,
};
use crate::topology::Topology;

pub struct SyntheticSimulator {
    rng: Mutex<StdRng>,
}

impl SyntheticSimulator {
    /// A fixed `seed` makes the sequence of summaries reproducible.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng: Mutex::new(rng) }
    }

    fn draw(&self) -> SimulationSummary {
        let mut rng = self.rng.lock();
        SimulationSummary {
            avg_latency_ms: rng.gen_range(LATENCY_MS_RANGE),
            packet_loss_ratio: rng.gen_range(LOSS_RATIO_RANGE),
            avg_throughput_mbps: rng.gen_range(THROUGHPUT_MBPS_RANGE),
            queue_occupancy: rng.gen_range(QUEUE_OCCUPANCY_RANGE),
            simulation_time_sec: SIMULATION_TIME_SEC,
        }
    }
}

#[async_trait::async_trait]
impl Simulator for SyntheticSimulator {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    async fn run(&self, topology: &Topology) -> Result<SimulationSummary, SimulationError> {
        let summary = self.draw();
        debug!(
            nodes = topology.nodes.len(),
            latency_ms = summary.avg_latency_ms,
            loss = summary.packet_loss_ratio,
            "synthetic simulation summary"
        );
        Ok(summary)
    }
}
