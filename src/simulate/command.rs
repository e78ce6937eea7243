//! External emulation backend.
//!
//! The topology is staged to a temporary JSON file, the configured command
//! is run with that path as its last argument, and a [`SimulationSummary`]
//! is parsed from its stdout. The staged file is deleted when the guard
//! drops, on every exit path.

use std::io::Write;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{SimulationError, SimulationSummary, Simulator};
use crate::config::SimulationConfig;
use crate::topology::Topology;

pub struct CommandSimulator {
    program: Option<String>,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandSimulator {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: Some(program.into()),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            program: config.command.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn stage(topology: &Topology) -> Result<tempfile::NamedTempFile, SimulationError> {
        let mut file = tempfile::Builder::new()
            .prefix("topology-")
            .suffix(".json")
            .tempfile()
            .map_err(|e| SimulationError::Staging(e.to_string()))?;
        serde_json::to_writer(&mut file, topology)
            .map_err(|e| SimulationError::Staging(e.to_string()))?;
        file.flush()
            .map_err(|e| SimulationError::Staging(e.to_string()))?;
        Ok(file)
    }
}

/// Parse the emulator's stdout and reject implausible values.
pub fn parse_output(stdout: &str) -> Result<SimulationSummary, SimulationError> {
    let summary: SimulationSummary =
        serde_json::from_str(stdout.trim()).map_err(|e| SimulationError::BadOutput(e.to_string()))?;
    summary.check_ranges()?;
    Ok(summary)
}

#[async_trait::async_trait]
impl Simulator for CommandSimulator {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn run(&self, topology: &Topology) -> Result<SimulationSummary, SimulationError> {
        let program = self.program.as_deref().ok_or(SimulationError::NotConfigured)?;
        let staged = Self::stage(topology)?;
        debug!(path = %staged.path().display(), %program, "staged topology for emulation");

        let child = Command::new(program)
            .args(&self.args)
            .arg(staged.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SimulationError::Spawn {
                command: program.to_string(),
                reason: e.to_string(),
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| SimulationError::Spawn {
                command: program.to_string(),
                reason: e.to_string(),
            })?,
            Err(_) => {
                warn!(%program, secs = self.timeout.as_secs(), "emulation timed out");
                return Err(SimulationError::Timeout {
                    secs: self.timeout.as_secs(),
                });
            }
        };

        if !output.status.success() {
            return Err(SimulationError::Failed {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let summary = parse_output(&String::from_utf8_lossy(&output.stdout))?;
        info!(
            %program,
            latency_ms = summary.avg_latency_ms,
            loss = summary.packet_loss_ratio,
            throughput_mbps = summary.avg_throughput_mbps,
            "emulation finished"
        );
        Ok(summary)
    }
}
