//! Live-circuit probe
//!
//! The drain policy wants to know whether sessions are still riding this
//! node. The router exposes that through an introspection command whose
//! output contains a `circuits (<n>)` token. Probe failures are surfaced
//! as errors and degrade inside the drain policy; they never abort the
//! evaluation.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Upper bound on the probe subprocess
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default router introspection command
pub const DEFAULT_CIRCUIT_COMMAND: &str = "ziti agent stats";

/// Errors raised by the circuit probe
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Circuit probe command is empty")]
    EmptyCommand,

    #[error("Circuit probe failed to start: {0}")]
    Spawn(String),

    #[error("Circuit probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("Circuit probe exited with status {0}")]
    Failed(i32),

    #[error("Circuit probe output has no circuits token")]
    MissingToken,
}

/// Source of the live circuit count used by the drain policy
pub trait CircuitProbe: Send + Sync {
    /// Count circuits currently traversing this node
    fn active_circuits(&self)
        -> Pin<Box<dyn Future<Output = Result<u32, ProbeError>> + Send + '_>>;
}

/// Probe that shells out to the router introspection command
pub struct CommandCircuitProbe {
    program: String,
    args: Vec<String>,
}

impl CommandCircuitProbe {
    /// Split a whitespace-separated command line into program and arguments
    pub fn from_command_line(command: &str) -> Result<Self, ProbeError> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(ProbeError::EmptyCommand)?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl CircuitProbe for CommandCircuitProbe {
    fn active_circuits(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<u32, ProbeError>> + Send + '_>> {
        Box::pin(async move {
            tracing::debug!(program = %self.program, "Running circuit probe");

            let output = tokio::time::timeout(
                PROBE_TIMEOUT,
                Command::new(&self.program).args(&self.args).output(),
            )
            .await
            .map_err(|_| ProbeError::Timeout(PROBE_TIMEOUT))?
            .map_err(|e| ProbeError::Spawn(e.to_string()))?;

            if !output.status.success() {
                return Err(ProbeError::Failed(output.status.code().unwrap_or(-1)));
            }

            parse_circuit_count(&String::from_utf8_lossy(&output.stdout))
        })
    }
}

/// Find the `circuits (<n>)` token in introspection output
pub fn parse_circuit_count(output: &str) -> Result<u32, ProbeError> {
    let start = output.find("circuits (").ok_or(ProbeError::MissingToken)?;
    let rest = &output[start + "circuits (".len()..];
    let end = rest.find(')').ok_or(ProbeError::MissingToken)?;
    rest[..end]
        .trim()
        .parse()
        .map_err(|_| ProbeError::MissingToken)
}
