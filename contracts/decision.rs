//! Decision types emitted by the failover engine

use serde::{Deserialize, Serialize};

/// Classified health state, derived from the control/link boolean pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifiedState {
    /// Control channel up and at least one usable data link
    Healthy,

    /// Control channel and every usable data link down
    AllFailed,

    /// Data links down while the control channel is fine
    LinksOnlyFailed,

    /// Control channel down with usable data links; the drain candidate
    ControlOnlyFailed,
}

/// Role signal handed back to the HA supervisor via the exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    RemainActive,
    Relinquish,
}

impl Decision {
    /// Process exit code the supervisor arbitrates on
    pub fn exit_code(self) -> i32 {
        match self {
            Decision::RemainActive => 0,
            Decision::Relinquish => 1,
        }
    }
}

/// Outcome of one engine evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub decision: Decision,

    pub state: ClassifiedState,

    /// Human-readable explanation, logged by the caller
    pub rationale: String,
}

impl DecisionResult {
    /// Create a remain-active result
    pub fn remain(state: ClassifiedState, rationale: impl Into<String>) -> Self {
        Self {
            decision: Decision::RemainActive,
            state,
            rationale: rationale.into(),
        }
    }

    /// Create a relinquish result
    pub fn relinquish(state: ClassifiedState, rationale: impl Into<String>) -> Self {
        Self {
            decision: Decision::Relinquish,
            state,
            rationale: rationale.into(),
        }
    }
}
