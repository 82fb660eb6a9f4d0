//! Drain policy for the control-down, links-up state
//!
//! An immediate failover here would sever long-lived sessions still riding
//! the healthy data links. The policy waits out a grace period measured by
//! the health subsystem's own timestamps, but switches early once a live
//! probe confirms there is nothing left to drain.

use crate::contracts::*;
use crate::probe::CircuitProbe;

/// Resolve the ambiguous state: control channel down, data links usable.
///
/// A probe error is "could not confirm draining" and falls through to the
/// elapsed-time check; it is never treated as zero circuits.
pub async fn evaluate_drain(
    control: &ControlCheckResult,
    switch_timeout_secs: u64,
    active_circuit_threshold: u32,
    probe: Option<&dyn CircuitProbe>,
) -> DecisionResult {
    let state = ClassifiedState::ControlOnlyFailed;

    let elapsed = match control.elapsed_secs() {
        Some(secs) => secs.max(0),
        None => {
            tracing::warn!(
                "Control check is failing but carries no failure timestamps; treating the outage as just begun"
            );
            0
        }
    };
    tracing::debug!(
        elapsed_secs = elapsed,
        switch_timeout_secs,
        "Control channel outage duration"
    );

    if let Some(probe) = probe {
        match probe.active_circuits().await {
            Ok(count) if count <= active_circuit_threshold => {
                return DecisionResult::relinquish(
                    state,
                    format!(
                        "control channel is down and only {} circuit(s) remain; nothing left to drain",
                        count
                    ),
                );
            }
            Ok(count) => {
                tracing::debug!(circuits = count, "Sessions still draining");
            }
            Err(err) => {
                tracing::warn!(error = %err, "Circuit probe failed; could not confirm draining");
            }
        }
    }

    if elapsed > switch_timeout_secs as i64 {
        DecisionResult::relinquish(
            state,
            format!(
                "control channel down for {}s, longer than the {}s drain grace period",
                elapsed, switch_timeout_secs
            ),
        )
    } else {
        DecisionResult::remain(
            state,
            format!(
                "control channel down for {}s; draining sessions within the {}s grace period",
                elapsed, switch_timeout_secs
            ),
        )
    }
}
