//! Failover decision engine
//!
//! Pure orchestration over one snapshot of health data: link filtering,
//! state classification, and drain-policy resolution. The engine performs
//! no network or process I/O of its own; the circuit probe is injected and
//! only consulted in the one ambiguous state.

mod drain;

pub use drain::evaluate_drain;

use crate::contracts::*;
use crate::probe::CircuitProbe;
use std::collections::HashSet;
use std::net::IpAddr;

/// More than this many live circuits counts as "sessions still draining"
pub const DEFAULT_ACTIVE_CIRCUIT_THRESHOLD: u32 = 2;

/// One snapshot of everything the decision depends on
#[derive(Debug, Clone)]
pub struct EvaluationInput {
    pub control: ControlCheckResult,
    pub links: LinkCheckResult,
    pub exclusions: HashSet<String>,
    pub control_addrs: Vec<IpAddr>,
    pub switch_timeout_secs: u64,
    pub active_circuit_threshold: u32,
}

/// Remove administratively excluded links and links riding the control channel.
///
/// Order is preserved and duplicates pass through. An entry without a
/// parseable remote address is dropped: a link that cannot be attributed
/// must not count toward data-plane health.
pub fn filter_links(
    details: &[LinkDetail],
    exclusions: &HashSet<String>,
    control_addrs: &[IpAddr],
) -> Vec<LinkDetail> {
    details
        .iter()
        .filter(|d| !exclusions.contains(&d.dest_router_id))
        .filter(|d| match d.remote_host() {
            Some(host) => !is_control_address(host, control_addrs),
            None => false,
        })
        .cloned()
        .collect()
}

fn is_control_address(host: &str, control_addrs: &[IpAddr]) -> bool {
    match host.parse::<IpAddr>() {
        Ok(ip) => control_addrs.contains(&ip),
        // A hostname cannot equal a resolved address
        Err(_) => false,
    }
}

/// Classify one snapshot of the two health booleans
pub fn classify(control_healthy: bool, filtered_link_healthy: bool) -> ClassifiedState {
    match (control_healthy, filtered_link_healthy) {
        (true, true) => ClassifiedState::Healthy,
        (false, false) => ClassifiedState::AllFailed,
        (true, false) => ClassifiedState::LinksOnlyFailed,
        (false, true) => ClassifiedState::ControlOnlyFailed,
    }
}

/// Failover decision engine
pub struct DecisionEngine;

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate one snapshot and decide whether to keep the master role.
    ///
    /// Identical inputs yield identical output; the only temporal inputs
    /// are the timestamps carried inside the snapshot itself.
    pub async fn evaluate(
        &self,
        input: &EvaluationInput,
        probe: Option<&dyn CircuitProbe>,
    ) -> DecisionResult {
        let details = input.links.details.as_deref().unwrap_or(&[]);
        let filtered = filter_links(details, &input.exclusions, &input.control_addrs);
        tracing::debug!(
            reported = details.len(),
            retained = filtered.len(),
            "Link set after policy filtering"
        );

        let state = classify(input.control.healthy, !filtered.is_empty());
        match state {
            ClassifiedState::Healthy => DecisionResult::remain(
                state,
                format!(
                    "control channel is healthy and {} data link(s) are usable",
                    filtered.len()
                ),
            ),
            ClassifiedState::AllFailed => {
                if let Some(since) = input.control.failing_since {
                    tracing::info!(failing_since = %since, "Control channel failure start");
                }
                DecisionResult::relinquish(
                    state,
                    format!(
                        "control channel and all data links have failed ({} consecutive control failures)",
                        input.control.consecutive_failures
                    ),
                )
            }
            ClassifiedState::LinksOnlyFailed => DecisionResult::relinquish(
                state,
                "no usable data links remain even though the control channel is healthy",
            ),
            ClassifiedState::ControlOnlyFailed => {
                evaluate_drain(
                    &input.control,
                    input.switch_timeout_secs,
                    input.active_circuit_threshold,
                    probe,
                )
                .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeError;
    use proptest::prelude::*;
    use std::future::Future;
    use std::pin::Pin;

    fn link(dest: &str, remote_addr: &str) -> LinkDetail {
        LinkDetail {
            dest_router_id: dest.to_string(),
            addresses: Some(LinkAddresses {
                ack: Some(LinkAddress {
                    remote_addr: remote_addr.to_string(),
                }),
            }),
        }
    }

    fn control(healthy: bool, failing_since: &str, last_check_time: &str) -> ControlCheckResult {
        ControlCheckResult {
            healthy,
            consecutive_failures: if healthy { 0 } else { 4 },
            failing_since: Some(failing_since.parse().unwrap()),
            last_check_time: Some(last_check_time.parse().unwrap()),
        }
    }

    fn healthy_control() -> ControlCheckResult {
        ControlCheckResult {
            healthy: true,
            consecutive_failures: 0,
            failing_since: None,
            last_check_time: Some("2024-01-01T00:00:00Z".parse().unwrap()),
        }
    }

    fn input(
        control: ControlCheckResult,
        details: Option<Vec<LinkDetail>>,
        exclusions: &[&str],
    ) -> EvaluationInput {
        EvaluationInput {
            control,
            links: LinkCheckResult {
                healthy: details.as_ref().is_some_and(|d| !d.is_empty()),
                details,
            },
            exclusions: exclusions.iter().map(|s| s.to_string()).collect(),
            control_addrs: vec!["192.0.2.10".parse().unwrap()],
            switch_timeout_secs: 600,
            active_circuit_threshold: DEFAULT_ACTIVE_CIRCUIT_THRESHOLD,
        }
    }

    fn two_links() -> Vec<LinkDetail> {
        vec![
            link("router-a", "tls:198.51.100.7:4022"),
            link("router-b", "tls:198.51.100.8:4022"),
        ]
    }

    /// Probe returning a fixed count, or a probe error when `None`
    struct FixedProbe {
        circuits: Option<u32>,
    }

    impl CircuitProbe for FixedProbe {
        fn active_circuits(
            &self,
        ) -> Pin<Box<dyn Future<Output = Result<u32, ProbeError>> + Send + '_>> {
            let circuits = self.circuits;
            Box::pin(async move { circuits.ok_or(ProbeError::MissingToken) })
        }
    }

    #[test]
    fn test_classify_truth_table() {
        assert_eq!(classify(true, true), ClassifiedState::Healthy);
        assert_eq!(classify(false, false), ClassifiedState::AllFailed);
        assert_eq!(classify(true, false), ClassifiedState::LinksOnlyFailed);
        assert_eq!(classify(false, true), ClassifiedState::ControlOnlyFailed);
    }

    #[test]
    fn test_filter_retains_order_and_duplicates() {
        let details = vec![
            link("router-a", "tls:198.51.100.7:4022"),
            link("router-b", "tls:198.51.100.8:4022"),
            link("router-a", "tls:198.51.100.7:4022"),
        ];
        let filtered = filter_links(&details, &HashSet::new(), &[]);
        assert_eq!(filtered, details);
    }

    #[test]
    fn test_filter_excludes_by_router_id() {
        let details = two_links();
        let exclusions: HashSet<String> = ["router-a".to_string()].into_iter().collect();
        let filtered = filter_links(&details, &exclusions, &[]);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].dest_router_id, "router-b");
    }

    #[test]
    fn test_filter_excludes_control_channel_links() {
        let details = vec![
            link("router-a", "tls:192.0.2.10:4022"),
            link("router-b", "tls:198.51.100.8:4022"),
        ];
        let control_addrs = vec!["192.0.2.10".parse().unwrap()];
        let filtered = filter_links(&details, &HashSet::new(), &control_addrs);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].dest_router_id, "router-b");
    }

    #[test]
    fn test_filter_drops_unparseable_addresses() {
        let details = vec![
            link("router-a", "garbage"),
            LinkDetail {
                dest_router_id: "router-b".to_string(),
                addresses: None,
            },
            link("router-c", "tls:198.51.100.8:4022"),
        ];
        let filtered = filter_links(&details, &HashSet::new(), &[]);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].dest_router_id, "router-c");
    }

    #[test]
    fn test_filter_retains_hostname_addresses() {
        let details = vec![link("router-a", "tls:peer.example.com:4022")];
        let control_addrs = vec!["192.0.2.10".parse().unwrap()];
        let filtered = filter_links(&details, &HashSet::new(), &control_addrs);
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn test_filter_empty_input() {
        assert!(filter_links(&[], &HashSet::new(), &[]).is_empty());
    }

    proptest! {
        #[test]
        fn prop_filter_is_a_subset_and_idempotent(
            entries in proptest::collection::vec(
                ("[a-d]{1}", "[0-9a-z.:]{0,20}"),
                0..16,
            )
        ) {
            let details: Vec<LinkDetail> = entries
                .iter()
                .map(|(dest, addr)| link(dest, addr))
                .collect();
            let exclusions: HashSet<String> = ["a".to_string()].into_iter().collect();
            let control_addrs = vec!["192.0.2.10".parse().unwrap()];

            let once = filter_links(&details, &exclusions, &control_addrs);
            prop_assert!(once.len() <= details.len());
            for retained in &once {
                prop_assert!(!exclusions.contains(&retained.dest_router_id));
                prop_assert!(retained.remote_host().is_some());
            }

            let twice = filter_links(&once, &exclusions, &control_addrs);
            prop_assert_eq!(once, twice);
        }
    }

    #[tokio::test]
    async fn test_scenario_a_healthy() {
        let engine = DecisionEngine::new();
        let input = input(healthy_control(), Some(two_links()), &[]);

        let result = engine.evaluate(&input, None).await;
        assert_eq!(result.decision, Decision::RemainActive);
        assert_eq!(result.state, ClassifiedState::Healthy);
        assert_eq!(result.decision.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_scenario_b_all_failed() {
        let engine = DecisionEngine::new();
        let control = control(false, "2024-01-01T00:00:00Z", "2024-01-01T00:05:00Z");
        let input = input(control, None, &[]);

        let result = engine.evaluate(&input, None).await;
        assert_eq!(result.decision, Decision::Relinquish);
        assert_eq!(result.state, ClassifiedState::AllFailed);
        assert_eq!(result.decision.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_scenario_c_all_links_excluded() {
        let engine = DecisionEngine::new();
        let input = input(
            healthy_control(),
            Some(two_links()),
            &["router-a", "router-b"],
        );

        let result = engine.evaluate(&input, None).await;
        assert_eq!(result.decision, Decision::Relinquish);
        assert_eq!(result.state, ClassifiedState::LinksOnlyFailed);
    }

    #[tokio::test]
    async fn test_scenario_d_draining_within_grace_period() {
        let engine = DecisionEngine::new();
        let control = control(false, "2024-01-01T00:00:00Z", "2024-01-01T00:05:00Z");
        let input = input(control, Some(two_links()), &[]);
        let probe = FixedProbe { circuits: Some(5) };

        let result = engine.evaluate(&input, Some(&probe)).await;
        assert_eq!(result.decision, Decision::RemainActive);
        assert_eq!(result.state, ClassifiedState::ControlOnlyFailed);
    }

    #[tokio::test]
    async fn test_scenario_e_grace_period_expired() {
        let engine = DecisionEngine::new();
        let control = control(false, "2024-01-01T00:00:00Z", "2024-01-01T00:11:00Z");
        let input = input(control, Some(two_links()), &[]);
        let probe = FixedProbe { circuits: Some(5) };

        let result = engine.evaluate(&input, Some(&probe)).await;
        assert_eq!(result.decision, Decision::Relinquish);
        assert_eq!(result.state, ClassifiedState::ControlOnlyFailed);
    }

    #[tokio::test]
    async fn test_scenario_f_nothing_left_to_drain() {
        let engine = DecisionEngine::new();
        let control = control(false, "2024-01-01T00:00:00Z", "2024-01-01T00:05:00Z");
        let input = input(control, Some(two_links()), &[]);
        let probe = FixedProbe { circuits: Some(0) };

        let result = engine.evaluate(&input, Some(&probe)).await;
        assert_eq!(result.decision, Decision::Relinquish);
        assert_eq!(result.state, ClassifiedState::ControlOnlyFailed);
    }

    #[tokio::test]
    async fn test_evaluation_is_idempotent() {
        let engine = DecisionEngine::new();
        let control = control(false, "2024-01-01T00:00:00Z", "2024-01-01T00:05:00Z");
        let input = input(control, Some(two_links()), &["router-a"]);
        let probe = FixedProbe { circuits: Some(5) };

        let first = engine.evaluate(&input, Some(&probe)).await;
        let second = engine.evaluate(&input, Some(&probe)).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_control_link_coincidence_counts_as_links_failed() {
        // The only link rides the control channel address, so the filtered
        // set is empty and the node must relinquish even with control up.
        let engine = DecisionEngine::new();
        let details = vec![link("router-a", "tls:192.0.2.10:4022")];
        let input = input(healthy_control(), Some(details), &[]);

        let result = engine.evaluate(&input, None).await;
        assert_eq!(result.decision, Decision::Relinquish);
        assert_eq!(result.state, ClassifiedState::LinksOnlyFailed);
    }
}
