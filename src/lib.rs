//! Failover health check for edge-router HA pairs
//!
//! Determines, once per invocation, whether the active member of a failover
//! pair should relinquish the master role. The supervising VRRP agent reads
//! the process exit code: 0 = remain active, 1 = relinquish.
//!
//! # Design Principles
//! - Deterministic: the same health snapshot always produces the same decision
//! - Stateless: all temporal reasoning comes from payload timestamps
//! - One shot: no retries, every I/O call bounded by a timeout

pub mod client;
pub mod config;
pub mod engine;
pub mod probe;

// Re-export contracts
#[path = "../contracts/mod.rs"]
pub mod contracts;

pub use contracts::*;
