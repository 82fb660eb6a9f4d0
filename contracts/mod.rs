//! Failover Health Check Contracts
//!
//! Wire shapes consumed from the router's health-check endpoint and the
//! decision types the engine hands back to the caller.

mod checks;
mod decision;

pub use checks::*;
pub use decision::*;
