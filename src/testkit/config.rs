//! Canonical test configurations.
//!
//! Single source of truth for the config shapes tests use, so each test
//! module doesn't grow its own slightly-different defaults.

use crate::config::{DispatchConfig, RelaunchBackoff, Scale};

/// Dispatch config with the given pool bounds and everything else quiet:
/// no polling, no retries, small channel capacities.
///
/// Tests that need specific timing behavior override fields on the
/// returned struct.
pub fn dispatch(min_conns: u32, max_conns: u32) -> DispatchConfig {
    DispatchConfig {
        min_conns,
        max_conns,
        relaunch_backoff: relaunch(),
        inbound_capacity: 128,
        callback_capacity: 128,
        retry_intake_capacity: 128,
        ..DispatchConfig::default()
    }
}

/// Fast scaling config: exponential growth with short windows so pool
/// transitions happen within test timescales.
pub fn scaling(min_conns: u32, max_conns: u32) -> DispatchConfig {
    DispatchConfig {
        scale: Scale::Exponential,
        min_sustain_ms: 200,
        poll_interval_ms: 50,
        settle_period_ms: 100,
        ..dispatch(min_conns, max_conns)
    }
}

/// Relaunch pacing with no real delays — no waiting in tests.
pub fn relaunch() -> RelaunchBackoff {
    RelaunchBackoff {
        initial_delay_ms: 1,
        max_delay_ms: 5,
        multiplier: 2.0,
    }
}
