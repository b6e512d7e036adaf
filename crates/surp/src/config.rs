// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SURP global configuration - single source of truth.
//!
//! Centralizes the protocol constants (multicast address, port derivation
//! parameters, datagram size) and the per-group timing knobs. Constants here
//! are fixed by the protocol; `GroupConfig` carries the tunables with their
//! required defaults.

use std::net::Ipv6Addr;
use std::time::Duration;

// =======================================================================
// Addressing
// =======================================================================

/// Fixed link-local multicast address shared by every SURP group.
///
/// Only the UDP port varies; it is derived from the group or register name
/// (see `transport::ports`).
pub const MULTICAST_ADDR: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0xcafe, 0xface, 0x1dea, 0x1);

/// Lowest derived port. Ports land in [1024, 49151].
pub const PORT_FLOOR: u16 = 1024;

/// Mask applied to the name hash before adding `PORT_FLOOR`.
///
/// `1024 + (crc16(name) & 0xBBFF)` keeps every derived port inside the
/// registered range. All nodes must agree on this bit-exactly.
pub const PORT_HASH_MASK: u16 = 0xBBFF;

// =======================================================================
// Datagrams
// =======================================================================

/// Maximum accepted datagram size. Larger datagrams are truncated by the
/// receive buffer and dropped by the decoder.
pub const MAX_DATAGRAM_SIZE: usize = 1024;

// =======================================================================
// Timing defaults
// =======================================================================

/// Lower bound of the jittered period between two periodic syncs.
pub const MIN_SYNC_PERIOD: Duration = Duration::from_secs(2);

/// Upper bound of the jittered period between two periodic syncs.
pub const MAX_SYNC_PERIOD: Duration = Duration::from_secs(4);

/// Freshness timeout: a consumer that has seen no Sync for this long reports
/// its register as undefined.
pub const SYNC_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval at which blocking socket reads and channel waits wake up to check
/// the shutdown flag.
pub(crate) const SHUTDOWN_POLL: Duration = Duration::from_millis(250);

// =======================================================================
// Group configuration
// =======================================================================

/// Multicast subscription strategy for a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    /// Join the group-wide multicast address once and observe every register
    /// in the group. Minimum socket footprint; used by listing tools.
    CatchAll,
    /// Additionally join the per-register multicast address for each added
    /// provider/consumer, so targeted Get challenges arrive without the
    /// group-wide traffic.
    PerRegister,
}

/// Per-group tunables.
///
/// The defaults are the protocol-required values; tests and tools may tighten
/// them via [`RegisterGroup::join_with_config`](crate::group::RegisterGroup::join_with_config).
#[derive(Debug, Clone)]
pub struct GroupConfig {
    /// Subscription strategy.
    pub mode: JoinMode,
    /// Lower bound of the jittered sync period.
    pub min_sync_period: Duration,
    /// Upper bound of the jittered sync period.
    pub max_sync_period: Duration,
    /// Consumer freshness timeout.
    pub sync_timeout: Duration,
}

impl GroupConfig {
    /// Config with required defaults and the given mode.
    #[must_use]
    pub fn with_mode(mode: JoinMode) -> Self {
        GroupConfig {
            mode,
            ..GroupConfig::default()
        }
    }
}

impl Default for GroupConfig {
    fn default() -> Self {
        GroupConfig {
            mode: JoinMode::PerRegister,
            min_sync_period: MIN_SYNC_PERIOD,
            max_sync_period: MAX_SYNC_PERIOD,
            sync_timeout: SYNC_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_defaults() {
        let config = GroupConfig::default();
        assert_eq!(config.min_sync_period, Duration::from_secs(2));
        assert_eq!(config.max_sync_period, Duration::from_secs(4));
        assert_eq!(config.sync_timeout, Duration::from_secs(10));
        assert_eq!(config.mode, JoinMode::PerRegister);
    }

    #[test]
    fn test_multicast_addr_is_link_local() {
        assert_eq!(MULTICAST_ADDR.segments()[0], 0xff02);
        assert!(MULTICAST_ADDR.is_multicast());
    }
}
