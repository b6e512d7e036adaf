// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Register endpoints: the provider (owner) and consumer (observer) sides of
//! a named, typed live value.
//!
//! The group runtime only sees the [`Provider`] and [`Consumer`] traits. The
//! coupling is inverted at both seams: endpoints expose sinks the group
//! calls (`accept_*`, `sync_value`) and attachment points the group injects
//! send functions into (`attach_sync_listener`, `attach_set_listener`), so
//! endpoints carry no reference to their group and are testable in
//! isolation.

/// Consumer-side typed registers.
pub mod consumer;
/// Provider-side typed registers.
pub mod provider;

use crate::optional::Optional;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Conventional metadata key naming the value encoding.
pub const META_TYPE: &str = "type";
/// Conventional metadata key flagging writability (`"true"` / `"false"`).
pub const META_RW: &str = "rw";

/// Register metadata: arbitrary string descriptors, at most 255 entries.
pub type Metadata = HashMap<String, String>;

/// Value encoder; `None` swallows the operation (used by the any-typed
/// registers before their type is known).
pub type Encoder<T> = Box<dyn Fn(&T) -> Option<Vec<u8>> + Send + Sync>;

/// Value decoder; `None` rejects the payload and leaves state unchanged.
pub type Decoder<T> = Box<dyn Fn(&[u8]) -> Option<T> + Send + Sync>;

/// Group-installed nudge asking the provider's sync loop to emit promptly.
pub type SyncListener = Box<dyn Fn() + Send + Sync>;

/// Group-installed sink turning a consumer's set request into a unicast Set.
pub type SetSink = Box<dyn Fn(Optional<Vec<u8>>) + Send + Sync>;

/// Owner side of a register: authoritative for the value, advertised via
/// periodic Sync.
pub trait Provider: Send + Sync {
    /// Register name, unique within the group.
    fn name(&self) -> &str;

    /// Metadata and encoded value captured at call time; every emitted Sync
    /// reflects this snapshot.
    fn encoded_state(&self) -> (Metadata, Optional<Vec<u8>>);

    /// Deliver an inbound Set payload.
    fn accept_encoded_value(&self, value: Optional<Vec<u8>>);

    /// Whether inbound Sets are honored.
    fn writable(&self) -> bool;

    /// Install the group's sync nudge (called on local value changes).
    fn attach_sync_listener(&self, listener: SyncListener);
}

/// Observer side of a register owned elsewhere.
pub trait Consumer: Send + Sync {
    /// Observed register name.
    fn name(&self) -> &str;

    /// Deliver metadata from an inbound Sync.
    fn accept_metadata(&self, metadata: &Metadata);

    /// Deliver an encoded value: on every inbound Sync, and as `Undefined`
    /// on freshness timeout.
    fn sync_value(&self, value: Optional<Vec<u8>>);

    /// Install the group's Set emitter, targeted at the last Sync sender.
    fn attach_set_listener(&self, listener: SetSink);
}

/// Lock with poison recovery: a panicking user callback must not wedge the
/// register or the group tables.
pub(crate) fn recover_lock<'a, T>(lock: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::debug!("[register] WARNING: {} poisoned, recovering", context);
            poisoned.into_inner()
        }
    }
}
