// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-provider periodic sync loop.
//!
//! Each registered provider gets one background thread that emits a Sync
//! after a random period in [min_sync_period, max_sync_period], or sooner
//! when nudged through the provider's sync channel (remote Get, local value
//! change). The jitter is required: it keeps fleets of providers that booted
//! together from flooding the link in lockstep.

use crate::config::SHUTDOWN_POLL;
use crate::group::GroupShared;
use crate::register::Provider;
use crossbeam::channel::{Receiver, RecvTimeoutError};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Spawn the sync loop for one provider.
///
/// The loop exits when the group shuts down, the nudge channel closes, or
/// the group state is dropped.
pub(crate) fn spawn_sync_loop(
    provider: Arc<dyn Provider>,
    group: Weak<GroupShared>,
    nudges: Receiver<()>,
    shutdown: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || sync_loop(&provider, &group, &nudges, &shutdown))
}

fn sync_loop(
    provider: &Arc<dyn Provider>,
    group: &Weak<GroupShared>,
    nudges: &Receiver<()>,
    shutdown: &AtomicBool,
) {
    let mut rng = rand::thread_rng();

    loop {
        let Some(shared) = group.upgrade() else {
            break;
        };
        if shared.is_shutdown() {
            break;
        }
        let min = shared.config.min_sync_period;
        let max = shared.config.max_sync_period;
        drop(shared);

        let period = if max > min {
            min + rng.gen_range(std::time::Duration::ZERO..=(max - min))
        } else {
            min
        };

        // Wait in short slices so Close never blocks on a full sync period.
        let deadline = Instant::now() + period;
        let mut channel_closed = false;
        loop {
            if shutdown.load(Ordering::Relaxed) {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            match nudges.recv_timeout(SHUTDOWN_POLL.min(deadline - now)) {
                Ok(()) => break,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    channel_closed = true;
                    break;
                }
            }
        }
        if channel_closed || shutdown.load(Ordering::Relaxed) {
            break;
        }

        let Some(shared) = group.upgrade() else {
            break;
        };
        if shared.is_shutdown() {
            break;
        }
        shared.emit_sync(provider.as_ref());
    }
}
