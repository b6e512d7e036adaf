// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Single-thread timer wheel for consumer freshness timeouts.
//!
//! Every accepted Sync re-arms a single-shot timer per consumer; expiry means
//! "this register is no longer reachable". Expiries are not delivered here -
//! they are sent as events into the group dispatcher channel, so staleness
//! and Sync handling are serialized on one thread.
//!
//! Re-arming does not remove the superseded heap entry; instead every arm
//! bumps a generation counter and the dispatcher ignores expiries whose
//! generation is no longer current. Stale entries drain as their deadlines
//! pass.

use crate::config::SHUTDOWN_POLL;
use crossbeam::channel::Sender;
use parking_lot::{Condvar, Mutex};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Expiry event: the armed key and the generation it was armed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Expiry {
    /// Consumer slot key.
    pub key: u64,
    /// Generation at arm time; stale if the slot re-armed since.
    pub generation: u64,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Entry {
    deadline: Instant,
    key: u64,
    generation: u64,
}

struct WheelInner {
    queue: Mutex<BinaryHeap<Reverse<Entry>>>,
    wakeup: Condvar,
    shutdown: AtomicBool,
    generation: AtomicU64,
}

/// The timer wheel: one background thread draining a deadline heap.
pub(crate) struct TimerWheel {
    inner: Arc<WheelInner>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TimerWheel {
    /// Spawn the wheel thread; due entries are sent to `expired`.
    pub(crate) fn spawn(expired: Sender<Expiry>) -> Self {
        let inner = Arc::new(WheelInner {
            queue: Mutex::new(BinaryHeap::new()),
            wakeup: Condvar::new(),
            shutdown: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        });

        let thread_inner = Arc::clone(&inner);
        let handle = thread::spawn(move || wheel_loop(&thread_inner, &expired));

        TimerWheel {
            inner,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Arm (or re-arm) the timer for `key`; returns the new generation.
    pub(crate) fn arm(&self, key: u64, timeout: Duration) -> u64 {
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        {
            let mut queue = self.inner.queue.lock();
            queue.push(Reverse(Entry {
                deadline: Instant::now() + timeout,
                key,
                generation,
            }));
        }
        self.inner.wakeup.notify_one();
        generation
    }

    /// Stop the wheel thread and release all outstanding timers.
    pub(crate) fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Relaxed);
        self.inner.wakeup.notify_one();
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TimerWheel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn wheel_loop(inner: &WheelInner, expired: &Sender<Expiry>) {
    let mut queue = inner.queue.lock();
    loop {
        if inner.shutdown.load(Ordering::Relaxed) {
            break;
        }

        let now = Instant::now();
        while queue
            .peek()
            .is_some_and(|Reverse(entry)| entry.deadline <= now)
        {
            let Some(Reverse(entry)) = queue.pop() else {
                break;
            };
            if expired
                .send(Expiry {
                    key: entry.key,
                    generation: entry.generation,
                })
                .is_err()
            {
                // Dispatcher is gone; nothing left to time out for.
                return;
            }
        }

        match queue.peek() {
            Some(Reverse(entry)) => {
                let deadline = entry.deadline;
                inner.wakeup.wait_until(&mut queue, deadline);
            }
            None => {
                inner.wakeup.wait_for(&mut queue, SHUTDOWN_POLL);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel;

    #[test]
    fn test_expiry_fires_after_timeout() {
        let (tx, rx) = channel::unbounded();
        let wheel = TimerWheel::spawn(tx);

        let generation = wheel.arm(7, Duration::from_millis(30));
        let expiry = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("expiry should arrive");
        assert_eq!(expiry, Expiry { key: 7, generation });

        wheel.shutdown();
    }

    #[test]
    fn test_rearm_bumps_generation() {
        let (tx, rx) = channel::unbounded();
        let wheel = TimerWheel::spawn(tx);

        let first = wheel.arm(1, Duration::from_millis(20));
        let second = wheel.arm(1, Duration::from_millis(40));
        assert!(second > first);

        // Both heap entries eventually fire; the dispatcher is expected to
        // discard the one whose generation is stale.
        let a = rx.recv_timeout(Duration::from_secs(2)).expect("first expiry");
        let b = rx.recv_timeout(Duration::from_secs(2)).expect("second expiry");
        assert_eq!(a.generation, first);
        assert_eq!(b.generation, second);

        wheel.shutdown();
    }

    #[test]
    fn test_expiries_come_in_deadline_order() {
        let (tx, rx) = channel::unbounded();
        let wheel = TimerWheel::spawn(tx);

        wheel.arm(1, Duration::from_millis(80));
        wheel.arm(2, Duration::from_millis(20));

        let first = rx.recv_timeout(Duration::from_secs(2)).expect("expiry");
        let second = rx.recv_timeout(Duration::from_secs(2)).expect("expiry");
        assert_eq!(first.key, 2);
        assert_eq!(second.key, 1);

        wheel.shutdown();
    }

    #[test]
    fn test_shutdown_is_idempotent_and_prompt() {
        let (tx, _rx) = channel::unbounded();
        let wheel = TimerWheel::spawn(tx);
        wheel.arm(1, Duration::from_secs(3600));

        let start = Instant::now();
        wheel.shutdown();
        wheel.shutdown();
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
