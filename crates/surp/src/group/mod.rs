// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The register group runtime: protocol state machine, dispatch, scheduling.
//!
//! # Architecture
//!
//! ```text
//! MulticastListener(s) --+
//!                        +--> inbound channel --> dispatcher thread
//! UnicastPipe reader  ---+                          |  Sync -> consumers
//! TimerWheel ----------> expiry channel ------------+  Set  -> provider
//!                                                   |  Get  -> sync nudge
//! provider sync loops --> outbound channel --> writer thread --> unicast socket
//! ```
//!
//! One dispatcher thread serializes all inbound handling (including
//! freshness expiries), one writer thread drains the bounded outbound
//! channel, and every provider gets a jittered periodic sync loop.
//!
//! Locking: the `providers` and `consumers` tables have independent locks and
//! are never held together. Consumer callbacks run under the consumers lock
//! so each consumer's recorded Set target stays consistent with its visible
//! value; the optional `on_sync` observer runs after the lock is released.

mod freshness;
mod sync;

use crate::config::{GroupConfig, JoinMode, SHUTDOWN_POLL};
use crate::error::{Error, Result};
use crate::optional::Optional;
use crate::protocol::{Message, MessageKind, MAX_NAME_LEN};
use crate::register::{recover_lock, Consumer, Provider};
use crate::transport::{ports, Datagram, MulticastListener, NetInterface, Outbound, UnicastPipe};
use crossbeam::channel::{self, Receiver, Sender};
use freshness::{Expiry, TimerWheel};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Observer invoked after every accepted Sync (used by listing tools).
pub type SyncObserver = Box<dyn Fn(&Message) + Send + Sync>;

// ============================================================================
// Shared state
// ============================================================================

struct ProviderSlot {
    handle: Arc<dyn Provider>,
    nudge: Sender<()>,
    halt: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

struct ConsumerSlot {
    handle: Arc<dyn Consumer>,
    key: u64,
    timer_generation: u64,
    set_target: Arc<Mutex<Option<SocketAddr>>>,
}

/// State shared between the public handle, the dispatcher, and the sync
/// loops. Sync loops and set listeners hold it weakly so a dropped group
/// tears down cleanly.
pub(crate) struct GroupShared {
    name: String,
    pub(crate) config: GroupConfig,
    iface: NetInterface,
    unicast_port: u16,
    sequence: AtomicU16,
    next_key: AtomicU64,
    outbound: Sender<Outbound>,
    inbound_tx: Sender<Datagram>,
    providers: Mutex<HashMap<String, ProviderSlot>>,
    consumers: Mutex<HashMap<String, Vec<ConsumerSlot>>>,
    on_sync: Mutex<Option<SyncObserver>>,
    wheel: TimerWheel,
    shutdown: Arc<AtomicBool>,
}

impl GroupShared {
    /// Next per-group sequence number, starting at 1, wrapping at 2^16.
    fn next_sequence(&self) -> u16 {
        self.sequence.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// True once the group is winding down (Close, or a fatal socket error).
    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    fn send_multicast(&self, payload: Vec<u8>, register: &str) {
        let group_dest = ports::group_endpoint(&self.name, self.iface.index);
        let register_dest = ports::register_endpoint(&self.name, register, self.iface.index);
        for dest in [group_dest, register_dest] {
            // A full channel blocks briefly; losing a datagram on a closed
            // channel is fine - the protocol is best-effort.
            let _ = self.outbound.send(Outbound {
                payload: payload.clone(),
                dest: SocketAddr::V6(dest),
            });
        }
    }

    /// Emit one Sync for `provider` to the group and per-register endpoints.
    ///
    /// The value and metadata are snapshotted here, so the datagram always
    /// reflects the provider's state at encode time.
    pub(crate) fn emit_sync(&self, provider: &dyn Provider) {
        let (metadata, value) = provider.encoded_state();
        let msg = Message::sync(
            self.next_sequence(),
            self.name.as_str(),
            provider.name(),
            value,
            metadata,
        );
        match msg.encode() {
            Ok(payload) => self.send_multicast(payload, provider.name()),
            Err(e) => log::debug!("[group] sync for '{}' not encodable: {}", provider.name(), e),
        }
    }

    fn emit_get(&self, register: &str) {
        let msg = Message::get(self.next_sequence(), self.name.as_str(), register);
        match msg.encode() {
            Ok(payload) => self.send_multicast(payload, register),
            Err(e) => log::debug!("[group] get for '{}' not encodable: {}", register, e),
        }
    }

    // ------------------------------------------------------------------
    // Inbound dispatch
    // ------------------------------------------------------------------

    fn handle_datagram(&self, datagram: &Datagram) {
        let msg = match Message::decode(&datagram.payload) {
            Ok(msg) => msg,
            Err(e) => {
                log::debug!("[group] dropping datagram from {}: {}", datagram.source, e);
                return;
            }
        };
        if msg.group != self.name {
            return;
        }
        match msg.kind {
            MessageKind::Sync => self.handle_sync(&msg, datagram.source),
            MessageKind::Set => self.handle_set(&msg),
            MessageKind::Get => self.handle_get(&msg.name),
        }
    }

    fn handle_sync(&self, msg: &Message, source: SocketAddr) {
        {
            let mut consumers = recover_lock(&self.consumers, "group consumers");
            if let Some(slots) = consumers.get_mut(&msg.name) {
                for slot in slots.iter_mut() {
                    *recover_lock(&slot.set_target, "consumer set target") = Some(source);
                    slot.handle.accept_metadata(&msg.metadata);
                    slot.timer_generation = self.wheel.arm(slot.key, self.config.sync_timeout);
                    slot.handle.sync_value(msg.value.clone());
                }
            }
        }
        // Observer runs outside the consumers lock.
        if let Some(observer) = recover_lock(&self.on_sync, "group on_sync").as_ref() {
            observer(msg);
        }
    }

    fn handle_set(&self, msg: &Message) {
        let provider = {
            let providers = recover_lock(&self.providers, "group providers");
            match providers.get(&msg.name) {
                Some(slot) if slot.handle.writable() => Some(Arc::clone(&slot.handle)),
                // Unknown or read-only register: drop silently.
                _ => None,
            }
        };
        if let Some(provider) = provider {
            provider.accept_encoded_value(msg.value.clone());
        }
    }

    fn handle_get(&self, name: &str) {
        let providers = recover_lock(&self.providers, "group providers");
        if let Some(slot) = providers.get(name) {
            // A pending nudge already guarantees a prompt sync.
            let _ = slot.nudge.try_send(());
        }
    }

    fn handle_expiry(&self, expiry: Expiry) {
        let mut consumers = recover_lock(&self.consumers, "group consumers");
        for slots in consumers.values_mut() {
            for slot in slots.iter_mut() {
                if slot.key == expiry.key {
                    if slot.timer_generation == expiry.generation {
                        slot.handle.sync_value(Optional::Undefined);
                    }
                    return;
                }
            }
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

fn dispatch_loop(shared: &GroupShared, inbound: &Receiver<Datagram>, expiries: &Receiver<Expiry>) {
    loop {
        if shared.shutdown.load(Ordering::Relaxed) {
            break;
        }
        crossbeam::select! {
            recv(inbound) -> datagram => match datagram {
                Ok(datagram) => shared.handle_datagram(&datagram),
                Err(_) => break,
            },
            recv(expiries) -> expiry => match expiry {
                Ok(expiry) => shared.handle_expiry(expiry),
                Err(_) => break,
            },
            default(SHUTDOWN_POLL) => {}
        }
    }
}

// ============================================================================
// Public handle
// ============================================================================

struct Pipes {
    unicast: Option<UnicastPipe>,
    /// Joined multicast ports; deduplicated so co-located endpoints on the
    /// same register share one listener.
    listeners: HashMap<u16, MulticastListener>,
}

/// A joined register group.
///
/// Created with [`RegisterGroup::join`]; providers and consumers may be
/// added at any time until [`RegisterGroup::close`]. Dropping the group
/// closes it.
pub struct RegisterGroup {
    shared: Arc<GroupShared>,
    pipes: Mutex<Pipes>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl std::fmt::Debug for RegisterGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterGroup").finish_non_exhaustive()
    }
}

impl RegisterGroup {
    /// Join `group` on the named interface with default configuration.
    ///
    /// # Errors
    ///
    /// Interface resolution and socket setup errors; see [`Error`].
    pub fn join(interface: &str, group: &str) -> Result<Self> {
        Self::join_with_config(interface, group, GroupConfig::default())
    }

    /// Join with explicit configuration (mode, timing).
    ///
    /// # Errors
    ///
    /// Interface resolution and socket setup errors; see [`Error`].
    pub fn join_with_config(interface: &str, group: &str, config: GroupConfig) -> Result<Self> {
        if group.len() > MAX_NAME_LEN {
            return Err(Error::NameTooLong {
                what: "group name",
                len: group.len(),
            });
        }

        let iface = NetInterface::resolve(interface)?;
        let shutdown = Arc::new(AtomicBool::new(false));

        let (inbound_tx, inbound_rx) = channel::bounded::<Datagram>(64);
        let (outbound_tx, outbound_rx) = channel::bounded::<Outbound>(16);
        let (expiry_tx, expiry_rx) = channel::bounded::<Expiry>(64);

        let unicast = UnicastPipe::open(&iface, inbound_tx.clone(), outbound_rx, Arc::clone(&shutdown))?;
        let unicast_port = unicast.local_port();

        let mut listeners = HashMap::new();
        if config.mode == JoinMode::CatchAll {
            let port = ports::group_endpoint(group, iface.index).port();
            let listener =
                MulticastListener::open(&iface, port, inbound_tx.clone(), Arc::clone(&shutdown))?;
            listeners.insert(port, listener);
        }

        let shared = Arc::new(GroupShared {
            name: group.to_string(),
            config,
            iface,
            unicast_port,
            sequence: AtomicU16::new(0),
            next_key: AtomicU64::new(1),
            outbound: outbound_tx,
            inbound_tx,
            providers: Mutex::new(HashMap::new()),
            consumers: Mutex::new(HashMap::new()),
            on_sync: Mutex::new(None),
            wheel: TimerWheel::spawn(expiry_tx),
            shutdown,
        });

        let dispatcher_shared = Arc::clone(&shared);
        let dispatcher = thread::spawn(move || {
            dispatch_loop(&dispatcher_shared, &inbound_rx, &expiry_rx);
        });

        log::info!(
            "[group] joined '{}' on {} (unicast port {})",
            group,
            interface,
            unicast_port
        );

        Ok(RegisterGroup {
            shared,
            pipes: Mutex::new(Pipes {
                unicast: Some(unicast),
                listeners,
            }),
            dispatcher: Mutex::new(Some(dispatcher)),
            closed: AtomicBool::new(false),
        })
    }

    /// Group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Local ephemeral unicast port (the source of all our sends; remote
    /// nodes target it with Sets).
    #[must_use]
    pub fn local_port(&self) -> u16 {
        self.shared.unicast_port
    }

    /// Register providers. Each gets a periodic sync loop; in per-register
    /// mode the matching multicast endpoint is joined as well. A provider
    /// re-registered under an existing name replaces the previous one.
    ///
    /// # Errors
    ///
    /// Name validation, multicast join failures, [`Error::GroupClosed`].
    pub fn add_providers(
        &self,
        providers: impl IntoIterator<Item = Arc<dyn Provider>>,
    ) -> Result<()> {
        for provider in providers {
            self.ensure_open()?;
            let name = provider.name().to_string();
            check_register_name(&name)?;
            self.join_register_endpoint(&name)?;

            let (nudge_tx, nudge_rx) = channel::bounded::<()>(1);
            let halt = Arc::new(AtomicBool::new(false));

            // Local value changes nudge the sync loop; a pending nudge
            // absorbs further ones.
            let listener_tx = nudge_tx.clone();
            provider.attach_sync_listener(Box::new(move || {
                let _ = listener_tx.try_send(());
            }));

            let thread = sync::spawn_sync_loop(
                Arc::clone(&provider),
                Arc::downgrade(&self.shared),
                nudge_rx,
                Arc::clone(&halt),
            );

            let slot = ProviderSlot {
                handle: provider,
                nudge: nudge_tx,
                halt,
                thread: Some(thread),
            };
            let replaced = recover_lock(&self.shared.providers, "group providers")
                .insert(name.clone(), slot);
            if let Some(old) = replaced {
                log::debug!("[group] provider '{}' replaced", name);
                stop_provider_slot(old);
            }
        }
        Ok(())
    }

    /// Register consumers (several per name are allowed). Each gets the
    /// group's Set emitter injected and a Get is sent immediately so the
    /// owning provider syncs without waiting for its periodic cycle.
    ///
    /// # Errors
    ///
    /// Name validation, multicast join failures, [`Error::GroupClosed`].
    pub fn add_consumers(
        &self,
        consumers: impl IntoIterator<Item = Arc<dyn Consumer>>,
    ) -> Result<()> {
        for consumer in consumers {
            self.ensure_open()?;
            let name = consumer.name().to_string();
            check_register_name(&name)?;
            self.join_register_endpoint(&name)?;

            let set_target: Arc<Mutex<Option<SocketAddr>>> = Arc::new(Mutex::new(None));

            let weak = Arc::downgrade(&self.shared);
            let target = Arc::clone(&set_target);
            let register = name.clone();
            consumer.attach_set_listener(Box::new(move |encoded| {
                let Some(shared) = weak.upgrade() else {
                    return;
                };
                // No Sync observed yet: nowhere to send, drop.
                let Some(dest) = *recover_lock(&target, "consumer set target") else {
                    return;
                };
                let msg = Message::set(
                    shared.next_sequence(),
                    shared.name.as_str(),
                    register.as_str(),
                    encoded,
                );
                match msg.encode() {
                    Ok(payload) => {
                        let _ = shared.outbound.send(Outbound { payload, dest });
                    }
                    Err(e) => log::debug!("[group] set for '{}' not encodable: {}", register, e),
                }
            }));

            let slot = ConsumerSlot {
                handle: consumer,
                key: self.shared.next_key.fetch_add(1, Ordering::Relaxed),
                timer_generation: 0,
                set_target,
            };
            recover_lock(&self.shared.consumers, "group consumers")
                .entry(name.clone())
                .or_default()
                .push(slot);

            self.shared.emit_get(&name);
        }
        Ok(())
    }

    /// Install the observer invoked after every accepted Sync.
    pub fn on_sync(&self, observer: impl Fn(&Message) + Send + Sync + 'static) {
        *recover_lock(&self.shared.on_sync, "group on_sync") = Some(Box::new(observer));
    }

    /// Close the group: stop sync loops, the timer wheel, and all socket
    /// threads. Idempotent; a second call is a no-op.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        log::info!("[group] closing '{}'", self.shared.name);
        self.shared.shutdown.store(true, Ordering::Relaxed);

        // Provider sync loops first: they hold weak group references and
        // exit within one poll slice.
        let slots: Vec<ProviderSlot> = {
            let mut providers = recover_lock(&self.shared.providers, "group providers");
            providers.drain().map(|(_, slot)| slot).collect()
        };
        for slot in slots {
            stop_provider_slot(slot);
        }

        // Timer wheel: cancels all outstanding freshness timers.
        self.shared.wheel.shutdown();

        // Socket threads: readers and the writer observe the flag (or their
        // closed channels) and exit; Drop joins them.
        {
            let mut pipes = recover_lock(&self.pipes, "group pipes");
            pipes.listeners.clear();
            pipes.unicast = None;
        }

        if let Some(handle) = recover_lock(&self.dispatcher, "group dispatcher").take() {
            let _ = handle.join();
        }

        recover_lock(&self.shared.consumers, "group consumers").clear();
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::GroupClosed);
        }
        Ok(())
    }

    /// In per-register mode, join the register's multicast endpoint (once
    /// per derived port).
    fn join_register_endpoint(&self, register: &str) -> Result<()> {
        if self.shared.config.mode != JoinMode::PerRegister {
            return Ok(());
        }
        let port = ports::register_endpoint(&self.shared.name, register, self.shared.iface.index)
            .port();
        let mut pipes = recover_lock(&self.pipes, "group pipes");
        if pipes.listeners.contains_key(&port) {
            return Ok(());
        }
        let listener = MulticastListener::open(
            &self.shared.iface,
            port,
            self.shared.inbound_tx.clone(),
            Arc::clone(&self.shared.shutdown),
        )?;
        pipes.listeners.insert(port, listener);
        Ok(())
    }
}

impl Drop for RegisterGroup {
    fn drop(&mut self) {
        self.close();
    }
}

fn check_register_name(name: &str) -> Result<()> {
    if name.len() > MAX_NAME_LEN {
        return Err(Error::NameTooLong {
            what: "register name",
            len: name.len(),
        });
    }
    Ok(())
}

fn stop_provider_slot(mut slot: ProviderSlot) {
    slot.halt.store(true, Ordering::Relaxed);
    drop(slot.nudge);
    if let Some(thread) = slot.thread.take() {
        let _ = thread.join();
    }
}
