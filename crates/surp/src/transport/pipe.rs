// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! UDP sockets and the datagram threads around them.
//!
//! Two socket roles per group:
//!
//! - one multicast listener per joined multicast endpoint (SO_REUSEADDR so
//!   several processes can share a port, IPV6_MULTICAST_LOOP so a node sees
//!   traffic from co-located groups),
//! - one ephemeral-port unicast socket that emits *all* outbound datagrams
//!   (multicast destinations included) and receives unicast Set traffic.
//!
//! Each socket gets a dedicated reader thread feeding the inbound channel
//! with `(payload, source)` pairs; a single writer thread drains the bounded
//! outbound channel. Reads use a short timeout so threads can observe the
//! shutdown flag; writer and readers also exit when their channel closes.

use crate::config::{MAX_DATAGRAM_SIZE, MULTICAST_ADDR, SHUTDOWN_POLL};
use crate::error::{Error, Result};
use crate::transport::netif::NetInterface;
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, SocketAddrV6, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// An inbound datagram with its source address.
#[derive(Debug, Clone)]
pub struct Datagram {
    /// Raw payload, at most [`MAX_DATAGRAM_SIZE`] bytes.
    pub payload: Vec<u8>,
    /// Sender address (used to target later unicast Sets).
    pub source: SocketAddr,
}

/// An outbound datagram with its destination.
#[derive(Debug, Clone)]
pub struct Outbound {
    /// Encoded message.
    pub payload: Vec<u8>,
    /// Destination, unicast or multicast.
    pub dest: SocketAddr,
}

// ============================================================================
// Socket construction
// ============================================================================

fn new_udp6_socket() -> Result<Socket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_only_v6(true)?;
    Ok(socket)
}

/// Multicast listener socket: reuse-address bind on the endpoint port, joined
/// to the SURP multicast address on the given interface, loopback enabled.
fn open_multicast_socket(iface: &NetInterface, port: u16) -> Result<UdpSocket> {
    let socket = new_udp6_socket()?;
    socket.set_reuse_address(true)?;

    let bind_addr = SocketAddrV6::new(std::net::Ipv6Addr::UNSPECIFIED, port, 0, 0);
    socket
        .bind(&SocketAddr::V6(bind_addr).into())
        .map_err(|e| Error::BindFailed(format!("[::]:{}: {}", port, e)))?;

    socket
        .join_multicast_v6(&MULTICAST_ADDR, iface.index)
        .map_err(|e| {
            Error::MulticastJoinFailed(format!(
                "{} port {} on {}: {}",
                MULTICAST_ADDR, port, iface.name, e
            ))
        })?;
    socket.set_multicast_loop_v6(true)?;

    let socket: UdpSocket = socket.into();
    socket.set_read_timeout(Some(SHUTDOWN_POLL))?;
    Ok(socket)
}

/// Unicast socket: ephemeral port on the interface address. Also the sending
/// socket for multicast, so loopback and the outgoing interface are set here.
fn open_unicast_socket(iface: &NetInterface) -> Result<UdpSocket> {
    let socket = new_udp6_socket()?;

    let bind_addr = SocketAddrV6::new(iface.addr, 0, 0, iface.bind_scope());
    socket
        .bind(&SocketAddr::V6(bind_addr).into())
        .map_err(|e| Error::BindFailed(format!("{}: {}", bind_addr, e)))?;

    socket.set_multicast_if_v6(iface.index)?;
    socket.set_multicast_loop_v6(true)?;
    // Link-local scope; never routed further anyway.
    socket.set_multicast_hops_v6(1)?;

    let socket: UdpSocket = socket.into();
    socket.set_read_timeout(Some(SHUTDOWN_POLL))?;
    Ok(socket)
}

// ============================================================================
// Reader loop
// ============================================================================

/// Blocking read loop with flag-checked timeouts.
///
/// Exits when the shutdown flag is set, the inbound channel is closed, or the
/// socket reports a fatal error. A fatal error raises the shutdown flag so
/// the rest of the group winds down instead of running half-deaf. Oversized
/// datagrams are dropped.
fn read_loop(socket: &UdpSocket, inbound: &Sender<Datagram>, shutdown: &AtomicBool, label: &str) {
    // One spare byte to tell an exact-fit datagram from a truncated one.
    let mut buf = [0u8; MAX_DATAGRAM_SIZE + 1];

    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        match socket.recv_from(&mut buf) {
            Ok((len, source)) => {
                if len > MAX_DATAGRAM_SIZE {
                    log::debug!("[pipe] {} dropping oversized datagram from {}", label, source);
                    continue;
                }
                let datagram = Datagram {
                    payload: buf[..len].to_vec(),
                    source,
                };
                if inbound.send(datagram).is_err() {
                    break;
                }
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                continue;
            }
            Err(e) => {
                log::debug!("[pipe] {} read error, shutting down: {}", label, e);
                shutdown.store(true, Ordering::Relaxed);
                break;
            }
        }
    }
}

// ============================================================================
// Multicast listener
// ============================================================================

/// A joined multicast endpoint with its reader thread.
pub(crate) struct MulticastListener {
    handle: Option<JoinHandle<()>>,
}

impl MulticastListener {
    /// Bind, join, and start reading into `inbound`.
    pub(crate) fn open(
        iface: &NetInterface,
        port: u16,
        inbound: Sender<Datagram>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self> {
        let socket = open_multicast_socket(iface, port)?;
        log::debug!(
            "[pipe] multicast listener on [{}]:{} iface={}",
            MULTICAST_ADDR,
            port,
            iface.name
        );

        let label = format!("multicast:{}", port);
        let handle = thread::spawn(move || read_loop(&socket, &inbound, &shutdown, &label));

        Ok(MulticastListener {
            handle: Some(handle),
        })
    }
}

impl Drop for MulticastListener {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

// ============================================================================
// Unicast pipe
// ============================================================================

/// The group's unicast socket with its reader and writer threads.
pub(crate) struct UnicastPipe {
    local_port: u16,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl UnicastPipe {
    /// Bind to an ephemeral port on the interface and start both threads.
    pub(crate) fn open(
        iface: &NetInterface,
        inbound: Sender<Datagram>,
        outbound: Receiver<Outbound>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self> {
        let socket = open_unicast_socket(iface)?;
        let local_port = socket.local_addr()?.port();
        log::debug!(
            "[pipe] unicast socket on {} (iface={})",
            socket.local_addr()?,
            iface.name
        );

        let reader_socket = socket.try_clone()?;
        let reader_shutdown = Arc::clone(&shutdown);
        let reader = thread::spawn(move || {
            read_loop(&reader_socket, &inbound, &reader_shutdown, "unicast");
        });

        let writer = thread::spawn(move || write_loop(&socket, &outbound, &shutdown));

        Ok(UnicastPipe {
            local_port,
            reader: Some(reader),
            writer: Some(writer),
        })
    }

    /// Local ephemeral port; remote nodes learn it from the source address of
    /// our multicast sends and target it with unicast Sets.
    pub(crate) fn local_port(&self) -> u16 {
        self.local_port
    }
}

/// Drain the outbound channel onto the socket. Send failures are logged and
/// skipped: the protocol is best-effort and a lost datagram is benign.
fn write_loop(socket: &UdpSocket, outbound: &Receiver<Outbound>, shutdown: &AtomicBool) {
    loop {
        match outbound.recv_timeout(SHUTDOWN_POLL) {
            Ok(out) => {
                if let Err(e) = socket.send_to(&out.payload, out.dest) {
                    log::debug!("[pipe] send to {} failed: {}", out.dest, e);
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

impl Drop for UnicastPipe {
    fn drop(&mut self) {
        for handle in [self.reader.take(), self.writer.take()].into_iter().flatten() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel;
    use std::time::Duration;

    fn loopback() -> NetInterface {
        NetInterface::resolve("lo").expect("loopback interface should resolve")
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_unicast_pipe_roundtrip() {
        let iface = loopback();
        let shutdown = Arc::new(AtomicBool::new(false));
        let (inbound_tx, inbound_rx) = channel::bounded(8);
        let (outbound_tx, outbound_rx) = channel::bounded(8);

        let pipe = UnicastPipe::open(&iface, inbound_tx, outbound_rx, Arc::clone(&shutdown))
            .expect("unicast pipe should open");
        assert!(pipe.local_port() > 0);

        // Loop a datagram back to our own port.
        let dest = SocketAddr::V6(SocketAddrV6::new(iface.addr, pipe.local_port(), 0, 0));
        outbound_tx
            .send(Outbound {
                payload: b"ping".to_vec(),
                dest,
            })
            .expect("outbound channel should accept");

        let datagram = inbound_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("datagram should loop back");
        assert_eq!(datagram.payload, b"ping");

        shutdown.store(true, Ordering::Relaxed);
        drop(outbound_tx);
        drop(pipe);
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_multicast_listener_opens_and_closes() {
        let iface = loopback();
        let shutdown = Arc::new(AtomicBool::new(false));
        let (inbound_tx, _inbound_rx) = channel::bounded(8);

        let listener =
            MulticastListener::open(&iface, 21521, inbound_tx, Arc::clone(&shutdown))
                .expect("listener should open");

        shutdown.store(true, Ordering::Relaxed);
        drop(listener); // Drop joins the reader within the poll interval.
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_two_listeners_share_port() {
        let iface = loopback();
        let shutdown = Arc::new(AtomicBool::new(false));
        let (tx1, _rx1) = channel::bounded(8);
        let (tx2, _rx2) = channel::bounded(8);

        let a = MulticastListener::open(&iface, 21522, tx1, Arc::clone(&shutdown))
            .expect("first listener");
        let b = MulticastListener::open(&iface, 21522, tx2, Arc::clone(&shutdown))
            .expect("second listener (SO_REUSEADDR)");

        shutdown.store(true, Ordering::Relaxed);
        drop(a);
        drop(b);
    }
}
