// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Network interface resolution.
//!
//! SURP binds to one named interface. The multicast joins need the interface
//! index; the unicast socket needs one of the interface's IPv6 addresses.

use crate::error::{Error, Result};
use std::net::{IpAddr, Ipv6Addr};

/// A resolved network interface: name, OS index, and the IPv6 address used
/// for the unicast socket.
#[derive(Debug, Clone)]
pub struct NetInterface {
    /// Interface name as given (e.g. `eth0`, `wlan0`, `lo`).
    pub name: String,
    /// OS interface index, used as the scope id for link-local addressing.
    pub index: u32,
    /// First IPv6 address of the interface.
    pub addr: Ipv6Addr,
}

impl NetInterface {
    /// Resolve an interface by name.
    ///
    /// # Errors
    ///
    /// [`Error::InterfaceNotFound`] if the OS does not know the name,
    /// [`Error::NoIpv6Address`] if the interface carries no IPv6 address.
    pub fn resolve(name: &str) -> Result<Self> {
        let index = if_index(name).ok_or_else(|| Error::InterfaceNotFound(name.to_string()))?;
        let addr = first_ipv6(name).ok_or_else(|| Error::NoIpv6Address(name.to_string()))?;

        log::debug!("[netif] resolved {} index={} addr={}", name, index, addr);

        Ok(NetInterface {
            name: name.to_string(),
            index,
            addr,
        })
    }

    /// Scope id to use when binding `addr`: link-local addresses need the
    /// interface index, global and loopback addresses do not.
    #[must_use]
    pub fn bind_scope(&self) -> u32 {
        if self.addr.is_unicast_link_local() {
            self.index
        } else {
            0
        }
    }
}

/// Interface name to OS index.
#[cfg(unix)]
fn if_index(name: &str) -> Option<u32> {
    let cname = std::ffi::CString::new(name).ok()?;
    // SAFETY: if_nametoindex reads a valid NUL-terminated string and returns
    // 0 on failure without touching other memory.
    let index = unsafe { libc::if_nametoindex(cname.as_ptr()) };
    (index != 0).then_some(index)
}

#[cfg(not(unix))]
fn if_index(_name: &str) -> Option<u32> {
    None
}

/// First IPv6 address configured on the named interface.
fn first_ipv6(name: &str) -> Option<Ipv6Addr> {
    let interfaces = match local_ip_address::list_afinet_netifas() {
        Ok(list) => list,
        Err(err) => {
            log::debug!("[netif] failed to list interfaces: {}", err);
            return None;
        }
    };

    interfaces.into_iter().find_map(|(ifname, ip)| match ip {
        IpAddr::V6(v6) if ifname == name => Some(v6),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_interface() {
        let err = NetInterface::resolve("no-such-if0").expect_err("must not resolve");
        assert!(matches!(err, Error::InterfaceNotFound(_)));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_loopback_resolves() {
        let lo = NetInterface::resolve("lo").expect("loopback should resolve");
        assert!(lo.index > 0);
        assert_eq!(lo.addr, Ipv6Addr::LOCALHOST);
        assert_eq!(lo.bind_scope(), 0);
    }
}
