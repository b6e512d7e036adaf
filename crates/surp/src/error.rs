// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Errors returned by SURP public operations.
//!
//! Only initialization can fail loudly: interface resolution, socket setup,
//! multicast joins. Malformed datagrams and transient I/O problems never
//! surface here - they are dropped (optionally logged) per protocol policy.

use std::fmt;

/// Errors returned by group and transport operations.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Initialization
    // ========================================================================
    /// The named network interface does not exist.
    InterfaceNotFound(String),
    /// The interface exists but carries no usable IPv6 address.
    NoIpv6Address(String),
    /// A group, register, or metadata name exceeds the wire limit of 255
    /// bytes.
    NameTooLong { what: &'static str, len: usize },
    /// Failed to bind a socket to an address.
    BindFailed(String),
    /// Failed to join a multicast group on the interface.
    MulticastJoinFailed(String),

    // ========================================================================
    // Runtime
    // ========================================================================
    /// The group has been closed; no further operations are accepted.
    GroupClosed,
    /// I/O error with underlying cause.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InterfaceNotFound(name) => write!(f, "Interface not found: {}", name),
            Error::NoIpv6Address(name) => {
                write!(f, "Interface {} has no usable IPv6 address", name)
            }
            Error::NameTooLong { what, len } => {
                write!(f, "{} too long: {} bytes (max 255)", what, len)
            }
            Error::BindFailed(msg) => write!(f, "Bind failed: {}", msg),
            Error::MulticastJoinFailed(msg) => write!(f, "Multicast join failed: {}", msg),
            Error::GroupClosed => write!(f, "Register group is closed"),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// Convenient alias for API results using the public `Error` type.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let e = Error::InterfaceNotFound("eth7".to_string());
        assert_eq!(e.to_string(), "Interface not found: eth7");

        let e = Error::NameTooLong {
            what: "register name",
            len: 300,
        };
        assert!(e.to_string().contains("300"));
    }

    #[test]
    fn test_io_source() {
        use std::error::Error as _;
        let e = Error::from(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert!(e.source().is_some());
    }
}
