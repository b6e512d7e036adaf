// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SURP wire protocol: message model and binary codec.
//!
//! One message shape covers the three operations:
//!
//! ```text
//! MAGIC    : "SURP"             (4 bytes)
//! TYPE     : u8                 (0x01 Sync, 0x02 Set, 0x03 Get)
//! SEQ      : u16 big-endian
//! GROUP    : u8 length + bytes  (<= 255)
//! NAME     : u8 length + bytes  (<= 255)
//! --- Sync and Set continue: ---
//! VALUE    : i16 big-endian length; 0xFFFF = undefined (no payload)
//! --- Sync only continues: ---
//! META_CNT : u8
//! { KEY: u8 len + bytes; VAL: u8 len + bytes } x META_CNT
//! ```
//!
//! Decoding is strictly length-checked at every step. A failed decode is a
//! [`WireError`]; the dispatcher's policy for inbound traffic is drop-and-
//! continue.

mod codec;
/// Primitive value coders and the dynamically typed [`Value`].
pub mod value;

pub use value::Value;

use crate::optional::Optional;
use std::collections::HashMap;
use std::fmt;

/// Leading magic of every SURP datagram.
pub const MAGIC: [u8; 4] = *b"SURP";

/// Value-length sentinel for the undefined state (-1 as i16).
pub(crate) const UNDEFINED_LEN: i16 = -1;

/// Upper bound for group names, register names, metadata keys/values and the
/// metadata entry count.
pub const MAX_NAME_LEN: usize = 255;

// ============================================================================
// Message model
// ============================================================================

/// SURP operation carried by a datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    /// Broadcast of a provider's current value and metadata.
    Sync = 0x01,
    /// Unicast request that a provider update its value.
    Set = 0x02,
    /// Multicast request that owners of a register emit a Sync immediately.
    Get = 0x03,
}

impl MessageKind {
    /// Wire byte for this kind.
    #[must_use]
    #[inline]
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Parse a wire byte; unknown bytes are a decode failure.
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(MessageKind::Sync),
            0x02 => Some(MessageKind::Set),
            0x03 => Some(MessageKind::Get),
            _ => None,
        }
    }
}

/// A decoded SURP message.
///
/// `value` is meaningful for Sync and Set; `metadata` only for Sync. The
/// codec ignores both for kinds that do not carry them, so `decode(encode(m))
/// == m` holds for every well-formed message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Operation.
    pub kind: MessageKind,
    /// Per-group monotonically increasing counter (informational only).
    pub sequence: u16,
    /// Group name the message belongs to.
    pub group: String,
    /// Register name.
    pub name: String,
    /// Encoded register value; `Undefined` is the protocol null.
    pub value: Optional<Vec<u8>>,
    /// Register metadata (Sync only on the wire).
    pub metadata: HashMap<String, String>,
}

impl Message {
    /// Build a Sync message.
    #[must_use]
    pub fn sync(
        sequence: u16,
        group: impl Into<String>,
        name: impl Into<String>,
        value: Optional<Vec<u8>>,
        metadata: HashMap<String, String>,
    ) -> Self {
        Message {
            kind: MessageKind::Sync,
            sequence,
            group: group.into(),
            name: name.into(),
            value,
            metadata,
        }
    }

    /// Build a Set message.
    #[must_use]
    pub fn set(
        sequence: u16,
        group: impl Into<String>,
        name: impl Into<String>,
        value: Optional<Vec<u8>>,
    ) -> Self {
        Message {
            kind: MessageKind::Set,
            sequence,
            group: group.into(),
            name: name.into(),
            value,
            metadata: HashMap::new(),
        }
    }

    /// Build a Get message (no value, no metadata).
    #[must_use]
    pub fn get(sequence: u16, group: impl Into<String>, name: impl Into<String>) -> Self {
        Message {
            kind: MessageKind::Get,
            sequence,
            group: group.into(),
            name: name.into(),
            value: Optional::Undefined,
            metadata: HashMap::new(),
        }
    }

    /// Encode into a wire datagram.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a name, metadata entry, or the value exceeds its wire
    /// length field.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        codec::encode(self)
    }

    /// Decode a wire datagram.
    ///
    /// Bytes after a complete message are ignored; every length check inside
    /// the message is strict.
    ///
    /// # Errors
    ///
    /// Returns `Err` on bad magic, unknown type byte, or any short read.
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        codec::decode(data)
    }
}

// ============================================================================
// Codec errors
// ============================================================================

/// Wire codec failure.
///
/// Inbound failures are dropped silently by the dispatcher; outbound failures
/// surface to the caller that supplied the oversized field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Datagram does not start with the `SURP` magic.
    BadMagic,
    /// Unknown message type byte.
    UnknownType(u8),
    /// Short read at the given offset.
    Truncated { offset: usize },
    /// Negative value length other than the undefined sentinel.
    BadValueLength(i16),
    /// A field exceeds its wire length field on encode.
    FieldTooLong { what: &'static str, len: usize },
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::BadMagic => write!(f, "missing SURP magic"),
            WireError::UnknownType(b) => write!(f, "unknown message type {:#04x}", b),
            WireError::Truncated { offset } => write!(f, "truncated at offset {}", offset),
            WireError::BadValueLength(len) => write!(f, "bad value length {}", len),
            WireError::FieldTooLong { what, len } => {
                write!(f, "{} too long for wire: {} bytes", what, len)
            }
        }
    }
}

impl std::error::Error for WireError {}
