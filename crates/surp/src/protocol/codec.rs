// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bounds-checked binary encode/decode for the SURP framing.
//!
//! Big-endian integers, u8-length-prefixed strings, i16-length-prefixed value
//! with 0xFFFF as the undefined sentinel.

use super::{Message, MessageKind, WireError, MAGIC, MAX_NAME_LEN, UNDEFINED_LEN};
use crate::optional::Optional;
use std::collections::HashMap;

// ============================================================================
// Read cursor
// ============================================================================

/// Read cursor over a received datagram. Every read is bounds-checked and
/// reports the failing offset.
struct Reader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, offset: 0 }
    }

    fn read_u8(&mut self) -> Result<u8, WireError> {
        let byte = *self
            .buf
            .get(self.offset)
            .ok_or(WireError::Truncated { offset: self.offset })?;
        self.offset += 1;
        Ok(byte)
    }

    fn read_u16_be(&mut self) -> Result<u16, WireError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or(WireError::Truncated { offset: self.offset })?;
        let slice = &self.buf[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    /// u8 length prefix followed by that many UTF-8 bytes. Invalid UTF-8 is
    /// replaced rather than rejected; names are compared as strings only.
    fn read_short_string(&mut self) -> Result<String, WireError> {
        let len = self.read_u8()? as usize;
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// i16 length prefix; -1 is the undefined sentinel, any other negative is
    /// malformed.
    fn read_value(&mut self) -> Result<Optional<Vec<u8>>, WireError> {
        let len = self.read_u16_be()? as i16;
        if len == UNDEFINED_LEN {
            return Ok(Optional::Undefined);
        }
        if len < 0 {
            return Err(WireError::BadValueLength(len));
        }
        Ok(Optional::Defined(self.read_bytes(len as usize)?.to_vec()))
    }
}

// ============================================================================
// Encode
// ============================================================================

fn write_short_string(buf: &mut Vec<u8>, s: &str, what: &'static str) -> Result<(), WireError> {
    if s.len() > MAX_NAME_LEN {
        return Err(WireError::FieldTooLong { what, len: s.len() });
    }
    buf.push(s.len() as u8);
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

fn write_value(buf: &mut Vec<u8>, value: &Optional<Vec<u8>>) -> Result<(), WireError> {
    match value {
        Optional::Undefined => buf.extend_from_slice(&(UNDEFINED_LEN as u16).to_be_bytes()),
        Optional::Defined(data) => {
            if data.len() > i16::MAX as usize {
                return Err(WireError::FieldTooLong {
                    what: "value",
                    len: data.len(),
                });
            }
            buf.extend_from_slice(&(data.len() as u16).to_be_bytes());
            buf.extend_from_slice(data);
        }
    }
    Ok(())
}

pub(super) fn encode(msg: &Message) -> Result<Vec<u8>, WireError> {
    let mut buf = Vec::with_capacity(64);

    buf.extend_from_slice(&MAGIC);
    buf.push(msg.kind.as_byte());
    buf.extend_from_slice(&msg.sequence.to_be_bytes());
    write_short_string(&mut buf, &msg.group, "group name")?;
    write_short_string(&mut buf, &msg.name, "register name")?;

    if msg.kind == MessageKind::Get {
        return Ok(buf);
    }

    write_value(&mut buf, &msg.value)?;

    if msg.kind == MessageKind::Sync {
        if msg.metadata.len() > MAX_NAME_LEN {
            return Err(WireError::FieldTooLong {
                what: "metadata",
                len: msg.metadata.len(),
            });
        }
        buf.push(msg.metadata.len() as u8);
        for (key, val) in &msg.metadata {
            write_short_string(&mut buf, key, "metadata key")?;
            write_short_string(&mut buf, val, "metadata value")?;
        }
    }

    Ok(buf)
}

// ============================================================================
// Decode
// ============================================================================

pub(super) fn decode(data: &[u8]) -> Result<Message, WireError> {
    let mut reader = Reader::new(data);

    if reader.read_bytes(MAGIC.len()).map_err(|_| WireError::BadMagic)? != MAGIC.as_slice() {
        return Err(WireError::BadMagic);
    }

    let type_byte = reader.read_u8()?;
    let kind = MessageKind::from_byte(type_byte).ok_or(WireError::UnknownType(type_byte))?;

    let sequence = reader.read_u16_be()?;
    let group = reader.read_short_string()?;
    let name = reader.read_short_string()?;

    let value = if kind == MessageKind::Get {
        Optional::Undefined
    } else {
        reader.read_value()?
    };

    let mut metadata = HashMap::new();
    if kind == MessageKind::Sync {
        let count = reader.read_u8()?;
        metadata.reserve(count as usize);
        for _ in 0..count {
            let key = reader.read_short_string()?;
            let val = reader.read_short_string()?;
            metadata.insert(key, val);
        }
    }

    Ok(Message {
        kind,
        sequence,
        group,
        name,
        value,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_sync_roundtrip() {
        let msg = Message::sync(
            7,
            "plant",
            "boiler.temp",
            Optional::Defined(vec![0x01, 0x02]),
            meta(&[("type", "int"), ("rw", "true"), ("unit", "degC")]),
        );
        let encoded = msg.encode().expect("encode should succeed");
        let decoded = Message::decode(&encoded).expect("decode should succeed");
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_sync_roundtrip_undefined_value() {
        let msg = Message::sync(0, "g", "r", Optional::Undefined, HashMap::new());
        let decoded = Message::decode(&msg.encode().expect("encode")).expect("decode");
        assert_eq!(decoded, msg);
        assert!(decoded.value.is_undefined());
    }

    #[test]
    fn test_sync_empty_value_distinct_from_undefined() {
        let msg = Message::sync(1, "g", "r", Optional::Defined(vec![]), HashMap::new());
        let decoded = Message::decode(&msg.encode().expect("encode")).expect("decode");
        assert_eq!(decoded.value, Optional::Defined(vec![]));
    }

    #[test]
    fn test_set_roundtrip() {
        let msg = Message::set(0xFFFF, "g", "r", Optional::Defined(vec![0xAA; 32]));
        let decoded = Message::decode(&msg.encode().expect("encode")).expect("decode");
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_get_roundtrip() {
        let msg = Message::get(3, "building/7", "door");
        let encoded = msg.encode().expect("encode");
        // Get carries neither value nor metadata.
        assert_eq!(encoded.len(), 4 + 1 + 2 + 1 + "building/7".len() + 1 + 4);
        let decoded = Message::decode(&encoded).expect("decode");
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_empty_names_roundtrip() {
        let msg = Message::sync(0, "", "", Optional::Defined(vec![]), HashMap::new());
        let decoded = Message::decode(&msg.encode().expect("encode")).expect("decode");
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_undefined_value_wire_sentinel() {
        let msg = Message::set(0, "g", "r", Optional::Undefined);
        let encoded = msg.encode().expect("encode");
        // ... group "g", name "r", then 0xFFFF and nothing after.
        assert_eq!(&encoded[encoded.len() - 2..], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_bad_magic_rejected() {
        assert_eq!(Message::decode(b"SURQ\x01\x00\x00"), Err(WireError::BadMagic));
        assert_eq!(Message::decode(b"SU"), Err(WireError::BadMagic));
        assert_eq!(Message::decode(b""), Err(WireError::BadMagic));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let mut data = Vec::new();
        data.extend_from_slice(b"SURP");
        data.push(0x7F);
        data.extend_from_slice(&[0, 1, 0, 0]);
        assert_eq!(Message::decode(&data), Err(WireError::UnknownType(0x7F)));
    }

    #[test]
    fn test_truncated_at_every_step() {
        let full = Message::sync(
            9,
            "grp",
            "reg",
            Optional::Defined(vec![1, 2, 3]),
            meta(&[("type", "int")]),
        )
        .encode()
        .expect("encode");

        // Any strict prefix must fail to decode, never panic.
        for len in 0..full.len() {
            assert!(
                Message::decode(&full[..len]).is_err(),
                "prefix of {} bytes decoded unexpectedly",
                len
            );
        }
        assert!(Message::decode(&full).is_ok());
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut encoded = Message::get(1, "g", "r").encode().expect("encode");
        encoded.extend_from_slice(&[0xDE, 0xAD]);
        assert!(Message::decode(&encoded).is_ok());
    }

    #[test]
    fn test_bad_negative_value_length() {
        let mut data = Vec::new();
        data.extend_from_slice(b"SURP\x02");
        data.extend_from_slice(&[0, 0]); // seq
        data.push(1);
        data.push(b'g');
        data.push(1);
        data.push(b'r');
        data.extend_from_slice(&0xFFFEu16.to_be_bytes()); // -2: not a valid length
        assert_eq!(Message::decode(&data), Err(WireError::BadValueLength(-2)));
    }

    #[test]
    fn test_oversized_name_rejected_on_encode() {
        let msg = Message::get(0, "g".repeat(256), "r");
        assert!(matches!(
            msg.encode(),
            Err(WireError::FieldTooLong { what: "group name", .. })
        ));
    }
}
