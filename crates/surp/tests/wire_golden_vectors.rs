// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Byte-exact wire vectors for the SURP framing.
//!
//! Interoperability rests on every implementation producing these bytes
//! bit-for-bit; the vectors below pin the framing so codec refactors cannot
//! drift silently.

use std::collections::HashMap;
use surp::protocol::value::{encode_bool, encode_float, encode_int, encode_string};
use surp::protocol::Message;
use surp::transport::ports;
use surp::Optional;

#[test]
fn golden_get_message() {
    let msg = Message::get(0x0102, "plant", "r2");
    let encoded = msg.encode().expect("encode");
    assert_eq!(
        encoded,
        [
            b'S', b'U', b'R', b'P', // magic
            0x03, // Get
            0x01, 0x02, // sequence
            5, b'p', b'l', b'a', b'n', b't', // group
            2, b'r', b'2', // name
        ]
    );
}

#[test]
fn golden_set_message_with_int_value() {
    // 64-bit big-endian encoding of 10 per the advertise-observe scenario.
    let msg = Message::set(1, "plant", "r2", Optional::Defined(encode_int(10)));
    let encoded = msg.encode().expect("encode");
    assert_eq!(
        encoded,
        [
            b'S', b'U', b'R', b'P',
            0x02, // Set
            0x00, 0x01, // sequence
            5, b'p', b'l', b'a', b'n', b't',
            2, b'r', b'2',
            0x00, 0x08, // value length
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0A, // value
        ]
    );
}

#[test]
fn golden_sync_message_with_undefined_value() {
    let mut metadata = HashMap::new();
    metadata.insert("type".to_string(), "int".to_string());

    let msg = Message::sync(0xFFFF, "g", "r", Optional::Undefined, metadata);
    let encoded = msg.encode().expect("encode");
    assert_eq!(
        encoded,
        [
            b'S', b'U', b'R', b'P',
            0x01, // Sync
            0xFF, 0xFF, // sequence (wrap value is legal)
            1, b'g',
            1, b'r',
            0xFF, 0xFF, // undefined value sentinel, no payload
            1, // one metadata entry
            4, b't', b'y', b'p', b'e', 3, b'i', b'n', b't',
        ]
    );
}

#[test]
fn golden_sync_message_empty_metadata() {
    let msg = Message::sync(0, "g", "r", Optional::Defined(vec![]), HashMap::new());
    let encoded = msg.encode().expect("encode");
    assert_eq!(
        encoded,
        [
            b'S', b'U', b'R', b'P',
            0x01,
            0x00, 0x00,
            1, b'g',
            1, b'r',
            0x00, 0x00, // empty value: length 0, distinct from undefined
            0, // no metadata
        ]
    );
}

#[test]
fn golden_primitive_encodings() {
    assert_eq!(encode_int(10), [0, 0, 0, 0, 0, 0, 0, 0x0A]);
    assert_eq!(encode_int(-1), [0xFF; 8]);
    assert_eq!(encode_bool(true), [0x01]);
    assert_eq!(encode_bool(false), [0x00]);
    // IEEE-754 binary64 big-endian of 1.5.
    assert_eq!(encode_float(1.5), [0x3F, 0xF8, 0, 0, 0, 0, 0, 0]);
    assert_eq!(encode_string("ab"), [0x61, 0x62]);
}

#[test]
fn golden_port_derivation() {
    // CRC16-CCITT ("123456789") = 0x29B1; port = 1024 + (0x29B1 & 0xBBFF).
    assert_eq!(ports::crc16("123456789"), 0x29B1);
    assert_eq!(ports::port_for_name("123456789"), 1024 + 0x29B1);
    assert_eq!(ports::port_for_name(""), 1024 + 0xBBFF);
}

#[test]
fn roundtrip_all_kinds() {
    let mut metadata = HashMap::new();
    metadata.insert("type".to_string(), "float".to_string());
    metadata.insert("rw".to_string(), "false".to_string());
    metadata.insert("unit".to_string(), "degC".to_string());

    let messages = [
        Message::sync(1, "plant", "temp", Optional::Defined(encode_float(21.5)), metadata),
        Message::sync(2, "plant", "temp", Optional::Undefined, HashMap::new()),
        Message::set(3, "plant", "temp", Optional::Defined(vec![])),
        Message::set(4, "plant", "temp", Optional::Undefined),
        Message::get(5, "plant", "temp"),
    ];

    for msg in messages {
        let decoded = Message::decode(&msg.encode().expect("encode")).expect("decode");
        assert_eq!(decoded, msg);
    }
}
