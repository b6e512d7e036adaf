// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Value coders for the four conventional register types.
//!
//! The wire carries opaque bytes; the `type` metadata key names the encoding:
//!
//! | type     | encoding                                   |
//! |----------|--------------------------------------------|
//! | `string` | UTF-8 bytes, identity                      |
//! | `int`    | i64 two's complement, big-endian, 8 bytes  |
//! | `bool`   | 1 byte; 0x00 = false, anything else = true |
//! | `float`  | IEEE-754 binary64, big-endian, 8 bytes     |
//!
//! Decoders reject payloads of the wrong length by returning `None`; callers
//! leave the previous value unchanged. [`Value`] is the dynamically typed
//! carrier used by the any-typed registers and the CLI.

use std::fmt;

/// Metadata value of the `type` key for string registers.
pub const TYPE_STRING: &str = "string";
/// Metadata value of the `type` key for int registers.
pub const TYPE_INT: &str = "int";
/// Metadata value of the `type` key for bool registers.
pub const TYPE_BOOL: &str = "bool";
/// Metadata value of the `type` key for float registers.
pub const TYPE_FLOAT: &str = "float";

// ============================================================================
// Primitive coders
// ============================================================================

/// Encode a string register value.
#[must_use]
pub fn encode_string(v: &str) -> Vec<u8> {
    v.as_bytes().to_vec()
}

/// Decode a string register value.
#[must_use]
pub fn decode_string(b: &[u8]) -> Option<String> {
    Some(String::from_utf8_lossy(b).into_owned())
}

/// Encode an int register value.
#[must_use]
pub fn encode_int(v: i64) -> Vec<u8> {
    v.to_be_bytes().to_vec()
}

/// Decode an int register value; rejects payloads that are not 8 bytes.
#[must_use]
pub fn decode_int(b: &[u8]) -> Option<i64> {
    Some(i64::from_be_bytes(b.try_into().ok()?))
}

/// Encode a bool register value as 0x00/0x01.
#[must_use]
pub fn encode_bool(v: bool) -> Vec<u8> {
    vec![u8::from(v)]
}

/// Decode a bool register value; rejects payloads that are not 1 byte.
#[must_use]
pub fn decode_bool(b: &[u8]) -> Option<bool> {
    match b {
        [byte] => Some(*byte != 0),
        _ => None,
    }
}

/// Encode a float register value.
#[must_use]
pub fn encode_float(v: f64) -> Vec<u8> {
    v.to_bits().to_be_bytes().to_vec()
}

/// Decode a float register value; rejects payloads that are not 8 bytes.
#[must_use]
pub fn decode_float(b: &[u8]) -> Option<f64> {
    Some(f64::from_bits(u64::from_be_bytes(b.try_into().ok()?)))
}

// ============================================================================
// Dynamically typed value
// ============================================================================

/// A register value whose concrete type is only known from metadata.
///
/// Backs the any-typed registers and the CLI, which learn a register's type
/// at runtime from the `type` metadata key.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `type=string`
    Str(String),
    /// `type=int`
    Int(i64),
    /// `type=bool`
    Bool(bool),
    /// `type=float`
    Float(f64),
}

impl Value {
    /// The `type` metadata name matching this variant.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => TYPE_STRING,
            Value::Int(_) => TYPE_INT,
            Value::Bool(_) => TYPE_BOOL,
            Value::Float(_) => TYPE_FLOAT,
        }
    }

    /// Parse a textual value for a register of the given type.
    ///
    /// Returns `None` for unknown types or unparseable text.
    #[must_use]
    pub fn parse(text: &str, type_name: &str) -> Option<Value> {
        match type_name {
            TYPE_STRING => Some(Value::Str(text.to_string())),
            TYPE_INT => text.parse().ok().map(Value::Int),
            TYPE_BOOL => text.parse().ok().map(Value::Bool),
            TYPE_FLOAT => text.parse().ok().map(Value::Float),
            _ => None,
        }
    }

    /// Encode for a register of the given type.
    ///
    /// Ints and floats coerce into each other so a CLI `set` with `42` works
    /// against a float register. Anything else must match the declared type.
    #[must_use]
    pub fn encode_as(&self, type_name: &str) -> Option<Vec<u8>> {
        match (type_name, self) {
            (TYPE_STRING, Value::Str(v)) => Some(encode_string(v)),
            (TYPE_INT, Value::Int(v)) => Some(encode_int(*v)),
            (TYPE_INT, Value::Float(v)) => Some(encode_int(*v as i64)),
            (TYPE_BOOL, Value::Bool(v)) => Some(encode_bool(*v)),
            (TYPE_FLOAT, Value::Float(v)) => Some(encode_float(*v)),
            (TYPE_FLOAT, Value::Int(v)) => Some(encode_float(*v as f64)),
            _ => None,
        }
    }

    /// Decode bytes for a register of the given type.
    #[must_use]
    pub fn decode(bytes: &[u8], type_name: &str) -> Option<Value> {
        match type_name {
            TYPE_STRING => decode_string(bytes).map(Value::Str),
            TYPE_INT => decode_int(bytes).map(Value::Int),
            TYPE_BOOL => decode_bool(bytes).map(Value::Bool),
            TYPE_FLOAT => decode_float(bytes).map(Value::Float),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(v) => v.fmt(f),
            Value::Int(v) => v.fmt(f),
            Value::Bool(v) => v.fmt(f),
            Value::Float(v) => v.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_coding() {
        // 64-bit big-endian 10.
        assert_eq!(encode_int(10), vec![0, 0, 0, 0, 0, 0, 0, 0x0A]);
        assert_eq!(decode_int(&encode_int(-3)), Some(-3));
        assert_eq!(decode_int(&[0; 4]), None);
        assert_eq!(decode_int(&[0; 9]), None);
    }

    #[test]
    fn test_bool_coding() {
        assert_eq!(encode_bool(false), vec![0x00]);
        assert_eq!(encode_bool(true), vec![0x01]);
        // Decoder accepts any non-zero byte as true.
        assert_eq!(decode_bool(&[0xFF]), Some(true));
        assert_eq!(decode_bool(&[0x00]), Some(false));
        assert_eq!(decode_bool(&[]), None);
        assert_eq!(decode_bool(&[1, 0]), None);
    }

    #[test]
    fn test_float_coding() {
        assert_eq!(decode_float(&encode_float(21.5)), Some(21.5));
        assert_eq!(decode_float(&encode_float(f64::NEG_INFINITY)), Some(f64::NEG_INFINITY));
        assert_eq!(decode_float(&[0; 7]), None);
    }

    #[test]
    fn test_string_coding() {
        assert_eq!(encode_string("topol"), b"topol".to_vec());
        assert_eq!(decode_string(b""), Some(String::new()));
    }

    #[test]
    fn test_value_parse() {
        assert_eq!(Value::parse("42", TYPE_INT), Some(Value::Int(42)));
        assert_eq!(Value::parse("true", TYPE_BOOL), Some(Value::Bool(true)));
        assert_eq!(Value::parse("3.5", TYPE_FLOAT), Some(Value::Float(3.5)));
        assert_eq!(
            Value::parse("hello", TYPE_STRING),
            Some(Value::Str("hello".to_string()))
        );
        assert_eq!(Value::parse("x", TYPE_INT), None);
        assert_eq!(Value::parse("1", "blob"), None);
    }

    #[test]
    fn test_value_encode_decode_dispatch() {
        let encoded = Value::Int(42).encode_as(TYPE_INT).expect("encode");
        assert_eq!(Value::decode(&encoded, TYPE_INT), Some(Value::Int(42)));

        // Numeric coercion both ways.
        assert_eq!(
            Value::Int(2).encode_as(TYPE_FLOAT),
            Some(encode_float(2.0))
        );
        assert_eq!(Value::Float(7.0).encode_as(TYPE_INT), Some(encode_int(7)));

        // Type mismatch and unknown type are swallowed.
        assert_eq!(Value::Bool(true).encode_as(TYPE_INT), None);
        assert_eq!(Value::Int(1).encode_as("blob"), None);
        assert_eq!(Value::decode(&[1], "blob"), None);
    }
}
