// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Provider-side register: a typed value wrapper that owns the authoritative
//! state and reacts to inbound Sets.
//!
//! The usual wiring is cyclic but bounded: an inbound Set decodes into the
//! user's set callback, which typically echoes the accepted value back via
//! [`Register::sync_value`], which nudges the group's sync loop into
//! emitting one Sync. Keep the arrows one-way: `sync_value` must not call
//! the set callback.

use crate::optional::Optional;
use crate::protocol::value::{
    decode_bool, decode_float, decode_int, decode_string, encode_bool, encode_float, encode_int,
    encode_string, Value, TYPE_BOOL, TYPE_FLOAT, TYPE_INT, TYPE_STRING,
};
use crate::register::{
    recover_lock, Decoder, Encoder, Metadata, Provider, SyncListener, META_RW, META_TYPE,
};
use std::sync::{Arc, Mutex};

/// User callback invoked with the decoded payload of an accepted Set.
pub type SetCallback<T> = Box<dyn Fn(Optional<T>) + Send + Sync>;

/// A typed provider register.
///
/// Construct through the typed helpers ([`Register::string`],
/// [`Register::int`], [`Register::bool`], [`Register::float`],
/// [`Register::any`]) and hand the `Arc` to
/// [`RegisterGroup::add_providers`](crate::group::RegisterGroup::add_providers).
pub struct Register<T> {
    name: String,
    rw: bool,
    metadata: Metadata,
    encoder: Encoder<T>,
    decoder: Decoder<T>,
    value: Mutex<Optional<T>>,
    sync_listener: Mutex<Option<SyncListener>>,
    set_callback: Option<SetCallback<T>>,
}

impl<T: Clone + Send + Sync + 'static> Register<T> {
    /// Generic constructor; the typed helpers fill in coders and type name.
    pub fn new(
        name: impl Into<String>,
        initial: Optional<T>,
        encoder: Encoder<T>,
        decoder: Decoder<T>,
        type_name: &str,
        rw: bool,
        metadata: Option<Metadata>,
        set_callback: Option<SetCallback<T>>,
    ) -> Arc<Self> {
        let mut metadata = metadata.unwrap_or_default();
        metadata.insert(META_TYPE.to_string(), type_name.to_string());
        metadata.insert(META_RW.to_string(), rw.to_string());

        Arc::new(Register {
            name: name.into(),
            rw,
            metadata,
            encoder,
            decoder,
            value: Mutex::new(initial),
            sync_listener: Mutex::new(None),
            set_callback,
        })
    }

    /// Current value.
    #[must_use]
    pub fn value(&self) -> Optional<T> {
        recover_lock(&self.value, "provider value").clone()
    }

    /// Store a new value and nudge the group into emitting a Sync.
    ///
    /// This is the user-facing mutation path, typically also called from the
    /// set callback to acknowledge an accepted Set.
    pub fn sync_value(&self, value: Optional<T>) {
        *recover_lock(&self.value, "provider value") = value;
        if let Some(listener) = recover_lock(&self.sync_listener, "provider sync listener").as_ref()
        {
            listener();
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Provider for Register<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn encoded_state(&self) -> (Metadata, Optional<Vec<u8>>) {
        let value = recover_lock(&self.value, "provider value");
        let encoded = match value.as_ref() {
            Optional::Defined(v) => (self.encoder)(v).map_or(Optional::Undefined, Optional::Defined),
            Optional::Undefined => Optional::Undefined,
        };
        (self.metadata.clone(), encoded)
    }

    fn accept_encoded_value(&self, value: Optional<Vec<u8>>) {
        if !self.rw {
            return;
        }
        let Some(callback) = self.set_callback.as_ref() else {
            return;
        };
        let decoded = match value {
            Optional::Defined(bytes) => match (self.decoder)(&bytes) {
                Some(v) => Optional::Defined(v),
                None => {
                    log::debug!("[register] {} rejecting undecodable set payload", self.name);
                    return;
                }
            },
            Optional::Undefined => Optional::Undefined,
        };
        callback(decoded);
    }

    fn writable(&self) -> bool {
        self.rw
    }

    fn attach_sync_listener(&self, listener: SyncListener) {
        *recover_lock(&self.sync_listener, "provider sync listener") = Some(listener);
    }
}

// ============================================================================
// Typed constructors
// ============================================================================

impl Register<String> {
    /// `type=string` provider.
    pub fn string(
        name: impl Into<String>,
        initial: Optional<String>,
        rw: bool,
        metadata: Option<Metadata>,
        set_callback: Option<SetCallback<String>>,
    ) -> Arc<Self> {
        Register::new(
            name,
            initial,
            Box::new(|v: &String| Some(encode_string(v))),
            Box::new(decode_string),
            TYPE_STRING,
            rw,
            metadata,
            set_callback,
        )
    }
}

impl Register<i64> {
    /// `type=int` provider.
    pub fn int(
        name: impl Into<String>,
        initial: Optional<i64>,
        rw: bool,
        metadata: Option<Metadata>,
        set_callback: Option<SetCallback<i64>>,
    ) -> Arc<Self> {
        Register::new(
            name,
            initial,
            Box::new(|v: &i64| Some(encode_int(*v))),
            Box::new(decode_int),
            TYPE_INT,
            rw,
            metadata,
            set_callback,
        )
    }
}

impl Register<bool> {
    /// `type=bool` provider.
    pub fn bool(
        name: impl Into<String>,
        initial: Optional<bool>,
        rw: bool,
        metadata: Option<Metadata>,
        set_callback: Option<SetCallback<bool>>,
    ) -> Arc<Self> {
        Register::new(
            name,
            initial,
            Box::new(|v: &bool| Some(encode_bool(*v))),
            Box::new(decode_bool),
            TYPE_BOOL,
            rw,
            metadata,
            set_callback,
        )
    }
}

impl Register<f64> {
    /// `type=float` provider.
    pub fn float(
        name: impl Into<String>,
        initial: Optional<f64>,
        rw: bool,
        metadata: Option<Metadata>,
        set_callback: Option<SetCallback<f64>>,
    ) -> Arc<Self> {
        Register::new(
            name,
            initial,
            Box::new(|v: &f64| Some(encode_float(*v))),
            Box::new(decode_float),
            TYPE_FLOAT,
            rw,
            metadata,
            set_callback,
        )
    }
}

impl Register<Value> {
    /// Dynamically typed provider; `type_name` declares the wire encoding
    /// and values are coerced to it on encode.
    pub fn any(
        name: impl Into<String>,
        initial: Optional<Value>,
        type_name: &str,
        rw: bool,
        metadata: Option<Metadata>,
        set_callback: Option<SetCallback<Value>>,
    ) -> Arc<Self> {
        let encode_type = type_name.to_string();
        let decode_type = type_name.to_string();
        Register::new(
            name,
            initial,
            Box::new(move |v: &Value| v.encode_as(&encode_type)),
            Box::new(move |b: &[u8]| Value::decode(b, &decode_type)),
            type_name,
            rw,
            metadata,
            set_callback,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_metadata_carries_type_and_rw() {
        let reg = Register::int("r2", Optional::Defined(10), true, None, None);
        let (metadata, value) = reg.encoded_state();
        assert_eq!(metadata.get(META_TYPE).map(String::as_str), Some("int"));
        assert_eq!(metadata.get(META_RW).map(String::as_str), Some("true"));
        assert_eq!(value, Optional::Defined(vec![0, 0, 0, 0, 0, 0, 0, 0x0A]));
    }

    #[test]
    fn test_sync_value_notifies_listener() {
        let reg = Register::int("r2", Optional::Undefined, true, None, None);
        let nudges = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&nudges);
        reg.attach_sync_listener(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        reg.sync_value(Optional::Defined(42));
        assert_eq!(nudges.load(Ordering::SeqCst), 1);
        assert_eq!(reg.value(), Optional::Defined(42));
    }

    #[test]
    fn test_set_decodes_into_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reg = Register::int(
            "r2",
            Optional::Defined(10),
            true,
            None,
            Some(Box::new(move |v| sink.lock().unwrap().push(v))),
        );

        reg.accept_encoded_value(Optional::Defined(encode_int(42)));
        reg.accept_encoded_value(Optional::Undefined);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![Optional::Defined(42), Optional::Undefined]
        );
    }

    #[test]
    fn test_read_only_ignores_set() {
        let seen = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&seen);
        let reg = Register::int(
            "ro",
            Optional::Defined(1),
            false,
            None,
            Some(Box::new(move |_| {
                sink.fetch_add(1, Ordering::SeqCst);
            })),
        );

        reg.accept_encoded_value(Optional::Defined(encode_int(9)));
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(reg.value(), Optional::Defined(1));
    }

    #[test]
    fn test_undecodable_set_is_dropped() {
        let seen = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&seen);
        let reg = Register::int(
            "r2",
            Optional::Defined(1),
            true,
            None,
            Some(Box::new(move |_| {
                sink.fetch_add(1, Ordering::SeqCst);
            })),
        );

        reg.accept_encoded_value(Optional::Defined(vec![1, 2, 3])); // not 8 bytes
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_undefined_value_encodes_undefined() {
        let reg = Register::float("f", Optional::Undefined, false, None, None);
        let (_, value) = reg.encoded_state();
        assert!(value.is_undefined());
    }

    #[test]
    fn test_any_provider_coerces() {
        let reg = Register::any(
            "mixed",
            Optional::Defined(Value::Int(2)),
            TYPE_FLOAT,
            false,
            None,
            None,
        );
        let (metadata, value) = reg.encoded_state();
        assert_eq!(metadata.get(META_TYPE).map(String::as_str), Some("float"));
        assert_eq!(value, Optional::Defined(encode_float(2.0)));
    }
}
