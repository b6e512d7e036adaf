// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Consumer-side register: tracks a named register owned elsewhere.
//!
//! The cached value is whatever the last accepted Sync decoded to, or
//! undefined after a freshness timeout. User callbacks fire on changes - and
//! unconditionally on the very first sync, so consumers learn promptly that
//! a register is present even when its value equals the carrier default.

use crate::optional::Optional;
use crate::protocol::value::{
    decode_bool, decode_float, decode_int, decode_string, encode_bool, encode_float, encode_int,
    encode_string, Value,
};
use crate::register::{recover_lock, Consumer, Decoder, Encoder, Metadata, SetSink, META_TYPE};
use std::sync::{Arc, Mutex};

/// User callback invoked with the decoded value on every observed change.
pub type SyncCallback<T> = Box<dyn Fn(Optional<T>) + Send + Sync>;

struct SyncState<T> {
    value: Optional<T>,
    first_sync: bool,
}

/// A typed consumer register.
///
/// Construct through the typed helpers ([`Register::string`],
/// [`Register::int`], [`Register::bool`], [`Register::float`],
/// [`Register::any`]) and hand the `Arc` to
/// [`RegisterGroup::add_consumers`](crate::group::RegisterGroup::add_consumers).
pub struct Register<T> {
    name: String,
    encoder: Encoder<T>,
    decoder: Decoder<T>,
    state: Mutex<SyncState<T>>,
    metadata: Arc<Mutex<Optional<Metadata>>>,
    listeners: Vec<SyncCallback<T>>,
    set_listener: Mutex<Option<SetSink>>,
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Register<T> {
    /// Generic constructor; the typed helpers fill in the coders.
    pub fn new(
        name: impl Into<String>,
        encoder: Encoder<T>,
        decoder: Decoder<T>,
        listeners: Vec<SyncCallback<T>>,
    ) -> Arc<Self> {
        Self::with_metadata_cell(
            name,
            encoder,
            decoder,
            listeners,
            Arc::new(Mutex::new(Optional::Undefined)),
        )
    }

    fn with_metadata_cell(
        name: impl Into<String>,
        encoder: Encoder<T>,
        decoder: Decoder<T>,
        listeners: Vec<SyncCallback<T>>,
        metadata: Arc<Mutex<Optional<Metadata>>>,
    ) -> Arc<Self> {
        Arc::new(Register {
            name: name.into(),
            encoder,
            decoder,
            state: Mutex::new(SyncState {
                value: Optional::Undefined,
                first_sync: true,
            }),
            metadata,
            listeners,
            set_listener: Mutex::new(None),
        })
    }

    /// Last decoded value, or undefined before the first sync / after a
    /// freshness timeout.
    #[must_use]
    pub fn value(&self) -> Optional<T> {
        recover_lock(&self.state, "consumer state").value.clone()
    }

    /// Metadata from the last Sync, undefined until one arrived.
    #[must_use]
    pub fn metadata(&self) -> Optional<Metadata> {
        recover_lock(&self.metadata, "consumer metadata").clone()
    }

    /// Request a Set on the remote register.
    ///
    /// Encodes and forwards through the group's set emitter. Swallowed when
    /// the value cannot be encoded yet (any-typed register before metadata)
    /// or when no group has adopted this consumer.
    pub fn set_value(&self, value: Optional<T>) {
        let encoded = match &value {
            Optional::Defined(v) => match (self.encoder)(v) {
                Some(bytes) => Optional::Defined(bytes),
                None => {
                    log::debug!("[register] {} swallowing unencodable set", self.name);
                    return;
                }
            },
            Optional::Undefined => Optional::Undefined,
        };
        if let Some(listener) = recover_lock(&self.set_listener, "consumer set listener").as_ref() {
            listener(encoded);
        }
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Consumer for Register<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn accept_metadata(&self, metadata: &Metadata) {
        *recover_lock(&self.metadata, "consumer metadata") = Optional::Defined(metadata.clone());
    }

    fn sync_value(&self, value: Optional<Vec<u8>>) {
        let decoded = match value {
            Optional::Defined(bytes) => match (self.decoder)(&bytes) {
                Some(v) => Optional::Defined(v),
                // Undecodable payload: leave the cached value unchanged.
                None => {
                    log::debug!("[register] {} rejecting undecodable sync payload", self.name);
                    return;
                }
            },
            Optional::Undefined => Optional::Undefined,
        };

        let fire = {
            let mut state = recover_lock(&self.state, "consumer state");
            let fire = state.first_sync || decoded != state.value;
            state.first_sync = false;
            state.value = decoded.clone();
            fire
        };

        // Listeners run outside the state lock; they may read value() freely.
        if fire {
            for listener in &self.listeners {
                listener(decoded.clone());
            }
        }
    }

    fn attach_set_listener(&self, listener: SetSink) {
        *recover_lock(&self.set_listener, "consumer set listener") = Some(listener);
    }
}

// ============================================================================
// Typed constructors
// ============================================================================

impl Register<String> {
    /// `type=string` consumer.
    pub fn string(name: impl Into<String>, listeners: Vec<SyncCallback<String>>) -> Arc<Self> {
        Register::new(
            name,
            Box::new(|v: &String| Some(encode_string(v))),
            Box::new(decode_string),
            listeners,
        )
    }
}

impl Register<i64> {
    /// `type=int` consumer.
    pub fn int(name: impl Into<String>, listeners: Vec<SyncCallback<i64>>) -> Arc<Self> {
        Register::new(
            name,
            Box::new(|v: &i64| Some(encode_int(*v))),
            Box::new(decode_int),
            listeners,
        )
    }
}

impl Register<bool> {
    /// `type=bool` consumer.
    pub fn bool(name: impl Into<String>, listeners: Vec<SyncCallback<bool>>) -> Arc<Self> {
        Register::new(
            name,
            Box::new(|v: &bool| Some(encode_bool(*v))),
            Box::new(decode_bool),
            listeners,
        )
    }
}

impl Register<f64> {
    /// `type=float` consumer.
    pub fn float(name: impl Into<String>, listeners: Vec<SyncCallback<f64>>) -> Arc<Self> {
        Register::new(
            name,
            Box::new(|v: &f64| Some(encode_float(*v))),
            Box::new(decode_float),
            listeners,
        )
    }
}

impl Register<Value> {
    /// Dynamically typed consumer: the concrete codec is chosen by the
    /// `type` key of the metadata received so far. Until metadata arrives,
    /// decodes fail (value stays undefined) and sets are swallowed.
    pub fn any(name: impl Into<String>, listeners: Vec<SyncCallback<Value>>) -> Arc<Self> {
        let metadata: Arc<Mutex<Optional<Metadata>>> = Arc::new(Mutex::new(Optional::Undefined));

        let encode_cell = Arc::clone(&metadata);
        let encoder: Encoder<Value> = Box::new(move |v: &Value| {
            let metadata = recover_lock(&encode_cell, "any-consumer metadata");
            match metadata.as_ref() {
                Optional::Defined(m) => m.get(META_TYPE).and_then(|t| v.encode_as(t)),
                Optional::Undefined => None,
            }
        });

        let decode_cell = Arc::clone(&metadata);
        let decoder: Decoder<Value> = Box::new(move |b: &[u8]| {
            let metadata = recover_lock(&decode_cell, "any-consumer metadata");
            match metadata.as_ref() {
                Optional::Defined(m) => m.get(META_TYPE).and_then(|t| Value::decode(b, t)),
                Optional::Undefined => None,
            }
        });

        Register::with_metadata_cell(name, encoder, decoder, listeners, metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::value::TYPE_INT;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn int_metadata() -> Metadata {
        let mut m = Metadata::new();
        m.insert(META_TYPE.to_string(), TYPE_INT.to_string());
        m
    }

    #[test]
    fn test_first_sync_always_fires() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let reg = Register::int(
            "r2",
            vec![Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })],
        );

        // First sync delivers the carrier default (undefined) - fires anyway.
        reg.sync_value(Optional::Undefined);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Unchanged value: no further callback.
        reg.sync_value(Optional::Undefined);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_change_detection() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reg = Register::int(
            "r2",
            vec![Box::new(move |v| sink.lock().unwrap().push(v))],
        );

        reg.sync_value(Optional::Defined(encode_int(10)));
        reg.sync_value(Optional::Defined(encode_int(10)));
        reg.sync_value(Optional::Defined(encode_int(42)));
        reg.sync_value(Optional::Undefined);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                Optional::Defined(10),
                Optional::Defined(42),
                Optional::Undefined,
            ]
        );
        assert_eq!(reg.value(), Optional::Undefined);
    }

    #[test]
    fn test_undecodable_payload_leaves_value_unchanged() {
        let reg = Register::int("r2", vec![]);
        reg.sync_value(Optional::Defined(encode_int(5)));
        reg.sync_value(Optional::Defined(vec![1, 2])); // wrong length
        assert_eq!(reg.value(), Optional::Defined(5));
    }

    #[test]
    fn test_set_value_forwards_encoded() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sent);
        let reg = Register::int("r2", vec![]);
        reg.attach_set_listener(Box::new(move |bytes| sink.lock().unwrap().push(bytes)));

        reg.set_value(Optional::Defined(42));
        reg.set_value(Optional::Undefined);

        assert_eq!(
            *sent.lock().unwrap(),
            vec![Optional::Defined(encode_int(42)), Optional::Undefined]
        );
    }

    #[test]
    fn test_any_consumer_waits_for_metadata() {
        let sent = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&sent);
        let reg = Register::any("r2", vec![]);
        reg.attach_set_listener(Box::new(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        }));

        // Before metadata: decode fails (value stays undefined), sets are
        // swallowed.
        reg.sync_value(Optional::Defined(encode_int(10)));
        assert_eq!(reg.value(), Optional::Undefined);
        reg.set_value(Optional::Defined(Value::Int(1)));
        assert_eq!(sent.load(Ordering::SeqCst), 0);

        // After metadata: both paths work.
        reg.accept_metadata(&int_metadata());
        reg.sync_value(Optional::Defined(encode_int(10)));
        assert_eq!(reg.value(), Optional::Defined(Value::Int(10)));
        reg.set_value(Optional::Defined(Value::Int(1)));
        assert_eq!(sent.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_metadata_accessor() {
        let reg = Register::int("r2", vec![]);
        assert!(reg.metadata().is_undefined());
        reg.accept_metadata(&int_metadata());
        assert!(reg.metadata().is_defined());
    }
}
