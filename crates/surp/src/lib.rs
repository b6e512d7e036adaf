// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # SURP - Simple UDP Register Protocol
//!
//! A decentralized machine-to-machine communication substrate for IoT and
//! small-fleet automation. Participants on a shared link-local IPv6 network
//! expose named, typed **registers** - small pieces of live state with
//! metadata - and observe or mutate registers exposed by others. No broker,
//! no directory service: discovery, value dissemination, and control all
//! ride on IPv6 multicast plus unicast responses.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use surp::{Optional, RegisterGroup};
//! use surp::register::{provider, Provider};
//!
//! fn main() -> surp::Result<()> {
//!     let group = RegisterGroup::join("eth0", "plant")?;
//!
//!     let boiler = provider::Register::int(
//!         "boiler.target",
//!         Optional::Defined(55),
//!         true,
//!         None,
//!         Some(Box::new(|requested| println!("set request: {}", requested))),
//!     );
//!     group.add_providers([boiler.clone() as Arc<dyn Provider>])?;
//!
//!     // The group now advertises boiler.target every 2-4 seconds and
//!     // answers Get/Set traffic until close().
//!     group.close();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------------+
//! |                        Application Layer                           |
//! |     typed provider/consumer registers, callbacks, surpctl CLI      |
//! +--------------------------------------------------------------------+
//! |                        Group Runtime                               |
//! |  dispatch (Sync/Set/Get) | jittered sync loops | freshness wheel   |
//! +--------------------------------------------------------------------+
//! |                        Protocol Layer                              |
//! |        SURP framing codec | value coders | name hashing            |
//! +--------------------------------------------------------------------+
//! |                        Transport Layer                             |
//! |   IPv6 multicast listeners | unicast socket | datagram threads     |
//! +--------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`RegisterGroup`] | A joined group: dispatch, scheduling, freshness |
//! | [`register::provider::Register`] | Typed owner of a register |
//! | [`register::consumer::Register`] | Typed observer of a remote register |
//! | [`Optional`] | Defined/undefined value carrier (wire-level null) |
//! | [`protocol::Message`] | One decoded Sync/Set/Get datagram |
//!
//! Delivery is best-effort by design: no reliability, no ordering across
//! registers, no authentication. Security is delegated to the network layer.

/// Protocol constants and per-group tunables.
pub mod config;
/// Typed errors for fallible public operations.
pub mod error;
/// The register group runtime (join, dispatch, periodic sync, freshness).
pub mod group;
/// Defined/undefined value carrier.
pub mod optional;
/// Wire protocol: message model, binary codec, value coders.
pub mod protocol;
/// Provider/consumer register endpoints.
pub mod register;
/// Interface resolution, addressing, sockets, datagram threads.
pub mod transport;

pub use config::{GroupConfig, JoinMode};
pub use error::{Error, Result};
pub use group::RegisterGroup;
pub use optional::Optional;
pub use protocol::{Message, MessageKind, Value};

/// SURP crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
