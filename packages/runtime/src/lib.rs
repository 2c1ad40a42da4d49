//! Client runtime for holon networks.
//!
//! A process uses one [`HolonRuntime`] to expose named holons, list them in a
//! shared directory so other processes can find them by name or type, and
//! exchange notifications through named publish/subscribe topics.
//!
//! The transport that carries the calls is not part of this crate.  The
//! runtime drives it through the traits in [`middleware`]; the [`memory`]
//! module provides an in-process implementation.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |---|---|
//! | [`config`] | [`RuntimeConfig`] and the transport properties derived from it |
//! | [`address`] | Outward-facing address discovery |
//! | [`session`] | Self-healing directory admin session |
//! | [`registry`] | Create-or-update registration, tolerant deregistration |
//! | [`topics`] | Race-safe topic get-or-create, event publishers |
//! | [`subscription`] | Idempotent topic subscriptions |
//! | [`holon`] | The [`Holon`] trait, ready-made variants, [`Agent`] |
//! | [`middleware`] | Contract with the transport, directory and broker |
//! | [`memory`] | In-memory middleware for tests and standalone use |
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use holonet::{memory::MemoryGrid, Agent, HolonRuntime, LoggingHolon, RuntimeConfig};
//!
//! let grid = MemoryGrid::new();
//! let runtime = HolonRuntime::start(RuntimeConfig::default(), &grid).await?;
//!
//! let mut agent = Agent::new(Arc::new(LoggingHolon::new("sensor-1")));
//! runtime.register(&mut agent).await?;
//! runtime.subscribe(&mut agent, "alarms").await?;
//!
//! // ... always deregister before exiting; this also drops its subscriptions
//! runtime.deregister(&mut agent).await?;
//! runtime.shutdown().await;
//! ```

pub mod address;
pub mod config;
pub mod error;
pub mod holon;
pub mod memory;
pub mod middleware;
pub mod registry;
pub mod runtime;
pub mod session;
pub mod subscription;
pub mod topics;

pub use holonet_core::{
    Identity, IdentityError, Mailbox, Message, ObjectProxy, QosOptions, Reliability,
};

pub use address::LocalAddressResolver;
pub use config::{ConfigError, RuntimeConfig};
pub use error::{MiddlewareError, RuntimeError};
pub use holon::{Agent, Holon, LoggingHolon, MailboxHolon, HOLON_TYPE_ID};
pub use registry::{Deregistration, Registration};
pub use runtime::HolonRuntime;
pub use session::DirectorySession;
pub use subscription::Subscription;
pub use topics::{EventPublisher, TopicHandle};
