//! Pure-logic holon primitives for holonet.
//!
//! This crate has **no I/O**: no sockets, no async runtime, no directory or
//! broker calls.  It holds the value types that flow between a process and
//! the middleware: who an object is ([`Identity`]), where it can be reached
//! ([`ObjectProxy`]), what is sent to it ([`Message`]), how a subscription is
//! delivered ([`QosOptions`]), and where received messages wait
//! ([`Mailbox`]).
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |---|---|
//! | [`identity`] | `category/name` object identities, parsing and display |
//! | [`proxy`] | Remote handle values returned by object adapters |
//! | [`message`] | The message payload delivered to holons |
//! | [`qos`] | Subscription delivery options |
//! | [`mailbox`] | Thread-safe FIFO of received messages |
//!
//! The runtime that drives the directory and broker lives in the `holonet`
//! crate, which re-exports everything here.

pub mod identity;
pub mod mailbox;
pub mod message;
pub mod proxy;
pub mod qos;

pub use identity::{Identity, IdentityError};
pub use mailbox::Mailbox;
pub use message::Message;
pub use proxy::ObjectProxy;
pub use qos::{QosOptions, Reliability};
