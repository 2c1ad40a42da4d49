//! The contract between the runtime and the transport/middleware.
//!
//! The runtime never talks to the network itself.  Everything it needs from
//! the outside world goes through the traits below, implemented by a
//! transport binding (or by [`crate::memory`] for in-process use).
//!
//! # Seams
//!
//! | Trait | Role |
//! |-------|------|
//! | [`Transport`] | Initialises a [`Communicator`] from transport properties |
//! | [`Communicator`] | Per-process root: adapters, well-known service handles, proxy binding |
//! | [`ObjectAdapter`] | Local dispatch of objects by identity |
//! | [`Registry`] / [`AdminSession`] / [`Admin`] | Authenticated directory mutation |
//! | [`Query`] | Directory lookup |
//! | [`TopicManager`] / [`Topic`] | Pub/sub topics |
//! | [`EventSink`] | The message-publishing capability a proxy is bound to |
//!
//! Recoverable conditions are returned as outcome enums instead of errors, so
//! the runtime handles them with plain branches.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use holonet_core::{Identity, Message, ObjectProxy, QosOptions};

use crate::config::TransportProperties;
use crate::error::MiddlewareError;
use crate::holon::Holon;

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of adding an object to the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddObjectOutcome {
    Added,
    /// An entry with the same identity is already listed.
    AlreadyExists,
}

/// Result of removing an object from the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveObjectOutcome {
    Removed,
    /// No entry with that identity was listed.
    NotFound,
}

/// Result of creating a topic.
pub enum CreateTopicOutcome {
    Created(Arc<dyn Topic>),
    /// Another process created a topic with that name first.
    AlreadyExists,
}

/// Result of hosting a servant on an object adapter.
pub struct Hosted {
    pub proxy: ObjectProxy,
    /// The servant that was hosted under the same identity before, if any.
    pub displaced: Option<Arc<dyn Holon>>,
}

/// Result of subscribing to a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Subscribed,
    /// The subscriber was already on the topic's list.
    AlreadySubscribed,
}

/// Result of unsubscribing from a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    Unsubscribed,
    NotSubscribed,
}

// ---------------------------------------------------------------------------
// Process root
// ---------------------------------------------------------------------------

/// Brings up the middleware for one process.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn initialize(
        &self,
        properties: &TransportProperties,
    ) -> Result<Arc<dyn Communicator>, MiddlewareError>;
}

/// The per-process handle onto the middleware.
///
/// Service accessors return handles without contacting the service; failures
/// surface on the first call made through them.
#[async_trait]
pub trait Communicator: Send + Sync + 'static {
    /// Create and return the named object adapter, configured from the
    /// transport properties.
    async fn create_object_adapter(
        &self,
        name: &str,
    ) -> Result<Arc<dyn ObjectAdapter>, MiddlewareError>;

    /// The directory's session factory.
    fn registry(&self) -> Arc<dyn Registry>;

    /// The directory's lookup interface.
    fn query(&self) -> Arc<dyn Query>;

    /// The broker's topic manager.
    fn topic_manager(&self) -> Arc<dyn TopicManager>;

    /// Bind a proxy to the message-publishing capability without checking
    /// that the target implements it.
    fn event_sink(&self, proxy: &ObjectProxy) -> Arc<dyn EventSink>;

    /// Tear down adapters and connections. Called once, at shutdown.
    async fn destroy(&self);
}

// ---------------------------------------------------------------------------
// Local dispatch
// ---------------------------------------------------------------------------

/// Dispatches incoming calls to locally hosted holons.
#[async_trait]
pub trait ObjectAdapter: Send + Sync + 'static {
    /// Start accepting calls.
    async fn activate(&self) -> Result<(), MiddlewareError>;

    /// Host `servant` under `identity` and return its proxy. An existing
    /// servant with the same identity is replaced and handed back in
    /// [`Hosted::displaced`].
    async fn add(&self, servant: Arc<dyn Holon>, identity: Identity)
        -> Result<Hosted, MiddlewareError>;

    /// Stop hosting `identity`, returning the servant that was removed.
    async fn remove(&self, identity: &Identity) -> Result<Option<Arc<dyn Holon>>, MiddlewareError>;

    /// The servant currently hosted under `identity`.
    fn find(&self, identity: &Identity) -> Option<Arc<dyn Holon>>;
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

/// Creates admin sessions against the directory.
#[async_trait]
pub trait Registry: Send + Sync + 'static {
    /// Open a new admin session. Credentials are not checked by the
    /// directory in this deployment model.
    async fn create_admin_session(
        &self,
        user: &str,
        password: &str,
    ) -> Result<Arc<dyn AdminSession>, MiddlewareError>;
}

/// A time-limited admin session.
#[async_trait]
pub trait AdminSession: Send + Sync + 'static {
    /// Lightweight liveness check.
    async fn ping(&self) -> Result<(), MiddlewareError>;

    /// The admin handle belonging to this session.
    async fn admin(&self) -> Result<Arc<dyn Admin>, MiddlewareError>;

    /// Close the session.
    async fn destroy(&self) -> Result<(), MiddlewareError>;
}

/// Directory mutation, valid only while its session is live.
#[async_trait]
pub trait Admin: Send + Sync + 'static {
    async fn add_object_with_type(
        &self,
        proxy: &ObjectProxy,
        type_id: &str,
    ) -> Result<AddObjectOutcome, MiddlewareError>;

    /// Replace the proxy stored for an existing entry.
    async fn update_object(&self, proxy: &ObjectProxy) -> Result<(), MiddlewareError>;

    async fn remove_object(&self, identity: &Identity)
        -> Result<RemoveObjectOutcome, MiddlewareError>;
}

/// Directory lookup.
#[async_trait]
pub trait Query: Send + Sync + 'static {
    async fn find_all_objects_by_type(
        &self,
        type_id: &str,
    ) -> Result<Vec<ObjectProxy>, MiddlewareError>;

    async fn find_object_by_id(
        &self,
        identity: &Identity,
    ) -> Result<Option<ObjectProxy>, MiddlewareError>;
}

// ---------------------------------------------------------------------------
// Broker
// ---------------------------------------------------------------------------

/// Resolves and creates named topics.
#[async_trait]
pub trait TopicManager: Send + Sync + 'static {
    /// The topic named `name`, or `None` if no such topic exists.
    async fn retrieve(&self, name: &str) -> Result<Option<Arc<dyn Topic>>, MiddlewareError>;

    async fn create(&self, name: &str) -> Result<CreateTopicOutcome, MiddlewareError>;
}

/// A named pub/sub topic.
#[async_trait]
pub trait Topic: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn subscribe_and_get_publisher(
        &self,
        qos: &QosOptions,
        subscriber: &ObjectProxy,
    ) -> Result<SubscribeOutcome, MiddlewareError>;

    async fn unsubscribe(&self, subscriber: &ObjectProxy)
        -> Result<UnsubscribeOutcome, MiddlewareError>;

    /// Proxy of the object that forwards published calls to every subscriber.
    async fn publisher(&self) -> Result<ObjectProxy, MiddlewareError>;
}

/// The message-publishing capability.
///
/// Bound to a holon's proxy it calls that holon; bound to a topic's
/// publisher it fans the call out to the topic's subscribers.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn put_message(&self, message: Message) -> Result<(), MiddlewareError>;

    async fn new_event(
        &self,
        name: &str,
        arguments: &BTreeMap<String, String>,
        payload: &[u8],
    ) -> Result<(), MiddlewareError>;
}
