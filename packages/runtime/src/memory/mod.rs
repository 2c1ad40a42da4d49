//! In-memory middleware.
//!
//! [`MemoryGrid`] implements the whole middleware contract inside one
//! process: a directory, a topic broker, and the object adapters of every
//! runtime initialised from it.  Each [`Transport::initialize`] call stands
//! for a separate process: it gets its own communicator and a unique adapter
//! id, while the directory and broker are shared, so several runtimes built
//! on one grid see each other exactly as separate processes would.
//!
//! Use it for tests, the conformance suite, and standalone demos.  The grid
//! also exposes fault injection: [`MemoryGrid::expire_sessions`] kills every
//! open admin session and [`MemoryGrid::set_reachable`] takes the directory
//! and broker offline.
//!
//! All state lives behind std locks that are never held across an `.await`.

mod adapter;
mod broker;
mod directory;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use holonet_core::{Identity, Message, ObjectProxy};
use tracing::debug;

pub use adapter::MemoryAdapter;

use crate::config::{TransportProperties, ADAPTER_ID};
use crate::error::MiddlewareError;
use crate::holon::Holon;
use crate::middleware::{
    Communicator, EventSink, ObjectAdapter, Query, Registry, TopicManager, Transport,
};
use broker::{Broker, MemoryTopicManager};
use directory::{Directory, MemoryQuery, MemoryRegistry};

/// Adapter id of the broker's publisher objects.
pub const BROKER_ADAPTER_ID: &str = "EventServer";

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

/// A call travelling to a holon, directly or through a topic.
#[derive(Clone)]
pub(crate) enum Call {
    Message(Message),
    Event {
        name: String,
        arguments: BTreeMap<String, String>,
        payload: Vec<u8>,
    },
}

impl Call {
    async fn dispatch(self, servant: &dyn Holon) {
        match self {
            Call::Message(message) => servant.put_message(message).await,
            Call::Event {
                name,
                arguments,
                payload,
            } => servant.new_event(&name, &arguments, &payload).await,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared grid state
// ---------------------------------------------------------------------------

pub(crate) struct GridState {
    directory: Directory,
    broker: Broker,
    adapters: RwLock<HashMap<String, Arc<MemoryAdapter>>>,
    next_process: AtomicU64,
    reachable: AtomicBool,
}

impl GridState {
    fn new() -> Self {
        Self {
            directory: Directory::new(),
            broker: Broker::new(),
            adapters: RwLock::new(HashMap::new()),
            next_process: AtomicU64::new(0),
            reachable: AtomicBool::new(true),
        }
    }

    pub(crate) fn check_reachable(&self, service: &str) -> Result<(), MiddlewareError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(MiddlewareError::Unreachable(service.to_string()))
        }
    }

    /// The servant behind `proxy`, if its adapter is active and hosts it.
    pub(crate) fn resolve(&self, proxy: &ObjectProxy) -> Option<Arc<dyn Holon>> {
        let adapter = read(&self.adapters).get(&proxy.adapter_id).cloned()?;
        if !adapter.is_active() {
            return None;
        }
        adapter.find(&proxy.identity)
    }

    /// Invoke `call` on the object behind `proxy`; publisher proxies fan out.
    pub(crate) async fn deliver(
        &self,
        proxy: &ObjectProxy,
        call: Call,
    ) -> Result<(), MiddlewareError> {
        if proxy.adapter_id == BROKER_ADAPTER_ID {
            self.check_reachable("broker")?;
            return self.broker.fan_out(self, &proxy.identity.name, call).await;
        }

        let servant = self
            .resolve(proxy)
            .ok_or_else(|| MiddlewareError::ObjectNotExist(proxy.to_string()))?;
        call.dispatch(servant.as_ref()).await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryGrid
// ---------------------------------------------------------------------------

/// A shared in-process directory, broker and adapter table.
#[derive(Clone)]
pub struct MemoryGrid {
    state: Arc<GridState>,
}

impl MemoryGrid {
    pub fn new() -> Self {
        Self {
            state: Arc::new(GridState::new()),
        }
    }

    /// Take the directory and broker offline (`false`) or back online.
    pub fn set_reachable(&self, reachable: bool) {
        self.state.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Invalidate every admin session opened so far.
    pub fn expire_sessions(&self) {
        self.state.directory.expire_sessions();
    }

    /// How many admin sessions have been opened.
    pub fn sessions_created(&self) -> u64 {
        self.state.directory.sessions_created()
    }

    /// Whether the directory lists an object with this stringified identity.
    pub fn is_listed(&self, identity: &str) -> bool {
        Identity::parse(identity)
            .map(|id| self.state.directory.contains(&id))
            .unwrap_or(false)
    }

    /// Names of all topics on the broker, sorted.
    pub fn topic_names(&self) -> Vec<String> {
        self.state.broker.topic_names()
    }

    /// Number of subscription records on `topic`, or `None` if it does not exist.
    pub fn subscriber_count(&self, topic: &str) -> Option<usize> {
        self.state.broker.subscriber_count(topic)
    }

    /// The servant behind `proxy`, if it is currently reachable.
    pub fn resolve(&self, proxy: &ObjectProxy) -> Option<Arc<dyn Holon>> {
        self.state.resolve(proxy)
    }
}

impl Default for MemoryGrid {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryGrid {
    async fn initialize(
        &self,
        properties: &TransportProperties,
    ) -> Result<Arc<dyn Communicator>, MiddlewareError> {
        let process = self.state.next_process.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("memory: initialising process {process}");
        Ok(Arc::new(MemoryCommunicator {
            state: Arc::clone(&self.state),
            properties: properties.clone(),
            process,
            adapters: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
        }))
    }
}

// ---------------------------------------------------------------------------
// MemoryCommunicator
// ---------------------------------------------------------------------------

/// One process's view of a [`MemoryGrid`].
pub struct MemoryCommunicator {
    state: Arc<GridState>,
    properties: TransportProperties,
    process: u64,
    adapters: Mutex<Vec<Arc<MemoryAdapter>>>,
    destroyed: AtomicBool,
}

#[async_trait]
impl Communicator for MemoryCommunicator {
    async fn create_object_adapter(
        &self,
        name: &str,
    ) -> Result<Arc<dyn ObjectAdapter>, MiddlewareError> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(MiddlewareError::Destroyed);
        }

        let base = self
            .properties
            .get(&format!("{name}.AdapterId"))
            .map(String::as_str)
            .unwrap_or(ADAPTER_ID);
        let adapter_id = format!("{base}-{}", self.process);
        let endpoints = self
            .properties
            .get(&format!("{name}.Endpoints"))
            .cloned()
            .unwrap_or_default();

        let adapter = Arc::new(MemoryAdapter::new(adapter_id.clone(), endpoints));
        write(&self.state.adapters).insert(adapter_id, Arc::clone(&adapter));
        self.adapters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&adapter));
        Ok(adapter)
    }

    fn registry(&self) -> Arc<dyn Registry> {
        Arc::new(MemoryRegistry::new(Arc::clone(&self.state)))
    }

    fn query(&self) -> Arc<dyn Query> {
        Arc::new(MemoryQuery::new(Arc::clone(&self.state)))
    }

    fn topic_manager(&self) -> Arc<dyn TopicManager> {
        Arc::new(MemoryTopicManager::new(Arc::clone(&self.state)))
    }

    fn event_sink(&self, proxy: &ObjectProxy) -> Arc<dyn EventSink> {
        Arc::new(MemoryEventSink {
            state: Arc::clone(&self.state),
            proxy: proxy.clone(),
        })
    }

    async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        let adapters: Vec<_> = self
            .adapters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        let mut table = write(&self.state.adapters);
        for adapter in adapters {
            adapter.deactivate();
            table.remove(adapter.id());
        }
        debug!("memory: process {} destroyed", self.process);
    }
}

/// A proxy bound to the message-publishing capability.
struct MemoryEventSink {
    state: Arc<GridState>,
    proxy: ObjectProxy,
}

#[async_trait]
impl EventSink for MemoryEventSink {
    async fn put_message(&self, message: Message) -> Result<(), MiddlewareError> {
        self.state.deliver(&self.proxy, Call::Message(message)).await
    }

    async fn new_event(
        &self,
        name: &str,
        arguments: &BTreeMap<String, String>,
        payload: &[u8],
    ) -> Result<(), MiddlewareError> {
        let call = Call::Event {
            name: name.to_string(),
            arguments: arguments.clone(),
            payload: payload.to_vec(),
        };
        self.state.deliver(&self.proxy, call).await
    }
}
