//! The per-process runtime.
//!
//! [`HolonRuntime::start`] resolves the address this process announces,
//! initialises the transport with properties derived from the
//! [`RuntimeConfig`], activates the object adapter and opens the directory
//! session.  From then on it is the single entry point for registering
//! holons, finding other holons, and using topics.
//!
//! One runtime per process.  It is `Send + Sync`; share it as
//! `Arc<HolonRuntime>` between tasks and threads.  Call
//! [`HolonRuntime::shutdown`] once, after every holon has been deregistered.

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use holonet_core::ObjectProxy;
use tracing::info;

use crate::address::LocalAddressResolver;
use crate::config::{RuntimeConfig, ADAPTER_NAME};
use crate::error::RuntimeError;
use crate::holon::Agent;
use crate::middleware::{Admin, Communicator, EventSink, Transport};
use crate::registry::{Deregistration, ObjectRegistry, Registration};
use crate::session::DirectorySession;
use crate::subscription::{Subscription, SubscriptionManager};
use crate::topics::{EventPublisher, TopicBroker, TopicHandle};

/// Entry point to the holon network for one process.
pub struct HolonRuntime {
    config: RuntimeConfig,
    local_address: IpAddr,
    communicator: Arc<dyn Communicator>,
    session: Arc<DirectorySession>,
    registry: ObjectRegistry,
    topics: Arc<TopicBroker>,
    subscriptions: SubscriptionManager,
    shut_down: AtomicBool,
}

impl HolonRuntime {
    /// Bring up the runtime on top of `transport`.
    ///
    /// Fails only if the transport or the object adapter cannot be
    /// initialised. An unreachable directory is logged; the session is then
    /// opened on first use.
    pub async fn start(
        config: RuntimeConfig,
        transport: &dyn Transport,
    ) -> Result<Self, RuntimeError> {
        let local_address = LocalAddressResolver::new(config.directory_port)
            .resolve(&config.directory_host)
            .await;
        info!("runtime: my IP address is {local_address}");

        let properties = config.transport_properties(local_address);
        let communicator = transport.initialize(&properties).await?;

        let adapter = communicator.create_object_adapter(ADAPTER_NAME).await?;
        adapter.activate().await?;

        let session = Arc::new(DirectorySession::connect(communicator.registry()).await);
        let registry = ObjectRegistry::new(adapter, Arc::clone(&session), communicator.query());
        let topics = Arc::new(TopicBroker::new(
            communicator.topic_manager(),
            Arc::clone(&communicator),
        ));
        let subscriptions = SubscriptionManager::new(Arc::clone(&topics));

        info!(
            "runtime: started against directory {}:{}",
            config.directory_host, config.directory_port
        );

        Ok(Self {
            config,
            local_address,
            communicator,
            session,
            registry,
            topics,
            subscriptions,
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The address this process announces to the directory.
    pub fn local_address(&self) -> IpAddr {
        self.local_address
    }

    fn ensure_running(&self) -> Result<(), RuntimeError> {
        if self.shut_down.load(Ordering::SeqCst) {
            Err(RuntimeError::ShutDown)
        } else {
            Ok(())
        }
    }

    // ── Directory ────────────────────────────────────────────────────────────

    /// An admin handle backed by a live directory session.
    pub async fn admin(&self) -> Result<Arc<dyn Admin>, RuntimeError> {
        self.ensure_running()?;
        Ok(self.session.admin().await?)
    }

    /// Make `agent` remotely callable and list it in the directory.
    pub async fn register(&self, agent: &mut Agent) -> Result<Registration, RuntimeError> {
        self.ensure_running()?;
        self.registry.register(agent).await
    }

    /// Drop `agent`'s topic subscriptions, then remove it from the directory
    /// and from this process.
    pub async fn deregister(&self, agent: &mut Agent) -> Result<Deregistration, RuntimeError> {
        self.ensure_running()?;
        if self.registry.hosts(agent) {
            self.subscriptions.unsubscribe_all(agent).await;
        }
        self.registry.deregister(agent).await
    }

    /// Every holon listed under `type_id`.
    pub async fn find_holons_by_type(
        &self,
        type_id: &str,
    ) -> Result<Vec<ObjectProxy>, RuntimeError> {
        self.ensure_running()?;
        self.registry.find_by_type(type_id).await
    }

    /// The holon listed under `name`, if any.
    pub async fn find_holon(&self, name: &str) -> Result<Option<ObjectProxy>, RuntimeError> {
        self.ensure_running()?;
        self.registry.find(name).await
    }

    /// A handle for sending messages straight to the holon behind `proxy`.
    pub fn connect(&self, proxy: &ObjectProxy) -> Result<Arc<dyn EventSink>, RuntimeError> {
        self.ensure_running()?;
        Ok(self.communicator.event_sink(proxy))
    }

    // ── Topics ───────────────────────────────────────────────────────────────

    /// The topic named `name`, created if it does not exist yet.
    pub async fn get_topic(&self, name: &str) -> Result<TopicHandle, RuntimeError> {
        self.ensure_running()?;
        self.topics.get_topic(name).await
    }

    /// The topic named `name`, without creating it.
    pub async fn find_topic(&self, name: &str) -> Result<Option<TopicHandle>, RuntimeError> {
        self.ensure_running()?;
        self.topics.find_topic(name).await
    }

    pub async fn event_publisher(&self, topic_name: &str) -> Result<EventPublisher, RuntimeError> {
        self.ensure_running()?;
        self.topics.event_publisher(topic_name).await
    }

    /// Subscribe a registered agent to `topic_name`.
    pub async fn subscribe(
        &self,
        agent: &mut Agent,
        topic_name: &str,
    ) -> Result<Subscription, RuntimeError> {
        self.ensure_running()?;
        self.subscriptions.subscribe(agent, topic_name).await
    }

    /// Unsubscribe a registered agent from `topic_name`. Returns `false` when
    /// it was not subscribed.
    pub async fn unsubscribe(
        &self,
        agent: &mut Agent,
        topic_name: &str,
    ) -> Result<bool, RuntimeError> {
        self.ensure_running()?;
        self.subscriptions.unsubscribe(agent, topic_name).await
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Close the directory session and destroy the transport. Later calls
    /// fail with [`RuntimeError::ShutDown`].
    ///
    /// Holons still registered at this point stay listed in the directory
    /// but can no longer be reached.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.session.close().await;
        self.communicator.destroy().await;
        info!("runtime: shut down");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
