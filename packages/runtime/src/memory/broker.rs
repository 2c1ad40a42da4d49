//! In-memory topic broker.
//!
//! `retrieve` and `create` are each atomic but not atomic together, so two
//! processes can both miss a topic and race to create it, exactly like
//! against a real broker.  Subscription records are keyed by the
//! subscriber's identity, one per (subscriber, topic) pair.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, Weak};

use async_trait::async_trait;
use holonet_core::{Identity, ObjectProxy, QosOptions};
use tracing::{debug, warn};

use super::{read, write, Call, GridState, BROKER_ADAPTER_ID};
use crate::error::MiddlewareError;
use crate::middleware::{
    CreateTopicOutcome, SubscribeOutcome, Topic, TopicManager, UnsubscribeOutcome,
};

struct Subscriber {
    proxy: ObjectProxy,
    qos: QosOptions,
    failures: u32,
}

pub(crate) struct Broker {
    topics: RwLock<BTreeMap<String, Arc<MemoryTopic>>>,
}

impl Broker {
    pub(crate) fn new() -> Self {
        Self {
            topics: RwLock::new(BTreeMap::new()),
        }
    }

    pub(crate) fn topic_names(&self) -> Vec<String> {
        read(&self.topics).keys().cloned().collect()
    }

    pub(crate) fn subscriber_count(&self, name: &str) -> Option<usize> {
        let topic = read(&self.topics).get(name).cloned()?;
        let count = read(&topic.subscribers).len();
        Some(count)
    }

    /// Deliver `call` to every subscriber of `topic_name`.
    ///
    /// A subscriber that cannot be resolved counts a failure; it is dropped
    /// once its failures exceed its `retry_count`, and kept forever when
    /// `retry_count` is `None`.
    pub(crate) async fn fan_out(
        &self,
        grid: &GridState,
        topic_name: &str,
        call: Call,
    ) -> Result<(), MiddlewareError> {
        let topic = read(&self.topics)
            .get(topic_name)
            .cloned()
            .ok_or_else(|| MiddlewareError::ObjectNotExist(format!("topic {topic_name}")))?;

        let targets: Vec<ObjectProxy> = read(&topic.subscribers)
            .values()
            .map(|s| s.proxy.clone())
            .collect();

        for proxy in targets {
            match grid.resolve(&proxy) {
                Some(servant) => {
                    call.clone().dispatch(servant.as_ref()).await;
                    topic.record_success(&proxy.identity);
                }
                None => topic.record_failure(&proxy),
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

pub(crate) struct MemoryTopic {
    name: String,
    publisher: ObjectProxy,
    subscribers: RwLock<BTreeMap<Identity, Subscriber>>,
    state: Weak<GridState>,
}

impl MemoryTopic {
    fn new(name: &str, state: Weak<GridState>) -> Self {
        Self {
            name: name.to_string(),
            publisher: ObjectProxy::new(
                Identity::new("publish", name),
                BROKER_ADAPTER_ID,
                "tcp -h broker",
            ),
            subscribers: RwLock::new(BTreeMap::new()),
            state,
        }
    }

    fn check_reachable(&self) -> Result<(), MiddlewareError> {
        match self.state.upgrade() {
            Some(state) => state.check_reachable("broker"),
            None => Err(MiddlewareError::Destroyed),
        }
    }

    fn record_success(&self, identity: &Identity) {
        if let Some(s) = write(&self.subscribers).get_mut(identity) {
            s.failures = 0;
        }
    }

    fn record_failure(&self, proxy: &ObjectProxy) {
        let mut subscribers = write(&self.subscribers);
        let Some(s) = subscribers.get_mut(&proxy.identity) else {
            return;
        };
        s.failures += 1;
        let failures = s.failures;
        let retry_count = s.qos.retry_count;
        match retry_count {
            Some(limit) if failures > limit => {
                warn!("memory: dropping dead subscriber {proxy} from '{}'", self.name);
                subscribers.remove(&proxy.identity);
            }
            _ => debug!(
                "memory: subscriber {proxy} of '{}' unreachable ({failures} failures)",
                self.name
            ),
        }
    }
}

#[async_trait]
impl Topic for MemoryTopic {
    fn name(&self) -> &str {
        &self.name
    }

    async fn subscribe_and_get_publisher(
        &self,
        qos: &QosOptions,
        subscriber: &ObjectProxy,
    ) -> Result<SubscribeOutcome, MiddlewareError> {
        self.check_reachable()?;
        let mut subscribers = write(&self.subscribers);
        if subscribers.contains_key(&subscriber.identity) {
            return Ok(SubscribeOutcome::AlreadySubscribed);
        }
        subscribers.insert(
            subscriber.identity.clone(),
            Subscriber {
                proxy: subscriber.clone(),
                qos: qos.clone(),
                failures: 0,
            },
        );
        Ok(SubscribeOutcome::Subscribed)
    }

    async fn unsubscribe(
        &self,
        subscriber: &ObjectProxy,
    ) -> Result<UnsubscribeOutcome, MiddlewareError> {
        self.check_reachable()?;
        Ok(match write(&self.subscribers).remove(&subscriber.identity) {
            Some(_) => UnsubscribeOutcome::Unsubscribed,
            None => UnsubscribeOutcome::NotSubscribed,
        })
    }

    async fn publisher(&self) -> Result<ObjectProxy, MiddlewareError> {
        self.check_reachable()?;
        Ok(self.publisher.clone())
    }
}

// ---------------------------------------------------------------------------
// TopicManager
// ---------------------------------------------------------------------------

pub(crate) struct MemoryTopicManager {
    state: Arc<GridState>,
}

impl MemoryTopicManager {
    pub(crate) fn new(state: Arc<GridState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl TopicManager for MemoryTopicManager {
    async fn retrieve(&self, name: &str) -> Result<Option<Arc<dyn Topic>>, MiddlewareError> {
        self.state.check_reachable("broker")?;
        let topic = read(&self.state.broker.topics).get(name).cloned();
        Ok(topic.map(|t| t as Arc<dyn Topic>))
    }

    async fn create(&self, name: &str) -> Result<CreateTopicOutcome, MiddlewareError> {
        self.state.check_reachable("broker")?;
        let mut topics = write(&self.state.broker.topics);
        if topics.contains_key(name) {
            return Ok(CreateTopicOutcome::AlreadyExists);
        }
        let topic = Arc::new(MemoryTopic::new(name, Arc::downgrade(&self.state)));
        topics.insert(name.to_string(), Arc::clone(&topic));
        Ok(CreateTopicOutcome::Created(topic))
    }
}
