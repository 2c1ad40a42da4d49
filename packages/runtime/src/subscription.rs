//! Topic subscriptions for registered holons.
//!
//! Every subscription uses the same delivery options: best-effort ordering
//! and a subscriber that is never dropped for being unreachable.
//! Subscribing a holon that is already subscribed is reported as
//! [`Subscription::Existing`], not as an error.
//!
//! The topics an agent is subscribed to are recorded on the [`Agent`] so
//! that [`SubscriptionManager::unsubscribe_all`] can drop them when the
//! holon is deregistered.

use std::sync::Arc;

use holonet_core::QosOptions;
use tracing::{debug, info, warn};

use crate::error::RuntimeError;
use crate::holon::Agent;
use crate::middleware::{SubscribeOutcome, UnsubscribeOutcome};
use crate::topics::TopicBroker;

/// Whether a subscribe call created a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscription {
    New,
    /// The holon was already subscribed; nothing changed.
    Existing,
}

/// Subscribes holons to topics.
pub struct SubscriptionManager {
    broker: Arc<TopicBroker>,
}

impl SubscriptionManager {
    pub fn new(broker: Arc<TopicBroker>) -> Self {
        Self { broker }
    }

    /// Delivery options used for every subscription.
    pub fn qos() -> QosOptions {
        QosOptions::never_evict()
    }

    /// Subscribe a registered holon to `topic_name`, creating the topic if needed.
    pub async fn subscribe(
        &self,
        agent: &mut Agent,
        topic_name: &str,
    ) -> Result<Subscription, RuntimeError> {
        let proxy = agent
            .proxy()
            .ok_or_else(|| RuntimeError::NotRegistered(agent.name().to_string()))?;

        let topic = self.broker.get_topic(topic_name).await?;
        let qos = Self::qos();
        debug!("subscription: qos {:?}", qos.to_properties());

        let subscription = match topic.subscribe_and_get_publisher(&qos, proxy).await? {
            SubscribeOutcome::Subscribed => Subscription::New,
            SubscribeOutcome::AlreadySubscribed => {
                let name = agent.name();
                info!("subscription: {name} already subscribed to '{topic_name}', that is ok");
                Subscription::Existing
            }
        };
        info!("subscription: {proxy} subscribed to {topic_name}");
        agent.record_subscription(topic_name);
        Ok(subscription)
    }

    /// Remove a holon from `topic_name`. Returns `false` when there was
    /// nothing to remove (no such topic, or not subscribed).
    pub async fn unsubscribe(
        &self,
        agent: &mut Agent,
        topic_name: &str,
    ) -> Result<bool, RuntimeError> {
        let proxy = agent
            .proxy()
            .ok_or_else(|| RuntimeError::NotRegistered(agent.name().to_string()))?;

        let Some(topic) = self.broker.find_topic(topic_name).await? else {
            info!("subscription: topic '{topic_name}' does not exist, nothing to unsubscribe");
            agent.forget_subscription(topic_name);
            return Ok(false);
        };

        let removed = match topic.unsubscribe(proxy).await? {
            UnsubscribeOutcome::Unsubscribed => {
                info!("subscription: {proxy} unsubscribed from {topic_name}");
                true
            }
            UnsubscribeOutcome::NotSubscribed => {
                info!("subscription: {} was not subscribed to '{topic_name}'", agent.name());
                false
            }
        };
        agent.forget_subscription(topic_name);
        Ok(removed)
    }

    /// Unsubscribe `agent` from every topic it subscribed to through this
    /// manager. Failures are logged and do not stop the remaining topics.
    pub async fn unsubscribe_all(&self, agent: &mut Agent) {
        for topic_name in agent.take_subscriptions() {
            if let Err(e) = self.unsubscribe(agent, &topic_name).await {
                warn!("subscription: dropping {} from '{topic_name}' failed: {e}", agent.name());
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
