//! Named pub/sub topics, created lazily on first use.
//!
//! [`TopicBroker::get_topic`] resolves a topic by name and creates it when it
//! does not exist.  Several processes bootstrapping at once can all see the
//! topic missing and all try to create it; the ones that lose get
//! `AlreadyExists` back and simply retrieve the winner's topic.  No global
//! lock is involved and losing that race is never reported as an error.

use std::collections::BTreeMap;
use std::sync::Arc;

use holonet_core::{Message, ObjectProxy};
use tracing::info;

use crate::error::RuntimeError;
use crate::middleware::{Communicator, CreateTopicOutcome, EventSink, Topic, TopicManager};

/// Shared handle to a broker topic.
pub type TopicHandle = Arc<dyn Topic>;

/// Resolves and creates topics on the broker.
pub struct TopicBroker {
    manager: Arc<dyn TopicManager>,
    communicator: Arc<dyn Communicator>,
}

impl TopicBroker {
    pub fn new(manager: Arc<dyn TopicManager>, communicator: Arc<dyn Communicator>) -> Self {
        Self {
            manager,
            communicator,
        }
    }

    /// The topic named `name`, creating it if needed.
    pub async fn get_topic(&self, name: &str) -> Result<TopicHandle, RuntimeError> {
        if let Some(topic) = self.manager.retrieve(name).await? {
            return Ok(topic);
        }

        match self.manager.create(name).await? {
            CreateTopicOutcome::Created(topic) => {
                info!("topics: created topic '{name}'");
                Ok(topic)
            }
            CreateTopicOutcome::AlreadyExists => {
                info!("topics: '{name}' was created concurrently, retrieving it");
                self.manager
                    .retrieve(name)
                    .await?
                    .ok_or_else(|| RuntimeError::TopicVanished(name.to_string()))
            }
        }
    }

    /// The topic named `name` if it exists. Never creates it.
    pub async fn find_topic(&self, name: &str) -> Result<Option<TopicHandle>, RuntimeError> {
        Ok(self.manager.retrieve(name).await?)
    }

    /// A publisher for the topic named `name`, creating the topic if needed.
    pub async fn event_publisher(&self, name: &str) -> Result<EventPublisher, RuntimeError> {
        let topic = self.get_topic(name).await?;
        let proxy = topic.publisher().await?;
        let sink = self.communicator.event_sink(&proxy);
        Ok(EventPublisher {
            topic: name.to_string(),
            proxy,
            sink,
        })
    }
}

/// Publishes messages and events to every subscriber of a topic.
#[derive(Clone)]
pub struct EventPublisher {
    topic: String,
    proxy: ObjectProxy,
    sink: Arc<dyn EventSink>,
}

impl EventPublisher {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The broker-side publisher object.
    pub fn proxy(&self) -> &ObjectProxy {
        &self.proxy
    }

    pub async fn put_message(&self, message: Message) -> Result<(), RuntimeError> {
        Ok(self.sink.put_message(message).await?)
    }

    pub async fn new_event(
        &self,
        name: &str,
        arguments: &BTreeMap<String, String>,
        payload: &[u8],
    ) -> Result<(), RuntimeError> {
        Ok(self.sink.new_event(name, arguments, payload).await?)
    }
}

impl std::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPublisher")
            .field("topic", &self.topic)
            .field("proxy", &self.proxy)
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
