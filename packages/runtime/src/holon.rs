//! Holons: the named, remotely callable objects a process exposes.
//!
//! Application behaviour lives behind the [`Holon`] trait.  The runtime only
//! ever sees an `Arc<dyn Holon>` (the servant it hands to the object adapter)
//! wrapped in an [`Agent`], which additionally records the proxy the holon
//! got when it was registered.
//!
//! Two ready-made variants are provided: [`LoggingHolon`], which only logs
//! what it receives, and [`MailboxHolon`], which queues received messages for
//! its owner to drain.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use holonet_core::{Mailbox, Message, ObjectProxy};
use tracing::{info, warn};

/// Type id under which holons are listed in the directory unless they
/// declare their own.
pub const HOLON_TYPE_ID: &str = "::hms::Holon";

/// A remotely callable holon.
///
/// Implementations must be cheap to share: the adapter keeps an `Arc` to the
/// servant and calls it from the middleware's dispatch threads.
#[async_trait]
pub trait Holon: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// The type the holon is listed under in the directory.
    fn hms_type(&self) -> &str {
        HOLON_TYPE_ID
    }

    /// Called by the middleware when a message arrives.
    async fn put_message(&self, message: Message) {
        info!(holon = self.name(), "holon: received message {message}");
    }

    /// Called by the middleware when an event is published on a topic the
    /// holon subscribed to.
    async fn new_event(&self, name: &str, _arguments: &BTreeMap<String, String>, _payload: &[u8]) {
        warn!(
            holon = self.name(),
            "holon: subscribed to a topic but new_event is not overridden (event '{name}')"
        );
    }
}

/// A generated holon name: the type's short name plus a fresh UUID.
pub fn default_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let short = full.rsplit("::").next().unwrap_or(full);
    format!("{short}_{}", uuid::Uuid::now_v7())
}

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

/// A holon that only logs incoming messages.
#[derive(Debug, Clone)]
pub struct LoggingHolon {
    name: String,
    hms_type: String,
}

impl LoggingHolon {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hms_type: HOLON_TYPE_ID.to_string(),
        }
    }

    /// A logging holon with a generated name.
    pub fn unnamed() -> Self {
        Self::new(default_name::<Self>())
    }

    pub fn with_type(mut self, hms_type: impl Into<String>) -> Self {
        self.hms_type = hms_type.into();
        self
    }
}

#[async_trait]
impl Holon for LoggingHolon {
    fn name(&self) -> &str {
        &self.name
    }

    fn hms_type(&self) -> &str {
        &self.hms_type
    }
}

/// A holon that queues every message and event it receives.
///
/// Events are converted to messages whose body is the event name and whose
/// arguments are the event arguments; the raw payload is dropped.
#[derive(Debug)]
pub struct MailboxHolon {
    name: String,
    hms_type: String,
    mailbox: Mailbox,
}

impl MailboxHolon {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hms_type: HOLON_TYPE_ID.to_string(),
            mailbox: Mailbox::new(),
        }
    }

    pub fn with_type(mut self, hms_type: impl Into<String>) -> Self {
        self.hms_type = hms_type.into();
        self
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }
}

#[async_trait]
impl Holon for MailboxHolon {
    fn name(&self) -> &str {
        &self.name
    }

    fn hms_type(&self) -> &str {
        &self.hms_type
    }

    async fn put_message(&self, message: Message) {
        tracing::debug!(holon = %self.name, "holon: queued message {message}");
        self.mailbox.push(message);
    }

    async fn new_event(&self, name: &str, arguments: &BTreeMap<String, String>, _payload: &[u8]) {
        let mut message = Message::new(name);
        message.arguments = arguments.clone();
        self.mailbox.push(message);
    }
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// An application-owned holon plus its registration state.
///
/// `proxy` is `None` until the runtime registers the agent, and is cleared
/// again on deregistration. The topics the agent subscribed to are recorded
/// so deregistration can unsubscribe from them. Only the runtime changes
/// either.
pub struct Agent {
    holon: Arc<dyn Holon>,
    proxy: Option<ObjectProxy>,
    subscriptions: BTreeSet<String>,
}

impl Agent {
    pub fn new(holon: Arc<dyn Holon>) -> Self {
        Self {
            holon,
            proxy: None,
            subscriptions: BTreeSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.holon.name()
    }

    pub fn hms_type(&self) -> &str {
        self.holon.hms_type()
    }

    pub fn holon(&self) -> &Arc<dyn Holon> {
        &self.holon
    }

    /// The remote handle, set while the agent is registered.
    pub fn proxy(&self) -> Option<&ObjectProxy> {
        self.proxy.as_ref()
    }

    pub fn is_registered(&self) -> bool {
        self.proxy.is_some()
    }

    /// Topics this agent is subscribed to, sorted.
    pub fn subscriptions(&self) -> impl Iterator<Item = &str> {
        self.subscriptions.iter().map(String::as_str)
    }

    /// Whether `servant` is this agent's holon (same allocation).
    pub(crate) fn is_served_by(&self, servant: &Arc<dyn Holon>) -> bool {
        Arc::as_ptr(servant) as *const () == Arc::as_ptr(&self.holon) as *const ()
    }

    pub(crate) fn attach(&mut self, proxy: ObjectProxy) {
        self.proxy = Some(proxy);
    }

    /// Clear the proxy and the subscription records that hung off it.
    pub(crate) fn detach(&mut self) -> Option<ObjectProxy> {
        self.subscriptions.clear();
        self.proxy.take()
    }

    pub(crate) fn record_subscription(&mut self, topic: &str) {
        self.subscriptions.insert(topic.to_string());
    }

    pub(crate) fn forget_subscription(&mut self, topic: &str) {
        self.subscriptions.remove(topic);
    }

    pub(crate) fn take_subscriptions(&mut self) -> BTreeSet<String> {
        std::mem::take(&mut self.subscriptions)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name())
            .field("proxy", &self.proxy)
            .field("subscriptions", &self.subscriptions)
            .finish()
    }
}

impl std::fmt::Display for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[Holon: {}]", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_name_uses_short_type_name() {
        let name = default_name::<LoggingHolon>();
        assert!(name.starts_with("LoggingHolon_"), "got {name}");
        assert_ne!(name, default_name::<LoggingHolon>());
    }

    #[test]
    fn logging_holon_defaults_to_generic_type() {
        let h = LoggingHolon::new("h1");
        assert_eq!(h.hms_type(), HOLON_TYPE_ID);
        assert_eq!(h.with_type("::demo::Sensor").hms_type(), "::demo::Sensor");
    }

    #[tokio::test]
    async fn mailbox_holon_queues_messages_and_events() {
        let h = MailboxHolon::new("h1");
        h.put_message(Message::new("hello")).await;
        let args = BTreeMap::from([("level".to_string(), "3".to_string())]);
        h.new_event("alarm", &args, b"raw").await;

        let queued = h.mailbox().snapshot();
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0].body, "hello");
        assert_eq!(queued[1].body, "alarm");
        assert_eq!(queued[1].arguments["level"], "3");
    }

    #[test]
    fn agent_starts_unregistered() {
        let agent = Agent::new(Arc::new(LoggingHolon::new("h1")));
        assert!(!agent.is_registered());
        assert_eq!(agent.subscriptions().count(), 0);
        assert_eq!(agent.to_string(), "[Holon: h1]");
    }

    #[test]
    fn agent_recognises_only_its_own_servant() {
        let holon: Arc<dyn Holon> = Arc::new(LoggingHolon::new("h1"));
        let agent = Agent::new(Arc::clone(&holon));
        let namesake: Arc<dyn Holon> = Arc::new(LoggingHolon::new("h1"));
        assert!(agent.is_served_by(&holon));
        assert!(!agent.is_served_by(&namesake));
    }

    #[test]
    fn detach_clears_subscription_records() {
        let mut agent = Agent::new(Arc::new(LoggingHolon::new("h1")));
        agent.attach(ObjectProxy::new(
            holonet_core::Identity::new("", "h1"),
            "holonet-1",
            "tcp -h 127.0.0.1",
        ));
        agent.record_subscription("alarms");
        agent.record_subscription("status");
        agent.forget_subscription("status");
        assert_eq!(agent.subscriptions().collect::<Vec<_>>(), vec!["alarms"]);

        agent.detach();
        assert!(!agent.is_registered());
        assert_eq!(agent.subscriptions().count(), 0);
    }
}
