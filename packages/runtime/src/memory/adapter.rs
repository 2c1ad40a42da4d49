//! In-memory object adapter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use holonet_core::{Identity, ObjectProxy};

use super::{read, write};
use crate::error::MiddlewareError;
use crate::holon::Holon;
use crate::middleware::{Hosted, ObjectAdapter};

/// Hosts servants by identity for one in-memory process.
///
/// Servants can be added before activation, but other processes only reach
/// them while the adapter is active.
pub struct MemoryAdapter {
    id: String,
    endpoints: String,
    servants: RwLock<HashMap<Identity, Arc<dyn Holon>>>,
    active: AtomicBool,
    deactivated: AtomicBool,
}

impl MemoryAdapter {
    pub(crate) fn new(id: String, endpoints: String) -> Self {
        Self {
            id,
            endpoints,
            servants: RwLock::new(HashMap::new()),
            active: AtomicBool::new(false),
            deactivated: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Number of servants currently hosted.
    pub fn len(&self) -> usize {
        read(&self.servants).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop dispatching for good and drop every servant.
    pub(crate) fn deactivate(&self) {
        self.deactivated.store(true, Ordering::SeqCst);
        self.active.store(false, Ordering::SeqCst);
        write(&self.servants).clear();
    }

    fn check_alive(&self) -> Result<(), MiddlewareError> {
        if self.deactivated.load(Ordering::SeqCst) {
            Err(MiddlewareError::Destroyed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ObjectAdapter for MemoryAdapter {
    async fn activate(&self) -> Result<(), MiddlewareError> {
        self.check_alive()?;
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn add(
        &self,
        servant: Arc<dyn Holon>,
        identity: Identity,
    ) -> Result<Hosted, MiddlewareError> {
        self.check_alive()?;
        let proxy = ObjectProxy::new(identity.clone(), self.id.clone(), self.endpoints.clone());
        let displaced = write(&self.servants).insert(identity, servant);
        Ok(Hosted { proxy, displaced })
    }

    async fn remove(&self, identity: &Identity) -> Result<Option<Arc<dyn Holon>>, MiddlewareError> {
        self.check_alive()?;
        Ok(write(&self.servants).remove(identity))
    }

    fn find(&self, identity: &Identity) -> Option<Arc<dyn Holon>> {
        read(&self.servants).get(identity).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holon::{LoggingHolon, HOLON_TYPE_ID};

    fn adapter() -> MemoryAdapter {
        MemoryAdapter::new("holonet-1".into(), "tcp -h 127.0.0.1".into())
    }

    #[tokio::test]
    async fn add_returns_proxy_for_this_adapter() {
        let a = adapter();
        let hosted = a
            .add(Arc::new(LoggingHolon::new("h1")), Identity::new("", "h1"))
            .await
            .unwrap();
        assert_eq!(hosted.proxy.adapter_id, "holonet-1");
        assert_eq!(hosted.proxy.endpoints, "tcp -h 127.0.0.1");
        assert!(hosted.displaced.is_none());
        assert!(a.find(&Identity::new("", "h1")).is_some());
    }

    #[tokio::test]
    async fn add_replaces_existing_servant() {
        let a = adapter();
        let id = Identity::new("", "h1");
        a.add(Arc::new(LoggingHolon::new("h1")), id.clone()).await.unwrap();
        let hosted = a
            .add(Arc::new(LoggingHolon::new("h1").with_type("::demo::T")), id.clone())
            .await
            .unwrap();
        assert_eq!(hosted.displaced.unwrap().hms_type(), HOLON_TYPE_ID);
        assert_eq!(a.len(), 1);
        assert_eq!(a.find(&id).unwrap().hms_type(), "::demo::T");
    }

    #[tokio::test]
    async fn remove_unknown_is_none() {
        let a = adapter();
        assert!(a.remove(&Identity::new("", "nobody")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deactivated_adapter_rejects_calls() {
        let a = adapter();
        a.activate().await.unwrap();
        a.deactivate();
        assert!(!a.is_active());
        assert_eq!(
            a.activate().await.unwrap_err(),
            MiddlewareError::Destroyed
        );
    }
}
