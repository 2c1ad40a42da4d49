//! Object registration against the local adapter and the directory.
//!
//! [`ObjectRegistry::register`] makes a holon locally dispatchable and lists
//! it in the directory under its declared type.  Registration uses
//! create-or-update semantics: if the directory already lists the identity
//! (typically left behind by a previous run of the same process), the entry
//! is updated to point at the new proxy instead of failing.
//!
//! [`ObjectRegistry::deregister`] removes the directory entry first and the
//! local adapter entry second.  A directory entry that is already gone, or a
//! directory that cannot be reached, is logged and does not stop the local
//! removal.
//!
//! Two agents with the same name in one process share an identity, so the
//! one registered last owns the adapter entry and the directory entry.  A
//! failed registration hands the entry back to the previous owner, and
//! deregistering an agent that no longer owns the entry only detaches it.
//!
//! Holons must be deregistered before the process exits; otherwise the
//! directory keeps a ghost entry that later callers cannot reach.

use std::sync::Arc;

use holonet_core::{Identity, ObjectProxy};
use tracing::{info, warn};

use crate::error::RuntimeError;
use crate::holon::{Agent, Holon};
use crate::middleware::{AddObjectOutcome, ObjectAdapter, Query, RemoveObjectOutcome};
use crate::session::DirectorySession;

/// Which directory path a registration took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// A new directory entry was created.
    Added,
    /// An entry with the same identity existed and now points at this proxy.
    Updated,
}

/// What happened to the directory entry during deregistration. The local
/// adapter entry is removed in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deregistration {
    Removed,
    /// The directory no longer listed the holon.
    DirectoryEntryMissing,
    /// The directory could not be asked; its entry may linger.
    DirectoryUnavailable,
    /// A later agent with the same name owns the entries; only this agent
    /// was detached.
    Superseded,
}

/// Registers and deregisters holons.
pub struct ObjectRegistry {
    adapter: Arc<dyn ObjectAdapter>,
    session: Arc<DirectorySession>,
    query: Arc<dyn Query>,
}

impl ObjectRegistry {
    pub fn new(
        adapter: Arc<dyn ObjectAdapter>,
        session: Arc<DirectorySession>,
        query: Arc<dyn Query>,
    ) -> Self {
        Self {
            adapter,
            session,
            query,
        }
    }

    /// Register `agent` locally and in the directory, storing its proxy on it.
    ///
    /// If the directory step fails the local entry is rolled back, handing
    /// it back to the servant it displaced if there was one, and the agent is
    /// left unregistered.
    pub async fn register(&self, agent: &mut Agent) -> Result<Registration, RuntimeError> {
        if agent.is_registered() {
            return Err(RuntimeError::AlreadyRegistered(agent.name().to_string()));
        }

        let identity = Identity::parse(agent.name())?;
        let hosted = self
            .adapter
            .add(Arc::clone(agent.holon()), identity.clone())
            .await?;
        let proxy = hosted.proxy;
        agent.attach(proxy.clone());

        match self.list(&proxy, agent.hms_type()).await {
            Ok(outcome) => {
                info!("registry: registered {proxy} as {} ({outcome:?})", agent.hms_type());
                Ok(outcome)
            }
            Err(e) => {
                warn!("registry: directory registration of {} failed: {e}", agent.name());
                agent.detach();
                self.roll_back(&identity, hosted.displaced).await;
                Err(e)
            }
        }
    }

    /// Put the adapter back the way it was before a failed registration.
    async fn roll_back(&self, identity: &Identity, displaced: Option<Arc<dyn Holon>>) {
        let restored = match displaced {
            Some(previous) => self.adapter.add(previous, identity.clone()).await.map(|_| ()),
            None => self.adapter.remove(identity).await.map(|_| ()),
        };
        if let Err(e) = restored {
            warn!("registry: rolling back local entry {identity} failed: {e}");
        }
    }

    async fn list(&self, proxy: &ObjectProxy, type_id: &str) -> Result<Registration, RuntimeError> {
        let admin = self.session.admin().await?;
        match admin.add_object_with_type(proxy, type_id).await? {
            AddObjectOutcome::Added => Ok(Registration::Added),
            AddObjectOutcome::AlreadyExists => {
                info!("registry: {} already listed, updating entry", proxy.identity);
                admin.update_object(proxy).await?;
                Ok(Registration::Updated)
            }
        }
    }

    /// Whether the adapter currently dispatches `agent`'s identity to
    /// `agent`'s own holon.
    pub fn hosts(&self, agent: &Agent) -> bool {
        agent
            .proxy()
            .and_then(|proxy| self.adapter.find(&proxy.identity))
            .is_some_and(|servant| agent.is_served_by(&servant))
    }

    /// Remove `agent` from the directory and then from the local adapter.
    ///
    /// The agent stays registered if the local removal fails.
    pub async fn deregister(&self, agent: &mut Agent) -> Result<Deregistration, RuntimeError> {
        let identity = match agent.proxy() {
            Some(proxy) => proxy.identity.clone(),
            None => return Err(RuntimeError::NotRegistered(agent.name().to_string())),
        };

        if !self.hosts(agent) {
            info!("registry: {identity} belongs to a newer registration, detaching only");
            agent.detach();
            return Ok(Deregistration::Superseded);
        }

        let outcome = match self.session.admin().await {
            Ok(admin) => match admin.remove_object(&identity).await {
                Ok(RemoveObjectOutcome::Removed) => Deregistration::Removed,
                Ok(RemoveObjectOutcome::NotFound) => {
                    info!("registry: {identity} was not listed in the directory");
                    Deregistration::DirectoryEntryMissing
                }
                Err(e) => {
                    warn!("registry: could not deregister {identity} from the directory: {e}");
                    Deregistration::DirectoryUnavailable
                }
            },
            Err(e) => {
                warn!("registry: could not deregister {identity} from the directory: {e}");
                Deregistration::DirectoryUnavailable
            }
        };

        self.adapter.remove(&identity).await?;
        agent.detach();
        info!("registry: deregistered {identity}");
        Ok(outcome)
    }

    /// Every holon the directory lists under `type_id`.
    pub async fn find_by_type(&self, type_id: &str) -> Result<Vec<ObjectProxy>, RuntimeError> {
        Ok(self.query.find_all_objects_by_type(type_id).await?)
    }

    /// The directory entry for the holon named `name`, if any.
    pub async fn find(&self, name: &str) -> Result<Option<ObjectProxy>, RuntimeError> {
        let identity = Identity::parse(name)?;
        Ok(self.query.find_object_by_id(&identity).await?)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::config::{RuntimeConfig, ADAPTER_NAME};
    use crate::error::MiddlewareError;
    use crate::holon::{LoggingHolon, MailboxHolon};
    use crate::memory::MemoryGrid;
    use crate::middleware::{Communicator, Hosted, Transport};

    async fn registry_on(grid: &MemoryGrid) -> (ObjectRegistry, Arc<dyn ObjectAdapter>) {
        let communicator = communicator_on(grid).await;
        let adapter = communicator.create_object_adapter(ADAPTER_NAME).await.unwrap();
        adapter.activate().await.unwrap();
        let session = Arc::new(DirectorySession::connect(communicator.registry()).await);
        let registry = ObjectRegistry::new(Arc::clone(&adapter), session, communicator.query());
        (registry, adapter)
    }

    /// Hosts servants normally but can never remove them.
    #[derive(Default)]
    struct StuckAdapter {
        servant: Mutex<Option<Arc<dyn Holon>>>,
    }

    #[async_trait]
    impl ObjectAdapter for StuckAdapter {
        async fn activate(&self) -> Result<(), MiddlewareError> {
            Ok(())
        }

        async fn add(
            &self,
            servant: Arc<dyn Holon>,
            identity: Identity,
        ) -> Result<Hosted, MiddlewareError> {
            let displaced = self.servant.lock().unwrap().replace(servant);
            Ok(Hosted {
                proxy: ObjectProxy::new(identity, "stuck-1", "tcp -h 127.0.0.1"),
                displaced,
            })
        }

        async fn remove(
            &self,
            _identity: &Identity,
        ) -> Result<Option<Arc<dyn Holon>>, MiddlewareError> {
            Err(MiddlewareError::Other("adapter refuses removal".into()))
        }

        fn find(&self, _identity: &Identity) -> Option<Arc<dyn Holon>> {
            self.servant.lock().unwrap().clone()
        }
    }

    async fn communicator_on(grid: &MemoryGrid) -> Arc<dyn Communicator> {
        let props = RuntimeConfig::default().transport_properties(IpAddr::V4(Ipv4Addr::LOCALHOST));
        grid.initialize(&props).await.unwrap()
    }

    fn sensor(name: &str) -> Agent {
        Agent::new(Arc::new(LoggingHolon::new(name).with_type("::demo::Sensor")))
    }

    #[tokio::test]
    async fn register_lists_holon_under_its_type() {
        let grid = MemoryGrid::new();
        let (registry, adapter) = registry_on(&grid).await;
        let mut agent = sensor("sensor-1");

        let outcome = registry.register(&mut agent).await.unwrap();
        assert_eq!(outcome, Registration::Added);
        assert!(agent.is_registered());
        assert!(adapter.find(&Identity::new("", "sensor-1")).is_some());

        let found = registry.find_by_type("::demo::Sensor").await.unwrap();
        assert_eq!(found, vec![agent.proxy().unwrap().clone()]);
    }

    #[tokio::test]
    async fn second_registration_with_same_name_updates() {
        let grid = MemoryGrid::new();
        let (registry, _) = registry_on(&grid).await;

        let mut first = sensor("sensor-1");
        let mut second = sensor("sensor-1");
        assert_eq!(registry.register(&mut first).await.unwrap(), Registration::Added);
        assert_eq!(registry.register(&mut second).await.unwrap(), Registration::Updated);
        assert_eq!(registry.find_by_type("::demo::Sensor").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn restarted_process_takes_over_stale_entry() {
        let grid = MemoryGrid::new();
        let (old, _) = registry_on(&grid).await;
        let mut before_crash = sensor("sensor-1");
        old.register(&mut before_crash).await.unwrap();

        let (new, _) = registry_on(&grid).await;
        let mut after_restart = sensor("sensor-1");
        assert_eq!(new.register(&mut after_restart).await.unwrap(), Registration::Updated);

        let listed = new.find("sensor-1").await.unwrap().unwrap();
        assert_eq!(&listed, after_restart.proxy().unwrap());
        assert_ne!(listed.adapter_id, before_crash.proxy().unwrap().adapter_id);
    }

    #[tokio::test]
    async fn registering_the_same_agent_value_twice_is_rejected() {
        let grid = MemoryGrid::new();
        let (registry, _) = registry_on(&grid).await;
        let mut agent = sensor("sensor-1");
        registry.register(&mut agent).await.unwrap();
        assert!(matches!(
            registry.register(&mut agent).await,
            Err(RuntimeError::AlreadyRegistered(_))
        ));
    }

    #[tokio::test]
    async fn failed_directory_registration_rolls_back() {
        let grid = MemoryGrid::new();
        let (registry, adapter) = registry_on(&grid).await;
        grid.set_reachable(false);

        let mut agent = sensor("sensor-1");
        let err = registry.register(&mut agent).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Middleware(ref e) if e.is_transient()));
        assert!(!agent.is_registered());
        assert!(adapter.find(&Identity::new("", "sensor-1")).is_none());
    }

    #[tokio::test]
    async fn register_survives_session_expiry() {
        let grid = MemoryGrid::new();
        let (registry, _) = registry_on(&grid).await;
        grid.expire_sessions();

        let mut agent = sensor("sensor-1");
        registry.register(&mut agent).await.unwrap();
        assert_eq!(grid.sessions_created(), 2);
    }

    #[tokio::test]
    async fn invalid_name_is_rejected_before_anything_is_added() {
        let grid = MemoryGrid::new();
        let (registry, adapter) = registry_on(&grid).await;
        let mut agent = sensor("a/b/c");
        assert!(matches!(
            registry.register(&mut agent).await,
            Err(RuntimeError::Identity(_))
        ));
        assert!(!agent.is_registered());
        assert!(adapter.find(&Identity::new("a", "b/c")).is_none());
    }

    #[tokio::test]
    async fn deregister_removes_directory_and_local_entries() {
        let grid = MemoryGrid::new();
        let (registry, adapter) = registry_on(&grid).await;
        let mut agent = Agent::new(Arc::new(MailboxHolon::new("worker")));
        registry.register(&mut agent).await.unwrap();

        assert_eq!(registry.deregister(&mut agent).await.unwrap(), Deregistration::Removed);
        assert!(!agent.is_registered());
        assert!(!grid.is_listed("worker"));
        assert!(adapter.find(&Identity::new("", "worker")).is_none());
    }

    #[tokio::test]
    async fn deregister_with_missing_directory_entry_still_removes_locally() {
        let grid = MemoryGrid::new();
        let (registry, adapter) = registry_on(&grid).await;
        let mut agent = sensor("sensor-1");
        registry.register(&mut agent).await.unwrap();

        // Someone else already cleaned the directory up.
        let identity = agent.proxy().unwrap().identity.clone();
        registry.session.admin().await.unwrap().remove_object(&identity).await.unwrap();

        let outcome = registry.deregister(&mut agent).await.unwrap();
        assert_eq!(outcome, Deregistration::DirectoryEntryMissing);
        assert!(adapter.find(&identity).is_none());
    }

    #[tokio::test]
    async fn deregister_with_directory_down_still_removes_locally() {
        let grid = MemoryGrid::new();
        let (registry, adapter) = registry_on(&grid).await;
        let mut agent = sensor("sensor-1");
        registry.register(&mut agent).await.unwrap();
        grid.set_reachable(false);

        let outcome = registry.deregister(&mut agent).await.unwrap();
        assert_eq!(outcome, Deregistration::DirectoryUnavailable);
        assert!(adapter.find(&Identity::new("", "sensor-1")).is_none());
    }

    #[tokio::test]
    async fn deregister_unregistered_agent_is_an_error() {
        let grid = MemoryGrid::new();
        let (registry, _) = registry_on(&grid).await;
        let mut agent = sensor("sensor-1");
        assert!(matches!(
            registry.deregister(&mut agent).await,
            Err(RuntimeError::NotRegistered(_))
        ));
    }

    #[tokio::test]
    async fn failed_registration_hands_entry_back_to_namesake() {
        let grid = MemoryGrid::new();
        let (registry, adapter) = registry_on(&grid).await;
        let mut first = sensor("sensor-1");
        registry.register(&mut first).await.unwrap();

        grid.set_reachable(false);
        let mut second = sensor("sensor-1");
        assert!(registry.register(&mut second).await.is_err());
        grid.set_reachable(true);

        assert!(!second.is_registered());
        assert!(first.is_registered());
        assert!(registry.hosts(&first));
        let servant = adapter.find(&Identity::new("", "sensor-1")).unwrap();
        assert!(first.is_served_by(&servant));
        assert!(grid.resolve(first.proxy().unwrap()).is_some());
        assert!(grid.is_listed("sensor-1"));
    }

    #[tokio::test]
    async fn deregistering_superseded_agent_leaves_successor_alone() {
        let grid = MemoryGrid::new();
        let (registry, _) = registry_on(&grid).await;
        let mut first = sensor("sensor-1");
        let mut second = sensor("sensor-1");
        registry.register(&mut first).await.unwrap();
        registry.register(&mut second).await.unwrap();
        assert!(!registry.hosts(&first));

        let outcome = registry.deregister(&mut first).await.unwrap();
        assert_eq!(outcome, Deregistration::Superseded);
        assert!(!first.is_registered());

        assert!(second.is_registered());
        assert!(registry.hosts(&second));
        assert!(grid.is_listed("sensor-1"));
        assert!(grid.resolve(second.proxy().unwrap()).is_some());

        assert_eq!(registry.deregister(&mut second).await.unwrap(), Deregistration::Removed);
        assert!(!grid.is_listed("sensor-1"));
    }

    #[tokio::test]
    async fn failed_local_removal_keeps_agent_registered() {
        let grid = MemoryGrid::new();
        let communicator = communicator_on(&grid).await;
        let session = Arc::new(DirectorySession::connect(communicator.registry()).await);
        let registry = ObjectRegistry::new(
            Arc::new(StuckAdapter::default()),
            session,
            communicator.query(),
        );
        let mut agent = sensor("sensor-1");
        registry.register(&mut agent).await.unwrap();

        let err = registry.deregister(&mut agent).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Middleware(MiddlewareError::Other(_))));
        assert!(agent.is_registered());
        assert!(registry.hosts(&agent));
    }
}
