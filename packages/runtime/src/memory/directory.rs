//! In-memory directory: admin sessions, object entries and lookup.
//!
//! Sessions remember the epoch they were opened in; bumping the epoch
//! ([`Directory::expire_sessions`]) invalidates every session opened before,
//! together with the admin handles obtained from them.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use holonet_core::{Identity, ObjectProxy};
use tracing::debug;

use super::{read, write, GridState};
use crate::error::MiddlewareError;
use crate::middleware::{
    AddObjectOutcome, Admin, AdminSession, Query, Registry, RemoveObjectOutcome,
};

struct Entry {
    proxy: ObjectProxy,
    type_id: String,
}

pub(crate) struct Directory {
    entries: RwLock<BTreeMap<Identity, Entry>>,
    epoch: AtomicU64,
    sessions_created: AtomicU64,
}

impl Directory {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            epoch: AtomicU64::new(0),
            sessions_created: AtomicU64::new(0),
        }
    }

    pub(crate) fn expire_sessions(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn sessions_created(&self) -> u64 {
        self.sessions_created.load(Ordering::SeqCst)
    }

    pub(crate) fn contains(&self, identity: &Identity) -> bool {
        read(&self.entries).contains_key(identity)
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// Validity shared between a session and the admin handles it hands out.
struct Liveness {
    born: u64,
    destroyed: AtomicBool,
}

impl Liveness {
    fn check(&self, state: &GridState) -> Result<(), MiddlewareError> {
        state.check_reachable("directory")?;
        if self.destroyed.load(Ordering::SeqCst)
            || self.born != state.directory.epoch.load(Ordering::SeqCst)
        {
            return Err(MiddlewareError::SessionExpired);
        }
        Ok(())
    }
}

pub(crate) struct MemoryRegistry {
    state: Arc<GridState>,
}

impl MemoryRegistry {
    pub(crate) fn new(state: Arc<GridState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn create_admin_session(
        &self,
        user: &str,
        _password: &str,
    ) -> Result<Arc<dyn AdminSession>, MiddlewareError> {
        self.state.check_reachable("directory")?;
        let directory = &self.state.directory;
        let n = directory.sessions_created.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("memory: admin session {n} opened for '{user}'");
        Ok(Arc::new(MemorySession {
            state: Arc::clone(&self.state),
            liveness: Arc::new(Liveness {
                born: directory.epoch.load(Ordering::SeqCst),
                destroyed: AtomicBool::new(false),
            }),
        }))
    }
}

struct MemorySession {
    state: Arc<GridState>,
    liveness: Arc<Liveness>,
}

#[async_trait]
impl AdminSession for MemorySession {
    async fn ping(&self) -> Result<(), MiddlewareError> {
        match self.liveness.check(&self.state) {
            Err(MiddlewareError::Unreachable(_)) => Err(MiddlewareError::Timeout),
            other => other,
        }
    }

    async fn admin(&self) -> Result<Arc<dyn Admin>, MiddlewareError> {
        self.liveness.check(&self.state)?;
        Ok(Arc::new(MemoryAdmin {
            state: Arc::clone(&self.state),
            liveness: Arc::clone(&self.liveness),
        }))
    }

    async fn destroy(&self) -> Result<(), MiddlewareError> {
        self.liveness.destroyed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

struct MemoryAdmin {
    state: Arc<GridState>,
    liveness: Arc<Liveness>,
}

#[async_trait]
impl Admin for MemoryAdmin {
    async fn add_object_with_type(
        &self,
        proxy: &ObjectProxy,
        type_id: &str,
    ) -> Result<AddObjectOutcome, MiddlewareError> {
        self.liveness.check(&self.state)?;
        let mut entries = write(&self.state.directory.entries);
        if entries.contains_key(&proxy.identity) {
            return Ok(AddObjectOutcome::AlreadyExists);
        }
        entries.insert(
            proxy.identity.clone(),
            Entry {
                proxy: proxy.clone(),
                type_id: type_id.to_string(),
            },
        );
        Ok(AddObjectOutcome::Added)
    }

    async fn update_object(&self, proxy: &ObjectProxy) -> Result<(), MiddlewareError> {
        self.liveness.check(&self.state)?;
        let mut entries = write(&self.state.directory.entries);
        match entries.get_mut(&proxy.identity) {
            Some(entry) => {
                entry.proxy = proxy.clone();
                Ok(())
            }
            None => Err(MiddlewareError::ObjectNotExist(proxy.identity.to_string())),
        }
    }

    async fn remove_object(
        &self,
        identity: &Identity,
    ) -> Result<RemoveObjectOutcome, MiddlewareError> {
        self.liveness.check(&self.state)?;
        let removed = write(&self.state.directory.entries).remove(identity);
        Ok(match removed {
            Some(_) => RemoveObjectOutcome::Removed,
            None => RemoveObjectOutcome::NotFound,
        })
    }
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

pub(crate) struct MemoryQuery {
    state: Arc<GridState>,
}

impl MemoryQuery {
    pub(crate) fn new(state: Arc<GridState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Query for MemoryQuery {
    async fn find_all_objects_by_type(
        &self,
        type_id: &str,
    ) -> Result<Vec<ObjectProxy>, MiddlewareError> {
        self.state.check_reachable("directory")?;
        Ok(read(&self.state.directory.entries)
            .values()
            .filter(|e| e.type_id == type_id)
            .map(|e| e.proxy.clone())
            .collect())
    }

    async fn find_object_by_id(
        &self,
        identity: &Identity,
    ) -> Result<Option<ObjectProxy>, MiddlewareError> {
        self.state.check_reachable("directory")?;
        Ok(read(&self.state.directory.entries)
            .get(identity)
            .map(|e| e.proxy.clone()))
    }
}
