//! Directory admin session: ping, detect expiry, recreate.
//!
//! The directory times admin sessions out silently.  [`DirectorySession`]
//! owns the current session and its admin handle and exposes a single
//! operation, [`DirectorySession::admin`], which always returns an admin
//! handle backed by a session that just answered a liveness check.
//!
//! # State transitions
//!
//! ```text
//! NoSession ──create──▶ Live ──ping ok───▶ Live
//!                        │
//!                        └──ping failed──▶ recreate ──▶ Live
//! ```
//!
//! Pings run without holding the lock.  Recreation runs under the lock and
//! only if nobody replaced the session since the caller took its snapshot
//! (tracked by a generation counter), so threads that detect the same expiry
//! together produce exactly one new session and all observe it.  Session and
//! admin handle are always replaced as a pair.
//!
//! A failure to create a session is returned to the caller as is; there is no
//! retry beyond the single recreation attempt.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::MiddlewareError;
use crate::middleware::{Admin, AdminSession, Registry};

/// Credentials used to open admin sessions. The directory does not check
/// them in this deployment model.
const BOOTSTRAP_USER: &str = "holonet";
const BOOTSTRAP_PASSWORD: &str = "holonet";

#[derive(Clone)]
struct LiveSession {
    session: Arc<dyn AdminSession>,
    admin: Arc<dyn Admin>,
}

struct SessionState {
    live: Option<LiveSession>,
    /// Bumped every time `live` is replaced or cleared.
    generation: u64,
}

/// Owns the admin session to the directory and keeps it alive.
pub struct DirectorySession {
    registry: Arc<dyn Registry>,
    state: Mutex<SessionState>,
}

impl DirectorySession {
    /// A manager with no session yet; the first [`admin`](Self::admin) call
    /// creates one.
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self {
            registry,
            state: Mutex::new(SessionState {
                live: None,
                generation: 0,
            }),
        }
    }

    /// A manager that tries to open a session straight away. A failure is
    /// logged and left for the first [`admin`](Self::admin) call to retry.
    pub async fn connect(registry: Arc<dyn Registry>) -> Self {
        let manager = Self::new(registry);
        {
            let mut state = manager.state.lock().await;
            match manager.open().await {
                Ok(live) => {
                    state.live = Some(live);
                    state.generation += 1;
                    info!("session: admin session established");
                }
                Err(e) => warn!("session: directory not reachable at startup: {e}"),
            }
        }
        manager
    }

    /// An admin handle whose session is live.
    pub async fn admin(&self) -> Result<Arc<dyn Admin>, MiddlewareError> {
        let (snapshot, generation) = {
            let state = self.state.lock().await;
            (state.live.clone(), state.generation)
        };

        if let Some(live) = snapshot {
            match live.session.ping().await {
                Ok(()) => return Ok(live.admin),
                Err(e) => debug!("session: ping failed ({e}), recreating"),
            }
        }

        let mut state = self.state.lock().await;
        if state.generation != generation {
            if let Some(live) = &state.live {
                debug!("session: another caller already recreated the session");
                return Ok(Arc::clone(&live.admin));
            }
        }

        let live = self.open().await?;
        let admin = Arc::clone(&live.admin);
        state.live = Some(live);
        state.generation += 1;
        info!("session: admin session (re)created, generation {}", state.generation);
        Ok(admin)
    }

    /// Number of times a session has been installed.
    pub async fn generation(&self) -> u64 {
        self.state.lock().await.generation
    }

    /// Drop the current session, closing it on the directory side.
    pub async fn close(&self) {
        let live = {
            let mut state = self.state.lock().await;
            state.generation += 1;
            state.live.take()
        };
        if let Some(live) = live {
            if let Err(e) = live.session.destroy().await {
                debug!("session: closing admin session failed: {e}");
            }
        }
    }

    async fn open(&self) -> Result<LiveSession, MiddlewareError> {
        let session = self
            .registry
            .create_admin_session(BOOTSTRAP_USER, BOOTSTRAP_PASSWORD)
            .await?;
        let admin = session.admin().await?;
        Ok(LiveSession { session, admin })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use holonet_core::{Identity, ObjectProxy};

    use super::*;
    use crate::middleware::{AddObjectOutcome, RemoveObjectOutcome};

    /// Registry whose sessions die when `epoch` moves past the one they were
    /// created in.
    #[derive(Default)]
    struct ScriptedRegistry {
        epoch: Arc<AtomicU64>,
        created: AtomicUsize,
        down: AtomicBool,
    }

    struct ScriptedSession {
        id: usize,
        born: u64,
        epoch: Arc<AtomicU64>,
    }

    struct ScriptedAdmin {
        session_id: usize,
    }

    #[async_trait]
    impl Registry for ScriptedRegistry {
        async fn create_admin_session(
            &self,
            _user: &str,
            _password: &str,
        ) -> Result<Arc<dyn AdminSession>, MiddlewareError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(MiddlewareError::Unreachable("directory".into()));
            }
            let id = self.created.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Arc::new(ScriptedSession {
                id,
                born: self.epoch.load(Ordering::SeqCst),
                epoch: Arc::clone(&self.epoch),
            }))
        }
    }

    #[async_trait]
    impl AdminSession for ScriptedSession {
        async fn ping(&self) -> Result<(), MiddlewareError> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            if self.epoch.load(Ordering::SeqCst) == self.born {
                Ok(())
            } else {
                Err(MiddlewareError::Timeout)
            }
        }

        async fn admin(&self) -> Result<Arc<dyn Admin>, MiddlewareError> {
            Ok(Arc::new(ScriptedAdmin { session_id: self.id }))
        }

        async fn destroy(&self) -> Result<(), MiddlewareError> {
            Ok(())
        }
    }

    #[async_trait]
    impl Admin for ScriptedAdmin {
        async fn add_object_with_type(
            &self,
            _proxy: &ObjectProxy,
            type_id: &str,
        ) -> Result<AddObjectOutcome, MiddlewareError> {
            Err(MiddlewareError::Other(format!(
                "session {} type {type_id}",
                self.session_id
            )))
        }

        async fn update_object(&self, _proxy: &ObjectProxy) -> Result<(), MiddlewareError> {
            Ok(())
        }

        async fn remove_object(
            &self,
            _identity: &Identity,
        ) -> Result<RemoveObjectOutcome, MiddlewareError> {
            Ok(RemoveObjectOutcome::NotFound)
        }
    }

    /// Which scripted session an admin handle belongs to.
    async fn session_of(admin: &Arc<dyn Admin>) -> String {
        let proxy = ObjectProxy::new(Identity::new("", "pinger"), "a", "e");
        match admin.add_object_with_type(&proxy, "t").await {
            Err(MiddlewareError::Other(s)) => s,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn first_call_creates_session() {
        let registry = Arc::new(ScriptedRegistry::default());
        let manager = DirectorySession::new(registry.clone());
        assert_eq!(manager.generation().await, 0);

        manager.admin().await.unwrap();
        assert_eq!(registry.created.load(Ordering::SeqCst), 1);
        assert_eq!(manager.generation().await, 1);
    }

    #[tokio::test]
    async fn live_session_is_reused() {
        let registry = Arc::new(ScriptedRegistry::default());
        let manager = DirectorySession::connect(registry.clone()).await;
        for _ in 0..3 {
            manager.admin().await.unwrap();
        }
        assert_eq!(registry.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_session_is_replaced_transparently() {
        let registry = Arc::new(ScriptedRegistry::default());
        let manager = DirectorySession::connect(registry.clone()).await;
        let before = manager.admin().await.unwrap();
        assert_eq!(session_of(&before).await, "session 1 type t");

        registry.epoch.fetch_add(1, Ordering::SeqCst);

        let after = manager.admin().await.unwrap();
        assert_eq!(session_of(&after).await, "session 2 type t");
        assert_eq!(registry.created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_repairs_collapse_into_one() {
        let registry = Arc::new(ScriptedRegistry::default());
        let manager = Arc::new(DirectorySession::connect(registry.clone()).await);
        registry.epoch.fetch_add(1, Ordering::SeqCst);

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.admin().await })
            })
            .collect();

        let mut sessions = Vec::new();
        for t in tasks {
            let admin = t.await.unwrap().unwrap();
            sessions.push(session_of(&admin).await);
        }

        assert_eq!(registry.created.load(Ordering::SeqCst), 2, "exactly one recreation");
        assert!(sessions.iter().all(|s| s == "session 2 type t"));
    }

    #[tokio::test]
    async fn unreachable_directory_surfaces_error() {
        let registry = Arc::new(ScriptedRegistry::default());
        registry.down.store(true, Ordering::SeqCst);
        let manager = DirectorySession::connect(registry.clone()).await;

        let err = manager.admin().await.err().unwrap();
        assert!(err.is_transient());

        registry.down.store(false, Ordering::SeqCst);
        manager.admin().await.unwrap();
        assert_eq!(manager.generation().await, 1);
    }

    #[tokio::test]
    async fn close_forces_a_new_session() {
        let registry = Arc::new(ScriptedRegistry::default());
        let manager = DirectorySession::connect(registry.clone()).await;
        manager.close().await;
        manager.admin().await.unwrap();
        assert_eq!(registry.created.load(Ordering::SeqCst), 2);
    }
}
