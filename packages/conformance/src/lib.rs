//! Shared helpers for the holonet conformance test suite.
//!
//! Provides [`spawn_process`] — a function that starts a [`HolonRuntime`] on
//! a shared [`MemoryGrid`], standing in for one OS process.  Several calls on
//! the same grid give runtimes that share a directory and a broker but have
//! separate object adapters, so a holon registered through one is only
//! reachable through its proxy from the others.

use std::sync::Arc;

use holonet::memory::MemoryGrid;
use holonet::{Agent, HolonRuntime, MailboxHolon, RuntimeConfig};

/// Directory host the conformance runtimes are configured with.  Loopback,
/// so address resolution never leaves the machine.
pub const DIRECTORY_HOST: &str = "127.0.0.1";

/// Start a runtime for one "process" on `grid`.
///
/// # Panics
///
/// Panics if the runtime fails to start.
pub async fn spawn_process(grid: &MemoryGrid) -> Arc<HolonRuntime> {
    let config = RuntimeConfig::new(DIRECTORY_HOST, RuntimeConfig::DEFAULT_PORT);
    let runtime = HolonRuntime::start(config, grid)
        .await
        .expect("start conformance runtime");
    Arc::new(runtime)
}

/// A holon that records what it receives, plus an unregistered agent for it.
pub fn mailbox_agent(name: &str, hms_type: &str) -> (Arc<MailboxHolon>, Agent) {
    let holon = Arc::new(MailboxHolon::new(name).with_type(hms_type));
    let agent = Agent::new(holon.clone());
    (holon, agent)
}
