//! Remote handle values.
//!
//! An [`ObjectProxy`] is what the local object adapter hands back when an
//! object is added to it, what the directory stores, and what a subscriber
//! passes to a topic.  It carries no connection; the middleware resolves it
//! to a live object when a call is made.

use serde::{Deserialize, Serialize};

use crate::identity::Identity;

/// A handle to a remotely callable object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectProxy {
    /// The object's identity within its adapter.
    pub identity: Identity,

    /// The adapter hosting the object; unique per process.
    pub adapter_id: String,

    /// Where the adapter listens, e.g. `tcp -h 10.0.0.5:udp -h 10.0.0.5`.
    pub endpoints: String,
}

impl ObjectProxy {
    pub fn new(
        identity: Identity,
        adapter_id: impl Into<String>,
        endpoints: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            adapter_id: adapter_id.into(),
            endpoints: endpoints.into(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }
}

impl std::fmt::Display for ObjectProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -t:{}", self.identity, self.endpoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_identity_and_endpoints() {
        let p = ObjectProxy::new(
            Identity::new("", "sensor-1"),
            "holonet-1",
            "tcp -h 10.0.0.5:udp -h 10.0.0.5",
        );
        assert_eq!(p.to_string(), "sensor-1 -t:tcp -h 10.0.0.5:udp -h 10.0.0.5");
    }

    #[test]
    fn json_shape() {
        let p = ObjectProxy::new(Identity::new("plant", "sensor-1"), "holonet-1", "tcp -h x");
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["identity"]["category"], "plant");
        assert_eq!(v["identity"]["name"], "sensor-1");
        assert_eq!(v["adapter_id"], "holonet-1");
    }
}
