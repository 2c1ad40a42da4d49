//! Subscription delivery options.
//!
//! The broker accepts QoS as a string property map.  [`QosOptions`] is the
//! typed form; [`QosOptions::to_properties`] produces the map the broker
//! understands:
//!
//! | Key | Values |
//! |---|---|
//! | `reliability` | `""` (best effort) or `"ordered"` |
//! | `retryCount` | `"-1"` (never evict a dead subscriber) or a count |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Delivery ordering of a subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reliability {
    /// Not strictly ordered.
    #[default]
    BestEffort,
    Ordered,
}

impl Reliability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reliability::BestEffort => "",
            Reliability::Ordered => "ordered",
        }
    }
}

/// Quality-of-service options passed with a subscribe call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QosOptions {
    pub reliability: Reliability,

    /// How many failed deliveries the broker tolerates before dropping the
    /// subscriber. `None` means the subscriber is never dropped.
    pub retry_count: Option<u32>,
}

impl QosOptions {
    /// Best-effort delivery; dead subscribers are kept.
    pub fn never_evict() -> Self {
        Self {
            reliability: Reliability::BestEffort,
            retry_count: None,
        }
    }

    pub fn to_properties(&self) -> BTreeMap<String, String> {
        let retry = match self.retry_count {
            Some(n) => n.to_string(),
            None => "-1".to_string(),
        };
        BTreeMap::from([
            ("reliability".to_string(), self.reliability.as_str().to_string()),
            ("retryCount".to_string(), retry),
        ])
    }
}

impl Default for QosOptions {
    fn default() -> Self {
        Self::never_evict()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_evict_properties() {
        let props = QosOptions::never_evict().to_properties();
        assert_eq!(props["reliability"], "");
        assert_eq!(props["retryCount"], "-1");
    }

    #[test]
    fn bounded_retry_properties() {
        let qos = QosOptions {
            reliability: Reliability::Ordered,
            retry_count: Some(3),
        };
        let props = qos.to_properties();
        assert_eq!(props["reliability"], "ordered");
        assert_eq!(props["retryCount"], "3");
    }
}
