//! The message payload delivered to holons.
//!
//! Parameters and arguments always travel as strings.  The builder methods
//! stringify whatever they are given, and an absent argument value becomes
//! the empty string rather than a placeholder such as `"None"`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message sent to a holon directly or through a topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Name of the sending holon; empty when sent from outside any holon.
    #[serde(default)]
    pub sender: String,

    /// Free-form body.
    pub body: String,

    /// Positional parameters, already stringified.
    #[serde(default)]
    pub parameters: Vec<String>,

    /// Named arguments, already stringified.
    #[serde(default)]
    pub arguments: BTreeMap<String, String>,

    /// When the message was constructed.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a message with the given body, stamped with the current time.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            sender: String::new(),
            body: body.into(),
            parameters: Vec::new(),
            arguments: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn from_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = sender.into();
        self
    }

    pub fn with_parameter(mut self, value: impl ToString) -> Self {
        self.parameters.push(value.to_string());
        self
    }

    /// Add a named argument. `None` is stored as `""`.
    pub fn with_argument<V: ToString>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        let value = value.map(|v| v.to_string()).unwrap_or_default();
        self.arguments.insert(key.into(), value);
        self
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.sender.is_empty() {
            write!(f, "[{}] {}", self.created_at.to_rfc3339(), self.body)
        } else {
            write!(
                f,
                "[{}] {} from {}",
                self.created_at.to_rfc3339(),
                self.body,
                self.sender
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_are_stringified() {
        let m = Message::new("move").with_parameter(3).with_parameter(1.5).with_parameter("x");
        assert_eq!(m.parameters, vec!["3", "1.5", "x"]);
    }

    #[test]
    fn absent_argument_becomes_empty_string() {
        let m = Message::new("move")
            .with_argument("speed", Some(12))
            .with_argument::<String>("target", None);
        assert_eq!(m.arguments["speed"], "12");
        assert_eq!(m.arguments["target"], "");
    }

    #[test]
    fn display_mentions_sender() {
        let m = Message::new("hello").from_sender("Holon1");
        assert!(m.to_string().ends_with("hello from Holon1"));
    }

    #[test]
    fn deserialize_with_defaults() {
        let json = r#"{"body":"ping","created_at":"2026-01-01T00:00:00Z"}"#;
        let m: Message = serde_json::from_str(json).unwrap();
        assert_eq!(m.body, "ping");
        assert!(m.sender.is_empty());
        assert!(m.parameters.is_empty());
        assert!(m.arguments.is_empty());
    }
}
