//! Object identities in `category/name` format.
//!
//! Every object the local adapter dispatches and the directory lists is keyed
//! by an [`Identity`].  Holons derive theirs from their name, so a holon named
//! `sensor-1` has the identity `{ category: "", name: "sensor-1" }` and a
//! holon named `plant/sensor-1` lands in the `plant` category.
//!
//! # Format
//!
//! ```text
//! plant/sensor-1
//! └───┘ └──────┘
//! category  name
//! ```
//!
//! A backslash escapes the next character, so `/` and `\` can appear inside
//! either part (`a\/b` is the single name `a/b`).  At most one unescaped `/`
//! is allowed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when parsing a stringified identity.
#[derive(Debug, Error, PartialEq)]
pub enum IdentityError {
    #[error("empty name in identity: '{0}'")]
    EmptyName(String),

    #[error("more than one unescaped '/' in identity: '{0}'")]
    TooManySeparators(String),

    #[error("dangling '\\' at end of identity: '{0}'")]
    DanglingEscape(String),
}

/// The key of a remotely reachable object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    /// Optional grouping prefix; empty for plain holon names.
    #[serde(default)]
    pub category: String,
    /// The object name. Never empty.
    pub name: String,
}

impl Identity {
    /// Construct from pre-validated parts.
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
        }
    }

    /// Parse a stringified identity, honouring `\` escapes.
    pub fn parse(s: &str) -> Result<Self, IdentityError> {
        let mut parts: Vec<String> = vec![String::new()];
        let mut chars = s.chars();

        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    let escaped = chars
                        .next()
                        .ok_or_else(|| IdentityError::DanglingEscape(s.to_string()))?;
                    if let Some(last) = parts.last_mut() {
                        last.push(escaped);
                    }
                }
                '/' => {
                    if parts.len() == 2 {
                        return Err(IdentityError::TooManySeparators(s.to_string()));
                    }
                    parts.push(String::new());
                }
                other => {
                    if let Some(last) = parts.last_mut() {
                        last.push(other);
                    }
                }
            }
        }

        let (category, name) = match parts.len() {
            1 => (String::new(), parts.remove(0)),
            _ => {
                let name = parts.remove(1);
                (parts.remove(0), name)
            }
        };

        if name.is_empty() {
            return Err(IdentityError::EmptyName(s.to_string()));
        }

        Ok(Self { category, name })
    }
}

fn escape(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for c in part.chars() {
        if c == '/' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.category.is_empty() {
            write!(f, "{}", escape(&self.name))
        } else {
            write!(f, "{}/{}", escape(&self.category), escape(&self.name))
        }
    }
}

impl std::str::FromStr for Identity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
