//! Wire value model shared by parameter assignments and telemetry records.
//!
//! The engine speaks plain text: every value crossing the boundary is a
//! string that is numeric most of the time. Decoding parses each scalar as
//! `f64` when possible and keeps the raw text otherwise; a `;`-separated
//! payload denotes an ordered list, parsed recursively.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One decoded engine value: a number, a text fallback, or an ordered list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Numeric scalar (the common case on the wire).
    Number(f64),
    /// Non-numeric scalar, kept verbatim.
    Text(String),
    /// Ordered sub-items, each independently number-or-text typed.
    List(Vec<Value>),
}

impl Value {
    /// Decode a raw wire payload.
    ///
    /// A payload containing `;` is an ordered list of sub-items; each
    /// sub-item decodes recursively. Scalars parse as `f64` when possible.
    #[must_use]
    pub fn decode(raw: &str) -> Self {
        if raw.contains(';') {
            return Self::List(raw.split(';').map(Self::decode).collect());
        }
        raw.parse::<f64>()
            .map_or_else(|_| Self::Text(raw.to_string()), Self::Number)
    }

    /// Get the numeric value, if this is a number.
    #[must_use]
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the text value, if this is a text scalar.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the list items, if this is a list.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    /// Render in the form the engine accepts in `set` commands.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ";")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i64> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}
