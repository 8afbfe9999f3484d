//! quorumkv-common: shared types for the quorumkv project.
//!
//! Provides the `NodeAddr` node identity and the `VersionedValue` pair that
//! every storage node holds per key.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

// ---------------------------------------------------------------------------
// NodeAddr
// ---------------------------------------------------------------------------

/// Identity of a storage node: its base URL, e.g. `http://127.0.0.1:8081`.
///
/// Trailing slashes are stripped on construction so that `"http://a:1/"` and
/// `"http://a:1"` name the same node and request paths can be appended
/// directly.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct NodeAddr(String);

impl NodeAddr {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let trimmed = url.trim().trim_end_matches('/');
        Self(trimmed.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build the full URL for a path on this node (`path` starts with `/`).
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.0, path)
    }
}

impl From<String> for NodeAddr {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for NodeAddr {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<NodeAddr> for String {
    fn from(addr: NodeAddr) -> Self {
        addr.0
    }
}

impl fmt::Debug for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeAddr({})", self.0)
    }
}

impl fmt::Display for NodeAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// VersionedValue
// ---------------------------------------------------------------------------

/// A value together with its last-write-wins version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedValue {
    pub value: String,
    pub version: u64,
}

impl VersionedValue {
    pub fn new(value: impl Into<String>, version: u64) -> Self {
        Self {
            value: value.into(),
            version,
        }
    }

    /// Stamp a value with the current wall-clock time in milliseconds.
    pub fn now(value: impl Into<String>) -> Self {
        Self::new(value, now_ms())
    }
}

/// Milliseconds since the Unix epoch. Ties between concurrent writers are
/// possible; resolution is last-write-wins on this number.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
