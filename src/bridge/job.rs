//! Identifiers and parameters delivered by the external scheduler.

use serde::{Deserialize, Serialize};

/// Opaque identifier of a deferred job, unique among concurrently active jobs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Opaque parameters handed over with a start signal.
///
/// The bridge never inspects these; they are passed through to the
/// execution delegate untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobParams(serde_json::Value);

impl JobParams {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Parameters carrying no data.
    pub fn empty() -> Self {
        Self(serde_json::Value::Null)
    }

    /// Look up a top-level field when the parameters are a JSON object.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }
}

impl From<serde_json::Value> for JobParams {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}
