//! Provisioned infrastructure outputs
//!
//! A [`ResourceDescriptor`] holds the named values exported by the
//! infrastructure definitions once provisioning has completed. It is parsed
//! from the provider's machine-readable output document and never patched:
//! re-provisioning produces a new descriptor.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, InfraError>;

#[derive(Debug, Error)]
pub enum InfraError {
    /// The output does not exist yet (provisioning has not completed)
    #[error("output '{key}' not found: infrastructure has not been provisioned")]
    NotFound { key: OutputKey },

    #[error("unknown output '{0}'")]
    UnknownKey(String),

    #[error("failed to parse outputs document: {0}")]
    Parse(#[from] serde_json::Error),
}

impl InfraError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, InfraError::NotFound { .. })
    }
}

/// Outputs exported by the infrastructure definitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKey {
    ClusterName,
    ClusterEndpoint,
    ClusterVersion,
    EcrRepositoryUrl,
    ConfigureKubectl,
    NodeGroupStatus,
}

impl OutputKey {
    pub const ALL: [OutputKey; 6] = [
        OutputKey::ClusterName,
        OutputKey::ClusterEndpoint,
        OutputKey::ClusterVersion,
        OutputKey::EcrRepositoryUrl,
        OutputKey::ConfigureKubectl,
        OutputKey::NodeGroupStatus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputKey::ClusterName => "cluster_name",
            OutputKey::ClusterEndpoint => "cluster_endpoint",
            OutputKey::ClusterVersion => "cluster_version",
            OutputKey::EcrRepositoryUrl => "ecr_repository_url",
            OutputKey::ConfigureKubectl => "configure_kubectl",
            OutputKey::NodeGroupStatus => "node_group_status",
        }
    }
}

impl fmt::Display for OutputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputKey {
    type Err = InfraError;

    fn from_str(s: &str) -> Result<Self> {
        OutputKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| InfraError::UnknownKey(s.to_string()))
    }
}

/// One entry of the provider's output document
#[derive(Debug, Clone, Deserialize)]
struct RawOutput {
    value: serde_json::Value,
    #[serde(default)]
    sensitive: bool,
}

/// A resolved output value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputValue {
    pub value: String,
    pub sensitive: bool,
}

impl OutputValue {
    /// Value safe to print
    pub fn display(&self) -> &str {
        if self.sensitive { "<sensitive>" } else { &self.value }
    }
}

/// Named outputs of a completed provisioning
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceDescriptor {
    values: BTreeMap<OutputKey, OutputValue>,
}

impl ResourceDescriptor {
    /// Parses a `{"name": {"value": ..., "sensitive": bool}}` document
    ///
    /// Names outside the known output set are ignored. Non-string values are
    /// kept as compact JSON text.
    pub fn from_json(document: &str) -> Result<Self> {
        let raw: BTreeMap<String, RawOutput> = serde_json::from_str(document)?;

        let values = raw
            .into_iter()
            .filter_map(|(name, output)| {
                let key = name.parse::<OutputKey>().ok()?;
                let value = match output.value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                Some((
                    key,
                    OutputValue {
                        value,
                        sensitive: output.sensitive,
                    },
                ))
            })
            .collect();

        Ok(Self { values })
    }

    /// Returns the provider value for `key`
    pub fn lookup(&self, key: OutputKey) -> Result<&str> {
        self.values
            .get(&key)
            .map(|output| output.value.as_str())
            .ok_or(InfraError::NotFound { key })
    }

    pub fn get(&self, key: OutputKey) -> Option<&OutputValue> {
        self.values.get(&key)
    }

    /// True when nothing has been provisioned
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (OutputKey, &OutputValue)> {
        self.values.iter().map(|(key, value)| (*key, value))
    }
}
