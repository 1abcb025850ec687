//! Container records as reported by cluster engines

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Substring of the status text that marks a running container
const RUNNING_MARKER: &str = "Up";

/// Exposed port of a container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Port {
    #[serde(rename = "IP")]
    pub ip: String,
    pub private_port: u16,
    pub public_port: u16,
    #[serde(rename = "Type")]
    pub port_type: String,
}

/// Container list entry, in the engine's `/containers/json` wire format
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Container {
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub names: Vec<String>,
    pub image: String,
    pub command: String,
    /// Creation time in unix seconds
    pub created: i64,
    /// Free-text status, e.g. `Up 2 hours` or `Exited (0) 1 hour ago`
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub ports: Vec<Port>,
    pub size_rw: i64,
    pub size_root_fs: i64,
    /// Fields the gateway does not interpret, passed through as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Engines encode empty lists as `null`; read those as the default value
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Container {
    /// Create a container record with the given id, status and creation time
    pub fn new(id: &str, status: &str, created: i64) -> Self {
        Self {
            id: id.to_string(),
            status: status.to_string(),
            created,
            ..Default::default()
        }
    }

    /// Whether the engine reports this container as running.
    ///
    /// This is a substring match over free text and must stay one: any
    /// status containing `Up` counts as running.
    pub fn is_running(&self) -> bool {
        self.status.contains(RUNNING_MARKER)
    }

    /// Listing order: ascending by creation time
    pub fn cmp_created(&self, other: &Self) -> Ordering {
        self.created.cmp(&other.created)
    }
}

/// Sort containers newest first
pub fn sort_newest_first(containers: &mut [Container]) {
    containers.sort_by(Container::cmp_created);
    containers.reverse();
}
