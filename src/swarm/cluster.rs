//! Cluster-wide container view

use super::container::Container;
use super::node::{EngineClient, Node, NodeState};
use crate::error::{GatewayError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};
use uuid::Uuid;

/// Read access to the cluster, as consumed by the API handlers
pub trait Cluster: Send + Sync {
    /// Snapshot of every container known cluster-wide
    fn containers(&self) -> Vec<Container>;
}

/// Cluster of container engines, refreshed by polling each engine
pub struct SwarmCluster {
    /// Cluster ID
    id: String,
    /// Nodes in the cluster, by node ID
    nodes: RwLock<HashMap<String, Node>>,
    /// Created timestamp
    created_at: DateTime<Utc>,
}

impl SwarmCluster {
    /// Create an empty cluster
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            nodes: RwLock::new(HashMap::new()),
            created_at: Utc::now(),
        }
    }

    /// Get cluster ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Add a node to the cluster
    pub fn add_node(&self, node: Node) -> Result<()> {
        let mut nodes = self
            .nodes
            .write()
            .map_err(|_| GatewayError::Lock("Failed to acquire write lock".to_string()))?;

        if nodes.values().any(|n| n.addr == node.addr) {
            return Err(GatewayError::NodeExists(node.addr));
        }

        debug!("Adding node {} ({})", node.id, node.addr);
        nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Remove a node from the cluster
    pub fn remove_node(&self, node_id: &str) -> Result<Node> {
        let mut nodes = self
            .nodes
            .write()
            .map_err(|_| GatewayError::Lock("Failed to acquire write lock".to_string()))?;

        nodes
            .remove(node_id)
            .ok_or_else(|| GatewayError::NodeNotFound(node_id.to_string()))
    }

    /// List all nodes
    pub fn list_nodes(&self) -> Result<Vec<Node>> {
        let nodes = self
            .nodes
            .read()
            .map_err(|_| GatewayError::Lock("Failed to acquire read lock".to_string()))?;

        Ok(nodes.values().cloned().collect())
    }

    /// Apply the outcome of polling one node
    pub fn update_node(&self, node_id: &str, polled: Result<Vec<Container>>) -> Result<()> {
        let mut nodes = self
            .nodes
            .write()
            .map_err(|_| GatewayError::Lock("Failed to acquire write lock".to_string()))?;

        let node = nodes
            .get_mut(node_id)
            .ok_or_else(|| GatewayError::NodeNotFound(node_id.to_string()))?;

        match polled {
            Ok(containers) => {
                debug!("Node {} reports {} containers", node.addr, containers.len());
                node.mark_ready(containers);
            }
            Err(e) => {
                warn!("Failed to refresh node {}: {}", node.addr, e);
                node.mark_down(&e.to_string());
            }
        }
        Ok(())
    }

    /// Poll every node once, all engines concurrently.
    ///
    /// The lock is not held across engine requests; nodes removed while a
    /// poll is in flight are skipped.
    pub async fn refresh(&self, client: &EngineClient) -> Result<()> {
        let mut polls = JoinSet::new();
        for node in self.list_nodes()? {
            let client = client.clone();
            polls.spawn(async move {
                let polled = client.list_containers(&node.addr).await;
                (node.id, polled)
            });
        }

        while let Some(joined) = polls.join_next().await {
            let (node_id, polled) =
                joined.map_err(|e| GatewayError::Node(format!("Poll task failed: {}", e)))?;
            match self.update_node(&node_id, polled) {
                Ok(()) | Err(GatewayError::NodeNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Poll every node on a fixed interval until the task is aborted.
    ///
    /// A refresh that overruns the interval delays the next one instead of
    /// triggering a burst of catch-up polls.
    pub fn spawn_refresher(
        self: &Arc<Self>,
        client: EngineClient,
        interval: Duration,
    ) -> JoinHandle<()> {
        let cluster = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = cluster.refresh(&client).await {
                    warn!("Cluster refresh failed: {}", e);
                }
            }
        })
    }

    /// Get cluster info
    pub fn info(&self) -> Result<ClusterInfo> {
        let nodes = self.list_nodes()?;

        Ok(ClusterInfo {
            id: self.id.clone(),
            node_count: nodes.len(),
            ready_count: nodes.iter().filter(|n| n.state == NodeState::Ready).count(),
            container_count: nodes.iter().map(|n| n.containers.len()).sum(),
            created_at: self.created_at,
        })
    }
}

impl Default for SwarmCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl Cluster for SwarmCluster {
    fn containers(&self) -> Vec<Container> {
        // Readers never mutate, so a poisoned map is still consistent.
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        nodes
            .values()
            .flat_map(|n| n.containers.iter().cloned())
            .collect()
    }
}

/// Cluster summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub id: String,
    pub node_count: usize,
    pub ready_count: usize,
    pub container_count: usize,
    pub created_at: DateTime<Utc>,
}

/// Fixed container set, for tests that need a cluster handle
#[cfg(test)]
pub(crate) struct FixedCluster(pub Vec<Container>);

#[cfg(test)]
impl Cluster for FixedCluster {
    fn containers(&self) -> Vec<Container> {
        self.0.clone()
    }
}
