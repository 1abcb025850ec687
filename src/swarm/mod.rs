//! Multi-host container cluster
//!
//! The gateway sees the cluster through the [`Cluster`] trait. [`SwarmCluster`]
//! implements it over a set of container engines that are polled for their
//! containers.

pub mod cluster;
pub mod container;
pub mod node;

pub use cluster::{Cluster, ClusterInfo, SwarmCluster};
pub use container::{Container, Port};
pub use node::{EngineClient, Node, NodeState};
