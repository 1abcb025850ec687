//! swarmgate - A Docker-compatible gateway for container clusters
//!
//! swarmgate serves the Docker Engine REST API in front of a set of container
//! engines, so existing Docker clients can address the whole cluster as one
//! engine. It provides:
//!
//! - Cluster-wide container listing (`docker ps`)
//! - Health checks (`/_ping`)
//! - API version prefixes (`/v1.43/...`) on every endpoint
//! - A uniform "not supported in clustering mode" answer for the rest of the API

pub mod config;
pub mod daemon;
pub mod error;
pub mod swarm;

pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
