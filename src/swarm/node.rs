//! Cluster node management

use super::container::Container;
use crate::error::{GatewayError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// Node state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    /// Node has not been polled yet
    #[default]
    Unknown,
    /// Last poll succeeded
    Ready,
    /// Last poll failed
    Down,
}

/// A container engine that is part of the cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Node ID
    pub id: String,
    /// Engine address as configured
    pub addr: String,
    /// Node state
    pub state: NodeState,
    /// Containers reported by the last successful poll
    pub containers: Vec<Container>,
    /// Error message of the last failed poll
    pub error: Option<String>,
    /// Time of the last poll, successful or not
    pub last_refresh: Option<DateTime<Utc>>,
}

impl Node {
    /// Create a node for the engine at `addr`
    pub fn new(addr: &str) -> Result<Self> {
        let addr = addr.trim();
        if addr.is_empty() {
            return Err(GatewayError::Node("Empty engine address".to_string()));
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            addr: addr.to_string(),
            state: NodeState::Unknown,
            containers: Vec::new(),
            error: None,
            last_refresh: None,
        })
    }

    /// Record a successful poll
    pub fn mark_ready(&mut self, containers: Vec<Container>) {
        self.state = NodeState::Ready;
        self.containers = containers;
        self.error = None;
        self.last_refresh = Some(Utc::now());
    }

    /// Record a failed poll. The node's containers leave the cluster view.
    pub fn mark_down(&mut self, error: &str) {
        self.state = NodeState::Down;
        self.containers.clear();
        self.error = Some(error.to_string());
        self.last_refresh = Some(Utc::now());
    }

    /// Check if node is ready
    pub fn is_ready(&self) -> bool {
        self.state == NodeState::Ready
    }
}

/// HTTP client for the engines behind the cluster
#[derive(Clone)]
pub struct EngineClient {
    client: reqwest::Client,
}

impl EngineClient {
    /// Create a client whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|e| GatewayError::Engine(e.to_string()))?;

        Ok(Self { client })
    }

    /// Fetch every container (running or not) from the engine at `addr`
    pub async fn list_containers(&self, addr: &str) -> Result<Vec<Container>> {
        let url = format!("{}/containers/json?all=1", engine_url(addr));
        debug!("Polling engine {}", url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(GatewayError::Engine(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        Ok(response.json().await?)
    }
}

/// Base URL for an engine address.
///
/// Accepts `host:port`, `tcp://host:port` and full `http(s)://` URLs.
pub fn engine_url(addr: &str) -> String {
    let addr = addr.trim().trim_end_matches('/');

    if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_string()
    } else if let Some(rest) = addr.strip_prefix("tcp://") {
        format!("http://{}", rest)
    } else {
        format!("http://{}", addr)
    }
}

/// Serve `router` on an ephemeral local port and return its address
#[cfg(test)]
pub(crate) async fn spawn_engine(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_node() {
        let node = Node::new(" 10.0.0.1:2375 ").unwrap();
        assert_eq!(node.addr, "10.0.0.1:2375");
        assert_eq!(node.state, NodeState::Unknown);
        assert!(node.containers.is_empty());
        assert!(node.last_refresh.is_none());
    }

    #[test]
    fn test_new_node_rejects_empty_addr() {
        assert!(Node::new("  ").is_err());
    }

    #[test]
    fn test_mark_ready_then_down() {
        let mut node = Node::new("10.0.0.1:2375").unwrap();

        node.mark_ready(vec![Container::new("a", "Up 1 second", 1)]);
        assert!(node.is_ready());
        assert_eq!(node.containers.len(), 1);

        node.mark_down("connection refused");
        assert_eq!(node.state, NodeState::Down);
        assert!(node.containers.is_empty());
        assert_eq!(node.error.as_deref(), Some("connection refused"));
        assert!(node.last_refresh.is_some());
    }

    #[test]
    fn test_engine_url() {
        assert_eq!(engine_url("10.0.0.1:2375"), "http://10.0.0.1:2375");
        assert_eq!(engine_url("tcp://10.0.0.1:2375"), "http://10.0.0.1:2375");
        assert_eq!(
            engine_url("https://engine.example.com/"),
            "https://engine.example.com"
        );
    }

    #[tokio::test]
    async fn test_list_containers() {
        use axum::routing::get;

        let engine = axum::Router::new().route(
            "/containers/json",
            get(|| async {
                axum::Json(vec![
                    Container::new("a", "Up 2 hours", 10),
                    Container::new("b", "Exited (0) 1 hour ago", 20),
                ])
            }),
        );
        let addr = spawn_engine(engine).await;

        let client = EngineClient::new(Duration::from_secs(5)).unwrap();
        let containers = client.list_containers(&addr).await.unwrap();
        assert_eq!(containers.len(), 2);
        assert_eq!(containers[1].status, "Exited (0) 1 hour ago");
    }

    #[tokio::test]
    async fn test_list_containers_engine_error() {
        use axum::http::StatusCode;
        use axum::routing::get;

        let engine = axum::Router::new().route(
            "/containers/json",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let addr = spawn_engine(engine).await;

        let client = EngineClient::new(Duration::from_secs(5)).unwrap();
        let result = client.list_containers(&addr).await;
        assert!(matches!(result, Err(GatewayError::Engine(_))));
    }

    #[tokio::test]
    async fn test_list_containers_null_lists() {
        use axum::http::header;
        use axum::routing::get;

        let engine = axum::Router::new().route(
            "/containers/json",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "application/json")],
                    r#"[{"Id":"a","Names":null,"Created":1,"Status":"Up 1 second","Ports":null}]"#,
                )
            }),
        );
        let addr = spawn_engine(engine).await;

        let client = EngineClient::new(Duration::from_secs(5)).unwrap();
        let containers = client.list_containers(&addr).await.unwrap();
        assert_eq!(containers.len(), 1);
        assert!(containers[0].ports.is_empty());
        assert!(containers[0].is_running());
    }
}
