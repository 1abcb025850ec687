//! Gateway daemon - Docker-compatible REST API
//!
//! This module serves a Docker-Engine-compatible REST API in front of a
//! cluster. Container listing and health checks are answered from the
//! cluster's live state; every other documented endpoint is rejected as not
//! supported in clustering mode.

pub mod api;
pub mod form;
pub mod router;
pub mod server;

pub use api::{ApiFunc, ApiRequest, ApiResponse};
pub use router::{Route, RouteTable};
pub use server::{GatewayServer, DEFAULT_LISTEN_ADDR};
