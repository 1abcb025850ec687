//! REST API handlers for the gateway
//!
//! Implements the Docker-compatible endpoints that make sense for a cluster.
//! Everything else is answered by [`not_implemented`].

use super::form::Form;
use crate::swarm::container::sort_newest_first;
use crate::swarm::{Cluster, Container};
use axum::http::{header, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::collections::HashMap;
use tracing::error;

/// Body of every response for an operation the gateway does not support
pub const NOT_SUPPORTED_MESSAGE: &str = "Not supported in clustering mode.";

/// Handler signature shared by every endpoint
pub type ApiFunc = fn(&dyn Cluster, &ApiRequest) -> ApiResponse;

/// An inbound API request, as seen by handlers
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub uri: Uri,
    /// Path variables captured by the matched route (`version`, `name`)
    pub vars: HashMap<String, String>,
}

impl ApiRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            vars: HashMap::new(),
        }
    }

    /// Parse the request's form values
    pub fn form(&self) -> crate::Result<Form> {
        Form::parse(self.uri.query().unwrap_or(""))
    }
}

/// A complete API response: status, content type and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// 200 with a plain text body
    pub fn text(body: &str) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: "text/plain; charset=utf-8",
            body: body.as_bytes().to_vec(),
        }
    }

    /// 200 with a JSON body, newline-terminated like the engine's encoder.
    ///
    /// Unlike the engine, `<`, `>` and `&` are written literally rather than
    /// as `\u003c`, `\u003e` and `\u0026`. Both forms decode to the same value.
    pub fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(mut body) => {
                body.push(b'\n');
                Self {
                    status: StatusCode::OK,
                    content_type: "application/json",
                    body,
                }
            }
            Err(e) => {
                error!("Failed to encode response: {}", e);
                Self::error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
            }
        }
    }

    /// Plain text error response
    pub fn error(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: format!("{}\n", message).into_bytes(),
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let content_type = [(header::CONTENT_TYPE, HeaderValue::from_static(self.content_type))];
        let mut response = (self.status, content_type, self.body).into_response();
        if !self.status.is_success() {
            response.headers_mut().insert(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            );
        }
        response
    }
}

/// `GET /_ping`
pub fn ping(_cluster: &dyn Cluster, _req: &ApiRequest) -> ApiResponse {
    ApiResponse::text("OK")
}

/// `GET /containers/json`: running containers, or all with `all=1`,
/// newest first
pub fn get_containers_json(cluster: &dyn Cluster, req: &ApiRequest) -> ApiResponse {
    let form = match req.form() {
        Ok(form) => form,
        Err(e) => return ApiResponse::error(e.status_code(), &e.to_string()),
    };

    let all = form.flag("all");

    let mut out: Vec<Container> = cluster
        .containers()
        .into_iter()
        // Skip stopped containers unless -a was specified.
        .filter(|c| all || c.is_running())
        .collect();

    sort_newest_first(&mut out);
    ApiResponse::json(&out)
}

/// Shared response for every endpoint the gateway rejects
pub fn not_implemented(_cluster: &dyn Cluster, _req: &ApiRequest) -> ApiResponse {
    ApiResponse::error(StatusCode::NOT_IMPLEMENTED, NOT_SUPPORTED_MESSAGE)
}
