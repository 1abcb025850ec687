//! Route table for the Docker-compatible API
//!
//! Routes are declared once in [`ROUTES`], per HTTP method. Every path is
//! registered twice, as written and behind a `/v<version>` prefix, so clients
//! pinned to any API version reach the same handler. The gateway does not
//! branch on the version.

use super::api::{self, ApiFunc, ApiRequest, ApiResponse};
use crate::error::{GatewayError, Result};
use crate::swarm::Cluster;
use axum::http::{Method, StatusCode};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Per HTTP method, every path the gateway answers and its handler
type RouteSpec = &'static [(&'static str, &'static [(&'static str, ApiFunc)])];

/// Version segment accepted in front of every path
const VERSION_PATTERN: &str = r"/v(?P<version>[0-9.]+)";

const ROUTES: RouteSpec = &[
    (
        "GET",
        &[
            ("/_ping", api::ping),
            ("/events", api::not_implemented),
            ("/info", api::not_implemented),
            ("/version", api::not_implemented),
            ("/images/json", api::not_implemented),
            ("/images/viz", api::not_implemented),
            ("/images/search", api::not_implemented),
            ("/images/get", api::not_implemented),
            ("/images/{name}/get", api::not_implemented),
            ("/images/{name}/history", api::not_implemented),
            ("/images/{name}/json", api::not_implemented),
            ("/containers/ps", api::get_containers_json),
            ("/containers/json", api::get_containers_json),
            ("/containers/{name}/export", api::not_implemented),
            ("/containers/{name}/changes", api::not_implemented),
            ("/containers/{name}/json", api::not_implemented),
            ("/containers/{name}/top", api::not_implemented),
            ("/containers/{name}/logs", api::not_implemented),
            ("/containers/{name}/attach/ws", api::not_implemented),
        ],
    ),
    (
        "POST",
        &[
            ("/auth", api::not_implemented),
            ("/commit", api::not_implemented),
            ("/build", api::not_implemented),
            ("/images/create", api::not_implemented),
            ("/images/load", api::not_implemented),
            ("/images/{name}/push", api::not_implemented),
            ("/images/{name}/tag", api::not_implemented),
            ("/containers/create", api::not_implemented),
            ("/containers/{name}/kill", api::not_implemented),
            ("/containers/{name}/pause", api::not_implemented),
            ("/containers/{name}/unpause", api::not_implemented),
            ("/containers/{name}/restart", api::not_implemented),
            ("/containers/{name}/start", api::not_implemented),
            ("/containers/{name}/stop", api::not_implemented),
            ("/containers/{name}/wait", api::not_implemented),
            ("/containers/{name}/resize", api::not_implemented),
            ("/containers/{name}/attach", api::not_implemented),
            ("/containers/{name}/copy", api::not_implemented),
            ("/containers/{name}/exec", api::not_implemented),
            ("/exec/{name}/start", api::not_implemented),
            ("/exec/{name}/resize", api::not_implemented),
        ],
    ),
    (
        "DELETE",
        &[
            ("/containers/{name}", api::not_implemented),
            ("/images/{name}", api::not_implemented),
        ],
    ),
    ("OPTIONS", &[("/", api::not_implemented)]),
];

/// Handler with its cluster handle already bound
type BoundHandler = Arc<dyn Fn(&ApiRequest) -> ApiResponse + Send + Sync>;

/// A single (method, path pattern) -> handler binding
pub struct Route {
    method: Method,
    path: &'static str,
    versioned: bool,
    pattern: Regex,
    handler: BoundHandler,
}

impl Route {
    fn new(
        method: Method,
        path: &'static str,
        versioned: bool,
        handler: BoundHandler,
    ) -> Result<Self> {
        Ok(Self {
            pattern: compile_pattern(path, versioned)?,
            method,
            path,
            versioned,
            handler,
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path as declared, without the version prefix
    pub fn path(&self) -> &'static str {
        self.path
    }

    pub fn is_versioned(&self) -> bool {
        self.versioned
    }

    /// Whether the path contains a `{name}` style variable
    pub fn has_variables(&self) -> bool {
        self.path.contains('{')
    }

    /// Match `path` and return the captured variables
    fn capture(&self, path: &str) -> Option<HashMap<String, String>> {
        let captures = self.pattern.captures(path)?;
        let vars = self
            .pattern
            .capture_names()
            .flatten()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect();
        Some(vars)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.versioned { "/v{version}" } else { "" };
        write!(f, "{} {}{}", self.method, prefix, self.path)
    }
}

/// Immutable routing table, built once at startup
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Build the full API route table, bound to `cluster`
    pub fn build(cluster: Arc<dyn Cluster>) -> Result<Self> {
        Self::from_spec(ROUTES, cluster)
    }

    fn from_spec(spec: RouteSpec, cluster: Arc<dyn Cluster>) -> Result<Self> {
        let mut routes = Vec::new();
        let mut seen = HashSet::new();

        for &(method, paths) in spec {
            let method = Method::from_bytes(method.as_bytes())
                .map_err(|e| GatewayError::Route(format!("Invalid method {:?}: {}", method, e)))?;

            for &(path, fct) in paths {
                if !seen.insert((method.clone(), path)) {
                    return Err(GatewayError::Route(format!(
                        "Duplicate route {} {}",
                        method, path
                    )));
                }

                debug!("Registering {}, {}", method, path);
                let handler = wrap(Arc::clone(&cluster), fct);

                routes.push(Route::new(method.clone(), path, true, Arc::clone(&handler))?);
                routes.push(Route::new(method.clone(), path, false, handler)?);
            }
        }

        // Literal paths take precedence over `{name}` patterns.
        routes.sort_by_key(Route::has_variables);

        Ok(Self { routes })
    }

    /// Find the route for `method` and `path`, with its captured variables
    pub fn find(&self, method: &Method, path: &str) -> Option<(&Route, HashMap<String, String>)> {
        self.routes
            .iter()
            .filter(|route| route.method == *method)
            .find_map(|route| route.capture(path).map(|vars| (route, vars)))
    }

    /// Route a request to its handler
    pub fn dispatch(&self, mut req: ApiRequest) -> ApiResponse {
        let path = req.uri.path().to_string();

        match self.find(&req.method, &path) {
            Some((route, vars)) => {
                req.vars = vars;
                (route.handler)(&req)
            }
            None => {
                debug!("No route for {} {}", req.method, req.uri);
                ApiResponse::error(StatusCode::NOT_FOUND, "404 page not found")
            }
        }
    }

    /// All registered routes, literal paths first
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Bind a handler to the cluster, logging each request before it runs
fn wrap(cluster: Arc<dyn Cluster>, fct: ApiFunc) -> BoundHandler {
    Arc::new(move |req: &ApiRequest| {
        debug!("-> {} {}", req.method, req.uri);
        fct(cluster.as_ref(), req)
    })
}

/// Compile a declared path into an anchored regex.
///
/// `{name}` segments match any non-empty text, slashes included, since image
/// and container references may contain them.
fn compile_pattern(path: &str, versioned: bool) -> Result<Regex> {
    if !path.starts_with('/') {
        return Err(GatewayError::Route(format!("Path must start with '/': {:?}", path)));
    }

    let mut re = String::from("^");
    if versioned {
        re.push_str(VERSION_PATTERN);
    }

    if path == "/" {
        re.push_str(if versioned { "/?" } else { "/" });
    } else {
        let mut rest = path;
        while let Some(start) = rest.find('{') {
            re.push_str(&regex::escape(&rest[..start]));

            let end = rest[start..]
                .find('}')
                .map(|i| start + i)
                .ok_or_else(|| GatewayError::Route(format!("Unclosed variable in {:?}", path)))?;

            let name = &rest[start + 1..end];
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(GatewayError::Route(format!(
                    "Invalid variable {:?} in {:?}",
                    name, path
                )));
            }

            re.push_str(&format!("(?P<{}>.+)", name));
            rest = &rest[end + 1..];
        }
        re.push_str(&regex::escape(rest));
    }

    re.push('$');
    Regex::new(&re).map_err(|e| GatewayError::Route(format!("Invalid pattern for {:?}: {}", path, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swarm::cluster::FixedCluster;
    use crate::swarm::Container;

    fn test_cluster() -> Arc<dyn Cluster> {
        Arc::new(FixedCluster(vec![
            Container::new("web", "Up 2 hours", 100),
            Container::new("job", "Exited (0) 1 hour ago", 300),
            Container::new("db", "Up 10 minutes", 200),
        ]))
    }

    fn table() -> RouteTable {
        RouteTable::build(test_cluster()).unwrap()
    }

    fn request(method: Method, uri: &str) -> ApiRequest {
        ApiRequest::new(method, uri.parse().unwrap())
    }

    /// Concrete request path for a declared path
    fn concrete(path: &str) -> String {
        path.replace("{name}", "probe")
    }

    fn spec_entries() -> Vec<(Method, &'static str, ApiFunc)> {
        ROUTES
            .iter()
            .flat_map(|&(method, paths)| {
                let method = Method::from_bytes(method.as_bytes()).unwrap();
                paths.iter().map(move |&(path, fct)| (method.clone(), path, fct))
            })
            .collect()
    }

    #[test]
    fn test_two_routes_per_path() {
        let table = table();
        let entries = spec_entries();
        assert_eq!(table.len(), entries.len() * 2);

        for (method, path, _) in &entries {
            let aliases: Vec<bool> = table
                .routes()
                .iter()
                .filter(|r| r.method() == method && r.path() == *path)
                .map(Route::is_versioned)
                .collect();
            assert_eq!(aliases.len(), 2, "{} {}", method, path);
            assert!(aliases.contains(&true) && aliases.contains(&false));
        }
    }

    #[test]
    fn test_every_route_keeps_its_own_binding() {
        let table = table();
        let cluster = test_cluster();

        for (method, path, fct) in spec_entries() {
            let uri = concrete(path);
            let (route, _) = table
                .find(&method, &uri)
                .unwrap_or_else(|| panic!("no route for {} {}", method, uri));
            assert_eq!(route.method(), &method);
            assert_eq!(route.path(), path);

            let req = request(method.clone(), &uri);
            let expected = fct(cluster.as_ref(), &req);
            assert_eq!(table.dispatch(req), expected, "{} {}", method, path);
        }
    }

    #[test]
    fn test_versioned_alias_matches_unversioned() {
        let table = table();

        for (method, path, _) in spec_entries() {
            let plain = concrete(path);
            for version in ["1.15", "1.43", "2"] {
                let versioned = format!("/v{}{}", version, plain);
                let expected = table.dispatch(request(method.clone(), &plain));
                let actual = table.dispatch(request(method.clone(), &versioned));
                assert_eq!(actual, expected, "{} {}", method, versioned);
            }
        }
    }

    #[test]
    fn test_versioned_query_alias() {
        let table = table();
        let plain = table.dispatch(request(Method::GET, "/containers/json?all=1"));
        let versioned = table.dispatch(request(Method::GET, "/v1.15/containers/json?all=1"));
        assert_eq!(plain.status, StatusCode::OK);
        assert_eq!(plain, versioned);
    }

    #[test]
    fn test_ping() {
        let response = table().dispatch(request(Method::GET, "/_ping"));
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, b"OK");

        let empty = RouteTable::build(Arc::new(FixedCluster(Vec::new()))).unwrap();
        let response = empty.dispatch(request(Method::GET, "/v1.15/_ping"));
        assert_eq!(response.body, b"OK");
    }

    #[test]
    fn test_container_listing_routes() {
        let table = table();

        for path in ["/containers/json", "/containers/ps"] {
            let response = table.dispatch(request(Method::GET, path));
            let listed: Vec<Container> = serde_json::from_slice(&response.body).unwrap();
            let ids: Vec<&str> = listed.iter().map(|c| c.id.as_str()).collect();
            assert_eq!(ids, vec!["db", "web"]);
        }
    }

    #[test]
    fn test_unsupported_surface() {
        let table = table();

        for (method, uri) in [
            (Method::POST, "/containers/create"),
            (Method::POST, "/v1.15/containers/create?name=web"),
            (Method::GET, "/containers/web/json"),
            (Method::GET, "/images/library/ubuntu/json"),
            (Method::DELETE, "/images/registry.local:5000/app"),
            (Method::POST, "/exec/abc/start"),
            (Method::OPTIONS, "/"),
            (Method::OPTIONS, "/v1.15"),
        ] {
            let response = table.dispatch(request(method.clone(), uri));
            assert_eq!(response.status, StatusCode::NOT_IMPLEMENTED, "{} {}", method, uri);
            assert_eq!(response.body, b"Not supported in clustering mode.\n");
        }
    }

    #[test]
    fn test_unknown_routes() {
        let table = table();

        for (method, uri) in [
            (Method::GET, "/networks"),
            (Method::GET, "/vx/_ping"),
            (Method::GET, "/v/_ping"),
            (Method::PUT, "/containers/json"),
            (Method::GET, "/containers//json"),
            (Method::GET, "/containers/json/"),
        ] {
            let response = table.dispatch(request(method.clone(), uri));
            assert_eq!(response.status, StatusCode::NOT_FOUND, "{} {}", method, uri);
        }
    }

    #[test]
    fn test_literal_paths_win() {
        const SPEC: RouteSpec = &[(
            "GET",
            &[("/images/{name}", api::not_implemented), ("/images/json", api::ping)],
        )];
        let table = RouteTable::from_spec(SPEC, test_cluster()).unwrap();

        let (route, vars) = table.find(&Method::GET, "/images/json").unwrap();
        assert_eq!(route.path(), "/images/json");
        assert!(vars.is_empty());

        let (route, _) = table.find(&Method::GET, "/images/ubuntu").unwrap();
        assert_eq!(route.path(), "/images/{name}");
    }

    #[test]
    fn test_captured_variables() {
        let table = table();
        let (route, vars) = table
            .find(&Method::POST, "/v1.43/containers/web/start")
            .unwrap();
        assert_eq!(route.path(), "/containers/{name}/start");
        assert!(route.is_versioned());
        assert_eq!(vars.get("version").map(String::as_str), Some("1.43"));
        assert_eq!(vars.get("name").map(String::as_str), Some("web"));
    }

    #[test]
    fn test_route_display() {
        let table = table();
        let shown: Vec<String> = table.routes().iter().map(|r| r.to_string()).collect();
        assert!(shown.contains(&"GET /_ping".to_string()));
        assert!(shown.contains(&"GET /v{version}/_ping".to_string()));
    }

    #[test]
    fn test_duplicate_route_rejected() {
        const SPEC: RouteSpec = &[(
            "GET",
            &[("/_ping", api::ping), ("/_ping", api::not_implemented)],
        )];
        let result = RouteTable::from_spec(SPEC, test_cluster());
        assert!(matches!(result, Err(GatewayError::Route(_))));
    }

    #[test]
    fn test_invalid_spec_rejected() {
        const BAD_METHOD: RouteSpec = &[("GE T", &[("/_ping", api::ping)])];
        const UNCLOSED: RouteSpec = &[("GET", &[("/images/{name/json", api::ping)])];
        const RELATIVE: RouteSpec = &[("GET", &[("_ping", api::ping)])];
        const CLASH: RouteSpec = &[("GET", &[("/x/{version}", api::ping)])];

        for spec in [BAD_METHOD, UNCLOSED, RELATIVE, CLASH] {
            let result = RouteTable::from_spec(spec, test_cluster());
            assert!(matches!(result, Err(GatewayError::Route(_))));
        }
    }
}
