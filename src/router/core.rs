use crate::spec::{build_routes, ContractDocument, RouteMeta};
use http::Method;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of matching a request to a declared operation
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The matched operation (Arc to avoid expensive clones)
    pub route: Arc<RouteMeta>,
    /// Percent-decoded path parameters (e.g., `{id}` → `{"id": "123"}`)
    pub path_params: HashMap<String, String>,
}

impl RouteMatch {
    /// Get a path parameter by name
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name).map(String::as_str)
    }
}

/// Outcome of [`RouteIndex::lookup`]
#[derive(Debug, Clone)]
pub enum RouteLookup {
    /// The path and method are declared by the contract
    Matched(RouteMatch),
    /// The path is declared, the method is not
    MethodNotAllowed {
        /// Template of the matched path
        path_pattern: String,
    },
    /// The contract does not describe this path
    Unmanaged,
}

/// One path template and the operations declared under it
#[derive(Debug, Clone)]
struct PathEntry {
    pattern: String,
    regex: Regex,
    param_names: Vec<String>,
    operations: HashMap<Method, Arc<RouteMeta>>,
}

/// Immutable route table shared by the request and response pipelines.
///
/// Each template is compiled to an anchored regex once, at construction.
/// Templates without parameters are tried before parameterised ones, and among
/// those, templates with fewer parameters win, so `/pets/mine` is preferred
/// over `/pets/{id}`. A template that matches the path but not the method does
/// not shadow a later one that declares the method.
#[derive(Debug, Clone)]
pub struct RouteIndex {
    entries: Vec<PathEntry>,
}

impl RouteIndex {
    /// Build the index from route metadata.
    ///
    /// # Errors
    ///
    /// Returns an error when a template cannot be compiled to a regex.
    pub fn new(routes: Vec<RouteMeta>) -> anyhow::Result<Self> {
        let mut entries: Vec<PathEntry> = Vec::new();
        for route in routes {
            let method = route.method.clone();
            match entries.iter_mut().find(|e| e.pattern == route.path_pattern) {
                Some(entry) => {
                    entry.operations.insert(method, Arc::new(route));
                }
                None => {
                    let (regex, param_names) = Self::path_to_regex(&route.path_pattern)?;
                    let mut operations = HashMap::new();
                    let pattern = route.path_pattern.clone();
                    operations.insert(method, Arc::new(route));
                    entries.push(PathEntry {
                        pattern,
                        regex,
                        param_names,
                        operations,
                    });
                }
            }
        }
        // stable: declaration order is kept among equal parameter counts
        entries.sort_by_key(|e| e.param_names.len());

        let operation_count: usize = entries.iter().map(|e| e.operations.len()).sum();
        info!(
            paths_count = entries.len(),
            operations_count = operation_count,
            "Route index loaded"
        );
        Ok(Self { entries })
    }

    /// Build the route table of a contract and index it.
    ///
    /// # Errors
    ///
    /// Propagates [`build_routes`] and regex compilation errors.
    pub fn from_contract(doc: &ContractDocument) -> anyhow::Result<Self> {
        Self::new(build_routes(doc)?)
    }

    /// Resolve a request to a declared operation. Any query string on `path`
    /// is ignored.
    #[must_use]
    pub fn lookup(&self, method: &Method, path: &str) -> RouteLookup {
        let path = path.split('?').next().unwrap_or_default();
        let mut first_match: Option<&PathEntry> = None;
        for entry in &self.entries {
            let Some(caps) = entry.regex.captures(path) else {
                continue;
            };
            let Some(route) = entry.operations.get(method) else {
                first_match.get_or_insert(entry);
                continue;
            };
            let path_params = entry
                .param_names
                .iter()
                .zip(caps.iter().skip(1))
                .filter_map(|(name, m)| {
                    let raw = m?.as_str();
                    let value = urlencoding::decode(raw)
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| raw.to_string());
                    Some((name.clone(), value))
                })
                .collect();
            debug!(method = %method, path = %path, route = %entry.pattern, "route matched");
            return RouteLookup::Matched(RouteMatch {
                route: Arc::clone(route),
                path_params,
            });
        }
        match first_match {
            Some(entry) => {
                debug!(method = %method, path = %path, route = %entry.pattern, "method not declared for route");
                RouteLookup::MethodNotAllowed {
                    path_pattern: entry.pattern.clone(),
                }
            }
            None => RouteLookup::Unmanaged,
        }
    }

    /// Every indexed operation, ordered by template then method
    #[must_use]
    pub fn routes(&self) -> Vec<Arc<RouteMeta>> {
        let mut all: Vec<Arc<RouteMeta>> = self
            .entries
            .iter()
            .flat_map(|e| e.operations.values().cloned())
            .collect();
        all.sort_by(|a, b| {
            a.path_pattern
                .cmp(&b.path_pattern)
                .then_with(|| a.method.as_str().cmp(b.method.as_str()))
        });
        all
    }

    /// Number of indexed operations
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.iter().map(|e| e.operations.len()).sum()
    }

    /// Whether the index holds no operations
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert an OpenAPI path template to an anchored regex and extract
    /// parameter names.
    ///
    /// `/users/{id}` becomes `^/users/([^/]+)/?$`. Parameters may share a
    /// segment with literal text (`/files/{name}.{ext}`); literal text is
    /// escaped.
    pub(crate) fn path_to_regex(path: &str) -> anyhow::Result<(Regex, Vec<String>)> {
        if path == "/" || path.is_empty() {
            return Ok((Regex::new(r"^/$")?, Vec::new()));
        }

        let mut pattern = String::with_capacity(path.len() + 8);
        pattern.push('^');
        let mut param_names = Vec::with_capacity(path.matches('{').count());

        let mut rest = path.trim_end_matches('/');
        while let Some(start) = rest.find('{') {
            let Some(len) = rest[start..].find('}') else {
                break;
            };
            pattern.push_str(&regex::escape(&rest[..start]));
            pattern.push_str("([^/]+)");
            param_names.push(rest[start + 1..start + len].to_string());
            rest = &rest[start + len + 1..];
        }
        pattern.push_str(&regex::escape(rest));
        pattern.push_str("/?$");

        Ok((Regex::new(&pattern)?, param_names))
    }
}
