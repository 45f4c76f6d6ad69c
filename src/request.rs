//! # Request Validation Pipeline
//!
//! [`RequestValidator`] checks one incoming request against the contract:
//!
//! 1. resolve the route; unknown paths pass through untouched, known paths
//!    with an undeclared method fail with 405
//! 2. fetch (or build and cache) the synthesized schema and its validator for
//!    the request's (method, route, content type)
//! 3. re-parse the query string from the original URL, reject undeclared keys
//! 4. apply the transform directives to the fresh query and to the host's
//!    own parameter maps, keeping both views consistent
//! 5. validate `{query, headers, params, cookies, body}`
//!
//! On success, declared parameter values are written back into the
//! [`ValidationRequest`] in their transformed (and coerced) form.

use crate::coerce::coerce_location;
use crate::compiler::{CompiledValidator, ValidatorCompiler};
use crate::config::ValidatorConfig;
use crate::content_type::ContentType;
use crate::error::ValidationFailure;
use crate::router::{RouteIndex, RouteLookup};
use crate::schema::{security_query_params, ParameterSchemaSynthesizer, SynthesizedSchema, TransformDirective};
use crate::spec::{ContractDocument, ParameterLocation, RouteMeta};
use crate::validator_cache::{ValidatorCache, ValidatorKey};
use http::Method;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// The host's view of one request.
///
/// Header names must be lower-case; [`with_header`](Self::with_header) takes
/// care of that. `query` starts as the parsed query string of the URL and may
/// be replaced with whatever the host framework parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationRequest {
    pub method: Method,
    /// Full request target including the query string
    pub original_url: String,
    pub headers: Map<String, Value>,
    pub query: Map<String, Value>,
    pub params: Map<String, Value>,
    pub cookies: Option<Map<String, Value>>,
    pub signed_cookies: Option<Map<String, Value>>,
    /// Parsed body; `None` when the request carried none
    pub body: Option<Value>,
}

impl ValidationRequest {
    pub fn new(method: Method, original_url: impl Into<String>) -> Self {
        let original_url = original_url.into();
        let query = parse_query_params(&original_url);
        Self {
            method,
            original_url,
            headers: Map::new(),
            query,
            params: Map::new(),
            cookies: None,
            signed_cookies: None,
            body: None,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), Value::String(value.into()));
        self
    }

    #[must_use]
    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies
            .get_or_insert_with(Map::new)
            .insert(name.into(), Value::String(value.into()));
        self
    }

    #[must_use]
    pub fn with_signed_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.signed_cookies
            .get_or_insert_with(Map::new)
            .insert(name.into(), Value::String(value.into()));
        self
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), Value::String(value.into()));
        self
    }

    #[must_use]
    pub fn with_query(mut self, query: Map<String, Value>) -> Self {
        self.query = query;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// The URL path, without query string or fragment
    pub fn path(&self) -> &str {
        let end = self
            .original_url
            .find(|c| c == '?' || c == '#')
            .unwrap_or(self.original_url.len());
        &self.original_url[..end]
    }

    fn host_map_mut(&mut self, location: ParameterLocation) -> Option<&mut Map<String, Value>> {
        match location {
            ParameterLocation::Query => Some(&mut self.query),
            ParameterLocation::Header => Some(&mut self.headers),
            ParameterLocation::Path => Some(&mut self.params),
            ParameterLocation::Cookie => self.cookies.as_mut(),
        }
    }
}

/// Parse the query string of `url`. Keys seen more than once collapse into
/// an array of their values, in order.
#[must_use]
pub fn parse_query_params(url: &str) -> Map<String, Value> {
    let mut out = Map::new();
    let Some((_, rest)) = url.split_once('?') else {
        return out;
    };
    let query = rest.split('#').next().unwrap_or_default();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let value = Value::String(value.into_owned());
        match out.get_mut(key.as_ref()) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                out.insert(key.into_owned(), value);
            }
        }
    }
    out
}

/// Everything compiled for one (method, route, content type)
#[derive(Debug)]
pub struct RequestPlan {
    pub schema: SynthesizedSchema,
    pub validator: CompiledValidator,
    /// Query-located security parameters exempt from unknown-key rejection
    pub security_query_params: Vec<String>,
}

/// Outcome of a request that did not fail validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The request satisfied the contract of `route`
    Validated { route: String },
    /// The contract does not describe this path
    Unmanaged,
    /// Request validation is switched off
    Skipped,
}

/// Validates incoming requests for one contract.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    doc: Arc<ContractDocument>,
    routes: Arc<RouteIndex>,
    compiler: ValidatorCompiler,
    cache: ValidatorCache<RequestPlan>,
    allow_unknown_query_parameters: bool,
    coerce_types: bool,
}

impl RequestValidator {
    pub fn new(doc: Arc<ContractDocument>, routes: Arc<RouteIndex>, config: &ValidatorConfig) -> Self {
        let compiler = ValidatorCompiler::new(&doc, config.validate_formats);
        Self {
            doc,
            routes,
            compiler,
            cache: ValidatorCache::new(config.schema_cache),
            allow_unknown_query_parameters: config.allow_unknown_query_parameters,
            coerce_types: config.coerce_types,
        }
    }

    /// Compiled plans, keyed by (method, route, content type)
    pub fn cache(&self) -> &ValidatorCache<RequestPlan> {
        &self.cache
    }

    /// Build the plan for `route` and `content_type` without caching it.
    ///
    /// # Errors
    ///
    /// Contract-shape (400), unsupported-media-type (415) and
    /// schema-compilation (500) failures.
    pub fn build_plan(&self, route: &RouteMeta, content_type: &ContentType) -> Result<RequestPlan, ValidationFailure> {
        let schema = ParameterSchemaSynthesizer::new(&self.doc).synthesize(route, content_type)?;
        let validator = self.compiler.compile(schema.to_schema(), &route.path_pattern)?;
        Ok(RequestPlan {
            schema,
            validator,
            security_query_params: security_query_params(&self.doc, route),
        })
    }

    /// Validate `req`, rewriting its parameter maps on success.
    ///
    /// # Errors
    ///
    /// Any [`ValidationFailure`] of the request side of the taxonomy.
    pub fn validate(&self, req: &mut ValidationRequest) -> Result<RequestOutcome, ValidationFailure> {
        let route_match = match self.routes.lookup(&req.method, req.path()) {
            RouteLookup::Matched(m) => m,
            RouteLookup::MethodNotAllowed { .. } => {
                warn!(method = %req.method, path = %req.path(), "method not allowed");
                return Err(ValidationFailure::method_not_allowed(req.path(), &req.method));
            }
            RouteLookup::Unmanaged => {
                debug!(method = %req.method, path = %req.path(), "request not managed by contract");
                return Ok(RequestOutcome::Unmanaged);
            }
        };
        let route = &route_match.route;

        let content_type = ContentType::from_headers(&req.headers);
        let key = ValidatorKey::new(&req.method, &route.path_pattern, &content_type);
        let plan = self
            .cache
            .get_or_build(&key, || self.build_plan(route, &content_type))?;

        let mut query = parse_query_params(&req.original_url);
        if !self.allow_unknown_query_parameters {
            if let Some(unknown) = query.keys().find(|k| {
                !plan.schema.query.declares(k) && !plan.security_query_params.iter().any(|s| s == *k)
            }) {
                warn!(method = %req.method, route = %route.path_pattern, parameter = %unknown, "unknown query parameter");
                return Err(ValidationFailure::unknown_query_parameter(unknown));
            }
        }

        if !route_match.path_params.is_empty() {
            req.params = route_match
                .path_params
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
        }

        for directive in &plan.schema.directives {
            apply_directive(directive, &mut query, req);
        }

        let mut cookies = req.cookies.clone().unwrap_or_default();
        if let Some(signed) = &req.signed_cookies {
            cookies.extend(signed.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        let mut headers = req.headers.clone();
        let mut params = req.params.clone();

        if self.coerce_types {
            coerce_location(&mut query, &plan.schema.query.properties, &self.doc);
            coerce_location(&mut headers, &plan.schema.headers.properties, &self.doc);
            coerce_location(&mut params, &plan.schema.params.properties, &self.doc);
            coerce_location(&mut cookies, &plan.schema.cookies.properties, &self.doc);
        }

        let mut instance = Map::new();
        instance.insert("query".to_string(), Value::Object(query));
        instance.insert("headers".to_string(), Value::Object(headers));
        instance.insert("params".to_string(), Value::Object(params));
        instance.insert("cookies".to_string(), Value::Object(cookies));
        if let Some(body) = req.body.take() {
            instance.insert("body".to_string(), body);
        }
        let mut instance = Value::Object(instance);

        let result = plan.validator.validate(&instance);
        req.body = instance.get_mut("body").map(Value::take);

        if let Err(errors) = result {
            warn!(
                method = %req.method,
                route = %route.path_pattern,
                content_type = %key.content_type,
                error_count = errors.len(),
                "request failed validation"
            );
            return Err(ValidationFailure::schema_validation(errors));
        }

        write_back(&plan.schema, &mut instance, req);
        debug!(method = %req.method, route = %route.path_pattern, "request validated");
        Ok(RequestOutcome::Validated {
            route: route.path_pattern.clone(),
        })
    }
}

/// A value counts as supplied when it is neither null nor an empty string
fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn transform(directive: &TransformDirective, value: &Value) -> Option<Value> {
    match (directive, value) {
        (TransformDirective::ParseJson { .. }, Value::String(raw)) => serde_json::from_str(raw).ok(),
        (TransformDirective::SplitArray { delimiter, .. }, Value::String(raw)) => Some(Value::Array(
            raw.split(*delimiter)
                .map(|s| Value::String(s.to_string()))
                .collect(),
        )),
        // repeated key: split every occurrence and flatten
        (TransformDirective::SplitArray { delimiter, .. }, Value::Array(items)) => Some(Value::Array(
            items
                .iter()
                .flat_map(|item| match item {
                    Value::String(raw) => raw
                        .split(*delimiter)
                        .map(|s| Value::String(s.to_string()))
                        .collect::<Vec<_>>(),
                    other => vec![other.clone()],
                })
                .collect(),
        )),
        (TransformDirective::WrapSingleAsArray { .. }, Value::Array(_)) => None,
        (TransformDirective::WrapSingleAsArray { .. }, other) => Some(Value::Array(vec![other.clone()])),
        _ => None,
    }
}

fn apply_in_place(directive: &TransformDirective, map: &mut Map<String, Value>) {
    let name = directive.name();
    if !is_present(map.get(name)) {
        return;
    }
    if let Some(slot) = map.get_mut(name) {
        if let Some(next) = transform(directive, slot) {
            *slot = next;
        }
    }
}

fn apply_directive(directive: &TransformDirective, query: &mut Map<String, Value>, req: &mut ValidationRequest) {
    let location = directive.location();
    let name = directive.name();

    if location == ParameterLocation::Query && is_present(query.get(name)) {
        if query.get(name) == req.query.get(name) {
            // same value in both views: transform once, assign both
            if let Some(next) = query.get(name).and_then(|v| transform(directive, v)) {
                query.insert(name.to_string(), next.clone());
                req.query.insert(name.to_string(), next);
            }
            debug!(parameter = %name, directive = ?directive, "directive applied");
            return;
        }
        apply_in_place(directive, query);
    }
    if let Some(host) = req.host_map_mut(location) {
        apply_in_place(directive, host);
    }
}

fn write_back(schema: &SynthesizedSchema, instance: &mut Value, req: &mut ValidationRequest) {
    for (field, location) in [
        ("query", ParameterLocation::Query),
        ("headers", ParameterLocation::Header),
        ("params", ParameterLocation::Path),
        ("cookies", ParameterLocation::Cookie),
    ] {
        let Some(validated) = instance.get_mut(field).and_then(Value::as_object_mut) else {
            continue;
        };
        let declared = &schema.location(location).properties;
        let Some(host) = req.host_map_mut(location) else {
            continue;
        };
        for name in declared.keys() {
            if location == ParameterLocation::Cookie && !host.contains_key(name) {
                continue;
            }
            if let Some(value) = validated.remove(name) {
                host.insert(name.clone(), value);
            }
        }
    }
}
