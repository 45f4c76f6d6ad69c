//! # Response Validation
//!
//! [`ResponseValidatorBuilder`] compiles one validator per declared response
//! of a route; [`ResponseValidator`] picks the validator for an outgoing
//! status code and checks the body.
//!
//! Status selection precedence: the exact code (`404`), then its class
//! (`4XX`), then `default`. A status matching none of them is a contract
//! gap and fails with 500. A declared response without a JSON schema is
//! accepted as is.

use crate::compiler::{CompiledValidator, ValidatorCompiler};
use crate::config::ValidatorConfig;
use crate::content_type::{is_json_media_type, ContentType};
use crate::error::ValidationFailure;
use crate::request::ValidationRequest;
use crate::router::{RouteIndex, RouteLookup};
use crate::spec::{ContractDocument, RouteMeta};
use crate::validator_cache::{ValidatorCache, ValidatorKey};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Validators for every declared response name of one route. `None` marks a
/// declared response with no JSON schema to check.
#[derive(Debug, Default)]
pub struct ResponseValidators {
    validators: HashMap<String, Option<CompiledValidator>>,
}

impl ResponseValidators {
    /// Pick the response entry for `status`: exact code, then class
    /// (`NXX`, either case), then `default`.
    #[must_use]
    pub fn select(&self, status: u16) -> Option<(&str, Option<&CompiledValidator>)> {
        let exact = status.to_string();
        let class = format!("{}XX", status / 100);
        let class_lower = format!("{}xx", status / 100);
        let found = [exact.as_str(), class.as_str(), class_lower.as_str(), "default"]
            .into_iter()
            .find_map(|name| {
                self.validators
                    .get_key_value(name)
                    .map(|(k, v)| (k.as_str(), v.as_ref()))
            });
        found
    }

    /// Number of declared responses
    #[must_use]
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Number of responses that carry a JSON schema
    #[must_use]
    pub fn validated_count(&self) -> usize {
        self.validators.values().filter(|v| v.is_some()).count()
    }
}

/// Builds [`ResponseValidators`] for the routes of one contract.
#[derive(Debug, Clone, Copy)]
pub struct ResponseValidatorBuilder<'a> {
    doc: &'a ContractDocument,
    compiler: &'a ValidatorCompiler,
}

impl<'a> ResponseValidatorBuilder<'a> {
    pub fn new(doc: &'a ContractDocument, compiler: &'a ValidatorCompiler) -> Self {
        Self { doc, compiler }
    }

    /// The schema of the first JSON media type of a response, if that entry
    /// declares one
    fn json_schema<'r>(response: &'r Value) -> Option<&'r Value> {
        let content = response.get("content")?.as_object()?;
        let (_, media) = content.iter().find(|(media_type, _)| is_json_media_type(media_type))?;
        media.get("schema")
    }

    /// Compile a validator for each declared response of `route`.
    ///
    /// # Errors
    ///
    /// Contract-shape failures for unresolvable response references and
    /// schema-compilation failures.
    pub fn build(&self, route: &RouteMeta) -> Result<ResponseValidators, ValidationFailure> {
        let mut validators = HashMap::with_capacity(route.responses.len());
        for (name, response) in &route.responses {
            let response = self.doc.resolve(response)?;
            let compiled = match Self::json_schema(response) {
                Some(schema) => {
                    let wrapped = json!({
                        "type": "object",
                        "properties": { "response": schema.clone() },
                    });
                    Some(self.compiler.compile(wrapped, &route.path_pattern)?)
                }
                None => None,
            };
            validators.insert(name.clone(), compiled);
        }
        let built = ResponseValidators { validators };
        debug!(
            route = %route.path_pattern,
            method = %route.method,
            responses = built.len(),
            validated = built.validated_count(),
            "response validators built"
        );
        Ok(built)
    }
}

/// Validates outgoing response bodies for one contract.
#[derive(Debug, Clone)]
pub struct ResponseValidator {
    doc: Arc<ContractDocument>,
    routes: Arc<RouteIndex>,
    compiler: ValidatorCompiler,
    cache: ValidatorCache<ResponseValidators>,
}

impl ResponseValidator {
    pub fn new(doc: Arc<ContractDocument>, routes: Arc<RouteIndex>, config: &ValidatorConfig) -> Self {
        let compiler = ValidatorCompiler::new(&doc, config.validate_formats);
        Self {
            doc,
            routes,
            compiler,
            cache: ValidatorCache::new(config.schema_cache),
        }
    }

    /// Compiled validator maps, keyed by (method, route, content type)
    pub fn cache(&self) -> &ValidatorCache<ResponseValidators> {
        &self.cache
    }

    /// Check `body` as the response to `req` with `status`, handing the body
    /// back untouched on success. Requests the contract does not manage pass
    /// through.
    ///
    /// # Errors
    ///
    /// `NoSchemaForStatus` (500) when no declared response matches `status`,
    /// `ResponseValidation` (500) when the body fails its schema.
    pub fn validate(&self, req: &ValidationRequest, status: u16, body: Value) -> Result<Value, ValidationFailure> {
        let route = match self.routes.lookup(&req.method, req.path()) {
            RouteLookup::Matched(m) => m.route,
            RouteLookup::MethodNotAllowed { .. } | RouteLookup::Unmanaged => return Ok(body),
        };

        let content_type = ContentType::from_headers(&req.headers);
        let key = ValidatorKey::new(&req.method, &route.path_pattern, &content_type);
        let validators = self.cache.get_or_build(&key, || {
            ResponseValidatorBuilder::new(&self.doc, &self.compiler).build(&route)
        })?;

        let Some((name, validator)) = validators.select(status) else {
            warn!(method = %req.method, route = %route.path_pattern, status = status, "no response declared for status");
            return Err(ValidationFailure::no_schema_for_status(&req.original_url, status));
        };
        let Some(validator) = validator else {
            debug!(route = %route.path_pattern, response = %name, "response has no JSON schema, accepted");
            return Ok(body);
        };

        let mut instance = Map::new();
        instance.insert("response".to_string(), body);
        let mut instance = Value::Object(instance);
        match validator.validate(&instance) {
            Ok(()) => Ok(instance
                .get_mut("response")
                .map(Value::take)
                .unwrap_or_default()),
            Err(errors) => {
                warn!(
                    method = %req.method,
                    route = %route.path_pattern,
                    status = status,
                    response = %name,
                    error_count = errors.len(),
                    "response violates contract"
                );
                Err(ValidationFailure::response_validation(errors))
            }
        }
    }
}
