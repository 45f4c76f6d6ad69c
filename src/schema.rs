//! # Parameter Schema Synthesis
//!
//! Turns a route's parameter list and request body into one structural schema
//! per (route, content type), plus the [`TransformDirective`]s that reshape
//! raw parameter strings before the schema is checked.
//!
//! The synthesized request schema has the form:
//!
//! ```json
//! {
//!   "required": ["query", "headers", "params", "body"],
//!   "properties": {
//!     "query":   {"type": "object", "properties": {...}, "required": [...]},
//!     "headers": {"type": "object", "properties": {...}},
//!     "params":  {"type": "object", "properties": {...}},
//!     "cookies": {"type": "object", "properties": {...}},
//!     "body":    {...}
//!   }
//! }
//! ```
//!
//! `body` is only listed as required when the request body is.

use crate::content_type::{is_json_media_type, ContentType};
use crate::error::ValidationFailure;
use crate::spec::{
    ContractDocument, ParameterDefinition, ParameterLocation, ParameterSchemaSource,
    ParameterStyle, RouteMeta,
};
use serde_json::{json, Map, Value};
use tracing::debug;

/// A transformation applied to a raw parameter value before validation.
///
/// Directives run in a fixed order: every `ParseJson` first, then every
/// `SplitArray`, then every `WrapSingleAsArray`. A JSON-encoded array of
/// objects must never be split on a delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformDirective {
    /// Decode a JSON-encoded string value
    ParseJson {
        name: String,
        location: ParameterLocation,
    },
    /// Split a delimited string into an array of strings
    SplitArray {
        name: String,
        location: ParameterLocation,
        delimiter: char,
    },
    /// Wrap a lone scalar into a one-element array
    WrapSingleAsArray {
        name: String,
        location: ParameterLocation,
    },
}

impl TransformDirective {
    fn rank(&self) -> u8 {
        match self {
            TransformDirective::ParseJson { .. } => 0,
            TransformDirective::SplitArray { .. } => 1,
            TransformDirective::WrapSingleAsArray { .. } => 2,
        }
    }

    /// Parameter name the directive targets (lower-cased for headers)
    pub fn name(&self) -> &str {
        match self {
            TransformDirective::ParseJson { name, .. }
            | TransformDirective::SplitArray { name, .. }
            | TransformDirective::WrapSingleAsArray { name, .. } => name,
        }
    }

    /// Location the directive targets
    pub fn location(&self) -> ParameterLocation {
        match self {
            TransformDirective::ParseJson { location, .. }
            | TransformDirective::SplitArray { location, .. }
            | TransformDirective::WrapSingleAsArray { location, .. } => *location,
        }
    }
}

/// Declared parameters of one location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationSchema {
    pub properties: Map<String, Value>,
    pub required: Vec<String>,
}

impl LocationSchema {
    fn insert(&mut self, name: String, schema: Value, required: bool) {
        if required && !self.required.contains(&name) {
            self.required.push(name.clone());
        }
        self.properties.insert(name, schema);
    }

    /// Whether `name` is a declared parameter
    #[must_use]
    pub fn declares(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Render as `{type: object, properties, required?}`
    #[must_use]
    pub fn to_schema(&self) -> Value {
        let mut schema = json!({
            "type": "object",
            "properties": Value::Object(self.properties.clone()),
        });
        if !self.required.is_empty() {
            schema["required"] = json!(self.required);
        }
        schema
    }
}

/// Output of [`ParameterSchemaSynthesizer::synthesize`]. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedSchema {
    pub query: LocationSchema,
    pub headers: LocationSchema,
    pub params: LocationSchema,
    pub cookies: LocationSchema,
    pub body: Value,
    pub body_required: bool,
    /// Directives in application order
    pub directives: Vec<TransformDirective>,
}

impl SynthesizedSchema {
    /// Declared parameters of `location`
    #[must_use]
    pub fn location(&self, location: ParameterLocation) -> &LocationSchema {
        match location {
            ParameterLocation::Query => &self.query,
            ParameterLocation::Header => &self.headers,
            ParameterLocation::Path => &self.params,
            ParameterLocation::Cookie => &self.cookies,
        }
    }

    fn location_mut(&mut self, location: ParameterLocation) -> &mut LocationSchema {
        match location {
            ParameterLocation::Query => &mut self.query,
            ParameterLocation::Header => &mut self.headers,
            ParameterLocation::Path => &mut self.params,
            ParameterLocation::Cookie => &mut self.cookies,
        }
    }

    /// The combined request schema handed to the compiler
    #[must_use]
    pub fn to_schema(&self) -> Value {
        let mut required = vec!["query", "headers", "params"];
        if self.body_required {
            required.push("body");
        }
        json!({
            "required": required,
            "properties": {
                "body": self.body.clone(),
                "query": self.query.to_schema(),
                "headers": self.headers.to_schema(),
                "params": self.params.to_schema(),
                "cookies": self.cookies.to_schema(),
            }
        })
    }
}

/// Builds [`SynthesizedSchema`]s for the routes of one contract.
#[derive(Debug, Clone, Copy)]
pub struct ParameterSchemaSynthesizer<'a> {
    doc: &'a ContractDocument,
}

impl<'a> ParameterSchemaSynthesizer<'a> {
    pub fn new(doc: &'a ContractDocument) -> Self {
        Self { doc }
    }

    /// Synthesize the request schema of `route` for `content_type`.
    ///
    /// # Errors
    ///
    /// - `ContractShape` (400) for an unresolvable `$ref`, an unknown `in` or
    ///   `style`, or a parameter with neither `schema` nor `content`
    /// - `UnsupportedMediaType` (415) when the body declares no entry for
    ///   `content_type`
    pub fn synthesize(
        &self,
        route: &RouteMeta,
        content_type: &ContentType,
    ) -> Result<SynthesizedSchema, ValidationFailure> {
        let mut out = SynthesizedSchema {
            query: LocationSchema::default(),
            headers: LocationSchema::default(),
            params: LocationSchema::default(),
            cookies: LocationSchema::default(),
            body: Value::Object(Map::new()),
            body_required: false,
            directives: Vec::new(),
        };

        for raw in &route.parameters {
            let resolved = self.doc.resolve(raw)?;
            let param = ParameterDefinition::from_value(resolved, &route.path_pattern)?;
            self.add_parameter(&mut out, &param, &route.path_pattern)?;
        }
        out.directives.sort_by_key(TransformDirective::rank);

        if let Some(raw_body) = &route.request_body {
            let request_body = self.doc.resolve(raw_body)?;
            if let Some(content) = request_body.get("content").and_then(Value::as_object) {
                out.body = self.body_schema(&route.path_pattern, content, content_type)?;
                out.body_required = request_body
                    .get("required")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
            }
        }

        debug!(
            route = %route.path_pattern,
            method = %route.method,
            content_type = %content_type.cache_key(),
            directive_count = out.directives.len(),
            body_required = out.body_required,
            "request schema synthesized"
        );
        Ok(out)
    }

    fn add_parameter(
        &self,
        out: &mut SynthesizedSchema,
        param: &ParameterDefinition,
        route: &str,
    ) -> Result<(), ValidationFailure> {
        let location = ParameterLocation::parse(&param.location).ok_or_else(|| {
            ValidationFailure::contract_shape(
                route,
                format!(
                    "Parameter 'in' has incorrect value '{}' for [{}]",
                    param.location, param.name
                ),
            )
        })?;
        let name = if location == ParameterLocation::Header {
            param.name.to_ascii_lowercase()
        } else {
            param.name.clone()
        };

        let schema = match &param.source {
            Some(ParameterSchemaSource::ContentKeyed { media_type, schema }) => {
                if is_json_media_type(media_type) {
                    out.directives.push(TransformDirective::ParseJson {
                        name: name.clone(),
                        location,
                    });
                }
                schema.clone()
            }
            Some(ParameterSchemaSource::Direct(schema)) => {
                if location == ParameterLocation::Query && schema_has_object(schema) {
                    out.directives.push(TransformDirective::ParseJson {
                        name: name.clone(),
                        location,
                    });
                }
                schema.clone()
            }
            None => {
                return Err(ValidationFailure::contract_shape(
                    route,
                    format!(
                        "No available parameter 'schema' or 'content' for [{}]",
                        param.name
                    ),
                ));
            }
        };

        if param.direct_schema().is_some_and(is_array_schema) {
            let style = match param.style.as_deref() {
                Some(raw) => ParameterStyle::parse(raw),
                None => Some(location.default_style()),
            };
            let explode = param
                .explode
                .unwrap_or(style == Some(ParameterStyle::Form));
            if explode {
                out.directives.push(TransformDirective::WrapSingleAsArray {
                    name: name.clone(),
                    location,
                });
            } else {
                let delimiter = style.and_then(ParameterStyle::array_delimiter).ok_or_else(|| {
                    ValidationFailure::contract_shape(
                        route,
                        format!(
                            "Parameter 'style' has incorrect value '{}' for [{}]",
                            param.style.as_deref().unwrap_or_default(),
                            param.name
                        ),
                    )
                })?;
                out.directives.push(TransformDirective::SplitArray {
                    name: name.clone(),
                    location,
                    delimiter,
                });
            }
        }

        out.location_mut(location).insert(name, schema, param.required);
        Ok(())
    }

    fn body_schema(
        &self,
        route: &str,
        content: &Map<String, Value>,
        content_type: &ContentType,
    ) -> Result<Value, ValidationFailure> {
        let media = if content_type.is_provided() {
            select_media(content, content_type)
                .ok_or_else(|| ValidationFailure::unsupported_media_type(route, content_type.raw()))?
        } else {
            match content
                .get("application/json")
                .or_else(|| content.iter().find(|(k, _)| is_json_media_type(k)).map(|(_, v)| v))
            {
                Some(media) => media,
                None => return Ok(Value::Object(Map::new())),
            }
        };
        match media.get("schema") {
            Some(schema) => self.cleanse_read_only(schema),
            None => Ok(Value::Object(Map::new())),
        }
    }

    /// Drop `readOnly` properties from the body's `required` list. A `$ref`
    /// body schema is expanded one level into a private copy first; the
    /// shared component is never modified.
    fn cleanse_read_only(&self, schema: &Value) -> Result<Value, ValidationFailure> {
        let mut body = if schema.get("$ref").is_some() {
            let target = self.doc.resolve(schema)?;
            if target.get("properties").is_none() {
                return Ok(schema.clone());
            }
            target.clone()
        } else {
            schema.clone()
        };

        let read_only: Vec<String> = match body.get("properties").and_then(Value::as_object) {
            Some(props) => props
                .iter()
                .filter(|(_, prop)| self.is_read_only(prop))
                .map(|(name, _)| name.clone())
                .collect(),
            None => return Ok(body),
        };
        let Some(obj) = body.as_object_mut() else {
            return Ok(body);
        };
        if let Some(required) = obj.get_mut("required").and_then(Value::as_array_mut) {
            required.retain(|r| !matches!(r.as_str(), Some(r) if read_only.iter().any(|n| n == r)));
            // Draft 4 rejects an empty `required`
            if required.is_empty() {
                obj.remove("required");
            }
        }
        Ok(body)
    }

    fn is_read_only(&self, prop: &Value) -> bool {
        let resolved = self.doc.resolve(prop).unwrap_or(prop);
        resolved.get("readOnly").and_then(Value::as_bool).unwrap_or(false)
    }
}

/// Pick the content entry for a request content type: its equivalents in
/// order, then the `type/*` wildcard, then `*/*`.
fn select_media<'c>(content: &'c Map<String, Value>, content_type: &ContentType) -> Option<&'c Value> {
    if let Some(media) = content_type
        .equivalents()
        .iter()
        .find_map(|key| content.get(key))
    {
        return Some(media);
    }
    let media_type = content_type.media_type()?;
    let family = media_type.split('/').next().unwrap_or_default();
    content
        .get(&format!("{family}/*"))
        .or_else(|| content.get("*/*"))
}

fn type_includes(schema: &Value, name: &str) -> bool {
    match schema.get("type") {
        Some(Value::String(t)) => t == name,
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some(name)),
        _ => false,
    }
}

/// Whether a schema describes an object directly or through any
/// `allOf`/`oneOf`/`anyOf` branch. `$ref`s are not followed.
pub fn schema_has_object(schema: &Value) -> bool {
    if type_includes(schema, "object") {
        return true;
    }
    ["allOf", "oneOf", "anyOf"].iter().any(|key| {
        schema
            .get(*key)
            .and_then(Value::as_array)
            .is_some_and(|branches| branches.iter().any(schema_has_object))
    })
}

fn is_array_schema(schema: &Value) -> bool {
    type_includes(schema, "array")
}

/// Names of the query-located security scheme parameters that may appear on
/// `route` without being declared. The route's own requirements apply,
/// falling back to the document's top-level ones.
#[must_use]
pub fn security_query_params(doc: &ContractDocument, route: &RouteMeta) -> Vec<String> {
    let requirements = match route.security.as_deref() {
        Some(own) => own,
        None => doc.security(),
    };
    let Some(schemes) = doc.security_schemes() else {
        return Vec::new();
    };
    let mut names: Vec<String> = Vec::new();
    for requirement in requirements {
        let Some(requirement) = requirement.as_object() else {
            continue;
        };
        for scheme_name in requirement.keys() {
            let Some(scheme) = schemes.get(scheme_name) else {
                continue;
            };
            let scheme = doc.resolve(scheme).unwrap_or(scheme);
            if scheme.get("in").and_then(Value::as_str) != Some("query") {
                continue;
            }
            if let Some(name) = scheme.get("name").and_then(Value::as_str) {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
    }
    names
}
