use crate::error::ValidationFailure;
use http::Method;
use serde_json::{Map, Value};

/// Where a parameter is carried in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    /// Parse an OpenAPI `in` value. Unknown values yield `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "path" => Some(ParameterLocation::Path),
            "query" => Some(ParameterLocation::Query),
            "header" => Some(ParameterLocation::Header),
            "cookie" => Some(ParameterLocation::Cookie),
            _ => None,
        }
    }

    /// Name of the request field validated for this location
    #[must_use]
    pub fn request_field(self) -> &'static str {
        match self {
            ParameterLocation::Path => "params",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "headers",
            ParameterLocation::Cookie => "cookies",
        }
    }

    /// The style OpenAPI assumes when a parameter declares none
    #[must_use]
    pub fn default_style(self) -> ParameterStyle {
        match self {
            ParameterLocation::Query | ParameterLocation::Cookie => ParameterStyle::Form,
            ParameterLocation::Path | ParameterLocation::Header => ParameterStyle::Simple,
        }
    }
}

impl std::fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterLocation::Path => write!(f, "path"),
            ParameterLocation::Query => write!(f, "query"),
            ParameterLocation::Header => write!(f, "header"),
            ParameterLocation::Cookie => write!(f, "cookie"),
        }
    }
}

/// OpenAPI parameter serialization style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterStyle {
    Matrix,
    Label,
    Form,
    Simple,
    SpaceDelimited,
    PipeDelimited,
    DeepObject,
}

impl ParameterStyle {
    /// Parse an OpenAPI `style` value. Unknown values yield `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "matrix" => Some(ParameterStyle::Matrix),
            "label" => Some(ParameterStyle::Label),
            "form" => Some(ParameterStyle::Form),
            "simple" => Some(ParameterStyle::Simple),
            "spaceDelimited" => Some(ParameterStyle::SpaceDelimited),
            "pipeDelimited" => Some(ParameterStyle::PipeDelimited),
            "deepObject" => Some(ParameterStyle::DeepObject),
            _ => None,
        }
    }

    /// Delimiter joining the items of a non-exploded array in this style
    #[must_use]
    pub fn array_delimiter(self) -> Option<char> {
        match self {
            ParameterStyle::Form | ParameterStyle::Simple => Some(','),
            ParameterStyle::SpaceDelimited => Some(' '),
            ParameterStyle::PipeDelimited => Some('|'),
            ParameterStyle::Matrix | ParameterStyle::Label | ParameterStyle::DeepObject => None,
        }
    }
}

impl std::fmt::Display for ParameterStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ParameterStyle::Matrix => "matrix",
            ParameterStyle::Label => "label",
            ParameterStyle::Form => "form",
            ParameterStyle::Simple => "simple",
            ParameterStyle::SpaceDelimited => "spaceDelimited",
            ParameterStyle::PipeDelimited => "pipeDelimited",
            ParameterStyle::DeepObject => "deepObject",
        };
        write!(f, "{s}")
    }
}

/// Where a parameter's structural schema comes from: a bare `schema`, or the
/// single entry of a `content` map.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterSchemaSource {
    Direct(Value),
    ContentKeyed { media_type: String, schema: Value },
}

impl ParameterSchemaSource {
    /// The structural schema regardless of source
    #[must_use]
    pub fn schema(&self) -> &Value {
        match self {
            ParameterSchemaSource::Direct(schema) => schema,
            ParameterSchemaSource::ContentKeyed { schema, .. } => schema,
        }
    }
}

/// A parameter definition as declared by the contract (after `$ref`
/// resolution). `location` and `style` are kept raw so that malformed values
/// surface as contract errors when the route is first exercised.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDefinition {
    pub name: String,
    pub location: String,
    pub required: bool,
    pub source: Option<ParameterSchemaSource>,
    pub style: Option<String>,
    pub explode: Option<bool>,
}

impl ParameterDefinition {
    /// Read a resolved parameter object.
    pub fn from_value(value: &Value, route: &str) -> Result<Self, ValidationFailure> {
        let obj = value.as_object().ok_or_else(|| {
            ValidationFailure::contract_shape(route, "Parameter definition must be an object")
        })?;
        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| ValidationFailure::contract_shape(route, "Parameter is missing 'name'"))?
            .to_string();
        let location = obj
            .get("in")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let source = if let Some(schema) = obj.get("schema") {
            Some(ParameterSchemaSource::Direct(schema.clone()))
        } else if let Some(content) = obj.get("content").and_then(Value::as_object) {
            Some(Self::content_source(content, &name, route)?)
        } else {
            None
        };

        Ok(Self {
            name,
            location,
            required: obj.get("required").and_then(Value::as_bool).unwrap_or(false),
            source,
            style: obj.get("style").and_then(Value::as_str).map(str::to_string),
            explode: obj.get("explode").and_then(Value::as_bool),
        })
    }

    fn content_source(
        content: &Map<String, Value>,
        name: &str,
        route: &str,
    ) -> Result<ParameterSchemaSource, ValidationFailure> {
        let mut entries = content.iter();
        match (entries.next(), entries.next()) {
            (Some((media_type, media)), None) => Ok(ParameterSchemaSource::ContentKeyed {
                media_type: media_type.clone(),
                schema: media.get("schema").cloned().unwrap_or_else(|| Value::Object(Map::new())),
            }),
            _ => Err(ValidationFailure::contract_shape(
                route,
                format!("Parameter 'content' must contain exactly one entry for [{name}]"),
            )),
        }
    }

    /// The direct schema, when the parameter declares one
    #[must_use]
    pub fn direct_schema(&self) -> Option<&Value> {
        match &self.source {
            Some(ParameterSchemaSource::Direct(schema)) => Some(schema),
            _ => None,
        }
    }
}

/// The contract fragment for one (method, route) pair.
///
/// Parameters, request body and responses are kept as raw contract values,
/// including unresolved `$ref`s; resolution happens when a validator is built.
#[derive(Debug, Clone)]
pub struct RouteMeta {
    pub method: Method,
    /// Path template including any server base path (e.g. `/v1/pets/{id}`)
    pub path_pattern: String,
    pub operation_id: Option<String>,
    /// Names of the `{...}` segments of the template, in order
    pub path_params: Vec<String>,
    /// Path-level and operation-level parameters, operation-level winning
    pub parameters: Vec<Value>,
    pub request_body: Option<Value>,
    pub responses: Map<String, Value>,
    /// Operation-level security requirements, when declared
    pub security: Option<Vec<Value>>,
}

/// A problem found while reading the contract.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub location: String,
    pub kind: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(
        location: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ValidationIssue {
            location: location.into(),
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Collapse collected issues into a single error.
pub fn fail_if_issues(issues: Vec<ValidationIssue>) -> anyhow::Result<()> {
    if issues.is_empty() {
        return Ok(());
    }
    let lines: Vec<String> = issues
        .iter()
        .map(|i| format!("[{}] {}: {}", i.kind, i.location, i.message))
        .collect();
    anyhow::bail!(
        "OpenAPI contract is invalid. {} issue(s) found:\n{}",
        issues.len(),
        lines.join("\n")
    )
}
