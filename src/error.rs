//! # Validation Error Taxonomy
//!
//! Every failure raised by the request and response pipelines is a
//! [`ValidationFailure`]: an HTTP status, a [`FailureKind`], a summary message
//! and the list of individual [`ValidationError`]s that caused it.
//!
//! The serialized form is the wire shape returned to clients:
//!
//! ```json
//! {
//!   "status": 400,
//!   "message": "request.query.limit: must be integer",
//!   "errors": [
//!     { "path": ".query.limit", "message": "\"ten\" is not of type \"integer\"", "errorCode": "type.openapi.validation" }
//!   ]
//! }
//! ```
//!
//! Contract problems surface lazily, on the first request that exercises the
//! offending route. Response-side failures are always 500: a handler that
//! violates its own contract is a server bug, never the client's fault.

use serde::Serialize;
use std::fmt;

/// A single validation problem, located by a dotted data path
/// (e.g. `.query.tags[1]`, `.body.name`, `.response.id`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// Data path of the offending value
    pub path: String,
    /// Human-readable description
    pub message: String,
    /// `<keyword>.openapi.validation` for structural failures, absent for
    /// contract-shape and routing failures
    #[serde(rename = "errorCode", skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl ValidationError {
    /// Create an error without an error code
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            error_code: None,
        }
    }

    /// Create an error produced by a failed schema keyword
    pub fn with_keyword(
        path: impl Into<String>,
        message: impl Into<String>,
        keyword: &str,
    ) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            error_code: Some(format!("{keyword}.openapi.validation")),
        }
    }
}

/// The kind of failure. Each kind fixes the HTTP status it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The contract itself is malformed for a parameter or body (bad `in`,
    /// bad `style`, missing schema/content, dangling `$ref`)
    ContractShape,
    /// Request content type not declared by the route
    UnsupportedMediaType,
    /// Route known, method undeclared
    MethodNotAllowed,
    /// Query key neither declared nor a security-scheme parameter
    UnknownQueryParameter,
    /// Request failed the synthesized schema
    SchemaValidation,
    /// No declared response matches the outgoing status code
    NoSchemaForStatus,
    /// Outgoing body failed its response schema
    ResponseValidation,
    /// The evaluator rejected a schema taken from the contract
    SchemaCompilation,
}

impl FailureKind {
    /// HTTP status code for this kind
    #[must_use]
    pub fn status(self) -> u16 {
        match self {
            FailureKind::ContractShape
            | FailureKind::UnknownQueryParameter
            | FailureKind::SchemaValidation => 400,
            FailureKind::MethodNotAllowed => 405,
            FailureKind::UnsupportedMediaType => 415,
            FailureKind::NoSchemaForStatus
            | FailureKind::ResponseValidation
            | FailureKind::SchemaCompilation => 500,
        }
    }

    /// Whether the failure is the server's fault
    #[must_use]
    pub fn is_server_error(self) -> bool {
        self.status() >= 500
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::ContractShape => "ContractShape",
            FailureKind::UnsupportedMediaType => "UnsupportedMediaType",
            FailureKind::MethodNotAllowed => "MethodNotAllowed",
            FailureKind::UnknownQueryParameter => "UnknownQueryParameter",
            FailureKind::SchemaValidation => "SchemaValidation",
            FailureKind::NoSchemaForStatus => "NoSchemaForStatus",
            FailureKind::ResponseValidation => "ResponseValidation",
            FailureKind::SchemaCompilation => "SchemaCompilation",
        };
        write!(f, "{s}")
    }
}

/// Aggregated failure raised by the validation pipelines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFailure {
    /// HTTP status code
    pub status: u16,
    /// Failure classification
    #[serde(skip)]
    pub kind: FailureKind,
    /// Summary of all errors
    pub message: String,
    /// Individual errors
    pub errors: Vec<ValidationError>,
}

impl ValidationFailure {
    fn single(kind: FailureKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status: kind.status(),
            kind,
            errors: vec![ValidationError::new(path, message.clone())],
            message,
        }
    }

    fn aggregate(kind: FailureKind, data_var: &str, errors: Vec<ValidationError>) -> Self {
        let message = errors
            .iter()
            .map(|e| format!("{data_var}{}: {}", e.path, e.message))
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            status: kind.status(),
            kind,
            message,
            errors,
        }
    }

    /// The contract is malformed at `path`
    pub fn contract_shape(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::single(FailureKind::ContractShape, path, message)
    }

    /// The request media type has no body schema on this route
    pub fn unsupported_media_type(path: impl Into<String>, content_type: Option<&str>) -> Self {
        let message = match content_type {
            Some(ct) => format!("unsupported media type {ct}"),
            None => "media type not specified".to_string(),
        };
        Self::single(FailureKind::UnsupportedMediaType, path, message)
    }

    /// The route exists but does not declare `method`
    pub fn method_not_allowed(path: impl Into<String>, method: &http::Method) -> Self {
        Self::single(
            FailureKind::MethodNotAllowed,
            path,
            format!("{method} method not allowed"),
        )
    }

    /// `name` is not a declared or whitelisted query parameter
    pub fn unknown_query_parameter(name: &str) -> Self {
        Self::single(
            FailureKind::UnknownQueryParameter,
            format!(".query.{name}"),
            format!("Unknown query parameter '{name}'"),
        )
    }

    /// The request failed its synthesized schema
    pub fn schema_validation(errors: Vec<ValidationError>) -> Self {
        Self::aggregate(FailureKind::SchemaValidation, "request", errors)
    }

    /// No response declared for `status`
    pub fn no_schema_for_status(path: impl Into<String>, status: u16) -> Self {
        Self::single(
            FailureKind::NoSchemaForStatus,
            path,
            format!("no schema defined for status code '{status}' in the openapi spec"),
        )
    }

    /// The outgoing body failed its response schema
    pub fn response_validation(errors: Vec<ValidationError>) -> Self {
        Self::aggregate(FailureKind::ResponseValidation, "", errors)
    }

    /// The evaluator could not compile a contract schema
    pub fn schema_compilation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::single(FailureKind::SchemaCompilation, path, message)
    }

    /// Serialize to the JSON body sent to clients
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "status": self.status,
            "message": self.message,
            "errors": self.errors,
        })
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.kind, self.status, self.message)
    }
}

impl std::error::Error for ValidationFailure {}
