//! # brrtguard
//!
//! **brrtguard** validates HTTP requests and responses against an
//! [OpenAPI 3.x](https://spec.openapis.org/oas/v3.1.0) contract. It is a
//! library: the host framework hands it a request (and later a response
//! body) and gets back either success, with the request's parameters
//! normalized in place, or a structured failure carrying an HTTP status.
//!
//! ## Architecture
//!
//! - **[`spec`]** - contract loading, `$ref` resolution and operation extraction
//! - **[`router`]** - path template matching for the contract's operations
//! - **[`content_type`]** - `Content-Type` parsing and media-type matching
//! - **[`schema`]** - synthesizes one JSON Schema per (operation, content type)
//!   covering query, headers, path params, cookies and body
//! - **[`compiler`]** - turns synthesized schemas into reusable validators
//! - **[`validator_cache`]** - memoizes compiled validators per
//!   (method, route, content type)
//! - **[`request`]** / **[`response`]** - the two validation pipelines
//! - **[`validator`]** - [`OpenApiValidator`], one contract wired to both pipelines
//! - **[`config`]** / **[`otel`]** - environment-driven switches and logging
//! - **[`error`]** - the failure taxonomy and its status codes
//!
//! ### Request Validation Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Host
//!     participant Val as OpenApiValidator
//!     participant Router as RouteIndex
//!     participant Cache as ValidatorCache
//!     participant Synth as ParameterSchemaSynthesizer
//!     participant Comp as ValidatorCompiler
//!
//!     Host->>Val: validate_request(&mut req)
//!     Val->>Router: lookup(method, path)
//!     alt unknown path
//!         Router-->>Host: Unmanaged (pass through)
//!     end
//!     alt method not declared
//!         Router-->>Host: 405
//!     end
//!     Val->>Cache: get_or_build(method-route-content_type)
//!     Cache->>Synth: synthesize(route, content type)
//!     Synth-->>Cache: schema + transform directives
//!     Cache->>Comp: compile(schema)
//!     Comp-->>Cache: CompiledValidator
//!     Val->>Val: reject unknown query keys (400)
//!     Val->>Val: apply directives, coerce scalars
//!     Val->>Val: validate {query, headers, params, cookies, body}
//!     Val-->>Host: Ok(Validated) or 400 with error list
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brrtguard::{OpenApiValidator, ValidationRequest, ValidatorConfig};
//! use brrtguard::spec::load_contract_str;
//! use http::Method;
//!
//! let contract = load_contract_str(r#"
//! openapi: 3.0.3
//! info: { title: Pets, version: "1" }
//! paths:
//!   /pets:
//!     get:
//!       parameters:
//!         - { name: limit, in: query, schema: { type: integer, maximum: 50 } }
//!       responses:
//!         "200": { description: ok }
//! "#)?;
//! let validator = OpenApiValidator::new(contract, ValidatorConfig::default())?;
//!
//! let mut ok = ValidationRequest::new(Method::GET, "/pets?limit=10");
//! assert!(validator.validate_request(&mut ok).is_ok());
//! assert_eq!(ok.query["limit"], 10);
//!
//! let mut bad = ValidationRequest::new(Method::GET, "/pets?limit=500");
//! assert_eq!(validator.validate_request(&mut bad).unwrap_err().status, 400);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Configuration
//!
//! [`ValidatorConfig::from_env`] reads the `BRRTR_*` switches; logging is set
//! up with [`otel::init_logging_with_config`] and `BRRTR_LOG_*`.

pub mod cli;
pub mod coerce;
pub mod compiler;
pub mod config;
pub mod content_type;
pub mod error;
pub mod otel;
pub mod request;
pub mod response;
pub mod router;
pub mod schema;
pub mod spec;
pub mod validator;
pub mod validator_cache;

pub use config::ValidatorConfig;
pub use content_type::ContentType;
pub use error::{FailureKind, ValidationError, ValidationFailure};
pub use request::{RequestOutcome, RequestValidator, ValidationRequest};
pub use response::{ResponseValidator, ResponseValidatorBuilder};
pub use router::{RouteIndex, RouteLookup, RouteMatch};
pub use schema::{ParameterSchemaSynthesizer, SynthesizedSchema, TransformDirective};
pub use spec::{load_contract, load_contract_str, ContractDocument, RouteMeta};
pub use validator::OpenApiValidator;
pub use validator_cache::{ValidatorCache, ValidatorKey};
