//! # Validator Facade
//!
//! [`OpenApiValidator`] wires one contract into both pipelines: it builds
//! the route index once, shares it (read-only) between the request and
//! response validators, and applies the [`ValidatorConfig`] switches.
//!
//! ```rust,no_run
//! use brrtguard::{OpenApiValidator, ValidationRequest, ValidatorConfig};
//! use http::Method;
//! use serde_json::json;
//!
//! let validator = OpenApiValidator::from_file("openapi.yaml", ValidatorConfig::from_env())?;
//! let mut req = ValidationRequest::new(Method::POST, "/pets")
//!     .with_header("content-type", "application/json")
//!     .with_body(json!({"name": "rex"}));
//! match validator.validate_request(&mut req) {
//!     Ok(outcome) => println!("{outcome:?}"),
//!     Err(failure) => println!("{}", failure.to_json()),
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::config::ValidatorConfig;
use crate::error::ValidationFailure;
use crate::request::{RequestOutcome, RequestValidator, ValidationRequest};
use crate::response::ResponseValidator;
use crate::router::RouteIndex;
use crate::spec::{load_contract, ContractDocument};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Request and response validation for one mounted contract.
#[derive(Debug, Clone)]
pub struct OpenApiValidator {
    contract: Arc<ContractDocument>,
    routes: Arc<RouteIndex>,
    config: ValidatorConfig,
    requests: RequestValidator,
    responses: ResponseValidator,
}

impl OpenApiValidator {
    /// Index `contract` and prepare both pipelines.
    ///
    /// # Errors
    ///
    /// Fails when the route table cannot be built.
    pub fn new(contract: ContractDocument, config: ValidatorConfig) -> anyhow::Result<Self> {
        let contract = Arc::new(contract);
        let routes = Arc::new(RouteIndex::from_contract(&contract)?);
        let requests = RequestValidator::new(Arc::clone(&contract), Arc::clone(&routes), &config);
        let responses = ResponseValidator::new(Arc::clone(&contract), Arc::clone(&routes), &config);
        info!(
            title = %contract.title(),
            operations = routes.len(),
            validate_requests = config.validate_requests,
            validate_responses = config.validate_responses,
            "OpenAPI validator ready"
        );
        Ok(Self {
            contract,
            routes,
            config,
            requests,
            responses,
        })
    }

    /// Load a contract file and prepare both pipelines.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be loaded or indexed.
    pub fn from_file(path: impl AsRef<Path>, config: ValidatorConfig) -> anyhow::Result<Self> {
        Self::new(load_contract(path)?, config)
    }

    /// Validate an incoming request; see [`RequestValidator::validate`].
    ///
    /// # Errors
    ///
    /// The request-side [`ValidationFailure`]s.
    pub fn validate_request(&self, req: &mut ValidationRequest) -> Result<RequestOutcome, ValidationFailure> {
        if !self.config.validate_requests {
            return Ok(RequestOutcome::Skipped);
        }
        self.requests.validate(req)
    }

    /// Validate an outgoing body; see [`ResponseValidator::validate`]. The
    /// body is returned untouched when response validation is switched off.
    ///
    /// # Errors
    ///
    /// The response-side [`ValidationFailure`]s (always 500).
    pub fn validate_response(&self, req: &ValidationRequest, status: u16, body: Value) -> Result<Value, ValidationFailure> {
        if !self.config.validate_responses {
            return Ok(body);
        }
        self.responses.validate(req, status, body)
    }

    pub fn contract(&self) -> &ContractDocument {
        &self.contract
    }

    pub fn routes(&self) -> &RouteIndex {
        &self.routes
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn request_validator(&self) -> &RequestValidator {
        &self.requests
    }

    pub fn response_validator(&self) -> &ResponseValidator {
        &self.responses
    }
}
