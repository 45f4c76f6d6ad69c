#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for the request validation pipeline
//!
//! # Test Coverage
//!
//! - Route resolution: unmanaged paths pass through, undeclared methods → 405
//! - Parameter locations: query, header, path, cookie (plain and signed)
//! - Scalar coercion and write-back of normalized values
//! - Unknown query parameter rejection and the security-scheme whitelist
//! - Request bodies: required bodies, content negotiation (415), readOnly
//!   stripping, `$ref` bodies
//! - Failure payload shape (`status`, `message`, `errors[].path`)

use brrtguard::spec::load_contract_str;
use brrtguard::{
    FailureKind, OpenApiValidator, RequestOutcome, ValidationFailure, ValidationRequest, ValidatorConfig,
};
use http::Method;
use serde_json::json;

const PETSTORE: &str = r##"
openapi: 3.0.3
info:
  title: Pet Store
  version: "1.0.0"
components:
  securitySchemes:
    ApiKeyQuery:
      type: apiKey
      in: query
      name: api_key
    ApiKeyHeader:
      type: apiKey
      in: header
      name: X-API-Key
  parameters:
    PetId:
      name: id
      in: path
      required: true
      schema:
        type: integer
        minimum: 1
  schemas:
    Pet:
      type: object
      required: [id, name]
      properties:
        id:
          type: integer
          readOnly: true
        name:
          type: string
          minLength: 1
        tag:
          type: string
          nullable: true
paths:
  /pets:
    get:
      operationId: list_pets
      security:
        - ApiKeyQuery: []
        - ApiKeyHeader: []
      parameters:
        - name: limit
          in: query
          schema:
            type: integer
            minimum: 1
            maximum: 100
        - name: X-Request-Id
          in: header
          required: true
          schema:
            type: string
        - name: session
          in: cookie
          schema:
            type: string
      responses:
        "200":
          description: ok
    post:
      operationId: add_pet
      requestBody:
        required: true
        content:
          application/json:
            schema:
              $ref: "#/components/schemas/Pet"
      responses:
        "201":
          description: created
  /pets/{id}:
    parameters:
      - $ref: "#/components/parameters/PetId"
    get:
      operationId: get_pet
      responses:
        "200":
          description: ok
    put:
      operationId: update_pet
      requestBody:
        content:
          application/json:
            schema:
              $ref: "#/components/schemas/Pet"
          text/plain:
            schema:
              type: string
              maxLength: 10
      responses:
        "200":
          description: ok
  /pets/{id}/photos:
    get:
      operationId: list_photos
      parameters:
        - $ref: "#/components/parameters/PetId"
        - name: fields
          in: query
          schema:
            type: string
            enum: [small, large]
      responses:
        "200":
          description: ok
"##;

fn validator_with(config: ValidatorConfig) -> OpenApiValidator {
    OpenApiValidator::new(load_contract_str(PETSTORE).unwrap(), config).unwrap()
}

fn validator() -> OpenApiValidator {
    validator_with(ValidatorConfig::default())
}

fn expect_failure(v: &OpenApiValidator, req: &mut ValidationRequest) -> ValidationFailure {
    v.validate_request(req).expect_err("request should be rejected")
}

#[test]
fn test_valid_query_and_header_are_accepted() {
    let v = validator();
    let mut req = ValidationRequest::new(Method::GET, "/pets?limit=10").with_header("X-Request-Id", "abc");
    let outcome = v.validate_request(&mut req).unwrap();
    assert_eq!(
        outcome,
        RequestOutcome::Validated {
            route: "/pets".to_string()
        }
    );
    // coerced to the declared type and written back
    assert_eq!(req.query["limit"], json!(10));
}

#[test]
fn test_query_constraint_violation() {
    let v = validator();
    let mut req = ValidationRequest::new(Method::GET, "/pets?limit=500").with_header("x-request-id", "abc");
    let failure = expect_failure(&v, &mut req);
    assert_eq!(failure.status, 400);
    assert_eq!(failure.kind, FailureKind::SchemaValidation);
    assert_eq!(failure.errors[0].path, ".query.limit");
    assert_eq!(failure.errors[0].error_code.as_deref(), Some("maximum.openapi.validation"));
    assert!(failure.message.starts_with("request.query.limit: "));
    // the host's view is left alone on failure
    assert_eq!(req.query["limit"], json!("500"));
}

#[test]
fn test_uncoercible_query_value() {
    let v = validator();
    let mut req = ValidationRequest::new(Method::GET, "/pets?limit=ten").with_header("x-request-id", "abc");
    let failure = expect_failure(&v, &mut req);
    assert_eq!(failure.status, 400);
    assert_eq!(failure.errors[0].path, ".query.limit");
}

#[test]
fn test_missing_required_header() {
    let v = validator();
    let mut req = ValidationRequest::new(Method::GET, "/pets");
    let failure = expect_failure(&v, &mut req);
    assert_eq!(failure.status, 400);
    assert_eq!(failure.errors.len(), 1);
    assert_eq!(failure.errors[0].path, ".headers.x-request-id");
    assert_eq!(failure.errors[0].error_code.as_deref(), Some("required.openapi.validation"));
}

#[test]
fn test_unknown_query_parameter_rejected() {
    let v = validator();
    let mut req = ValidationRequest::new(Method::GET, "/pets?limit=1&color=red").with_header("x-request-id", "abc");
    let failure = expect_failure(&v, &mut req);
    assert_eq!(failure.status, 400);
    assert_eq!(failure.kind, FailureKind::UnknownQueryParameter);
    assert_eq!(failure.message, "Unknown query parameter 'color'");
    assert_eq!(failure.errors[0].path, ".query.color");
}

#[test]
fn test_unknown_query_parameter_rejected_without_declared_query() {
    let v = validator();
    let mut req = ValidationRequest::new(Method::GET, "/pets/1?debug=1");
    let failure = expect_failure(&v, &mut req);
    assert_eq!(failure.kind, FailureKind::UnknownQueryParameter);
}

#[test]
fn test_unknown_query_parameter_allowed_by_config() {
    let v = validator_with(ValidatorConfig {
        allow_unknown_query_parameters: true,
        ..ValidatorConfig::default()
    });
    let mut req = ValidationRequest::new(Method::GET, "/pets?color=red").with_header("x-request-id", "abc");
    assert!(v.validate_request(&mut req).is_ok());
    assert_eq!(req.query["color"], json!("red"));
}

#[test]
fn test_security_query_parameter_whitelisted() {
    let v = validator();
    let mut req = ValidationRequest::new(Method::GET, "/pets?api_key=secret").with_header("x-request-id", "abc");
    assert!(v.validate_request(&mut req).is_ok());

    // the whitelist is per route: /pets/{id} has no security requirement
    let mut req = ValidationRequest::new(Method::GET, "/pets/3?api_key=secret");
    assert_eq!(expect_failure(&v, &mut req).kind, FailureKind::UnknownQueryParameter);
}

#[test]
fn test_unmanaged_path_passes_through() {
    let v = validator();
    let mut req = ValidationRequest::new(Method::GET, "/health?anything=goes");
    assert_eq!(v.validate_request(&mut req).unwrap(), RequestOutcome::Unmanaged);
}

#[test]
fn test_method_not_allowed() {
    let v = validator();
    let mut req = ValidationRequest::new(Method::DELETE, "/pets/1");
    let failure = expect_failure(&v, &mut req);
    assert_eq!(failure.status, 405);
    assert_eq!(failure.message, "DELETE method not allowed");
    assert_eq!(failure.errors[0].path, "/pets/1");
}

#[test]
fn test_path_parameter_coerced_and_checked() {
    let v = validator();
    let mut req = ValidationRequest::new(Method::GET, "/pets/42");
    v.validate_request(&mut req).unwrap();
    assert_eq!(req.params["id"], json!(42));

    let mut req = ValidationRequest::new(Method::GET, "/pets/0");
    let failure = expect_failure(&v, &mut req);
    assert_eq!(failure.errors[0].path, ".params.id");

    let mut req = ValidationRequest::new(Method::GET, "/pets/abc");
    assert_eq!(expect_failure(&v, &mut req).status, 400);
}

#[test]
fn test_enum_message_lists_allowed_values() {
    let v = validator();
    let mut req = ValidationRequest::new(Method::GET, "/pets/1/photos?fields=huge");
    let failure = expect_failure(&v, &mut req);
    assert_eq!(failure.errors[0].path, ".query.fields");
    assert_eq!(failure.errors[0].message, "\"huge\" is not one of the allowed values: small, large");
}

#[test]
fn test_signed_cookies_are_merged() {
    let v = validator();
    let mut req = ValidationRequest::new(Method::GET, "/pets")
        .with_header("x-request-id", "abc")
        .with_signed_cookie("session", "s-1");
    assert!(v.validate_request(&mut req).is_ok());
}

#[test]
fn test_required_body_missing_without_content_type() {
    let v = validator();
    let mut req = ValidationRequest::new(Method::POST, "/pets");
    let failure = expect_failure(&v, &mut req);
    assert_eq!(failure.status, 400);
    assert_eq!(failure.errors[0].path, ".body");
}

#[test]
fn test_read_only_property_not_required_on_input() {
    let v = validator();
    let mut req = ValidationRequest::new(Method::POST, "/pets")
        .with_header("content-type", "application/json")
        .with_body(json!({"name": "rex", "tag": null}));
    assert!(v.validate_request(&mut req).is_ok());
    // the body is handed back to the host
    assert_eq!(req.body, Some(json!({"name": "rex", "tag": null})));

    let mut req = ValidationRequest::new(Method::POST, "/pets")
        .with_header("content-type", "application/json; charset=utf-8")
        .with_body(json!({"tag": "x"}));
    let failure = expect_failure(&v, &mut req);
    assert_eq!(failure.errors.len(), 1);
    assert_eq!(failure.errors[0].path, ".body.name");
}

#[test]
fn test_unsupported_media_type() {
    let v = validator();
    let mut req = ValidationRequest::new(Method::POST, "/pets")
        .with_header("content-type", "application/xml")
        .with_body(json!("<pet/>"));
    let failure = expect_failure(&v, &mut req);
    assert_eq!(failure.status, 415);
    assert_eq!(failure.message, "unsupported media type application/xml");
}

#[test]
fn test_body_schema_follows_content_type() {
    let v = validator();
    let mut req = ValidationRequest::new(Method::PUT, "/pets/1")
        .with_header("content-type", "text/plain")
        .with_body(json!("short"));
    assert!(v.validate_request(&mut req).is_ok());

    let mut req = ValidationRequest::new(Method::PUT, "/pets/1")
        .with_header("content-type", "text/plain")
        .with_body(json!("far too long for this"));
    assert_eq!(expect_failure(&v, &mut req).errors[0].path, ".body");

    // optional body may be omitted
    let mut req = ValidationRequest::new(Method::PUT, "/pets/1").with_header("content-type", "application/json");
    assert!(v.validate_request(&mut req).is_ok());
}

#[test]
fn test_failure_json_shape() {
    let v = validator();
    let mut req = ValidationRequest::new(Method::GET, "/pets");
    let body = expect_failure(&v, &mut req).to_json();
    assert_eq!(body["status"], json!(400));
    assert!(body["message"].is_string());
    assert_eq!(body["errors"][0]["path"], json!(".headers.x-request-id"));
    assert_eq!(body["errors"][0]["errorCode"], json!("required.openapi.validation"));
}

#[test]
fn test_request_validation_disabled() {
    let v = validator_with(ValidatorConfig {
        validate_requests: false,
        ..ValidatorConfig::default()
    });
    let mut req = ValidationRequest::new(Method::DELETE, "/pets/1?junk=1");
    assert_eq!(v.validate_request(&mut req).unwrap(), RequestOutcome::Skipped);
}

#[test]
fn test_coercion_disabled_rejects_string_numbers() {
    let v = validator_with(ValidatorConfig {
        coerce_types: false,
        ..ValidatorConfig::default()
    });
    let mut req = ValidationRequest::new(Method::GET, "/pets/42");
    assert_eq!(expect_failure(&v, &mut req).errors[0].path, ".params.id");
}

#[test]
fn test_contract_shape_error_surfaces_per_route() {
    let contract = r##"
openapi: 3.0.3
info: { title: Broken, version: "1" }
paths:
  /things:
    get:
      parameters:
        - name: q
          in: body
          schema: { type: string }
      responses:
        "200": { description: ok }
  /others:
    get:
      parameters:
        - $ref: "#/components/parameters/Missing"
      responses:
        "200": { description: ok }
"##;
    let v = OpenApiValidator::new(load_contract_str(contract).unwrap(), ValidatorConfig::default()).unwrap();

    let mut req = ValidationRequest::new(Method::GET, "/things");
    let failure = expect_failure(&v, &mut req);
    assert_eq!(failure.kind, FailureKind::ContractShape);
    assert_eq!(failure.message, "Parameter 'in' has incorrect value 'body' for [q]");

    let mut req = ValidationRequest::new(Method::GET, "/others");
    let failure = expect_failure(&v, &mut req);
    assert_eq!(failure.status, 400);
    assert!(failure.message.contains("#/components/parameters/Missing"));
}

#[test]
fn test_body_with_only_read_only_required_accepted() {
    let contract = r##"
openapi: 3.0.3
info: { title: Tokens, version: "1" }
components:
  schemas:
    Token:
      type: object
      required: [id]
      properties:
        id: { type: string, readOnly: true }
        label: { type: string }
paths:
  /tokens:
    post:
      requestBody:
        required: true
        content:
          application/json:
            schema:
              $ref: "#/components/schemas/Token"
      responses:
        "201": { description: created }
"##;
    let v = OpenApiValidator::new(load_contract_str(contract).unwrap(), ValidatorConfig::default()).unwrap();

    let mut req = ValidationRequest::new(Method::POST, "/tokens")
        .with_header("content-type", "application/json")
        .with_body(json!({"label": "x"}));
    assert!(v.validate_request(&mut req).is_ok());

    let mut req = ValidationRequest::new(Method::POST, "/tokens")
        .with_header("content-type", "application/json")
        .with_body(json!({"label": 1}));
    let failure = expect_failure(&v, &mut req);
    assert_eq!(failure.status, 400);
    assert_eq!(failure.errors[0].path, ".body.label");
}
