#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for response body validation
//!
//! Covers status selection (exact → class → default), the 500 raised when a
//! status has no declared response, responses without a JSON schema, and the
//! `.response` data paths reported for invalid bodies.

use brrtguard::spec::load_contract_str;
use brrtguard::{FailureKind, OpenApiValidator, ValidationRequest, ValidatorConfig};
use http::Method;
use serde_json::json;

const CONTRACT: &str = r##"
openapi: 3.0.3
info:
  title: Responses
  version: "1"
components:
  schemas:
    Pet:
      type: object
      required: [id, name]
      properties:
        id: { type: integer }
        name: { type: string }
    Error:
      type: object
      required: [code]
      properties:
        code: { type: integer }
  responses:
    NotFound:
      description: not found
      content:
        application/problem+json:
          schema:
            type: object
            required: [title]
            properties:
              title: { type: string }
paths:
  /pets/{id}:
    get:
      parameters:
        - { name: id, in: path, required: true, schema: { type: integer } }
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema:
                $ref: "#/components/schemas/Pet"
        "4XX":
          description: client error
          content:
            application/json:
              schema:
                $ref: "#/components/schemas/Error"
        default:
          description: anything else
          content:
            application/json:
              schema:
                type: object
                required: [message]
                properties:
                  message: { type: string }
  /pets:
    get:
      responses:
        "200":
          description: list
          content:
            application/json:
              schema:
                type: array
                items:
                  $ref: "#/components/schemas/Pet"
        "404":
          $ref: "#/components/responses/NotFound"
        "204":
          description: nothing
        "2xx":
          description: csv export
          content:
            text/csv:
              schema: { type: string }
  /status:
    get:
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema:
                type: object
                properties:
                  up: { type: boolean }
"##;

fn validator() -> OpenApiValidator {
    let config = ValidatorConfig {
        validate_responses: true,
        ..ValidatorConfig::default()
    };
    OpenApiValidator::new(load_contract_str(CONTRACT).unwrap(), config).unwrap()
}

fn get(url: &str) -> ValidationRequest {
    ValidationRequest::new(Method::GET, url)
}

#[test]
fn test_exact_status_selected() {
    let v = validator();
    let body = json!({"id": 1, "name": "rex"});
    let returned = v.validate_response(&get("/pets/1"), 200, body.clone()).unwrap();
    assert_eq!(returned, body);

    let failure = v.validate_response(&get("/pets/1"), 200, json!({"id": "one"})).unwrap_err();
    assert_eq!(failure.status, 500);
    assert_eq!(failure.kind, FailureKind::ResponseValidation);
    let paths: Vec<&str> = failure.errors.iter().map(|e| e.path.as_str()).collect();
    assert!(paths.contains(&".response.id"));
    assert!(paths.contains(&".response.name"));
}

#[test]
fn test_class_status_selected() {
    let v = validator();
    assert!(v.validate_response(&get("/pets/1"), 404, json!({"code": 404})).is_ok());
    let failure = v.validate_response(&get("/pets/1"), 404, json!({"message": "gone"})).unwrap_err();
    assert_eq!(failure.errors[0].path, ".response.code");
}

#[test]
fn test_default_status_selected() {
    let v = validator();
    assert!(v.validate_response(&get("/pets/1"), 500, json!({"message": "boom"})).is_ok());
    assert!(v.validate_response(&get("/pets/1"), 302, json!({"message": "moved"})).is_ok());
    let failure = v.validate_response(&get("/pets/1"), 503, json!({"code": 1})).unwrap_err();
    assert_eq!(failure.errors[0].path, ".response.message");
}

#[test]
fn test_no_declared_response_for_status() {
    let v = validator();
    let failure = v.validate_response(&get("/status?verbose=1"), 418, json!({})).unwrap_err();
    assert_eq!(failure.status, 500);
    assert_eq!(failure.kind, FailureKind::NoSchemaForStatus);
    assert_eq!(
        failure.message,
        "no schema defined for status code '418' in the openapi spec"
    );
    assert_eq!(failure.errors[0].path, "/status?verbose=1");
}

#[test]
fn test_array_body_paths() {
    let v = validator();
    let failure = v
        .validate_response(&get("/pets"), 200, json!([{"id": 1, "name": "a"}, {"id": 2}]))
        .unwrap_err();
    assert_eq!(failure.errors[0].path, ".response[1].name");
    assert!(failure.message.starts_with(".response[1].name: "));
}

#[test]
fn test_referenced_response_with_problem_json() {
    let v = validator();
    assert!(v.validate_response(&get("/pets"), 404, json!({"title": "missing"})).is_ok());
    assert!(v.validate_response(&get("/pets"), 404, json!({})).is_err());
}

#[test]
fn test_response_without_json_schema_accepted() {
    let v = validator();
    assert!(v.validate_response(&get("/pets"), 204, json!(null)).is_ok());
    // lowercase class key, non-JSON content
    assert!(v.validate_response(&get("/pets"), 201, json!("id,name")).is_ok());
}

#[test]
fn test_unmanaged_routes_pass_through() {
    let v = validator();
    assert!(v.validate_response(&get("/metrics"), 200, json!("anything")).is_ok());
    let post = ValidationRequest::new(Method::POST, "/status");
    assert!(v.validate_response(&post, 200, json!("anything")).is_ok());
}

#[test]
fn test_response_validation_disabled_by_default() {
    let v = OpenApiValidator::new(load_contract_str(CONTRACT).unwrap(), ValidatorConfig::default()).unwrap();
    assert!(v.validate_response(&get("/pets/1"), 200, json!({"id": "x"})).is_ok());
}

#[test]
fn test_validators_cached_per_route() {
    let v = validator();
    let cache = v.response_validator().cache();
    assert_eq!(cache.size(), 0);
    v.validate_response(&get("/pets/1"), 200, json!({"id": 1, "name": "a"})).unwrap();
    v.validate_response(&get("/pets/2"), 404, json!({"code": 1})).unwrap();
    assert_eq!(cache.size(), 1);
    v.validate_response(&get("/status"), 200, json!({"up": true})).unwrap();
    assert_eq!(cache.size(), 2);
}
