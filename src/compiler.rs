//! Compilation of synthesized schemas into reusable validators, and the
//! mapping of evaluator failures onto [`ValidationError`]s.
//!
//! Every compiled schema carries a copy of the contract's `components` at
//! its root so `#/components/...` references resolve exactly as they do in
//! the contract. OpenAPI 3.0 documents are evaluated as Draft 4, 3.1
//! documents as Draft 2020-12.

use crate::error::{ValidationError, ValidationFailure};
use crate::spec::ContractDocument;
use jsonschema::error::ValidationErrorKind;
use jsonschema::Draft;
use serde_json::Value;
use std::fmt;
use tracing::error;

/// Holds the compilation context shared by every schema of one contract.
#[derive(Debug, Clone)]
pub struct ValidatorCompiler {
    components: Option<Value>,
    draft: Draft,
    validate_formats: bool,
}

impl ValidatorCompiler {
    pub fn new(doc: &ContractDocument, validate_formats: bool) -> Self {
        let components = doc.components().cloned().map(|mut c| {
            normalize_nullable(&mut c);
            c
        });
        let draft = if doc.is_v31() {
            Draft::Draft202012
        } else {
            Draft::Draft4
        };
        Self {
            components,
            draft,
            validate_formats,
        }
    }

    /// Compile `schema`, binding it to the contract's components.
    ///
    /// # Errors
    ///
    /// A `SchemaCompilation` failure (500) located at `route` when the
    /// evaluator rejects the schema.
    pub fn compile(&self, mut schema: Value, route: &str) -> Result<CompiledValidator, ValidationFailure> {
        normalize_nullable(&mut schema);
        if let (Some(obj), Some(components)) = (schema.as_object_mut(), &self.components) {
            obj.insert("components".to_string(), components.clone());
        }
        let inner = jsonschema::options()
            .with_draft(self.draft)
            .should_validate_formats(self.validate_formats)
            .build(&schema)
            .map_err(|e| {
                error!(route = %route, error = %e, "schema compilation failed");
                ValidationFailure::schema_compilation(route, format!("invalid schema: {e}"))
            })?;
        Ok(CompiledValidator { inner })
    }
}

/// A compiled, immutable validator. Shared across requests behind an `Arc`.
pub struct CompiledValidator {
    inner: jsonschema::Validator,
}

impl fmt::Debug for CompiledValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledValidator").finish_non_exhaustive()
    }
}

impl CompiledValidator {
    #[must_use]
    pub fn is_valid(&self, instance: &Value) -> bool {
        self.inner.is_valid(instance)
    }

    /// Check `instance`, mapping every failure to a [`ValidationError`].
    ///
    /// # Errors
    ///
    /// The mapped failures, in evaluator order.
    pub fn validate(&self, instance: &Value) -> Result<(), Vec<ValidationError>> {
        let errors: Vec<ValidationError> = self.inner.iter_errors(instance).map(|e| map_error(&e)).collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Convert a JSON pointer (`/body/tags/1`) into a dotted data path
/// (`.body.tags[1]`).
pub fn pointer_to_path(pointer: &str) -> String {
    let mut out = String::with_capacity(pointer.len() + 4);
    for segment in pointer.split('/').skip(1) {
        let segment = segment.replace("~1", "/").replace("~0", "~");
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            out.push('[');
            out.push_str(&segment);
            out.push(']');
        } else {
            out.push('.');
            out.push_str(&segment);
        }
    }
    out
}

/// The failing keyword: the last schema-path segment that is not an index
fn keyword_of(schema_path: &str) -> String {
    schema_path
        .rsplit('/')
        .find(|s| !s.is_empty() && !s.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or("schema")
        .to_string()
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn map_error(e: &jsonschema::ValidationError<'_>) -> ValidationError {
    let instance_path = pointer_to_path(&e.instance_path.to_string());
    let schema_path = e.schema_path.to_string();
    let keyword = keyword_of(&schema_path);

    let path = match &e.kind {
        ValidationErrorKind::Required { property } => {
            format!("{instance_path}.{}", display_value(property))
        }
        ValidationErrorKind::AdditionalProperties { unexpected } => match unexpected.first() {
            Some(prop) => format!("{instance_path}.{prop}"),
            None => instance_path,
        },
        _ => instance_path,
    };
    let path = if path.is_empty() { schema_path } else { path };

    let message = match &e.kind {
        ValidationErrorKind::Enum { options } => {
            let allowed = options
                .as_array()
                .map(|o| o.iter().map(display_value).collect::<Vec<_>>().join(", "))
                .unwrap_or_else(|| options.to_string());
            format!("{} is not one of the allowed values: {allowed}", e.instance)
        }
        _ => e.to_string(),
    };

    ValidationError::with_keyword(path, message, &keyword)
}

/// Rewrite OpenAPI 3.0 `nullable: true` into plain JSON Schema: widen `type`
/// to include `"null"` and add `null` to any `enum`.
pub fn normalize_nullable(schema: &mut Value) {
    match schema {
        Value::Object(obj) => {
            if obj.get("nullable") == Some(&Value::Bool(true)) {
                let widened = match obj.get("type") {
                    Some(Value::String(t)) => Some(vec![Value::String(t.clone()), Value::from("null")]),
                    Some(Value::Array(types)) if !types.iter().any(|t| t.as_str() == Some("null")) => {
                        let mut types = types.clone();
                        types.push(Value::from("null"));
                        Some(types)
                    }
                    _ => None,
                };
                if let Some(types) = widened {
                    obj.insert("type".to_string(), Value::Array(types));
                }
                if let Some(Value::Array(values)) = obj.get_mut("enum") {
                    if !values.contains(&Value::Null) {
                        values.push(Value::Null);
                    }
                }
            }
            for value in obj.values_mut() {
                normalize_nullable(value);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(normalize_nullable),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::load_contract_str;
    use serde_json::json;

    fn compiler() -> ValidatorCompiler {
        let doc = load_contract_str(
            r#"
openapi: 3.0.3
info: {title: t, version: '1'}
components:
  schemas:
    Pet:
      type: object
      required: [name]
      additionalProperties: false
      properties:
        name: {type: string}
        kind: {type: string, enum: [cat, dog]}
        tag: {type: string, nullable: true}
paths: {}
"#,
        )
        .unwrap();
        ValidatorCompiler::new(&doc, true)
    }

    #[test]
    fn test_pointer_to_path() {
        assert_eq!(pointer_to_path(""), "");
        assert_eq!(pointer_to_path("/query/limit"), ".query.limit");
        assert_eq!(pointer_to_path("/body/tags/1"), ".body.tags[1]");
        assert_eq!(pointer_to_path("/headers/a~1b"), ".headers.a/b");
    }

    #[test]
    fn test_keyword_of() {
        assert_eq!(keyword_of("/properties/query/properties/limit/type"), "type");
        assert_eq!(keyword_of("/allOf/0"), "allOf");
        assert_eq!(keyword_of(""), "schema");
    }

    #[test]
    fn test_components_resolve() {
        let v = compiler()
            .compile(json!({"properties": {"body": {"$ref": "#/components/schemas/Pet"}}}), "/pets")
            .unwrap();
        assert!(v.is_valid(&json!({"body": {"name": "rex"}})));
        assert!(!v.is_valid(&json!({"body": {}})));
    }

    #[test]
    fn test_required_and_additional_paths() {
        let v = compiler()
            .compile(json!({"properties": {"body": {"$ref": "#/components/schemas/Pet"}}}), "/pets")
            .unwrap();
        let errors = v.validate(&json!({"body": {"extra": 1}})).unwrap_err();
        let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&".body.name"), "{paths:?}");
        assert!(paths.contains(&".body.extra"), "{paths:?}");
        let codes: Vec<&str> = errors.iter().filter_map(|e| e.error_code.as_deref()).collect();
        assert!(codes.contains(&"required.openapi.validation"));
        assert!(codes.contains(&"additionalProperties.openapi.validation"));
    }

    #[test]
    fn test_enum_message_lists_allowed_values() {
        let v = compiler()
            .compile(json!({"properties": {"body": {"$ref": "#/components/schemas/Pet"}}}), "/pets")
            .unwrap();
        let errors = v.validate(&json!({"body": {"name": "x", "kind": "cow"}})).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, ".body.kind");
        assert!(errors[0].message.ends_with("allowed values: cat, dog"), "{}", errors[0].message);
        assert_eq!(errors[0].error_code.as_deref(), Some("enum.openapi.validation"));
    }

    #[test]
    fn test_nullable() {
        let v = compiler()
            .compile(json!({"properties": {"body": {"$ref": "#/components/schemas/Pet"}}}), "/pets")
            .unwrap();
        assert!(v.is_valid(&json!({"body": {"name": "x", "tag": null}})));

        let mut schema = json!({"type": "string", "enum": ["a"], "nullable": true});
        normalize_nullable(&mut schema);
        assert_eq!(schema["type"], json!(["string", "null"]));
        assert_eq!(schema["enum"], json!(["a", null]));
    }

    #[test]
    fn test_invalid_schema_is_server_error() {
        let err = compiler().compile(json!({"type": 12}), "/pets").unwrap_err();
        assert_eq!(err.status, 500);
        assert_eq!(err.errors[0].path, "/pets");
    }
}
