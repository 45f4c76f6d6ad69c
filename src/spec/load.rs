use crate::error::ValidationFailure;
use anyhow::Context;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::info;

/// A loaded OpenAPI 3.x contract.
///
/// The document is immutable after load and is shared (behind an `Arc`) by
/// the route index, the schema synthesizer and the compilers.
#[derive(Debug, Clone)]
pub struct ContractDocument {
    root: Value,
    version: String,
    title: String,
}

impl ContractDocument {
    /// Wrap an already parsed document.
    ///
    /// # Errors
    ///
    /// Fails when the root is not an object or `openapi` is not a `3.x` version.
    pub fn from_value(root: Value) -> anyhow::Result<Self> {
        let obj = root
            .as_object()
            .context("OpenAPI document root must be an object")?;
        let version = obj
            .get("openapi")
            .and_then(Value::as_str)
            .context("OpenAPI document is missing the 'openapi' version field")?
            .to_string();
        if !version.starts_with("3.") {
            anyhow::bail!("unsupported OpenAPI version: {version} (only 3.x supported)");
        }
        let title = obj
            .get("info")
            .and_then(|i| i.get("title"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(Self {
            root,
            version,
            title,
        })
    }

    /// The whole document
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// The `openapi` version string (e.g. `3.0.3`)
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Whether the document is OpenAPI 3.1 (JSON Schema 2020-12 dialect)
    #[must_use]
    pub fn is_v31(&self) -> bool {
        self.version.starts_with("3.1")
    }

    /// `info.title`
    pub fn title(&self) -> &str {
        &self.title
    }

    /// `components`, if declared
    pub fn components(&self) -> Option<&Value> {
        self.root.get("components")
    }

    /// `paths`, if declared
    pub fn paths(&self) -> Option<&Map<String, Value>> {
        self.root.get("paths").and_then(Value::as_object)
    }

    /// Top-level security requirements
    pub fn security(&self) -> &[Value] {
        self.root
            .get("security")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// `components.securitySchemes`
    pub fn security_schemes(&self) -> Option<&Map<String, Value>> {
        self.components()
            .and_then(|c| c.get("securitySchemes"))
            .and_then(Value::as_object)
    }

    /// URL of the first declared server
    pub fn first_server_url(&self) -> Option<&str> {
        self.root
            .get("servers")
            .and_then(Value::as_array)
            .and_then(|s| s.first())
            .and_then(|s| s.get("url"))
            .and_then(Value::as_str)
    }

    /// Look up a local reference such as `#/components/parameters/Limit`.
    ///
    /// # Errors
    ///
    /// Returns a contract-shape failure for non-local references and missing
    /// targets.
    pub fn resolve_ref(&self, reference: &str) -> Result<&Value, ValidationFailure> {
        let pointer = reference.strip_prefix('#').ok_or_else(|| {
            ValidationFailure::contract_shape(
                reference,
                format!("only local references are supported, found '{reference}'"),
            )
        })?;
        self.root.pointer(pointer).ok_or_else(|| {
            ValidationFailure::contract_shape(reference, format!("unresolved $ref '{reference}'"))
        })
    }

    /// Resolve one level of `$ref` indirection. Values without `$ref` are
    /// returned unchanged; the target itself is not resolved further.
    ///
    /// # Errors
    ///
    /// See [`resolve_ref`](Self::resolve_ref).
    pub fn resolve<'a>(&'a self, value: &'a Value) -> Result<&'a Value, ValidationFailure> {
        match value.get("$ref").and_then(Value::as_str) {
            Some(reference) => self.resolve_ref(reference),
            None => Ok(value),
        }
    }
}

/// Parse a contract from YAML or JSON text (JSON is valid YAML).
///
/// # Errors
///
/// Fails on syntax errors and on non-3.x documents.
pub fn load_contract_str(content: &str) -> anyhow::Result<ContractDocument> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(content).context("failed to parse OpenAPI document")?;
    ContractDocument::from_value(yaml_to_json(yaml)?)
}

/// Convert a YAML tree to JSON. Scalar mapping keys become strings, so
/// unquoted status codes (`200:`) load as `"200"`.
fn yaml_to_json(value: serde_yaml::Value) -> anyhow::Result<Value> {
    use serde_yaml::Value as Yaml;
    Ok(match value {
        Yaml::Mapping(mapping) => {
            let mut out = Map::with_capacity(mapping.len());
            for (key, value) in mapping {
                let key = match key {
                    Yaml::String(s) => s,
                    Yaml::Number(n) => n.to_string(),
                    Yaml::Bool(b) => b.to_string(),
                    other => anyhow::bail!("unsupported mapping key in OpenAPI document: {other:?}"),
                };
                out.insert(key, yaml_to_json(value)?);
            }
            Value::Object(out)
        }
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<anyhow::Result<Vec<_>>>()?,
        ),
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value)?,
        other => serde_json::to_value(other).context("unsupported YAML value")?,
    })
}

/// Read and parse a contract file (`.yaml`, `.yml` or `.json`).
///
/// # Errors
///
/// Fails when the file cannot be read or parsed.
pub fn load_contract(path: impl AsRef<Path>) -> anyhow::Result<ContractDocument> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read OpenAPI document {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let doc = if is_json {
        let root: Value = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        ContractDocument::from_value(root)?
    } else {
        load_contract_str(&content)
            .with_context(|| format!("failed to load {}", path.display()))?
    };
    info!(
        path = %path.display(),
        openapi_version = %doc.version(),
        title = %doc.title(),
        "OpenAPI contract loaded"
    );
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> ContractDocument {
        ContractDocument::from_value(json!({
            "openapi": "3.0.3",
            "info": {"title": "Pets", "version": "1"},
            "components": {
                "parameters": {
                    "Limit": {"name": "limit", "in": "query", "schema": {"type": "integer"}}
                },
                "schemas": {
                    "Alias": {"$ref": "#/components/schemas/Pet"},
                    "Pet": {"type": "object"}
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_rejects_non_v3() {
        assert!(ContractDocument::from_value(json!({"swagger": "2.0"})).is_err());
        assert!(ContractDocument::from_value(json!({"openapi": "2.0"})).is_err());
        assert!(ContractDocument::from_value(json!([])).is_err());
    }

    #[test]
    fn test_resolve_local_ref() {
        let doc = doc();
        let reference = json!({"$ref": "#/components/parameters/Limit"});
        let param = doc.resolve(&reference).unwrap();
        assert_eq!(param["name"], "limit");
    }

    #[test]
    fn test_resolve_is_single_level() {
        let doc = doc();
        let reference = json!({"$ref": "#/components/schemas/Alias"});
        let alias = doc.resolve(&reference).unwrap();
        assert_eq!(alias, &json!({"$ref": "#/components/schemas/Pet"}));
    }

    #[test]
    fn test_resolve_passthrough_and_failures() {
        let doc = doc();
        let inline = json!({"type": "string"});
        assert_eq!(doc.resolve(&inline).unwrap(), &inline);

        let missing = doc.resolve(&json!({"$ref": "#/components/schemas/Nope"})).unwrap_err();
        assert_eq!(missing.status, 400);
        assert!(missing.message.contains("Nope"));

        let remote = doc.resolve(&json!({"$ref": "other.yaml#/Pet"})).unwrap_err();
        assert_eq!(remote.status, 400);
    }

    #[test]
    fn test_load_contract_str_yaml() {
        let doc = load_contract_str("openapi: 3.1.0\ninfo:\n  title: T\n  version: '1'\npaths: {}\n")
            .unwrap();
        assert!(doc.is_v31());
        assert_eq!(doc.title(), "T");
        assert!(doc.paths().unwrap().is_empty());
        assert!(doc.security().is_empty());
    }

    #[test]
    fn test_unquoted_status_keys() {
        let doc = load_contract_str(
            "openapi: 3.0.0\ninfo: {title: T, version: 1}\npaths:\n  /a:\n    get:\n      responses:\n        200: {description: ok}\n",
        )
        .unwrap();
        assert!(doc.root().pointer("/paths/~1a/get/responses/200").is_some());
        assert_eq!(doc.root()["info"]["version"], json!(1));
    }
}
