use super::load::ContractDocument;
use super::types::{fail_if_issues, RouteMeta, ValidationIssue};
use http::Method;
use serde_json::{Map, Value};
use tracing::debug;

/// Operation keys of a path item, in the order routes are emitted
const OPERATION_KEYS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Path component of the first server URL, without a trailing slash.
///
/// Both absolute (`https://api.example.com/v1`) and relative (`/v1`) server
/// URLs are accepted. Returns an empty string when there is no usable base path.
pub fn base_path(doc: &ContractDocument) -> String {
    let Some(url_str) = doc.first_server_url() else {
        return String::new();
    };
    url::Url::parse(url_str)
        .or_else(|_| url::Url::parse(&format!("http://dummy{url_str}")))
        .map(|u| {
            let p = u.path().trim_end_matches('/');
            if p == "/" || p.is_empty() {
                String::new()
            } else {
                p.to_string()
            }
        })
        .unwrap_or_default()
}

/// Names of the `{...}` segments of a path template, in order
pub fn extract_path_params(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                names.push(after[..end].to_string());
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    names
}

/// Key used to merge path-level and operation-level parameters. Parameters
/// whose `$ref` cannot be resolved have no key and are always kept; the
/// broken reference is reported when the route is first validated.
fn parameter_key(doc: &ContractDocument, param: &Value) -> Option<(String, String)> {
    let resolved = doc.resolve(param).ok()?;
    let name = resolved.get("name")?.as_str()?;
    let location = resolved.get("in").and_then(Value::as_str).unwrap_or_default();
    Some((name.to_string(), location.to_string()))
}

/// Merge path-level and operation-level parameters; an operation-level
/// parameter replaces the path-level one with the same `(name, in)`.
pub fn merge_parameters(doc: &ContractDocument, path_level: &[Value], op_level: &[Value]) -> Vec<Value> {
    let mut merged: Vec<Value> = Vec::with_capacity(path_level.len() + op_level.len());
    let op_keys: Vec<Option<(String, String)>> =
        op_level.iter().map(|p| parameter_key(doc, p)).collect();
    for param in path_level {
        let key = parameter_key(doc, param);
        if key.is_some() && op_keys.contains(&key) {
            continue;
        }
        merged.push(param.clone());
    }
    merged.extend(op_level.iter().cloned());
    merged
}

fn parameter_list(value: Option<&Value>, location: &str, issues: &mut Vec<ValidationIssue>) -> Vec<Value> {
    match value {
        None => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(_) => {
            issues.push(ValidationIssue::new(
                location,
                "InvalidParameters",
                "'parameters' must be an array",
            ));
            Vec::new()
        }
    }
}

/// Build the route table for every operation declared under `paths`.
///
/// Templates are prefixed with the server [`base_path`]. Structural problems
/// (path items or operations that are not objects, non-array `parameters`)
/// are collected and reported together.
///
/// # Errors
///
/// Returns an error listing every issue found.
pub fn build_routes(doc: &ContractDocument) -> anyhow::Result<Vec<RouteMeta>> {
    let mut routes = Vec::new();
    let mut issues = Vec::new();
    let base = base_path(doc);

    let Some(paths) = doc.paths() else {
        return Ok(routes);
    };

    for (path, item) in paths {
        let Some(item) = item.as_object() else {
            issues.push(ValidationIssue::new(
                path,
                "InvalidPathItem",
                "path item must be an object",
            ));
            continue;
        };
        let path_params = parameter_list(item.get("parameters"), path, &mut issues);
        let template = format!("{base}{path}");

        for key in OPERATION_KEYS {
            let Some(operation) = item.get(key) else {
                continue;
            };
            let location = format!("{path} → {key}");
            let Some(operation) = operation.as_object() else {
                issues.push(ValidationIssue::new(
                    &location,
                    "InvalidOperation",
                    "operation must be an object",
                ));
                continue;
            };
            let Ok(method) = Method::from_bytes(key.to_ascii_uppercase().as_bytes()) else {
                continue;
            };

            let op_params = parameter_list(operation.get("parameters"), &location, &mut issues);
            let responses = match operation.get("responses") {
                None => Map::new(),
                Some(Value::Object(r)) => r.clone(),
                Some(_) => {
                    issues.push(ValidationIssue::new(
                        &location,
                        "InvalidResponses",
                        "'responses' must be an object",
                    ));
                    Map::new()
                }
            };

            routes.push(RouteMeta {
                method,
                path_pattern: template.clone(),
                operation_id: operation
                    .get("operationId")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                path_params: extract_path_params(&template),
                parameters: merge_parameters(doc, &path_params, &op_params),
                request_body: operation.get("requestBody").cloned(),
                responses,
                security: operation
                    .get("security")
                    .and_then(Value::as_array)
                    .cloned(),
            });
        }
    }

    fail_if_issues(issues)?;
    debug!(route_count = routes.len(), base_path = %base, "route table built");
    Ok(routes)
}
