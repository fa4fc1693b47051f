//! Request validation (§4.12 "Validation"), grounded on
//! `mockforge-core::openapi::validation::RequestValidator` but narrowed to
//! the one policy the config model exposes: `fail` / `log` / `ignore`
//! against `ValidationConfig.request` (§3's `ValidationConfig`). Response
//! validation is intentionally a no-op — see DESIGN.md's Open Question
//! decision.

use std::collections::HashMap;

use jsonschema::Draft;
use serde_json::Value;

use crate::spec::OpenApiDocument;

/// The outcome of validating one request against an operation's declared
/// parameters and request body schema.
#[derive(Debug, Default)]
pub struct ValidationOutcome {
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate `body` (already parsed as JSON, when present) against the
/// request body schema declared for `method`/`path` in `document`, plus
/// required-parameter presence. Unknown operations validate successfully —
/// matching happens before validation runs (§4.12).
pub fn validate_request(
    document: &OpenApiDocument,
    method: &str,
    path: &str,
    query_params: &HashMap<String, Vec<String>>,
    body: Option<&Value>,
) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();

    let Some(operation) = document.operations.iter().find(|op| op.method == method && op.path == path) else {
        return outcome;
    };

    let spec_operation = document
        .spec
        .paths
        .iter()
        .find(|(p, _)| format!("{}{p}", document.server_path_prefix()) == path)
        .and_then(|(_, item)| item.as_item())
        .and_then(|item| match method {
            "GET" => item.get.as_ref(),
            "PUT" => item.put.as_ref(),
            "POST" => item.post.as_ref(),
            "DELETE" => item.delete.as_ref(),
            "OPTIONS" => item.options.as_ref(),
            "HEAD" => item.head.as_ref(),
            "PATCH" => item.patch.as_ref(),
            _ => None,
        });

    let Some(spec_operation) = spec_operation else { return outcome };

    for param_ref in &spec_operation.parameters {
        let Some(openapiv3::Parameter::Query { parameter_data, .. }) = param_ref.as_item() else { continue };
        if parameter_data.required && !query_params.contains_key(&parameter_data.name) {
            outcome.errors.push(format!("missing required query parameter '{}'", parameter_data.name));
        }
    }

    if let Some(request_body) = spec_operation.request_body.as_ref().and_then(|b| b.as_item()) {
        if request_body.required && body.is_none() {
            outcome.errors.push("missing required request body".to_string());
        }
        if let (Some(body), Some(media_type)) = (body, request_body.content.get("application/json")) {
            if let Some(schema_ref) = &media_type.schema {
                if let openapiv3::ReferenceOr::Item(schema) = schema_ref {
                    if let Err(message) = validate_against_schema(schema, body) {
                        outcome.errors.push(message);
                    }
                }
            }
        }
    }

    let _ = operation;
    outcome
}

fn validate_against_schema(schema: &openapiv3::Schema, body: &Value) -> Result<(), String> {
    let schema_json = serde_json::to_value(schema).map_err(|e| e.to_string())?;
    let validator =
        jsonschema::options().with_draft(Draft::Draft7).build(&schema_json).map_err(|e| e.to_string())?;
    let errors: Vec<String> = validator.iter_errors(body).map(|e| e.to_string()).collect();
    if errors.is_empty() { Ok(()) } else { Err(errors.join("; ")) }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: &str = r#"{
        "openapi": "3.0.3",
        "info": {"title": "t", "version": "1"},
        "paths": {
            "/pets": {
                "post": {
                    "parameters": [{"name": "q", "in": "query", "required": true, "schema": {"type": "string"}}],
                    "requestBody": {
                        "required": true,
                        "content": {"application/json": {"schema": {
                            "type": "object",
                            "required": ["name"],
                            "properties": {"name": {"type": "string"}}
                        }}}
                    },
                    "responses": {"200": {"description": "ok"}}
                }
            }
        }
    }"#;

    #[test]
    fn missing_required_query_param_is_reported() {
        let document = OpenApiDocument::parse(SPEC.as_bytes()).unwrap();
        let outcome = validate_request(&document, "POST", "/pets", &HashMap::new(), Some(&serde_json::json!({"name": "rex"})));
        assert!(!outcome.is_valid());
        assert!(outcome.errors.iter().any(|e| e.contains("'q'")));
    }

    #[test]
    fn valid_request_passes() {
        let document = OpenApiDocument::parse(SPEC.as_bytes()).unwrap();
        let mut query = HashMap::new();
        query.insert("q".to_string(), vec!["x".to_string()]);
        let outcome = validate_request(&document, "POST", "/pets", &query, Some(&serde_json::json!({"name": "rex"})));
        assert!(outcome.is_valid());
    }

    #[test]
    fn body_schema_violation_is_reported() {
        let document = OpenApiDocument::parse(SPEC.as_bytes()).unwrap();
        let mut query = HashMap::new();
        query.insert("q".to_string(), vec!["x".to_string()]);
        let outcome = validate_request(&document, "POST", "/pets", &query, Some(&serde_json::json!({})));
        assert!(!outcome.is_valid());
    }
}
