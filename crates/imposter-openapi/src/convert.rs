//! Swagger 2.0 → OpenAPI 3.0 upgrade, performed on the raw JSON value before
//! `openapiv3` ever sees it (§4.12 "Spec loading"). Mirrors
//! `mockforge-core::openapi::swagger_convert`'s shape: rewrite the handful
//! of top-level sections that moved (`host`/`basePath`/`schemes` →
//! `servers`, `definitions` → `components.schemas`, `securityDefinitions` →
//! `components.securitySchemes`), then a per-parameter/per-response rewrite
//! so that OAS2's inline `type`/`items` pairs become OAS3 `schema` objects.

use serde_json::{json, Map, Value};

/// True when `doc` looks like a Swagger 2.0 document (`"swagger": "2.0"`).
pub fn is_swagger2(doc: &Value) -> bool {
    doc.get("swagger").and_then(Value::as_str) == Some("2.0")
}

/// Upgrade a Swagger 2.0 document to an OpenAPI 3.0.3 one.
pub fn convert_to_openapi3(swagger: &Value) -> Value {
    let mut openapi = Map::new();
    openapi.insert("openapi".to_string(), json!("3.0.3"));

    if let Some(info) = swagger.get("info") {
        openapi.insert("info".to_string(), info.clone());
    } else {
        openapi.insert("info".to_string(), json!({"title": "", "version": "0.0.0"}));
    }

    let servers = convert_servers(swagger);
    if !servers.is_empty() {
        openapi.insert("servers".to_string(), json!(servers));
    }

    let default_produces =
        swagger.get("produces").and_then(Value::as_array).cloned().unwrap_or_default();

    if let Some(paths) = swagger.get("paths").and_then(Value::as_object) {
        let mut converted_paths = Map::new();
        for (path, item) in paths {
            converted_paths.insert(path.clone(), convert_path_item(item, &default_produces));
        }
        openapi.insert("paths".to_string(), Value::Object(converted_paths));
    }

    let mut components = Map::new();
    if let Some(definitions) = swagger.get("definitions") {
        components.insert("schemas".to_string(), definitions.clone());
    }
    if let Some(security_defs) = swagger.get("securityDefinitions") {
        components.insert("securitySchemes".to_string(), security_defs.clone());
    }
    if !components.is_empty() {
        openapi.insert("components".to_string(), json!(components));
    }

    if let Some(security) = swagger.get("security") {
        openapi.insert("security".to_string(), security.clone());
    }

    Value::Object(openapi)
}

fn convert_servers(swagger: &Value) -> Vec<Value> {
    let host = swagger.get("host").and_then(Value::as_str);
    let base_path = swagger.get("basePath").and_then(Value::as_str).unwrap_or("");
    let scheme = swagger
        .get("schemes")
        .and_then(Value::as_array)
        .and_then(|s| s.first())
        .and_then(Value::as_str)
        .unwrap_or("https");

    match host {
        Some(host) => vec![json!({"url": format!("{scheme}://{host}{base_path}")})],
        None if !base_path.is_empty() => vec![json!({"url": base_path})],
        None => Vec::new(),
    }
}

fn convert_path_item(item: &Value, default_produces: &[Value]) -> Value {
    let Some(item) = item.as_object() else { return item.clone() };
    let mut converted = Map::new();
    for (key, value) in item {
        if matches!(key.as_str(), "get" | "put" | "post" | "delete" | "options" | "head" | "patch") {
            converted.insert(key.clone(), convert_operation(value, default_produces));
        } else {
            converted.insert(key.clone(), value.clone());
        }
    }
    Value::Object(converted)
}

fn convert_operation(op: &Value, default_produces: &[Value]) -> Value {
    let Some(op) = op.as_object() else { return op.clone() };
    let produces = op
        .get("produces")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_else(|| default_produces.to_vec());

    let mut converted = Map::new();
    let mut request_body = None;
    let mut converted_params = Vec::new();

    if let Some(params) = op.get("parameters").and_then(Value::as_array) {
        for param in params {
            if param.get("in").and_then(Value::as_str) == Some("body") {
                let schema = param.get("schema").cloned().unwrap_or_else(|| json!({}));
                let content_type =
                    produces.first().and_then(Value::as_str).unwrap_or("application/json");
                request_body = Some(json!({
                    "required": param.get("required").and_then(Value::as_bool).unwrap_or(false),
                    "content": { content_type: { "schema": schema } },
                }));
            } else {
                converted_params.push(convert_parameter(param));
            }
        }
    }

    if !converted_params.is_empty() {
        converted.insert("parameters".to_string(), Value::Array(converted_params));
    }
    if let Some(body) = request_body {
        converted.insert("requestBody".to_string(), body);
    }

    for (key, value) in op {
        if key == "parameters" {
            continue;
        }
        if key == "responses" {
            converted.insert("responses".to_string(), convert_responses(value, &produces));
        } else {
            converted.insert(key.clone(), value.clone());
        }
    }

    Value::Object(converted)
}

fn convert_parameter(param: &Value) -> Value {
    let Some(obj) = param.as_object() else { return param.clone() };
    let mut schema = Map::new();
    let mut converted = Map::new();
    for (key, value) in obj {
        match key.as_str() {
            "type" | "format" | "items" | "enum" | "default" | "minimum" | "maximum" => {
                schema.insert(key.clone(), value.clone());
            }
            _ => {
                converted.insert(key.clone(), value.clone());
            }
        }
    }
    if !schema.is_empty() {
        converted.insert("schema".to_string(), Value::Object(schema));
    }
    Value::Object(converted)
}

fn convert_responses(responses: &Value, produces: &[Value]) -> Value {
    let Some(responses) = responses.as_object() else { return responses.clone() };
    let content_type = produces.first().and_then(Value::as_str).unwrap_or("application/json");

    let mut converted = Map::new();
    for (status, response) in responses {
        let Some(response_obj) = response.as_object() else {
            converted.insert(status.clone(), response.clone());
            continue;
        };
        let mut entry = Map::new();
        for (key, value) in response_obj {
            if key == "schema" {
                entry.insert(
                    "content".to_string(),
                    json!({ content_type: { "schema": value.clone() } }),
                );
            } else {
                entry.insert(key.clone(), value.clone());
            }
        }
        entry.entry("description").or_insert_with(|| json!(""));
        converted.insert(status.clone(), Value::Object(entry));
    }
    Value::Object(converted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_swagger2_marker() {
        assert!(is_swagger2(&json!({"swagger": "2.0"})));
        assert!(!is_swagger2(&json!({"openapi": "3.0.0"})));
    }

    #[test]
    fn converts_host_base_path_to_servers() {
        let swagger = json!({
            "swagger": "2.0",
            "host": "api.example.com",
            "basePath": "/v1",
            "schemes": ["https"],
            "info": {"title": "t", "version": "1"},
            "paths": {},
        });
        let openapi = convert_to_openapi3(&swagger);
        assert_eq!(openapi["openapi"], json!("3.0.3"));
        assert_eq!(openapi["servers"][0]["url"], json!("https://api.example.com/v1"));
    }

    #[test]
    fn converts_response_schema_into_content_map() {
        let swagger = json!({
            "swagger": "2.0",
            "info": {"title": "t", "version": "1"},
            "paths": {
                "/pets": {
                    "get": {
                        "produces": ["application/json"],
                        "responses": {
                            "200": {"description": "ok", "schema": {"type": "string"}}
                        }
                    }
                }
            }
        });
        let openapi = convert_to_openapi3(&swagger);
        let content = &openapi["paths"]["/pets"]["get"]["responses"]["200"]["content"];
        assert_eq!(content["application/json"]["schema"]["type"], json!("string"));
    }
}
