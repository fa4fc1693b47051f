//! OpenAPI 3.x / Swagger 2.0 spec loading (§4.12 "Spec loading"). Mirrors
//! `mockforge-core::openapi::spec::OpenApiSpec`'s load-then-flatten shape:
//! parse the document once, then walk `paths` into a flat list of
//! `method x path` operations with their responses pre-indexed by status
//! code and content type, so the augmenter and response processor never
//! have to re-walk `openapiv3` types at request time.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use openapiv3::{MediaType, OpenAPI, ReferenceOr, Schema, StatusCode};
use serde_json::Value;

use crate::convert;
use crate::error::{Error, Result};

/// One `(status code, content type)` variant of an operation's response.
#[derive(Debug, Clone)]
pub struct ResponseVariant {
    /// Stable identifier, unique within the document: `"{method} {path}#{status}#{content_type}"`.
    pub id: String,
    pub status_code: u16,
    pub content_type: String,
    pub schema: Option<Schema>,
    /// Named examples declared on the media type, in declaration order.
    pub examples: IndexMap<String, Value>,
    pub header_names: Vec<String>,
}

/// One `method x path` operation, with its responses pre-indexed.
#[derive(Debug, Clone)]
pub struct OperationEntry {
    pub method: String,
    /// Path template, already prefixed by the server/basePath unless the
    /// config opts out (§4.12 "Path prefixing").
    pub path: String,
    pub operation_id: Option<String>,
    pub responses: BTreeMap<u16, Vec<ResponseVariant>>,
}

impl OperationEntry {
    /// Preferred response for this operation (§4.12 "Default status code
    /// selection"): 200 if present, else the lowest status >= 200, else the
    /// lowest status present at all.
    pub fn default_response(&self) -> Option<(u16, &ResponseVariant)> {
        let status = if self.responses.contains_key(&200) {
            200
        } else if let Some(&code) = self.responses.keys().find(|&&c| c >= 200) {
            code
        } else {
            *self.responses.keys().next()?
        };
        self.responses.get(&status).and_then(|v| v.first()).map(|v| (status, v))
    }

    pub fn response_for(&self, status: u16, content_type: &str) -> Option<&ResponseVariant> {
        self.responses.get(&status)?.iter().find(|v| v.content_type == content_type)
    }
}

/// A loaded, flattened OpenAPI document.
pub struct OpenApiDocument {
    pub spec: OpenAPI,
    pub operations: Vec<OperationEntry>,
}

impl OpenApiDocument {
    /// Parse `bytes` as JSON or YAML, upgrading a Swagger 2.0 document to
    /// OpenAPI 3.0 first, and flatten its paths into `operations`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let raw: Value = serde_json::from_slice(bytes).or_else(|_| serde_yaml::from_slice(bytes))?;
        let raw = if convert::is_swagger2(&raw) { convert::convert_to_openapi3(&raw) } else { raw };

        let spec: OpenAPI = serde_json::from_value(raw).map_err(|e| Error::Spec(e.to_string()))?;
        let operations = flatten_operations(&spec);
        Ok(Self { spec, operations })
    }

    /// Resolve a `#/components/schemas/Name` reference to an owned schema.
    pub fn get_schema(&self, reference: &str) -> Option<Schema> {
        let name = reference.strip_prefix("#/components/schemas/")?;
        let components = self.spec.components.as_ref()?;
        match components.schemas.get(name)? {
            ReferenceOr::Item(schema) => Some(schema.clone()),
            ReferenceOr::Reference { reference } => self.get_schema(reference),
        }
    }

    fn resolve_schema_ref(&self, schema_ref: &ReferenceOr<Schema>) -> Option<Schema> {
        match schema_ref {
            ReferenceOr::Item(schema) => Some(schema.clone()),
            ReferenceOr::Reference { reference } => self.get_schema(reference),
        }
    }

    /// The path prefix implied by the first declared server URL, or `""`
    /// when the document declares no servers (§4.12 "Path prefixing").
    pub fn server_path_prefix(&self) -> String {
        server_path_prefix(&self.spec)
    }
}

fn server_path_prefix(spec: &OpenAPI) -> String {
    spec.servers.first().map(|server| extract_path(&server.url)).unwrap_or_default()
}

fn extract_path(url: &str) -> String {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    };
    path.trim_end_matches('/').to_string()
}

fn flatten_operations(spec: &OpenAPI) -> Vec<OperationEntry> {
    let prefix = server_path_prefix(spec);
    let mut entries = Vec::new();

    for (path_template, path_item_ref) in spec.paths.iter() {
        let Some(path_item) = path_item_ref.as_item() else { continue };
        let full_path = format!("{prefix}{path_template}");

        let methods: [(&str, &Option<openapiv3::Operation>); 7] = [
            ("GET", &path_item.get),
            ("PUT", &path_item.put),
            ("POST", &path_item.post),
            ("DELETE", &path_item.delete),
            ("OPTIONS", &path_item.options),
            ("HEAD", &path_item.head),
            ("PATCH", &path_item.patch),
        ];

        for (method, operation) in methods {
            let Some(operation) = operation else { continue };
            entries.push(OperationEntry {
                method: method.to_string(),
                path: full_path.clone(),
                operation_id: operation.operation_id.clone(),
                responses: flatten_responses(spec, method, &full_path, operation),
            });
        }
    }

    entries
}

fn flatten_responses(
    spec: &OpenAPI,
    method: &str,
    path: &str,
    operation: &openapiv3::Operation,
) -> BTreeMap<u16, Vec<ResponseVariant>> {
    let mut out: BTreeMap<u16, Vec<ResponseVariant>> = BTreeMap::new();

    for (status, response_ref) in operation.responses.responses.iter() {
        let StatusCode::Code(status_code) = status else { continue };
        let Some(response) = response_ref.as_item() else { continue };

        let header_names: Vec<String> = response.headers.keys().cloned().collect();
        let mut variants = Vec::new();
        for (content_type, media_type) in response.content.iter() {
            variants.push(build_variant(spec, method, path, *status_code, content_type, media_type, &header_names));
        }
        if !variants.is_empty() {
            out.insert(*status_code, variants);
        }
    }

    out
}

fn resolve_schema_ref(spec: &OpenAPI, schema_ref: &ReferenceOr<Schema>) -> Option<Schema> {
    match schema_ref {
        ReferenceOr::Item(schema) => Some(schema.clone()),
        ReferenceOr::Reference { reference } => {
            let name = reference.strip_prefix("#/components/schemas/")?;
            match spec.components.as_ref()?.schemas.get(name)? {
                ReferenceOr::Item(schema) => Some(schema.clone()),
                nested @ ReferenceOr::Reference { .. } => resolve_schema_ref(spec, nested),
            }
        }
    }
}

fn build_variant(
    spec: &OpenAPI,
    method: &str,
    path: &str,
    status_code: u16,
    content_type: &str,
    media_type: &MediaType,
    header_names: &[String],
) -> ResponseVariant {
    let schema = media_type.schema.as_ref().and_then(|s| resolve_schema_ref(spec, s));

    let mut examples = IndexMap::new();
    for (name, example_ref) in media_type.examples.iter() {
        if let Some(example) = example_ref.as_item() {
            if let Some(value) = example.value.clone() {
                examples.insert(name.clone(), value);
            }
        }
    }
    if examples.is_empty() {
        if let Some(example) = media_type.example.clone() {
            examples.insert("default".to_string(), example);
        }
    }

    ResponseVariant {
        id: format!("{method} {path}#{status_code}#{content_type}"),
        status_code,
        content_type: content_type.to_string(),
        schema,
        examples,
        header_names: header_names.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_OAS3: &str = r#"{
        "openapi": "3.0.3",
        "info": {"title": "pets", "version": "1"},
        "servers": [{"url": "https://api.example.com/v1"}],
        "paths": {
            "/pets": {
                "get": {
                    "operationId": "listPets",
                    "responses": {
                        "200": {
                            "description": "ok",
                            "content": {
                                "application/json": {
                                    "schema": {"type": "array", "items": {"type": "string"}}
                                }
                            }
                        }
                    }
                }
            }
        }
    }"#;

    #[test]
    fn flattens_operations_with_server_prefix() {
        let doc = OpenApiDocument::parse(SAMPLE_OAS3.as_bytes()).unwrap();
        assert_eq!(doc.operations.len(), 1);
        let op = &doc.operations[0];
        assert_eq!(op.method, "GET");
        assert_eq!(op.path, "/v1/pets");
    }

    #[test]
    fn default_response_prefers_200() {
        let doc = OpenApiDocument::parse(SAMPLE_OAS3.as_bytes()).unwrap();
        let op = &doc.operations[0];
        let (status, variant) = op.default_response().unwrap();
        assert_eq!(status, 200);
        assert_eq!(variant.content_type, "application/json");
    }

    #[test]
    fn parses_swagger2_document() {
        let swagger = r#"{
            "swagger": "2.0",
            "info": {"title": "pets", "version": "1"},
            "host": "api.example.com",
            "basePath": "/v1",
            "schemes": ["https"],
            "paths": {
                "/pets": {
                    "get": {
                        "produces": ["application/json"],
                        "responses": {"200": {"description": "ok", "schema": {"type": "string"}}}
                    }
                }
            }
        }"#;
        let doc = OpenApiDocument::parse(swagger.as_bytes()).unwrap();
        assert_eq!(doc.operations.len(), 1);
        assert_eq!(doc.operations[0].path, "/v1/pets");
    }
}
