//! JSON Schema-driven example synthesis (§4.12 "Example synthesis").
//! Trimmed down from `mockforge-core::openapi::response::generate_example_from_schema`'s
//! recursion shape (string/integer/number/boolean leaves, object recurses
//! into properties, array recurses into `items`), leaving out the
//! AI/persona/pagination-inference branches layered on top there — this
//! plugin only ever needs a single plausible instance, not a scenario-aware
//! one.

use openapiv3::{Schema, SchemaKind, Type};
use serde_json::{json, Value};

use crate::spec::{OpenApiDocument, ResponseVariant};

/// Resolve the body for `variant`: a configured `exampleName`, else the
/// first declared example, else a schema-driven synthesized value.
pub fn resolve_body(document: &OpenApiDocument, variant: &ResponseVariant, example_name: Option<&str>) -> Value {
    if let Some(name) = example_name {
        if let Some(value) = variant.examples.get(name) {
            return value.clone();
        }
    }
    if let Some((_, value)) = variant.examples.first() {
        return value.clone();
    }
    match &variant.schema {
        Some(schema) => generate_from_schema(document, schema),
        None => Value::Null,
    }
}

/// Generate a plausible value for `schema`, recursing through `document`'s
/// component schemas for `$ref`s.
pub fn generate_from_schema(document: &OpenApiDocument, schema: &Schema) -> Value {
    if let Some(example) = schema.schema_data.example.as_ref() {
        return example.clone();
    }

    match &schema.schema_kind {
        SchemaKind::Type(Type::String(string_type)) if !string_type.enumeration.is_empty() => string_type
            .enumeration
            .iter()
            .find_map(|v| v.clone())
            .map(Value::String)
            .unwrap_or(Value::Null),
        SchemaKind::Type(Type::String(string_type)) => Value::String(string_example(&string_type.format)),
        SchemaKind::Type(Type::Integer(integer_type)) => {
            Value::Number(integer_example(&integer_type.format).into())
        }
        SchemaKind::Type(Type::Number(number_type)) => {
            Value::Number(serde_json::Number::from_f64(number_example(&number_type.format)).unwrap())
        }
        SchemaKind::Type(Type::Boolean(_)) => Value::Bool(true),
        SchemaKind::Type(Type::Object(object_type)) => {
            let mut map = serde_json::Map::new();
            for (name, property) in &object_type.properties {
                let value = match property {
                    openapiv3::ReferenceOr::Item(prop_schema) => generate_from_schema(document, prop_schema),
                    openapiv3::ReferenceOr::Reference { reference } => document
                        .get_schema(reference)
                        .map(|resolved| generate_from_schema(document, &resolved))
                        .unwrap_or(Value::Null),
                };
                map.insert(name.clone(), value);
            }
            Value::Object(map)
        }
        SchemaKind::Type(Type::Array(array_type)) => match &array_type.items {
            Some(item_ref) => {
                let item = match item_ref {
                    openapiv3::ReferenceOr::Item(item_schema) => generate_from_schema(document, item_schema),
                    openapiv3::ReferenceOr::Reference { reference } => document
                        .get_schema(reference)
                        .map(|resolved| generate_from_schema(document, &resolved))
                        .unwrap_or(Value::Null),
                };
                Value::Array(vec![item])
            }
            None => Value::Array(Vec::new()),
        },
        SchemaKind::AllOf { all_of } => merge_all_of(document, all_of),
        SchemaKind::OneOf { one_of } => first_branch(document, one_of),
        SchemaKind::AnyOf { any_of } => first_branch(document, any_of),
        SchemaKind::Not { .. } => Value::Null,
        SchemaKind::Any(_) => json!({}),
    }
}

fn string_example(format: &openapiv3::VariantOrUnknownOrEmpty<openapiv3::StringFormat>) -> String {
    use openapiv3::{StringFormat, VariantOrUnknownOrEmpty};
    match format {
        VariantOrUnknownOrEmpty::Item(StringFormat::DateTime) => "2024-01-01T00:00:00Z".to_string(),
        VariantOrUnknownOrEmpty::Item(StringFormat::Date) => "2024-01-01".to_string(),
        VariantOrUnknownOrEmpty::Unknown(format) if format == "email" => "user@example.com".to_string(),
        VariantOrUnknownOrEmpty::Unknown(format) if format == "uuid" => {
            "00000000-0000-4000-8000-000000000000".to_string()
        }
        _ => "example".to_string(),
    }
}

fn integer_example(format: &openapiv3::VariantOrUnknownOrEmpty<openapiv3::IntegerFormat>) -> i64 {
    use openapiv3::{IntegerFormat, VariantOrUnknownOrEmpty};
    match format {
        VariantOrUnknownOrEmpty::Item(IntegerFormat::Int64) => 42,
        VariantOrUnknownOrEmpty::Item(IntegerFormat::Int32) => 42,
        _ => 42,
    }
}

fn number_example(format: &openapiv3::VariantOrUnknownOrEmpty<openapiv3::NumberFormat>) -> f64 {
    use openapiv3::{NumberFormat, VariantOrUnknownOrEmpty};
    match format {
        VariantOrUnknownOrEmpty::Item(NumberFormat::Float) => 42.0,
        VariantOrUnknownOrEmpty::Item(NumberFormat::Double) => 42.0,
        _ => 42.0,
    }
}

fn merge_all_of(document: &OpenApiDocument, schemas: &[openapiv3::ReferenceOr<Schema>]) -> Value {
    let mut map = serde_json::Map::new();
    for schema_ref in schemas {
        let resolved = match schema_ref {
            openapiv3::ReferenceOr::Item(schema) => Some(schema.clone()),
            openapiv3::ReferenceOr::Reference { reference } => document.get_schema(reference),
        };
        if let Some(schema) = resolved {
            if let Value::Object(fields) = generate_from_schema(document, &schema) {
                map.extend(fields);
            }
        }
    }
    Value::Object(map)
}

fn first_branch(document: &OpenApiDocument, schemas: &[openapiv3::ReferenceOr<Schema>]) -> Value {
    match schemas.first() {
        Some(openapiv3::ReferenceOr::Item(schema)) => generate_from_schema(document, schema),
        Some(openapiv3::ReferenceOr::Reference { reference }) => document
            .get_schema(reference)
            .map(|resolved| generate_from_schema(document, &resolved))
            .unwrap_or(Value::Null),
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::OpenApiDocument;

    fn doc(body: &str) -> OpenApiDocument {
        OpenApiDocument::parse(body.as_bytes()).unwrap()
    }

    #[test]
    fn synthesizes_scalar_defaults() {
        let document = doc(
            r#"{"openapi":"3.0.3","info":{"title":"t","version":"1"},"paths":{
                "/p":{"get":{"responses":{"200":{"description":"ok","content":{
                    "application/json":{"schema":{"type":"object","properties":{
                        "name":{"type":"string"},"age":{"type":"integer"},"active":{"type":"boolean"}
                    }}}
                }}}}}
            }}"#,
        );
        let variant = &document.operations[0].responses[&200][0];
        let value = resolve_body(&document, variant, None);
        assert_eq!(value["name"], json!("example"));
        assert_eq!(value["age"], json!(42));
        assert_eq!(value["active"], json!(true));
    }

    #[test]
    fn synthesizes_array_with_one_item() {
        let document = doc(
            r#"{"openapi":"3.0.3","info":{"title":"t","version":"1"},"paths":{
                "/p":{"get":{"responses":{"200":{"description":"ok","content":{
                    "application/json":{"schema":{"type":"array","items":{"type":"string"}}}
                }}}}}
            }}"#,
        );
        let variant = &document.operations[0].responses[&200][0];
        let value = resolve_body(&document, variant, None);
        assert_eq!(value, json!(["example"]));
    }

    #[test]
    fn prefers_named_example_over_schema() {
        let document = doc(
            r#"{"openapi":"3.0.3","info":{"title":"t","version":"1"},"paths":{
                "/p":{"get":{"responses":{"200":{"description":"ok","content":{
                    "application/json":{
                        "schema":{"type":"string"},
                        "examples":{"sample":{"value":"from-example"}}
                    }
                }}}}}
            }}"#,
        );
        let variant = &document.operations[0].responses[&200][0];
        assert_eq!(resolve_body(&document, variant, None), json!("from-example"));
    }
}
