//! Wires spec loading, example synthesis, and request validation into
//! `imposter-core`'s `Augmenter`/`ResponseProcessor` seams (§4.12
//! "Augmentation", "Example synthesis", "Validation").
//!
//! Mirrors `imposter-soap::plugin`'s shape: one interceptor per response
//! variant that matches the operation's method/path/`Accept` header and
//! replies with the placeholder sentinel, plus a terminal catch-all. Scoped
//! to each operation's *default* response (§4.12 "Default status code
//! selection") rather than every declared status code — see DESIGN.md's
//! Open Question decision on this.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use imposter_core::exchange::Exchange;
use imposter_core::model::{
    BaseResource, Capture, CaptureSource, Interceptor, RequestMatcher, Response, ServerConfig, ValidationBehaviour,
};
use imposter_core::plugin::{Augmenter, BaseResponseProcessor, ResponseProcessor};
use imposter_core::response_builder::EXAMPLE_PLACEHOLDER_SENTINEL;
use imposter_core::store::StoreRegistry;
use imposter_core::value_matcher::{Condition, Operator, ValueMatcher};

use crate::example;
use crate::spec::OpenApiDocument;
use crate::validate;

const MATCHED_RESPONSE_KEY: &str = "_matched-openapi-response";

/// Parses the config's `specFile` and appends one interceptor per
/// operation's default response, plus a terminal catch-all.
pub struct OpenApiAugmenter;

impl Augmenter for OpenApiAugmenter {
    fn augment(&self, config: &mut ServerConfig) -> imposter_core::Result<()> {
        let Some(spec_file) = config.spec_file.clone() else { return Ok(()) };
        let path = config.config_dir.join(&spec_file);
        let bytes = std::fs::read(&path)
            .map_err(|e| imposter_core::Error::config(format!("failed to read spec {}: {e}", path.display())))?;
        let document =
            OpenApiDocument::parse(&bytes).map_err(|e| imposter_core::Error::config(format!("{}: {e}", path.display())))?;
        tracing::debug!(operations = document.operations.len(), spec = %path.display(), "parsed OpenAPI document");

        for operation in &document.operations {
            let Some((status, variant)) = operation.default_response() else { continue };
            config.interceptors.push(response_interceptor(&operation.method, &operation.path, status, variant));
        }
        config.interceptors.push(catch_all_interceptor());

        Ok(())
    }
}

fn response_interceptor(
    method: &str,
    path: &str,
    _status: u16,
    variant: &crate::spec::ResponseVariant,
) -> Interceptor {
    let mut matcher = RequestMatcher {
        method: Some(method.to_string()),
        path: Some(path.to_string()),
        ..Default::default()
    };
    matcher.request_headers.insert(
        "Accept".to_string(),
        ValueMatcher::Condition(Condition { operator: Operator::Contains, value: variant.content_type.clone() }),
    );

    let mut capture = HashMap::new();
    capture.insert(
        "openapiResponse".to_string(),
        Capture {
            enabled: true,
            store_name: "request".to_string(),
            key_template: Some(MATCHED_RESPONSE_KEY.to_string()),
            source: CaptureSource::Const(variant.id.clone()),
        },
    );

    Interceptor {
        matcher,
        base: BaseResource {
            capture,
            response: Some(Response {
                content: Some(EXAMPLE_PLACEHOLDER_SENTINEL.to_string()),
                headers: HashMap::from([("Content-Type".to_string(), variant.content_type.clone())]),
                ..Default::default()
            }),
            ..Default::default()
        },
        continue_: true,
    }
}

/// Terminal interceptor: a request that matched a response interceptor
/// above already captured `_matched-openapi-response`; nothing further
/// should run (no REST resources coexist with an OpenAPI-only config).
fn catch_all_interceptor() -> Interceptor {
    use imposter_core::value_matcher::ExprCondition;
    let matcher = RequestMatcher {
        all_of: vec![ExprCondition {
            expression: format!("${{stores.request.{MATCHED_RESPONSE_KEY}}}"),
            operator: Operator::Exists,
            value: String::new(),
        }],
        ..Default::default()
    };
    Interceptor { matcher, base: BaseResource::default(), continue_: false }
}

/// Runs the base response builder, then — if the body is still the example
/// placeholder — validates the request (when configured) and replaces the
/// body with a synthesized or declared example (§4.12 "Response
/// post-processing").
pub struct OpenApiResponseProcessor {
    document: Arc<OpenApiDocument>,
    validation: Option<ValidationBehaviour>,
    base: BaseResponseProcessor,
}

impl OpenApiResponseProcessor {
    pub fn new(document: Arc<OpenApiDocument>, validation: Option<ValidationBehaviour>) -> Self {
        Self { document, validation, base: BaseResponseProcessor }
    }

    fn find_variant(&self, variant_id: &str) -> Option<(&crate::spec::OperationEntry, &crate::spec::ResponseVariant)> {
        self.document.operations.iter().find_map(|op| {
            op.responses.values().flatten().find(|v| v.id == variant_id).map(|v| (op, v))
        })
    }
}

#[async_trait]
impl ResponseProcessor for OpenApiResponseProcessor {
    async fn process(
        &self,
        response: &Response,
        config_dir: &Path,
        exchange: &mut Exchange,
        registry: &StoreRegistry,
    ) -> imposter_core::Result<()> {
        self.base.process(response, config_dir, exchange, registry).await?;

        if !exchange.response.is_example_placeholder {
            return Ok(());
        }

        let variant_id = exchange.request_store.get_string(MATCHED_RESPONSE_KEY);
        let Some((_, variant)) = variant_id.as_deref().and_then(|id| self.find_variant(id)) else {
            exchange.response.status = 500;
            exchange.response.body = b"unresolved openapi response".to_vec();
            exchange.response.is_example_placeholder = false;
            return Ok(());
        };

        if let Some(behaviour) = self.validation {
            let body_json: Option<serde_json::Value> = serde_json::from_slice(&exchange.request.body).ok();
            let outcome = validate::validate_request(
                &self.document,
                &exchange.request.method,
                &exchange.request.path,
                &exchange.request.query_params,
                body_json.as_ref(),
            );
            if !outcome.is_valid() {
                match behaviour {
                    ValidationBehaviour::Fail => {
                        exchange.response.status = 400;
                        exchange.response.body =
                            serde_json::to_vec(&json!({"message": "request validation failed", "errors": outcome.errors}))
                                .expect("json serialization of plain strings never fails");
                        exchange.response.headers.insert("Content-Type".to_string(), "application/json".to_string());
                        exchange.response.is_example_placeholder = false;
                        return Ok(());
                    }
                    ValidationBehaviour::Log => {
                        tracing::warn!(errors = ?outcome.errors, "openapi request validation failed");
                    }
                    ValidationBehaviour::Ignore => {}
                }
            }
        }

        let body_value = example::resolve_body(&self.document, variant, response.example_name.as_deref());
        exchange.response.body =
            serde_json::to_vec(&body_value).expect("generated example values always serialize");
        exchange.response.status = variant.status_code;
        exchange.response.headers.insert("Content-Type".to_string(), variant.content_type.clone());
        exchange.response.is_example_placeholder = false;
        Ok(())
    }
}
