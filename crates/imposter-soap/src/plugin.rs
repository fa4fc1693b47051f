//! Wires WSDL parsing, example synthesis, and envelope handling into
//! `imposter-core`'s `Augmenter`/`ResponseProcessor`/`SoapMatchContext` seams
//! (§4.11 "Augmentation" and "Response post-processing").

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use imposter_core::exchange::Exchange;
use imposter_core::matcher::SoapMatchContext;
use imposter_core::model::{BaseResource, Capture, CaptureSource, Interceptor, RequestMatcher, Response, ServerConfig};
use imposter_core::plugin::{Augmenter, BaseResponseProcessor, ResponseProcessor};
use imposter_core::response_builder::EXAMPLE_PLACEHOLDER_SENTINEL;
use imposter_core::store::StoreRegistry;
use imposter_core::value_matcher::{ExprCondition, Operator};

use crate::envelope;
use crate::example;
use crate::wsdl::{self, Operation, WsdlDocument};

const MATCHED_OPERATION_KEY: &str = "_matched-soap-operation";

/// Resolves the SOAP-specific matcher criteria (`operation`, `binding`)
/// against a parsed WSDL document.
pub struct SoapContext {
    wsdl: Arc<WsdlDocument>,
}

impl SoapMatchContext for SoapContext {
    fn body_operation_name(&self, body: &[u8]) -> Option<String> {
        envelope::unwrap(body).ok().and_then(|p| p.operation_name)
    }

    fn binding_for_operation(&self, operation: &str) -> Option<String> {
        self.wsdl.operations.iter().find(|op| op.name == operation).map(|op| op.binding_name.clone())
    }
}

/// Parses the config's `wsdlFile` and appends one interceptor per operation
/// plus a terminal catch-all (§4.11 "Augmentation").
pub struct SoapAugmenter;

impl Augmenter for SoapAugmenter {
    fn augment(&self, config: &mut ServerConfig) -> imposter_core::Result<()> {
        let Some(wsdl_file) = config.wsdl_file.clone() else {
            return Ok(());
        };
        let path = config.config_dir.join(&wsdl_file);
        let bytes = std::fs::read(&path)
            .map_err(|e| imposter_core::Error::config(format!("failed to read wsdl {}: {e}", path.display())))?;
        let document =
            wsdl::parse(&bytes).map_err(|e| imposter_core::Error::config(format!("{}: {e}", path.display())))?;
        tracing::debug!(operations = document.operations.len(), wsdl = %path.display(), "parsed WSDL document");
        let document = Arc::new(document);

        let base_path = config.base_path.clone().unwrap_or_default();
        for op in &document.operations {
            config.interceptors.push(operation_interceptor(op, &base_path));
        }
        config.interceptors.push(catch_all_interceptor());

        config.soap_context = Some(Arc::new(SoapContext { wsdl: document }));
        Ok(())
    }
}

/// One interceptor per WSDL operation: matches `POST` at the config's base
/// path with the operation's `soapAction` (when declared), captures the
/// matched operation name, and replies with the example-placeholder
/// sentinel so `SoapResponseProcessor` fills in the real body afterwards.
fn operation_interceptor(op: &Operation, base_path: &str) -> Interceptor {
    let matcher = RequestMatcher {
        method: Some("POST".to_string()),
        path: Some(if base_path.is_empty() { "/*".to_string() } else { format!("{base_path}/*") }),
        soap_operation: Some(op.name.clone()),
        soap_action: (!op.soap_action.is_empty()).then(|| op.soap_action.clone()),
        ..Default::default()
    };

    let mut capture = std::collections::HashMap::new();
    capture.insert(
        "soapOperation".to_string(),
        Capture {
            enabled: true,
            store_name: "request".to_string(),
            key_template: Some(MATCHED_OPERATION_KEY.to_string()),
            source: CaptureSource::Const(op.name.clone()),
        },
    );

    Interceptor {
        matcher,
        base: BaseResource {
            capture,
            response: Some(Response { content: Some(EXAMPLE_PLACEHOLDER_SENTINEL.to_string()), ..Default::default() }),
            ..Default::default()
        },
        continue_: true,
    }
}

/// Terminal interceptor: anything that fell through after a `*Operation`
/// interceptor already captured a match stops here with no further resource
/// lookup, leaving the placeholder body untouched (§4.11: a WSDL-only
/// config declares no REST resources of its own).
fn catch_all_interceptor() -> Interceptor {
    let matcher = RequestMatcher {
        all_of: vec![ExprCondition {
            expression: format!("${{stores.request.{MATCHED_OPERATION_KEY}}}"),
            operator: Operator::Exists,
            value: String::new(),
        }],
        ..Default::default()
    };
    Interceptor { matcher, base: BaseResource::default(), continue_: false }
}

/// Runs the base response builder, then — if the body is still the example
/// placeholder — replaces it with a synthesized SOAP envelope (or fault)
/// using the operation captured into the request store by the matching
/// interceptor (§4.11 "Response post-processing").
pub struct SoapResponseProcessor {
    wsdl: Arc<WsdlDocument>,
    base: BaseResponseProcessor,
}

impl SoapResponseProcessor {
    pub fn new(wsdl: Arc<WsdlDocument>) -> Self {
        Self { wsdl, base: BaseResponseProcessor }
    }
}

#[async_trait]
impl ResponseProcessor for SoapResponseProcessor {
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

        let version = self.wsdl.soap_version;
        let forced_fault = response.soap_fault || exchange.response.status >= 500;
        let envelope_invalid = envelope::unwrap(&exchange.request.body).is_err();

        let body_xml = if envelope_invalid {
            exchange.response.status = 400;
            envelope::fault(version, "soap:Client", "malformed SOAP envelope")
        } else if forced_fault {
            envelope::fault(version, "soap:Server", "simulated fault")
        } else {
            let operation_name = exchange.request_store.get_string(MATCHED_OPERATION_KEY);
            let operation = operation_name.as_deref().and_then(|name| self.wsdl.operations.iter().find(|op| op.name == name));
            match operation {
                Some(op) => {
                    let fragment = example::synthesize(&op.output, &self.wsdl.schema_index);
                    envelope::wrap(version, &fragment)
                }
                None => envelope::fault(version, "soap:Server", "unresolved operation"),
            }
        };

        exchange.response.body = body_xml.into_bytes();
        exchange.response.is_example_placeholder = false;
        exchange.response.headers.insert("Content-Type".to_string(), version.content_type().to_string());
        Ok(())
    }
}
