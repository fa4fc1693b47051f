//! The dispatcher (C8, §4.9): selects a `ServerConfig`, runs interceptors in
//! order, picks the best-matching resource, enforces concurrency limits and
//! runs captures/steps/response for the winner.
//!
//! The "one struct holding shared state behind cheap clones, handed an
//! incoming request and producing an outcome" shape is grounded on
//! `mockforge-http`'s router/handler split.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::capture;
use crate::error::{Error, Result};
use crate::exchange::{ConcurrencyGuard, Exchange, RequestContext};
use crate::matcher::{self, MatchOutcome};
use crate::model::{BaseResource, Response, ServerConfig};
use crate::plugin::ResponseProcessor;
use crate::steps;
use crate::store::{StoreContext, StoreRegistry};

/// One scored candidate, tracked alongside the flags `bestMatch` breaks ties
/// on (§4.6: "non-wildcard wins ties over wildcard; runtime-generated wins
/// ties over non-runtime").
struct Candidate<'a> {
    base: &'a BaseResource,
    outcome: MatchOutcome,
    index: usize,
}

/// Holds every loaded config plus the process-wide shared state a request
/// needs to be dispatched: named stores, per-resource-id concurrency
/// counters, and whichever `ResponseProcessor` the loaded plugin kind wired
/// in (plain REST vs. SOAP/OpenAPI composition, §9 design note).
pub struct Dispatcher {
    configs: Vec<ServerConfig>,
    registry: StoreRegistry,
    concurrency: RwLock<HashMap<String, Arc<AtomicI64>>>,
    response_processor: Arc<dyn ResponseProcessor>,
}

impl Dispatcher {
    pub fn new(configs: Vec<ServerConfig>, registry: StoreRegistry, response_processor: Arc<dyn ResponseProcessor>) -> Self {
        Self { configs, registry, concurrency: RwLock::new(HashMap::new()), response_processor }
    }

    /// Select the config whose base path is a request-path prefix, falling
    /// back to the sole config when there is only one (§4.9.1).
    fn select_config(&self, path: &str) -> Option<&ServerConfig> {
        if self.configs.len() == 1 {
            return self.configs.first();
        }
        self.configs
            .iter()
            .filter(|c| c.base_path.as_deref().is_some_and(|bp| path.starts_with(bp)))
            .max_by_key(|c| c.base_path.as_deref().map(str::len).unwrap_or(0))
    }

    fn counter_for(&self, resource_id: &str) -> Arc<AtomicI64> {
        if let Some(counter) = self.concurrency.read().get(resource_id) {
            return counter.clone();
        }
        self.concurrency.write().entry(resource_id.to_string()).or_insert_with(|| Arc::new(AtomicI64::new(0))).clone()
    }

    pub async fn handle(&self, request: RequestContext) -> Exchange {
        let mut exchange = Exchange::new(request);

        let Some(config) = self.select_config(&exchange.request.path) else {
            exchange.response.status = 404;
            exchange.response.body = b"No matching config".to_vec();
            exchange.response.handled = true;
            return exchange;
        };

        if let Err(e) = self.run_interceptors(config, &mut exchange).await {
            tracing::warn!(error = %e, "interceptor chain failed");
            apply_error(&mut exchange, &e);
            return exchange;
        }
        if exchange.response.handled {
            return exchange;
        }

        let Some((base, outcome)) = self.best_resource(config, &exchange) else {
            exchange.response.status = 404;
            exchange.response.body = b"No matching resource".to_vec();
            exchange.response.handled = true;
            return exchange;
        };
        exchange.path_params = outcome.path_params;

        if self.enforce_concurrency_limit(base, &mut exchange).await {
            return exchange;
        }

        if let Err(e) = self.run_resource(config, base, &mut exchange).await {
            tracing::warn!(error = %e, "resource execution failed");
            apply_error(&mut exchange, &e);
        }
        exchange
    }

    async fn run_interceptors(&self, config: &ServerConfig, exchange: &mut Exchange) -> Result<()> {
        for interceptor in &config.interceptors {
            let matched = {
                let ctx = StoreContext { registry: &self.registry, request: &exchange.request_store };
                matcher::score(
                    &exchange.request,
                    &interceptor.matcher,
                    &config.system.xml_namespaces,
                    &ctx,
                    config.soap_context.as_deref(),
                )?
            };
            let Some(outcome) = matched else { continue };

            if !interceptor.base.capture.is_empty() {
                let ctx = StoreContext { registry: &self.registry, request: &exchange.request_store };
                capture::run(&interceptor.base.capture, &exchange.request, &outcome.path_params, &ctx)?;
            }
            if !interceptor.base.steps.is_empty() {
                steps::run(&interceptor.base.steps, exchange, &self.registry).await?;
            }
            if let Some(response) = &interceptor.base.response {
                self.response_processor.process(response, &config.config_dir, exchange, &self.registry).await?;
            }
            if exchange.response.handled || exchange.response.stopped {
                return Ok(());
            }
            if !interceptor.continue_ {
                exchange.response.handled = true;
                return Ok(());
            }
        }
        Ok(())
    }

    /// Score every resource, returning the winner per `bestMatch` (§4.6).
    fn best_resource<'a>(&self, config: &'a ServerConfig, exchange: &Exchange) -> Option<(&'a BaseResource, MatchOutcome)> {
        let mut candidates = Vec::new();
        for (index, resource) in config.all_resources().iter().enumerate() {
            let ctx = StoreContext { registry: &self.registry, request: &exchange.request_store };
            let matched = matcher::score(
                &exchange.request,
                &resource.matcher,
                &config.system.xml_namespaces,
                &ctx,
                config.soap_context.as_deref(),
            )
            .ok()
            .flatten();
            if let Some(outcome) = matched {
                candidates.push(Candidate { base: &resource.base, outcome, index });
            }
        }

        candidates.sort_by(|a, b| {
            b.outcome
                .score
                .cmp(&a.outcome.score)
                .then(a.outcome.wildcard.cmp(&b.outcome.wildcard))
                .then(b.base.runtime_generated.cmp(&a.base.runtime_generated))
                .then(a.index.cmp(&b.index))
        });

        candidates.into_iter().next().map(|c| (c.base, c.outcome))
    }

    /// Returns `true` if a concurrency limit saturated and the exchange is
    /// already handled (§4.9.4).
    async fn enforce_concurrency_limit(&self, base: &BaseResource, exchange: &mut Exchange) -> bool {
        if base.concurrency_limits.is_empty() {
            return false;
        }
        let resource_id = base.resource_id.clone().unwrap_or_default();
        let counter = self.counter_for(&resource_id);

        for limit in &base.concurrency_limits {
            let in_flight = counter.load(Ordering::SeqCst);
            if in_flight >= limit.threshold as i64 {
                let config_dir = std::path::Path::new("");
                if self.response_processor.process(&limit.response, config_dir, exchange, &self.registry).await.is_err() {
                    exchange.response.status = 500;
                }
                exchange.response.handled = true;
                return true;
            }
        }

        counter.fetch_add(1, Ordering::SeqCst);
        exchange.hold_concurrency_guard(ConcurrencyGuard::new(counter));
        false
    }

    async fn run_resource(&self, config: &ServerConfig, base: &BaseResource, exchange: &mut Exchange) -> Result<()> {
        if !base.capture.is_empty() {
            let ctx = StoreContext { registry: &self.registry, request: &exchange.request_store };
            capture::run(&base.capture, &exchange.request, &exchange.path_params, &ctx)?;
        }
        if !base.steps.is_empty() {
            steps::run(&base.steps, exchange, &self.registry).await?;
            if exchange.response.handled {
                return Ok(());
            }
        }
        if let Some(response) = &base.response {
            self.response_processor.process(response, &config.config_dir, exchange, &self.registry).await?;
        } else {
            empty_ok(exchange);
        }
        Ok(())
    }
}

fn empty_ok(exchange: &mut Exchange) {
    exchange.response.status = 200;
    exchange.response.handled = true;
}

/// Map a propagated `Error` onto an HTTP outcome (§7) and write it into
/// `exchange.response`, rather than letting it fall through to the default
/// 200/empty response.
fn apply_error(exchange: &mut Exchange, error: &Error) {
    let (status, body): (u16, &str) = match error {
        Error::PathTraversal { .. } => (500, "Invalid file path"),
        Error::Template { .. } => (500, "Template expansion failed"),
        Error::Step { .. } => (500, "Failed to execute steps"),
        Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound => (404, "Not found"),
        _ => (500, "Internal error"),
    };
    exchange.response.status = status;
    exchange.response.body = body.as_bytes().to_vec();
    exchange.response.handled = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BaseResource, Interceptor, PluginKind, RequestMatcher, Resource};
    use crate::plugin::BaseResponseProcessor;

    fn empty_config(base_path: Option<&str>) -> ServerConfig {
        ServerConfig {
            plugin: PluginKind::Rest,
            base_path: base_path.map(str::to_string),
            resources: Vec::new(),
            interceptors: Vec::new(),
            system: Default::default(),
            security: None,
            wsdl_file: None,
            spec_file: None,
            strip_server_path: false,
            validation: None,
            config_dir: Default::default(),
            soap_context: None,
        }
    }

    fn request(method: &str, path: &str) -> RequestContext {
        RequestContext { method: method.to_string(), path: path.to_string(), ..Default::default() }
    }

    #[tokio::test]
    async fn no_matching_resource_yields_404() {
        let dispatcher =
            Dispatcher::new(vec![empty_config(None)], StoreRegistry::new(), Arc::new(BaseResponseProcessor));
        let exchange = dispatcher.handle(request("GET", "/nothing")).await;
        assert_eq!(exchange.response.status, 404);
    }

    #[tokio::test]
    async fn matching_resource_applies_its_response() {
        let mut config = empty_config(None);
        let mut resource = Resource::default();
        resource.matcher.method = Some("GET".to_string());
        resource.matcher.path = Some("/hello".to_string());
        resource.base.response = Some(Response { content: Some("hi".to_string()), ..Default::default() });
        config.resources.push(resource);

        let dispatcher = Dispatcher::new(vec![config], StoreRegistry::new(), Arc::new(BaseResponseProcessor));
        let exchange = dispatcher.handle(request("GET", "/hello")).await;
        assert_eq!(exchange.response.body, b"hi");
    }

    #[tokio::test]
    async fn more_specific_literal_match_wins_over_wildcard() {
        let mut config = empty_config(None);

        let mut wildcard = Resource::default();
        wildcard.matcher.path = Some("/a/*".to_string());
        wildcard.base.response = Some(Response { content: Some("wild".to_string()), ..Default::default() });

        let mut literal = Resource::default();
        literal.matcher.path = Some("/a/b".to_string());
        literal.base.response = Some(Response { content: Some("literal".to_string()), ..Default::default() });

        config.resources.push(wildcard);
        config.resources.push(literal);

        let dispatcher = Dispatcher::new(vec![config], StoreRegistry::new(), Arc::new(BaseResponseProcessor));
        let exchange = dispatcher.handle(request("GET", "/a/b")).await;
        assert_eq!(exchange.response.body, b"literal");
    }

    #[tokio::test]
    async fn terminating_interceptor_short_circuits_resources() {
        let mut config = empty_config(None);
        config.interceptors.push(Interceptor {
            matcher: RequestMatcher::default(),
            base: BaseResource {
                response: Some(Response { status_code: Some(503), content: Some("down".to_string()), ..Default::default() }),
                ..Default::default()
            },
            continue_: false,
        });
        let mut resource = Resource::default();
        resource.matcher.path = Some("/hello".to_string());
        resource.base.response = Some(Response { content: Some("hi".to_string()), ..Default::default() });
        config.resources.push(resource);

        let dispatcher = Dispatcher::new(vec![config], StoreRegistry::new(), Arc::new(BaseResponseProcessor));
        let exchange = dispatcher.handle(request("GET", "/hello")).await;
        assert_eq!(exchange.response.status, 503);
        assert_eq!(exchange.response.body, b"down");
    }

    #[tokio::test]
    async fn concurrency_limit_saturation_returns_configured_response() {
        let mut config = empty_config(None);
        let mut resource = Resource::default();
        resource.matcher.path = Some("/limited".to_string());
        resource.base.resource_id = Some("GET:/limited".to_string());
        resource.base.concurrency_limits.push(crate::model::ConcurrencyLimit {
            threshold: 0,
            response: Response { status_code: Some(429), content: Some("slow down".to_string()), ..Default::default() },
        });
        resource.base.response = Some(Response { content: Some("ok".to_string()), ..Default::default() });
        config.resources.push(resource);

        let dispatcher = Dispatcher::new(vec![config], StoreRegistry::new(), Arc::new(BaseResponseProcessor));
        let exchange = dispatcher.handle(request("GET", "/limited")).await;
        assert_eq!(exchange.response.status, 429);
        assert_eq!(exchange.response.body, b"slow down");
    }

    #[tokio::test]
    async fn dir_traversal_via_wildcard_yields_500() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = empty_config(None);
        config.config_dir = dir.path().to_path_buf();
        let mut resource = Resource::default();
        resource.matcher.path = Some("/files/*".to_string());
        resource.base.response = Some(Response { dir: Some("public".to_string()), ..Default::default() });
        config.resources.push(resource);

        let dispatcher = Dispatcher::new(vec![config], StoreRegistry::new(), Arc::new(BaseResponseProcessor));
        let exchange = dispatcher.handle(request("GET", "/files/../../etc/passwd")).await;
        assert_eq!(exchange.response.status, 500);
        assert_eq!(exchange.response.body, b"Invalid file path");
    }

    #[tokio::test]
    async fn missing_dir_file_yields_404() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = empty_config(None);
        config.config_dir = dir.path().to_path_buf();
        let mut resource = Resource::default();
        resource.matcher.path = Some("/files/*".to_string());
        resource.base.response = Some(Response { dir: Some("public".to_string()), ..Default::default() });
        config.resources.push(resource);

        let dispatcher = Dispatcher::new(vec![config], StoreRegistry::new(), Arc::new(BaseResponseProcessor));
        let exchange = dispatcher.handle(request("GET", "/files/missing.txt")).await;
        assert_eq!(exchange.response.status, 404);
    }

    #[tokio::test]
    async fn base_path_selects_matching_config() {
        let mut config_a = empty_config(Some("/alpha"));
        let mut resource_a = Resource::default();
        resource_a.matcher.path = Some("/alpha/ping".to_string());
        resource_a.base.response = Some(Response { content: Some("alpha".to_string()), ..Default::default() });
        config_a.resources.push(resource_a);

        let mut config_b = empty_config(Some("/beta"));
        let mut resource_b = Resource::default();
        resource_b.matcher.path = Some("/beta/ping".to_string());
        resource_b.base.response = Some(Response { content: Some("beta".to_string()), ..Default::default() });
        config_b.resources.push(resource_b);

        let dispatcher =
            Dispatcher::new(vec![config_a, config_b], StoreRegistry::new(), Arc::new(BaseResponseProcessor));
        let exchange = dispatcher.handle(request("GET", "/beta/ping")).await;
        assert_eq!(exchange.response.body, b"beta");
    }
}
