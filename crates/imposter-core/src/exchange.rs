//! The in-flight request/response/state bundle (`Exchange`, §3 "ambient data
//! types"). The outer HTTP listener and its request/response serialization
//! are out of scope (§1); `imposter-http` adapts axum's types into
//! `RequestContext` and reads `ResponseState` back out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::store::RequestStore;

/// Decrements a concurrency-limit counter when dropped (§5 "record a
/// cleanup hook that decrements the counter when the exchange ends").
/// Held by the `Exchange` that was admitted past the limit, so it fires
/// exactly once, whenever that exchange goes out of scope — including on
/// early return or a cancelled task.
pub struct ConcurrencyGuard(Arc<AtomicI64>);

impl ConcurrencyGuard {
    pub fn new(counter: Arc<AtomicI64>) -> Self {
        Self(counter)
    }
}

impl Drop for ConcurrencyGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A normalized view of an incoming HTTP request, independent of whatever
/// web framework produced it.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    /// Query parameters, first-seen order, multiple values per name.
    pub query_params: HashMap<String, Vec<String>>,
    /// Header names are stored lower-cased (headers are matched
    /// case-insensitively, §4.6.3).
    pub headers: HashMap<String, String>,
    pub form_params: HashMap<String, Vec<String>>,
    pub body: Vec<u8>,
}

impl RequestContext {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn form_param(&self, name: &str) -> Option<&str> {
        self.form_params.get(name).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// The mutable response under construction (§4.8, "ResponseState" in the
/// §9 redesign note: a single owned struct, mutated by explicit reference,
/// never via globals).
#[derive(Debug, Clone)]
pub struct ResponseState {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    /// Set once the pipeline has produced a final answer and no further
    /// resource/response processing should occur (e.g. a `Step` handled the
    /// exchange itself, or `Fail::EmptyResponse`/`CloseConnection` fired).
    pub handled: bool,
    /// Set by `Fail::CloseConnection` (§4.8.4); the hosting layer should
    /// attempt to drop the underlying connection.
    pub stopped: bool,
    /// Set when the body is still the sentinel "fill in example later"
    /// marker; a protocol-specific `ResponseProcessor` (SOAP/OpenAPI) must
    /// replace it before the exchange is considered complete.
    pub is_example_placeholder: bool,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body: Vec::new(),
            handled: false,
            stopped: false,
            is_example_placeholder: false,
        }
    }
}

/// Everything one dispatch call threads through the pipeline.
pub struct Exchange {
    pub request: RequestContext,
    pub response: ResponseState,
    pub request_store: RequestStore,
    /// Path parameters captured while scoring the winning matcher (§4.6.2).
    pub path_params: HashMap<String, String>,
    /// Concurrency-limit admissions held for the life of this exchange;
    /// dropped (and so decremented) whichever way the exchange ends.
    concurrency_guards: Vec<ConcurrencyGuard>,
}

impl Exchange {
    pub fn new(request: RequestContext) -> Self {
        Self {
            request,
            response: ResponseState::default(),
            request_store: RequestStore::new(),
            path_params: HashMap::new(),
            concurrency_guards: Vec::new(),
        }
    }

    pub fn hold_concurrency_guard(&mut self, guard: ConcurrencyGuard) {
        self.concurrency_guards.push(guard);
    }
}
