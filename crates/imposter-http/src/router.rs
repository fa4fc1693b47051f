//! Builds the axum `Router` that forwards every request to a `Dispatcher`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response as AxumResponse};
use axum::Router;

use imposter_core::exchange::RequestContext;
use imposter_core::Dispatcher;

/// Build a router that owns `dispatcher` and forwards every method/path to
/// `Dispatcher::handle`, with no matching or response logic of its own.
pub fn build_router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new().fallback(handle_any).with_state(dispatcher)
}

async fn handle_any(
    State(dispatcher): State<Arc<Dispatcher>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> AxumResponse {
    let request = to_request_context(&method, &uri, &headers, &body);
    let exchange = dispatcher.handle(request).await;

    let mut builder = axum::http::Response::builder()
        .status(StatusCode::from_u16(exchange.response.status).unwrap_or(StatusCode::OK));
    for (name, value) in &exchange.response.headers {
        builder = builder.header(name, value);
    }
    if exchange.response.stopped {
        tracing::warn!("CloseConnection requested; axum/hyper cannot sever the stream from a handler, signalling best-effort via Connection: close");
        builder = builder.header("Connection", "close");
    }
    builder.body(axum::body::Body::from(exchange.response.body)).unwrap_or_else(|_| {
        (StatusCode::INTERNAL_SERVER_ERROR, "failed to build response").into_response()
    })
}

fn to_request_context(method: &Method, uri: &Uri, headers: &HeaderMap, body: &Bytes) -> RequestContext {
    let mut header_map = HashMap::new();
    for (name, value) in headers {
        if let Ok(v) = value.to_str() {
            header_map.insert(name.as_str().to_ascii_lowercase(), v.to_string());
        }
    }

    let query_params = uri.query().map(parse_form_encoded).unwrap_or_default();

    let form_params = if header_map.get("content-type").map(|c| c.starts_with("application/x-www-form-urlencoded")).unwrap_or(false) {
        parse_form_encoded(&String::from_utf8_lossy(body))
    } else {
        HashMap::new()
    };

    let path = urlencoding::decode(uri.path()).map(|c| c.into_owned()).unwrap_or_else(|_| uri.path().to_string());

    RequestContext {
        method: method.as_str().to_string(),
        path,
        query_params,
        headers: header_map,
        form_params,
        body: body.to_vec(),
    }
}

fn parse_form_encoded(raw: &str) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for pair in raw.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = urlencoding::decode(key).map(|c| c.into_owned()).unwrap_or_else(|_| key.to_string());
        let value = urlencoding::decode(value).map(|c| c.into_owned()).unwrap_or_else(|_| value.to_string());
        map.entry(key).or_default().push(value);
    }
    map
}
