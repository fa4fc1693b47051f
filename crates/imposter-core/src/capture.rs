//! The capture engine (C6, §4.7): after a resource/interceptor matches,
//! each of its `capture` entries pulls a value out of the request (or a
//! constant, or an expression) and writes it into a store.
//!
//! Grounded on `mockforge-core::conditions`'s body-projection helpers for
//! the `Body{jsonPath,xPath}` source, reused here via `matcher::project_body`
//! equivalents.

use std::collections::HashMap;

use crate::error::Result;
use crate::exchange::RequestContext;
use crate::model::{Capture, CaptureSource};
use crate::store::StoreContext;
use crate::template;

/// Run every capture rule in `captures` (in declaration order) against
/// `request`, writing each result into its configured store. Disabled
/// captures (`enabled: false`) are skipped. A capture whose source has
/// nothing to offer (e.g. a missing path param) is skipped without error —
/// capture is best-effort, never a match criterion (§4.7.3).
pub fn run(captures: &HashMap<String, Capture>, request: &RequestContext, path_params: &HashMap<String, String>, stores: &StoreContext<'_>) -> Result<()> {
    for (name, capture) in captures {
        if !capture.enabled {
            continue;
        }
        let Some(value) = extract(&capture.source, request, path_params) else {
            continue;
        };
        let key = match &capture.key_template {
            Some(template_str) => template::expand(template_str, stores),
            None => name.clone(),
        };
        stores.set(&capture.store_name, key, serde_json::Value::String(value));
    }
    Ok(())
}

fn extract(source: &CaptureSource, request: &RequestContext, path_params: &HashMap<String, String>) -> Option<String> {
    match source {
        CaptureSource::PathParam(name) => path_params.get(name).cloned(),
        CaptureSource::QueryParam(name) => request.query_param(name).map(str::to_string),
        CaptureSource::FormParam(name) => request.form_param(name).map(str::to_string),
        CaptureSource::Header(name) => request.header(name).map(str::to_string),
        CaptureSource::Const(value) => Some(value.clone()),
        CaptureSource::Expression(expr) => Some(expr.clone()),
        CaptureSource::Body { json_path, x_path, xml_namespaces } => {
            project_body(request, json_path.as_deref(), x_path.as_deref(), xml_namespaces)
        }
    }
}

fn project_body(
    request: &RequestContext,
    json_path: Option<&str>,
    x_path: Option<&str>,
    xml_namespaces: &HashMap<String, String>,
) -> Option<String> {
    if let Some(json_path) = json_path {
        let value: serde_json::Value = serde_json::from_slice(&request.body).ok()?;
        let selector = jsonpath::Selector::new(json_path).ok()?;
        let results: Vec<String> = selector
            .find(&value)
            .map(|v| match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        return (!results.is_empty()).then(|| results.join(","));
    }
    if let Some(x_path) = x_path {
        let body = request.body_text();
        let doc = roxmltree::Document::parse(body.as_ref()).ok()?;
        return crate::xpath::text(doc.root_element(), x_path.trim_start_matches('/'), xml_namespaces);
    }
    Some(request.body_text().into_owned())
}
