//! The legacy-config rewriter (C2, §4.4): turns an older single-resource
//! YAML shape into the current `resources[]`-based shape before C1's
//! normal decoder ever sees it. Only active when
//! `IMPOSTER_SUPPORT_LEGACY_CONFIG=true`.
//!
//! Operates on the raw `serde_yaml::Value` tree, the same "rewrite the
//! parsed-but-untyped document, then re-decode" idiom
//! `mockforge-config`'s (stub, naming-only) layering implies and that
//! `mockforge-core::routing` uses for its own path-template normalization.

use serde_yaml::{Mapping, Value};

/// True if `doc` uses any legacy-only shape (§4.4's trigger list).
pub fn detect(doc: &Value) -> bool {
    let Some(map) = doc.as_mapping() else { return false };
    let top_level_legacy =
        map.contains_key("path") || map.contains_key("method") || map.contains_key("contentType") || map.contains_key("response");
    if top_level_legacy {
        return true;
    }
    if let Some(Value::Sequence(resources)) = map.get("resources") {
        return resources.iter().any(resource_is_legacy);
    }
    false
}

fn resource_is_legacy(resource: &Value) -> bool {
    let Some(map) = resource.as_mapping() else { return false };
    if map.contains_key("contentType") {
        return true;
    }
    if let Some(response) = map.get("response").and_then(Value::as_mapping) {
        return response.contains_key("staticFile") || response.contains_key("staticData") || response.contains_key("scriptFile");
    }
    false
}

/// Rewrite `doc` in place into the canonical current shape.
pub fn rewrite(mut doc: Value) -> Value {
    let Value::Mapping(ref mut map) = doc else { return doc };

    if let Some(lifted) = lift_top_level(map) {
        let entry = map.entry("resources".into()).or_insert_with(|| Value::Sequence(Vec::new()));
        if let Value::Sequence(resources) = entry {
            resources.insert(0, lifted);
        }
    }

    if let Some(Value::Sequence(resources)) = map.get_mut("resources") {
        for resource in resources.iter_mut() {
            rewrite_resource(resource);
        }
    }

    doc
}

/// Pull `{path, method, contentType, response}` off the document root into
/// a standalone resource mapping, removing them from the root.
fn lift_top_level(map: &mut Mapping) -> Option<Value> {
    let path = map.remove("path");
    let method = map.remove("method");
    let content_type = map.remove("contentType");
    let response = map.remove("response");
    if path.is_none() && method.is_none() && content_type.is_none() && response.is_none() {
        return None;
    }

    let mut resource = Mapping::new();
    if let Some(p) = path {
        resource.insert("path".into(), p);
    }
    if let Some(m) = method {
        resource.insert("method".into(), m);
    }
    if let Some(ct) = content_type {
        resource.insert("contentType".into(), ct);
    }
    if let Some(r) = response {
        resource.insert("response".into(), r);
    }
    let mut lifted = Value::Mapping(resource);
    rewrite_resource(&mut lifted);
    Some(lifted)
}

fn rewrite_resource(resource: &mut Value) {
    let Value::Mapping(map) = resource else { return };

    if let Some(path) = map.get("path").and_then(Value::as_str).map(brace_style) {
        map.insert("path".into(), Value::String(path));
    }

    let content_type = map.remove("contentType");

    if let Some(Value::Mapping(response)) = map.get_mut("response") {
        if let Some(ct) = content_type {
            let headers_entry = response.entry("headers".into()).or_insert_with(|| Value::Mapping(Mapping::new()));
            if let Value::Mapping(headers) = headers_entry {
                headers.insert("Content-Type".into(), ct);
            }
        }
        if let Some(static_data) = response.remove("staticData") {
            response.insert("content".into(), static_data);
        }
        if let Some(static_file) = response.remove("staticFile") {
            response.insert("file".into(), static_file);
        }
        if let Some(script_file) = response.remove("scriptFile") {
            let step = {
                let mut step = Mapping::new();
                step.insert("type".into(), "script".into());
                step.insert("lang".into(), "javascript".into());
                step.insert("file".into(), script_file);
                Value::Mapping(step)
            };
            let steps_entry = map.entry("steps".into()).or_insert_with(|| Value::Sequence(Vec::new()));
            if let Value::Sequence(steps) = steps_entry {
                steps.insert(0, step);
            }
        }
    } else if let Some(ct) = content_type {
        // `response` absent but contentType was declared: still normalize
        // into a response block so the current decoder sees a consistent
        // shape.
        let mut response = Mapping::new();
        let mut headers = Mapping::new();
        headers.insert("Content-Type".into(), ct);
        response.insert("headers".into(), Value::Mapping(headers));
        map.insert("response".into(), Value::Mapping(response));
    }
}

/// `/api/:id/sub/:name` → `/api/{id}/sub/{name}`.
fn brace_style(path: &str) -> String {
    path.split('/')
        .map(|seg| match seg.strip_prefix(':') {
            Some(name) => format!("{{{name}}}"),
            None => seg.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}
