//! Stable resource IDs (C4, §4.5): every resource and interceptor gets a
//! deterministic ID derived from its matcher, used to key concurrency
//! counters and the runtime-generated-resource registry across config
//! reloads. Grounded on `mockforge-core::routing`'s route-id hashing (a
//! stable digest of the route's defining fields, not a random UUID).

use sha2::{Digest, Sha256};

use crate::model::{PluginKind, RequestMatcher};

/// Compute the resource ID for `matcher`.
///
/// The base is `UPPER(method|"*"):name`, where `name` is the matcher's path
/// for REST/OpenAPI or its SOAP operation name for SOAP. With no criteria
/// beyond method/path that base is the whole ID; otherwise every other
/// criterion is canonicalized (sorted by key), SHA-256 hashed, and the
/// first 8 hex characters are appended as `base:hash8` so two structurally
/// identical matchers always collide and reordered YAML keys never change
/// the result.
pub fn compute(matcher: &RequestMatcher, plugin: PluginKind) -> String {
    let base = base_string(matcher, plugin);
    if !matcher.has_additional_criteria() {
        return base;
    }
    let mut hasher = Sha256::new();
    hasher.update(canonical_criteria(matcher).as_bytes());
    let digest = hasher.finalize();
    format!("{base}:{}", &hex::encode(digest)[..8])
}

fn base_string(matcher: &RequestMatcher, plugin: PluginKind) -> String {
    let method = matcher.method.as_deref().unwrap_or("*").to_ascii_uppercase();
    let name = match plugin {
        PluginKind::Soap => matcher.soap_operation.clone().unwrap_or_default(),
        PluginKind::Rest | PluginKind::Openapi => matcher.path.clone().unwrap_or_default(),
    };
    format!("{method}:{name}")
}

/// A deterministic textual rendering of every criterion beyond method/path,
/// sorted so map iteration order never affects the digest.
fn canonical_criteria(matcher: &RequestMatcher) -> String {
    let mut parts = Vec::new();
    push_sorted_map(&mut parts, "query", &matcher.query_params);
    push_sorted_map(&mut parts, "headers", &matcher.request_headers);
    push_sorted_map(&mut parts, "form", &matcher.form_params);
    push_sorted_map(&mut parts, "pathParams", &matcher.path_params);
    if matcher.request_body.is_some() {
        parts.push("body".to_string());
    }
    parts.push(format!("allOf={}", matcher.all_of.len()));
    parts.push(format!("anyOf={}", matcher.any_of.len()));
    if let Some(action) = &matcher.soap_action {
        parts.push(format!("soapAction={action}"));
    }
    if let Some(binding) = &matcher.binding {
        parts.push(format!("binding={binding}"));
    }
    parts.join("|")
}

fn push_sorted_map(
    parts: &mut Vec<String>,
    label: &str,
    map: &std::collections::HashMap<String, crate::value_matcher::ValueMatcher>,
) {
    if map.is_empty() {
        return;
    }
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    for key in keys {
        parts.push(format!("{label}.{key}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_matcher::ValueMatcher;

    #[test]
    fn matcher_without_extra_criteria_uses_base_string() {
        let matcher = RequestMatcher { method: Some("get".into()), path: Some("/a".into()), ..Default::default() };
        assert_eq!(compute(&matcher, PluginKind::Rest), "GET:/a");
    }

    #[test]
    fn soap_base_uses_operation_name_not_path() {
        let matcher = RequestMatcher {
            method: Some("POST".into()),
            soap_operation: Some("GetPet".into()),
            ..Default::default()
        };
        assert_eq!(compute(&matcher, PluginKind::Soap), "POST:GetPet");
    }

    #[test]
    fn matcher_with_extra_criteria_appends_truncated_hash() {
        let mut matcher = RequestMatcher { method: Some("GET".into()), path: Some("/a".into()), ..Default::default() };
        matcher.query_params.insert("x".into(), ValueMatcher::Equals("1".into()));
        let id = compute(&matcher, PluginKind::Rest);
        assert!(id.starts_with("GET:/a:"));
        assert_eq!(id.len(), "GET:/a:".len() + 8);
    }

    #[test]
    fn id_is_stable_regardless_of_map_insertion_order() {
        let mut a = RequestMatcher { method: Some("GET".into()), path: Some("/a".into()), ..Default::default() };
        a.query_params.insert("x".into(), ValueMatcher::Equals("1".into()));
        a.query_params.insert("y".into(), ValueMatcher::Equals("2".into()));

        let mut b = RequestMatcher { method: Some("GET".into()), path: Some("/a".into()), ..Default::default() };
        b.query_params.insert("y".into(), ValueMatcher::Equals("2".into()));
        b.query_params.insert("x".into(), ValueMatcher::Equals("1".into()));

        assert_eq!(compute(&a, PluginKind::Rest), compute(&b, PluginKind::Rest));
    }
}
