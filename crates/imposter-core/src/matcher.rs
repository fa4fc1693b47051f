//! The request matcher (C5, §4.6): scores a request against a
//! `RequestMatcher`, rejecting with `None` and otherwise returning an
//! integer score plus whether a trailing wildcard was used.
//!
//! Path segment handling is grounded on
//! `mockforge-core::routing::RouteRegistry::matches_path`; body projection
//! (JSONPath via the `jsonpath` crate, hand-rolled XPath text extraction
//! over `roxmltree`) is grounded on `mockforge-core::conditions`'s
//! `evaluate_jsonpath`/`evaluate_xpath_simple`.

use std::collections::HashMap;

use crate::error::Result;
use crate::exchange::RequestContext;
use crate::model::RequestMatcher;
use crate::store::StoreContext;
use crate::value_matcher::BodyCondition;

/// The outcome of a successful match.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub score: i64,
    pub wildcard: bool,
    pub path_params: HashMap<String, String>,
}

/// Reserved `path_params` key for the remainder captured by a trailing `/*`
/// pattern segment. Can't collide with a named `{param}` capture.
pub const WILDCARD_PATH_PARAM: &str = "*";

/// Extra context the SOAP fields of a matcher need; supplied by
/// `imposter-soap` so this crate stays protocol-agnostic.
pub trait SoapMatchContext {
    /// Local name of the first child element of the SOAP `Body`, if the
    /// request body is a parseable SOAP envelope.
    fn body_operation_name(&self, body: &[u8]) -> Option<String>;
    /// The binding name declared for `operation`, as resolved by the WSDL
    /// parser.
    fn binding_for_operation(&self, operation: &str) -> Option<String>;
}

/// Score `request` against `matcher`. Returns `None` if any criterion
/// rejects the request.
pub fn score(
    request: &RequestContext,
    matcher: &RequestMatcher,
    system_xml_namespaces: &HashMap<String, String>,
    stores: &StoreContext<'_>,
    soap: Option<&dyn SoapMatchContext>,
) -> Result<Option<MatchOutcome>> {
    let mut total = 0i64;
    let mut wildcard = false;
    let mut path_params = HashMap::new();

    // 1. Method.
    if let Some(method) = &matcher.method {
        if !method.eq_ignore_ascii_case(&request.method) {
            return Ok(None);
        }
    }

    // 2. Path.
    if let Some(pattern) = &matcher.path {
        match match_path(pattern, &request.path) {
            Some((path_score, is_wildcard, params)) => {
                total += path_score;
                wildcard = is_wildcard;
                // Path-param conditions declared in the matcher must also hold.
                for (name, value_matcher) in &matcher.path_params {
                    let actual = params.get(name).map(String::as_str);
                    if !value_matcher.evaluate(actual)? {
                        return Ok(None);
                    }
                }
                path_params = params;
            }
            None => return Ok(None),
        }
    }

    // 3. Headers / query / form.
    for (name, vm) in &matcher.request_headers {
        if !vm.evaluate(request.header(name))? {
            return Ok(None);
        }
        total += 1;
    }
    for (name, vm) in &matcher.query_params {
        if !vm.evaluate(request.query_param(name))? {
            return Ok(None);
        }
        total += 1;
    }
    for (name, vm) in &matcher.form_params {
        if !vm.evaluate(request.form_param(name))? {
            return Ok(None);
        }
        total += 1;
    }

    // 4. Request body.
    if let Some(body_matcher) = &matcher.request_body {
        if let Some(primary) = &body_matcher.primary {
            if !evaluate_body_condition(request, primary, system_xml_namespaces)? {
                return Ok(None);
            }
        }
        if !body_matcher.all_of.is_empty() {
            for cond in &body_matcher.all_of {
                if !evaluate_body_condition(request, cond, system_xml_namespaces)? {
                    return Ok(None);
                }
            }
        }
        if !body_matcher.any_of.is_empty() {
            let mut any = false;
            for cond in &body_matcher.any_of {
                if evaluate_body_condition(request, cond, system_xml_namespaces)? {
                    any = true;
                    break;
                }
            }
            if !any {
                return Ok(None);
            }
        }
    }

    // 5. Matcher-level allOf/anyOf expression conditions.
    if !matcher.all_of.is_empty() {
        for expr in &matcher.all_of {
            if !evaluate_expr_condition(expr, stores)? {
                return Ok(None);
            }
        }
    }
    if !matcher.any_of.is_empty() {
        let mut any = false;
        for expr in &matcher.any_of {
            if evaluate_expr_condition(expr, stores)? {
                any = true;
                break;
            }
        }
        if !any {
            return Ok(None);
        }
    }

    // 6. SOAP fields.
    if let Some(expected) = &matcher.soap_action {
        let actual = request.header("SOAPAction").map(|h| h.trim_matches('"'));
        if actual != Some(expected.as_str()) {
            return Ok(None);
        }
    }
    if let Some(expected) = &matcher.soap_operation {
        let actual = soap.and_then(|s| s.body_operation_name(&request.body));
        if actual.as_deref() != Some(expected.as_str()) {
            return Ok(None);
        }
    }
    if let Some(expected) = &matcher.binding {
        let op = matcher.soap_operation.as_deref().unwrap_or_default();
        let actual = soap.and_then(|s| s.binding_for_operation(op));
        if actual.as_deref() != Some(expected.as_str()) {
            return Ok(None);
        }
    }

    Ok(Some(MatchOutcome { score: total, wildcard, path_params }))
}

/// Tokenize `pattern` and `path` by `/` and compare segment by segment.
/// Returns `(score, wildcard, path_params)` or `None` if rejected.
fn match_path(pattern: &str, path: &str) -> Option<(i64, bool, HashMap<String, String>)> {
    let pattern_segs: Vec<&str> = pattern.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect();
    let path_segs: Vec<&str> = path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect();

    let mut score = 0i64;
    let mut wildcard = false;
    let mut params = HashMap::new();

    let mut pi = 0usize;
    for (i, seg) in pattern_segs.iter().enumerate() {
        if *seg == "*" && i == pattern_segs.len() - 1 {
            wildcard = true;
            let remainder = path_segs[pi..].join("/");
            params.insert(WILDCARD_PATH_PARAM.to_string(), remainder);
            return Some((score, wildcard, params));
        }
        let Some(actual) = path_segs.get(pi) else {
            return None;
        };
        if let Some(name) = seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            if actual.is_empty() {
                return None;
            }
            params.insert(name.to_string(), (*actual).to_string());
            score += 1;
        } else if *seg == *actual {
            score += 1;
        } else {
            return None;
        }
        pi += 1;
    }

    if pi != path_segs.len() {
        return None;
    }
    Some((score, wildcard, params))
}

fn evaluate_expr_condition(
    expr: &crate::value_matcher::ExprCondition,
    stores: &StoreContext<'_>,
) -> Result<bool> {
    let actual = resolve_store_expression(&expr.expression, stores);
    expr.as_condition().evaluate(actual.as_deref())
}

/// `${stores.SCOPE.KEY}` → the stored value's string form, or `None` if the
/// expression isn't that shape or the key is unset.
fn resolve_store_expression(expression: &str, stores: &StoreContext<'_>) -> Option<String> {
    let inner = expression.strip_prefix("${")?.strip_suffix('}')?;
    let rest = inner.strip_prefix("stores.")?;
    let (scope, key) = rest.split_once('.')?;
    stores.get_string(scope, key)
}

fn evaluate_body_condition(
    request: &RequestContext,
    cond: &BodyCondition,
    system_xml_namespaces: &HashMap<String, String>,
) -> Result<bool> {
    let projected = project_body(request, cond, system_xml_namespaces)?;
    cond.as_condition().evaluate(Some(&projected))
}

/// Select the portion of the body a `BodyCondition` compares against:
/// JSONPath result (stringified, arrays comma-joined), XPath result
/// (likewise, with namespace bindings merged over the system defaults), or
/// the whole body as text.
fn project_body(
    request: &RequestContext,
    cond: &BodyCondition,
    system_xml_namespaces: &HashMap<String, String>,
) -> Result<String> {
    if let Some(json_path) = &cond.json_path {
        return Ok(project_json_path(request.body_text().as_ref(), json_path));
    }
    if let Some(x_path) = &cond.x_path {
        let mut ns = system_xml_namespaces.clone();
        ns.extend(cond.xml_namespaces.clone());
        return Ok(project_x_path(request.body_text().as_ref(), x_path, &ns).unwrap_or_default());
    }
    Ok(request.body_text().into_owned())
}

fn project_json_path(body: &str, json_path: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return String::new();
    };
    let Ok(selector) = jsonpath::Selector::new(json_path) else {
        return String::new();
    };
    let results: Vec<String> = selector
        .find(&value)
        .map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();
    results.join(",")
}

fn project_x_path(body: &str, x_path: &str, namespaces: &HashMap<String, String>) -> Option<String> {
    let doc = roxmltree::Document::parse(body).ok()?;
    crate::xpath::text(doc.root_element(), x_path.trim_start_matches('/'), namespaces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RequestMatcher;
    use crate::store::{RequestStore, StoreRegistry};
    use crate::value_matcher::ValueMatcher;

    fn stores<'a>(registry: &'a StoreRegistry, request: &'a RequestStore) -> StoreContext<'a> {
        StoreContext { registry, request }
    }

    #[test]
    fn rejects_wrong_method() {
        let req = RequestContext { method: "POST".into(), path: "/test".into(), ..Default::default() };
        let matcher = RequestMatcher { method: Some("GET".into()), ..Default::default() };
        let registry = StoreRegistry::new();
        let request_store = RequestStore::new();
        let outcome = score(&req, &matcher, &HashMap::new(), &stores(&registry, &request_store), None).unwrap();
        assert!(outcome.is_none());
    }

    #[test]
    fn literal_path_scores_segment_count() {
        let req = RequestContext { method: "GET".into(), path: "/api/users".into(), ..Default::default() };
        let matcher =
            RequestMatcher { method: Some("GET".into()), path: Some("/api/users".into()), ..Default::default() };
        let registry = StoreRegistry::new();
        let request_store = RequestStore::new();
        let outcome = score(&req, &matcher, &HashMap::new(), &stores(&registry, &request_store), None)
            .unwrap()
            .unwrap();
        assert_eq!(outcome.score, 2);
        assert!(!outcome.wildcard);
    }

    #[test]
    fn path_param_is_captured_and_scored() {
        let req = RequestContext { method: "GET".into(), path: "/api/users/42".into(), ..Default::default() };
        let matcher = RequestMatcher {
            method: Some("GET".into()),
            path: Some("/api/users/{id}".into()),
            ..Default::default()
        };
        let registry = StoreRegistry::new();
        let request_store = RequestStore::new();
        let outcome = score(&req, &matcher, &HashMap::new(), &stores(&registry, &request_store), None)
            .unwrap()
            .unwrap();
        assert_eq!(outcome.score, 3);
        assert_eq!(outcome.path_params.get("id"), Some(&"42".to_string()));
    }

    #[test]
    fn mismatched_segment_count_rejects() {
        let req = RequestContext { method: "GET".into(), path: "/api/users/42/x".into(), ..Default::default() };
        let matcher =
            RequestMatcher { method: Some("GET".into()), path: Some("/api/users/{id}".into()), ..Default::default() };
        let registry = StoreRegistry::new();
        let request_store = RequestStore::new();
        let outcome = score(&req, &matcher, &HashMap::new(), &stores(&registry, &request_store), None).unwrap();
        assert!(outcome.is_none());
    }

    #[test]
    fn trailing_wildcard_matches_any_suffix_without_scoring() {
        let req = RequestContext { method: "GET".into(), path: "/files/a/b/c".into(), ..Default::default() };
        let matcher =
            RequestMatcher { method: Some("GET".into()), path: Some("/files/*".into()), ..Default::default() };
        let registry = StoreRegistry::new();
        let request_store = RequestStore::new();
        let outcome = score(&req, &matcher, &HashMap::new(), &stores(&registry, &request_store), None)
            .unwrap()
            .unwrap();
        assert!(outcome.wildcard);
        assert_eq!(outcome.score, 0);
        assert_eq!(outcome.path_params.get(WILDCARD_PATH_PARAM).map(String::as_str), Some("a/b/c"));
    }

    #[test]
    fn header_condition_adds_to_score() {
        let mut headers = HashMap::new();
        headers.insert("authorization".to_string(), "Bearer abc".to_string());
        let req = RequestContext { method: "GET".into(), path: "/".into(), headers, ..Default::default() };
        let mut matcher = RequestMatcher { method: Some("GET".into()), ..Default::default() };
        matcher
            .request_headers
            .insert("Authorization".to_string(), ValueMatcher::Equals("Bearer abc".to_string()));
        let registry = StoreRegistry::new();
        let request_store = RequestStore::new();
        let outcome = score(&req, &matcher, &HashMap::new(), &stores(&registry, &request_store), None)
            .unwrap()
            .unwrap();
        assert_eq!(outcome.score, 1);
    }

    #[test]
    fn json_path_body_projection() {
        let req = RequestContext {
            method: "POST".into(),
            path: "/".into(),
            body: br#"{"id": 3}"#.to_vec(),
            ..Default::default()
        };
        assert_eq!(project_json_path(req.body_text().as_ref(), "$.id"), "3");
    }

    #[test]
    fn x_path_body_projection_with_namespace() {
        let xml = r#"<pet:getPetByIdRequest xmlns:pet="urn:pets"><pet:id>3</pet:id></pet:getPetByIdRequest>"#;
        let mut ns = HashMap::new();
        ns.insert("pet".to_string(), "urn:pets".to_string());
        assert_eq!(project_x_path(xml, "//pet:id", &ns), Some("3".to_string()));
    }
}
