//! The security rewriter (C3, §4.3): expands the declarative `security`
//! block into interceptors and clears it, so the dispatcher only ever sees
//! `security: None`. Runs once per loaded `ServerConfig`, before the
//! dispatcher is built.
//!
//! The "compile sugar into the same primitives the engine already
//! understands" shape is grounded on `mockforge-core::routing`'s
//! conditions-to-matcher lowering.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::{
    BaseResource, Capture, CaptureSource, Interceptor, RequestMatcher, Response, SecurityConfig, SecurityDefault,
    ServerConfig,
};
use crate::value_matcher::{ExprCondition, Operator, ValueMatcher};

/// Monotonically increasing across every `ServerConfig` processed in one
/// startup, so resource-level condition keys never collide even when two
/// configs each declare a resource-level security block (§4.3: "global
/// counter ensures uniqueness even across multiple ServerConfigs").
static RESOURCE_COUNTER: AtomicU64 = AtomicU64::new(0);

#[cfg(test)]
pub(crate) fn reset_counter_for_tests() {
    RESOURCE_COUNTER.store(0, Ordering::SeqCst);
}

/// Rewrite `config`'s server-level and every resource-level security block
/// into interceptors, then clear every `security` field.
pub fn rewrite(config: &mut ServerConfig) {
    let mut prepended = Vec::new();
    if let Some(security) = config.security.take() {
        prepended.extend(lower(&security, "", None));
    }

    for resource in &mut config.resources {
        if let Some(security) = resource.security.take() {
            let n = RESOURCE_COUNTER.fetch_add(1, Ordering::SeqCst);
            let prefix = format!("resource{n}_");
            let scope = RequestMatcher { method: resource.matcher.method.clone(), path: resource.matcher.path.clone(), ..Default::default() };
            prepended.extend(lower(&security, &prefix, Some(scope)));
        }
    }

    // Server-level interceptors precede the existing ones (§4.3 "Order").
    let mut rewritten = prepended;
    rewritten.append(&mut config.interceptors);
    config.interceptors = rewritten;
}

/// Lower one `SecurityConfig` into its condition interceptors plus, if
/// `default == Deny`, a terminal deny interceptor. `scope`, when present,
/// additionally restricts every emitted interceptor's matcher to the
/// originating resource's method/path so a resource-level block can't leak
/// into other resources' requests.
fn lower(security: &SecurityConfig, prefix: &str, scope: Option<RequestMatcher>) -> Vec<Interceptor> {
    let mut interceptors = Vec::new();
    let mut keys = Vec::new();

    for (i, condition) in security.conditions.iter().enumerate() {
        let key = format!("{prefix}_security_condition{}", i + 1);
        keys.push(key.clone());

        let mut matcher = scope.clone().unwrap_or_default();
        matcher.request_headers.extend(condition.request_headers.clone());
        matcher.query_params.extend(condition.query_params.clone());
        matcher.form_params.extend(condition.form_params.clone());

        let mut capture = HashMap::new();
        capture.insert(
            key.clone(),
            Capture {
                enabled: true,
                store_name: "request".to_string(),
                key_template: Some(key.clone()),
                source: CaptureSource::Const("met".to_string()),
            },
        );

        interceptors.push(Interceptor {
            matcher,
            base: BaseResource { capture, ..Default::default() },
            continue_: true,
        });
    }

    if security.default == SecurityDefault::Deny {
        let any_of = keys
            .iter()
            .map(|key| ExprCondition {
                expression: format!("${{stores.request.{key}}}"),
                operator: Operator::NotEqualTo,
                value: "met".to_string(),
            })
            .collect();

        let mut matcher = scope.unwrap_or_default();
        matcher.any_of = any_of;

        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "text/plain".to_string());

        interceptors.push(Interceptor {
            matcher,
            base: BaseResource {
                response: Some(Response {
                    status_code: Some(401),
                    content: Some("Unauthorised".to_string()),
                    headers,
                    ..Default::default()
                }),
                ..Default::default()
            },
            continue_: false,
        });
    }

    interceptors
}
