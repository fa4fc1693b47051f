//! Pipeline steps (sub-component of C8, §4.10): run after matching and
//! capture, before the response is built. `Remote` is grounded on
//! `mockforge-core`'s use of `reqwest` for outbound calls elsewhere in the
//! teacher's stack; `Script` stands in for an external script engine this
//! crate does not embed (§1 Non-goals) — it records the request and leaves
//! the exchange untouched rather than silently no-opping.

use std::collections::HashMap;
use std::time::Duration;

use crate::capture;
use crate::error::{Error, Result};
use crate::exchange::Exchange;
use crate::model::Step;
use crate::store::StoreRegistry;
use crate::template;

/// Run every step in order against `exchange`. Any failing step aborts the
/// whole run, marks the exchange handled with a 500, and returns `Ok(())`
/// (the 500 itself *is* the outcome — see §7 "StepFailure").
pub async fn run(steps: &[Step], exchange: &mut Exchange, registry: &StoreRegistry) -> Result<()> {
    for step in steps {
        if let Err(e) = run_one(step, exchange, registry).await {
            tracing::warn!(error = %e, "step execution failed");
            exchange.response.status = 500;
            exchange.response.body = b"Failed to execute steps".to_vec();
            exchange.response.headers.insert("Content-Type".to_string(), "text/plain".to_string());
            exchange.response.handled = true;
            return Ok(());
        }
    }
    Ok(())
}

async fn run_one(step: &Step, exchange: &mut Exchange, registry: &StoreRegistry) -> Result<()> {
    match step {
        Step::Script { lang, code, file } => run_script(lang, code.as_deref(), file.as_deref(), exchange),
        Step::Remote { url, method, headers, body, capture } => {
            run_remote(url, method, headers, body.as_deref(), capture, exchange, registry).await
        }
    }
}

/// No embedded script engine ships with this crate (§1 Non-goals: "script
/// engines" are external collaborators). Record that a script step ran —
/// in the request store, under a fixed diagnostic key — so configs can be
/// authored and exercised end-to-end even where the engine itself is a
/// later integration point.
fn run_script(lang: &str, code: Option<&str>, file: Option<&str>, exchange: &mut Exchange) -> Result<()> {
    if code.is_none() && file.is_none() {
        return Err(Error::step("script step declares neither inline code nor a file"));
    }
    exchange.request_store.set("_last_script_lang", serde_json::Value::String(lang.to_string()));
    Ok(())
}

async fn run_remote(
    url: &str,
    method: &str,
    headers: &HashMap<String, String>,
    body: Option<&str>,
    capture: &HashMap<String, crate::model::Capture>,
    exchange: &mut Exchange,
    registry: &StoreRegistry,
) -> Result<()> {
    let expanded_url = {
        let ctx = crate::store::StoreContext { registry, request: &exchange.request_store };
        template::expand(url, &ctx)
    };
    let expanded_body = body.map(|b| {
        let ctx = crate::store::StoreContext { registry, request: &exchange.request_store };
        template::expand(b, &ctx)
    });

    let client = reqwest::Client::builder().timeout(Duration::from_secs(30)).build()?;
    let mut request = client.request(method.parse().unwrap_or(reqwest::Method::GET), &expanded_url);
    for (k, v) in headers {
        request = request.header(k, v);
    }
    if let Some(b) = expanded_body {
        request = request.body(b);
    }

    let response = request.send().await?;
    let status = response.status();
    let response_body = response.text().await.unwrap_or_default();

    if !capture.is_empty() {
        let remote_request = crate::exchange::RequestContext {
            method: method.to_string(),
            path: expanded_url.clone(),
            body: response_body.clone().into_bytes(),
            ..Default::default()
        };
        let path_params = HashMap::new();
        let ctx = crate::store::StoreContext { registry, request: &exchange.request_store };
        capture::run(capture, &remote_request, &path_params, &ctx)?;
    }

    if !status.is_success() {
        return Err(Error::step(format!("remote step to {expanded_url} returned {status}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{Exchange, RequestContext};
    use crate::model::Step;

    #[tokio::test]
    async fn script_step_without_code_or_file_fails() {
        let steps = vec![Step::Script { lang: "javascript".to_string(), code: None, file: None }];
        let mut exchange = Exchange::new(RequestContext::default());
        let registry = StoreRegistry::new();
        run(&steps, &mut exchange, &registry).await.unwrap();
        assert_eq!(exchange.response.status, 500);
        assert!(exchange.response.handled);
    }

    #[tokio::test]
    async fn script_step_with_inline_code_records_diagnostic() {
        let steps =
            vec![Step::Script { lang: "javascript".to_string(), code: Some("1+1".to_string()), file: None }];
        let mut exchange = Exchange::new(RequestContext::default());
        let registry = StoreRegistry::new();
        run(&steps, &mut exchange, &registry).await.unwrap();
        assert!(!exchange.response.handled);
        assert_eq!(exchange.request_store.get_string("_last_script_lang"), Some("javascript".to_string()));
    }
}
