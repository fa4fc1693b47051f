//! The response builder (C7, §4.8): turns a declared `Response` plus the
//! current exchange into concrete status/headers/body bytes.
//!
//! Delay and failure simulation are grounded on `mockforge-core::latency`;
//! path handling and content-type inference are grounded on
//! `mockforge-http::file_server::serve_mock_file`. The resolved `file`/`dir`
//! path is checked twice before any bytes are read: a component-wise
//! rejection of `..` segments anywhere in the fully joined path (config
//! value and request-derived sub-path alike), then a canonicalize-based
//! check that the resolved path still lives under the config directory.
//! Both run ahead of the existence check, so a traversal attempt reports
//! 500 even when it happens to resolve to nothing.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};
use crate::exchange::Exchange;
use crate::matcher::WILDCARD_PATH_PARAM;
use crate::model::{Delay, Fail, Response};
use crate::store::{StoreContext, StoreRegistry};
use crate::{delay, template};

/// The literal sentinel a protocol augmenter writes as `response.content`
/// to mean "synthesize the real example after I've run" (§9 redesign note).
/// `ResponseState::is_example_placeholder` is the typed signal a
/// `ResponseProcessor` actually branches on; this string only exists so the
/// sentinel round-trips through YAML untouched.
pub const EXAMPLE_PLACEHOLDER_SENTINEL: &str = "__imposter_example__";

/// Apply `response` to `exchange.response`, per §4.8's numbered steps.
///
/// Takes the process-wide `registry` rather than a ready-made
/// `StoreContext`, so the (short-lived, read-only) store lookup needed for
/// template expansion never has to outlive the mutable borrow of
/// `exchange.response` used to write the result back.
pub async fn build(response: &Response, config_dir: &Path, exchange: &mut Exchange, registry: &StoreRegistry) -> Result<()> {
    // 1. Delay — a suspension point, not a blocked OS thread (§5).
    if let Some(d) = &response.delay {
        tokio::time::sleep(resolve_delay(d)).await;
    }

    // 2. Status.
    if let Some(status) = response.status_code {
        exchange.response.status = status;
    }

    // 3. Headers (response overwrites).
    for (k, v) in &response.headers {
        exchange.response.headers.insert(k.clone(), v.clone());
    }

    // 4. Failure simulation.
    if let Some(fail) = response.fail {
        match fail {
            Fail::EmptyResponse => {
                exchange.response.body.clear();
                exchange.response.handled = true;
                return Ok(());
            }
            Fail::CloseConnection => {
                exchange.response.stopped = true;
                exchange.response.handled = true;
                return Ok(());
            }
        }
    }

    // 5. Body source.
    let mut content_type_hint = None;
    let body = if let Some(dir) = &response.dir {
        let (bytes, hint) = body_from_dir(dir, config_dir, &exchange.path_params).await?;
        content_type_hint = hint;
        bytes
    } else if let Some(file) = &response.file {
        let (bytes, hint) = body_from_file(file, config_dir).await?;
        content_type_hint = hint;
        bytes
    } else if let Some(content) = &response.content {
        if content == EXAMPLE_PLACEHOLDER_SENTINEL {
            exchange.response.is_example_placeholder = true;
        }
        content.clone().into_bytes()
    } else {
        Vec::new()
    };

    // 6. Template expansion.
    let body = if response.template && !exchange.response.is_example_placeholder {
        let ctx = StoreContext { registry, request: &exchange.request_store };
        let text = String::from_utf8_lossy(&body).into_owned();
        template::expand(&text, &ctx).into_bytes()
    } else {
        body
    };
    exchange.response.body = body;

    // 7. Content-Type.
    if !exchange.response.headers.contains_key("Content-Type") {
        let content_type = content_type_hint.unwrap_or_else(|| {
            if response.file.is_some() || response.dir.is_some() {
                "application/octet-stream".to_string()
            } else {
                "application/json".to_string()
            }
        });
        exchange.response.headers.insert("Content-Type".to_string(), content_type);
    }

    exchange.response.handled = true;
    Ok(())
}

fn resolve_delay(d: &Delay) -> std::time::Duration {
    delay::resolve(d)
}

/// `dir` requires the matcher's path end in `/*`; the matched wildcard
/// remainder (the request path with the matcher's literal prefix already
/// stripped off by `matcher::match_path`) becomes the sub-path, joined
/// segment-for-segment so nested files resolve, `index.html` for an
/// empty one.
async fn body_from_dir(
    dir: &str,
    config_dir: &Path,
    path_params: &HashMap<String, String>,
) -> Result<(Vec<u8>, Option<String>)> {
    let sub_path = path_params.get(WILDCARD_PATH_PARAM).map(String::as_str).unwrap_or("");
    let sub_path = if sub_path.is_empty() { "index.html" } else { sub_path };
    let base = resolve_under_config_dir(dir, config_dir)?;
    let resolved = base.join(sub_path);
    if contains_traversal(&resolved) {
        return Err(Error::path_traversal(format!("rejected traversal in path: {sub_path}")));
    }
    read_validated(&resolved, config_dir).await
}

async fn body_from_file(file: &str, config_dir: &Path) -> Result<(Vec<u8>, Option<String>)> {
    let resolved = resolve_under_config_dir(file, config_dir)?;
    read_validated(&resolved, config_dir).await
}

/// Component-wise `..` check: catches traversal introduced by either the
/// config's `dir`/`file` value or a request-derived sub-path, without
/// false-positiving on a literal filename that merely contains two dots.
fn contains_traversal(path: &Path) -> bool {
    path.components().any(|c| matches!(c, Component::ParentDir))
}

fn resolve_under_config_dir(relative: &str, config_dir: &Path) -> Result<PathBuf> {
    let joined = config_dir.join(relative);
    if contains_traversal(&joined) {
        return Err(Error::path_traversal(format!("rejected traversal in path: {relative}")));
    }
    Ok(joined)
}

async fn read_validated(path: &Path, config_dir: &Path) -> Result<(Vec<u8>, Option<String>)> {
    // Canonicalize guard before the existence check: a resolved path that
    // escapes the config dir (e.g. via a symlink) must report 500 "Invalid
    // file path" rather than be mistaken for a plain 404. Only fires when
    // both sides resolve; literal `..` segments are already rejected above
    // regardless of whether the target exists.
    if let (Ok(canon_path), Ok(canon_base)) = (path.canonicalize(), config_dir.canonicalize()) {
        if !canon_path.starts_with(&canon_base) {
            return Err(Error::path_traversal(format!("escapes config directory: {}", path.display())));
        }
    }
    if !path.exists() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("file not found: {}", path.display()),
        )));
    }
    let bytes = tokio::fs::read(path).await?;
    let hint = path.extension().and_then(|e| e.to_str()).map(content_type_for_extension);
    Ok((bytes, hint))
}

fn content_type_for_extension(ext: &str) -> String {
    match ext.to_ascii_lowercase().as_str() {
        "json" => "application/json",
        "xml" => "application/xml",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "txt" => "text/plain",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{Exchange, RequestContext};
    use std::io::Write;

    #[tokio::test]
    async fn inline_content_sets_status_and_body() {
        let response = Response { content: Some("hello".to_string()), status_code: Some(201), ..Default::default() };
        let mut exchange = Exchange::new(RequestContext::default());
        let registry = StoreRegistry::new();
        build(&response, Path::new("/tmp"), &mut exchange, &registry).await.unwrap();
        assert_eq!(exchange.response.status, 201);
        assert_eq!(exchange.response.body, b"hello");
        assert_eq!(exchange.response.headers.get("Content-Type").map(String::as_str), Some("application/json"));
    }

    #[tokio::test]
    async fn empty_response_failure_clears_body_and_handles() {
        let response = Response { content: Some("hello".to_string()), fail: Some(Fail::EmptyResponse), ..Default::default() };
        let mut exchange = Exchange::new(RequestContext::default());
        let registry = StoreRegistry::new();
        build(&response, Path::new("/tmp"), &mut exchange, &registry).await.unwrap();
        assert!(exchange.response.body.is_empty());
        assert!(exchange.response.handled);
    }

    #[tokio::test]
    async fn close_connection_marks_stopped() {
        let response = Response { fail: Some(Fail::CloseConnection), ..Default::default() };
        let mut exchange = Exchange::new(RequestContext::default());
        let registry = StoreRegistry::new();
        build(&response, Path::new("/tmp"), &mut exchange, &registry).await.unwrap();
        assert!(exchange.response.stopped);
    }

    #[tokio::test]
    async fn file_response_reads_bytes_and_infers_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("body.json")).unwrap();
        f.write_all(b"{\"a\":1}").unwrap();

        let response = Response { file: Some("body.json".to_string()), ..Default::default() };
        let mut exchange = Exchange::new(RequestContext::default());
        let registry = StoreRegistry::new();
        build(&response, dir.path(), &mut exchange, &registry).await.unwrap();
        assert_eq!(exchange.response.body, b"{\"a\":1}");
        assert_eq!(exchange.response.headers.get("Content-Type").map(String::as_str), Some("application/json"));
    }

    #[tokio::test]
    async fn missing_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let response = Response { file: Some("missing.json".to_string()), ..Default::default() };
        let mut exchange = Exchange::new(RequestContext::default());
        let registry = StoreRegistry::new();
        assert!(build(&response, dir.path(), &mut exchange, &registry).await.is_err());
    }

    #[tokio::test]
    async fn traversal_in_file_path_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let response = Response { file: Some("../escape.json".to_string()), ..Default::default() };
        let mut exchange = Exchange::new(RequestContext::default());
        let registry = StoreRegistry::new();
        assert!(build(&response, dir.path(), &mut exchange, &registry).await.is_err());
    }

    #[tokio::test]
    async fn dir_response_resolves_nested_sub_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub/nested")).unwrap();
        let mut f = std::fs::File::create(dir.path().join("sub/nested/report.pdf")).unwrap();
        f.write_all(b"%PDF-body").unwrap();

        let response = Response { dir: Some("sub".to_string()), ..Default::default() };
        let mut exchange = Exchange::new(RequestContext::default());
        exchange.path_params.insert(WILDCARD_PATH_PARAM.to_string(), "nested/report.pdf".to_string());
        let registry = StoreRegistry::new();
        build(&response, dir.path(), &mut exchange, &registry).await.unwrap();
        assert_eq!(exchange.response.body, b"%PDF-body");
        assert_eq!(exchange.response.headers.get("Content-Type").map(String::as_str), Some("application/pdf"));
    }

    #[tokio::test]
    async fn dir_response_rejects_traversal_in_wildcard_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let response = Response { dir: Some("public".to_string()), ..Default::default() };
        let mut exchange = Exchange::new(RequestContext::default());
        exchange.path_params.insert(WILDCARD_PATH_PARAM.to_string(), "../../etc/passwd".to_string());
        let registry = StoreRegistry::new();
        let err = build(&response, dir.path(), &mut exchange, &registry).await.unwrap_err();
        assert!(matches!(err, Error::PathTraversal { .. }));
    }

    #[tokio::test]
    async fn example_placeholder_sentinel_is_flagged() {
        let response = Response { content: Some(EXAMPLE_PLACEHOLDER_SENTINEL.to_string()), ..Default::default() };
        let mut exchange = Exchange::new(RequestContext::default());
        let registry = StoreRegistry::new();
        build(&response, Path::new("/tmp"), &mut exchange, &registry).await.unwrap();
        assert!(exchange.response.is_example_placeholder);
    }

    #[tokio::test]
    async fn template_expansion_runs_over_body() {
        let response =
            Response { content: Some("id=${stores.request.id}".to_string()), template: true, ..Default::default() };
        let mut exchange = Exchange::new(RequestContext::default());
        exchange.request_store.set("id", serde_json::Value::String("7".into()));
        let registry = StoreRegistry::new();
        build(&response, Path::new("/tmp"), &mut exchange, &registry).await.unwrap();
        assert_eq!(exchange.response.body, b"id=7");
    }
}
