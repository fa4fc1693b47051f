//! A minimal `${...}` template expander (§6 ambient stack). The full
//! templating language is named-only and out of scope (§1); this module
//! resolves exactly the placeholders the matcher's expression evaluator and
//! `response.template=true` bodies need: store lookups, env vars, a random
//! UUID and the current timestamp.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::store::StoreContext;

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid"));

/// Expand every `${...}` token in `input` using `stores` for
/// `${stores.SCOPE.KEY}` lookups. Unrecognized tokens are left verbatim.
pub fn expand(input: &str, stores: &StoreContext<'_>) -> String {
    TOKEN
        .replace_all(input, |caps: &regex::Captures| {
            let token = &caps[1];
            resolve(token, stores).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn resolve(token: &str, stores: &StoreContext<'_>) -> Option<String> {
    if let Some(rest) = token.strip_prefix("stores.") {
        let (scope, key) = rest.split_once('.')?;
        return stores.get_string(scope, key);
    }
    if let Some(name) = token.strip_prefix("env.") {
        return std::env::var(name).ok();
    }
    match token {
        "random.uuid" => Some(uuid::Uuid::new_v4().to_string()),
        "datetime.now" => Some(chrono::Utc::now().to_rfc3339()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{RequestStore, StoreRegistry};

    #[test]
    fn expands_store_lookup() {
        let registry = StoreRegistry::new();
        let request = RequestStore::new();
        request.set("id", serde_json::Value::String("42".into()));
        let ctx = StoreContext { registry: &registry, request: &request };
        assert_eq!(expand("id=${stores.request.id}", &ctx), "id=42");
    }

    #[test]
    fn leaves_unknown_token_verbatim() {
        let registry = StoreRegistry::new();
        let request = RequestStore::new();
        let ctx = StoreContext { registry: &registry, request: &request };
        assert_eq!(expand("${nonsense.token}", &ctx), "${nonsense.token}");
    }

    #[test]
    fn expands_uuid_to_something_plausible() {
        let registry = StoreRegistry::new();
        let request = RequestStore::new();
        let ctx = StoreContext { registry: &registry, request: &request };
        let out = expand("${random.uuid}", &ctx);
        assert_eq!(out.len(), 36);
    }
}
