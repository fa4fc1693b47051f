//! Named key/value stores (C11, §4.13): `request` is per-exchange and
//! disposable, every other name is process-wide and shared for the life of
//! the process. Grounded on the `Arc<RwLock<...>>` shared-state idiom used
//! throughout `mockforge-http` (e.g. `ManagementState`).

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A single named bucket of key → value.
#[derive(Debug, Default)]
pub struct Store {
    values: RwLock<HashMap<String, Value>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.values.write().insert(key.into(), value);
    }

    /// A string rendering of the value, used by the template expander and
    /// the expression-condition evaluator.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }
}

/// Process-wide named stores, shared across every exchange, plus the
/// per-exchange "request" store created fresh for each dispatch call.
#[derive(Clone)]
pub struct StoreRegistry {
    named: Arc<RwLock<HashMap<String, Arc<Store>>>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self { named: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Fetch or lazily create the named store. `"request"` is never created
    /// here — callers use [`RequestStore`] for that scope.
    pub fn named(&self, name: &str) -> Arc<Store> {
        if let Some(store) = self.named.read().get(name) {
            return store.clone();
        }
        let mut named = self.named.write();
        named.entry(name.to_string()).or_insert_with(|| Arc::new(Store::new())).clone()
    }

    /// Preload a named store from inline data (`system.stores.*.preloadData`).
    pub fn preload(&self, name: &str, data: &Value) {
        let store = self.named(name);
        if let Value::Object(map) = data {
            for (k, v) in map {
                store.set(k.clone(), v.clone());
            }
        }
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The per-exchange "request" store: created when dispatch begins, dropped
/// when the response is written (§3 lifecycle). Exclusively owned by its
/// exchange — never shared across requests.
#[derive(Debug, Default)]
pub struct RequestStore {
    store: Store,
}

impl RequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.store.get(key)
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.store.get_string(key)
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.store.set(key, value);
    }
}

/// Resolves a `(scope, key)` pair to the right store, where `scope ==
/// "request"` means the per-exchange store and anything else means a named
/// process-wide store.
pub struct StoreContext<'a> {
    pub registry: &'a StoreRegistry,
    pub request: &'a RequestStore,
}

impl<'a> StoreContext<'a> {
    pub fn get_string(&self, scope: &str, key: &str) -> Option<String> {
        if scope == "request" {
            self.request.get_string(key)
        } else {
            self.registry.named(scope).get_string(key)
        }
    }

    pub fn set(&self, scope: &str, key: impl Into<String>, value: Value) {
        if scope == "request" {
            self.request.set(key, value);
        } else {
            self.registry.named(scope).set(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_store_is_shared_across_lookups() {
        let reg = StoreRegistry::new();
        reg.named("orders").set("last_id", Value::String("42".into()));
        assert_eq!(reg.named("orders").get_string("last_id"), Some("42".to_string()));
    }

    #[test]
    fn request_store_is_independent_per_instance() {
        let a = RequestStore::new();
        let b = RequestStore::new();
        a.set("k", Value::String("v".into()));
        assert_eq!(a.get_string("k"), Some("v".to_string()));
        assert_eq!(b.get_string("k"), None);
    }
}
