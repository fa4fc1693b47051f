//! The request-dispatch engine: config loading and normalization, request
//! matching, capture/store, response building, and the dispatcher that
//! wires them together. Protocol-agnostic — `imposter-soap` and
//! `imposter-openapi` extend it through the [`plugin`] seam.

pub mod capture;
pub mod delay;
pub mod dispatcher;
pub mod env_subst;
pub mod error;
pub mod exchange;
pub mod legacy;
pub mod loader;
pub mod matcher;
pub mod model;
pub mod plugin;
pub mod resource_id;
pub mod response_builder;
pub mod security;
pub mod steps;
pub mod store;
pub mod template;
pub mod value_matcher;
pub mod xpath;

pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use exchange::{Exchange, RequestContext};
pub use loader::RuntimeOptions;
pub use model::{PluginKind, ServerConfig};
pub use store::StoreRegistry;
