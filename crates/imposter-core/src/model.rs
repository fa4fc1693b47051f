//! The configuration data model (§3): `ServerConfig`, `Resource`,
//! `Interceptor`, `RequestMatcher`, `Response`, `Capture` and friends.
//!
//! Field shapes mirror `mockforge-core::routing`'s style: a plain
//! serde-derived struct per concept, builder-style `with_*` helpers only
//! where tests actually construct these by hand.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::matcher::SoapMatchContext;
use crate::value_matcher::{BodyMatcher, ExprCondition, ValueMatcher};

/// The three protocol flavours a `ServerConfig` document can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    Rest,
    Soap,
    Openapi,
}

/// A fully-loaded, normalized mock configuration document (one per YAML
/// document after splitting on `---`).
#[derive(Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub plugin: PluginKind,
    #[serde(default)]
    pub base_path: Option<String>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub interceptors: Vec<Interceptor>,
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub security: Option<SecurityConfig>,

    // SOAP-specific.
    #[serde(default)]
    pub wsdl_file: Option<String>,

    // OpenAPI-specific.
    #[serde(default)]
    pub spec_file: Option<String>,
    #[serde(default)]
    pub strip_server_path: bool,
    #[serde(default)]
    pub validation: Option<ValidationConfig>,

    /// The directory the config file was loaded from; used to resolve
    /// relative `file`/`dir`/`wsdl_file`/`spec_file` paths and to bound path
    /// traversal (§4.8.5).
    #[serde(skip)]
    pub config_dir: PathBuf,

    /// Set by the SOAP augmenter (`imposter-soap`) after loading, so the
    /// matcher can resolve `operation`/`binding` criteria without this
    /// crate depending on the WSDL parser. `None` for REST/OpenAPI configs.
    #[serde(skip)]
    pub soap_context: Option<Arc<dyn SoapMatchContext + Send + Sync>>,
}

impl ServerConfig {
    /// All resources, including any appended at load time by a protocol
    /// plugin (§4.11, §4.12 augmentation).
    pub fn all_resources(&self) -> &[Resource] {
        &self.resources
    }
}

impl std::fmt::Debug for ServerConfig {
    /// Hand-written: `soap_context` is a trait object with no useful
    /// `Debug` impl of its own.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("plugin", &self.plugin)
            .field("base_path", &self.base_path)
            .field("resources", &self.resources)
            .field("interceptors", &self.interceptors)
            .field("system", &self.system)
            .field("security", &self.security)
            .field("wsdl_file", &self.wsdl_file)
            .field("spec_file", &self.spec_file)
            .field("strip_server_path", &self.strip_server_path)
            .field("validation", &self.validation)
            .field("config_dir", &self.config_dir)
            .field("soap_context", &self.soap_context.is_some())
            .finish()
    }
}

/// `system.stores` / `system.xml-namespaces`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub stores: HashMap<String, StoreConfig>,
    #[serde(default, rename = "xmlNamespaces")]
    pub xml_namespaces: HashMap<String, String>,
}

/// A named process-wide store's startup preload configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default, rename = "preloadFile")]
    pub preload_file: Option<String>,
    #[serde(default, rename = "preloadData")]
    pub preload_data: Option<serde_json::Value>,
}

/// The declarative security block, expanded away by the security rewriter
/// (§4.3) before the dispatcher ever sees a `ServerConfig`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SecurityConfig {
    pub default: SecurityDefault,
    #[serde(default)]
    pub conditions: Vec<SecurityCondition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum SecurityDefault {
    Permit,
    Deny,
}

/// One security condition: a restricted view of `RequestMatcher` covering
/// only the criteria condition interceptors copy (headers, query, form).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SecurityCondition {
    /// Accepted for config-shape fidelity; the transform in §4.3 does not
    /// branch on it (only `SecurityConfig::default` gates the terminal deny
    /// interceptor) — see DESIGN.md Open Question decisions.
    #[serde(default)]
    pub effect: Option<SecurityDefault>,
    #[serde(default, rename = "requestHeaders")]
    pub request_headers: HashMap<String, ValueMatcher>,
    #[serde(default, rename = "queryParams")]
    pub query_params: HashMap<String, ValueMatcher>,
    #[serde(default, rename = "formParams")]
    pub form_params: HashMap<String, ValueMatcher>,
}

/// Criteria a request is scored against (§3, §4.6).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RequestMatcher {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default, rename = "queryParams")]
    pub query_params: HashMap<String, ValueMatcher>,
    #[serde(default, rename = "requestHeaders")]
    pub request_headers: HashMap<String, ValueMatcher>,
    #[serde(default, rename = "formParams")]
    pub form_params: HashMap<String, ValueMatcher>,
    #[serde(default, rename = "pathParams")]
    pub path_params: HashMap<String, ValueMatcher>,
    #[serde(default, rename = "requestBody")]
    pub request_body: Option<BodyMatcher>,
    #[serde(default, rename = "allOf")]
    pub all_of: Vec<ExprCondition>,
    #[serde(default, rename = "anyOf")]
    pub any_of: Vec<ExprCondition>,

    // SOAP fields (§4.6.6).
    #[serde(default, rename = "operation")]
    pub soap_operation: Option<String>,
    #[serde(default, rename = "soapAction")]
    pub soap_action: Option<String>,
    #[serde(default)]
    pub binding: Option<String>,
}

impl RequestMatcher {
    /// True when the matcher carries no criteria beyond method/path, i.e.
    /// the resource ID is just its base string (§4.5).
    pub fn has_additional_criteria(&self) -> bool {
        !self.query_params.is_empty()
            || !self.request_headers.is_empty()
            || !self.form_params.is_empty()
            || !self.path_params.is_empty()
            || self.request_body.is_some()
            || !self.all_of.is_empty()
            || !self.any_of.is_empty()
            || self.soap_action.is_some()
            || self.binding.is_some()
    }
}

/// Fields shared between `Resource` and `Interceptor` (§3's "BaseResource").
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BaseResource {
    #[serde(default)]
    pub capture: HashMap<String, Capture>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub response: Option<Response>,
    #[serde(default, rename = "concurrencyLimits")]
    pub concurrency_limits: Vec<ConcurrencyLimit>,
    #[serde(default, rename = "logTemplate")]
    pub log_template: Option<String>,
    #[serde(default, rename = "runtimeGenerated")]
    pub runtime_generated: bool,
    #[serde(default, rename = "resourceId")]
    pub resource_id: Option<String>,
}

/// A declarative match-and-reply rule.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Resource {
    #[serde(flatten)]
    pub matcher: RequestMatcher,
    #[serde(flatten)]
    pub base: BaseResource,
    /// Cleared by the security rewriter; never `Some` once the dispatcher
    /// sees a loaded `ServerConfig` (invariant in spec §8).
    #[serde(default)]
    pub security: Option<SecurityConfig>,
}

/// A `Resource` that runs before resource matching and may short-circuit.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Interceptor {
    #[serde(flatten)]
    pub matcher: RequestMatcher,
    #[serde(flatten)]
    pub base: BaseResource,
    #[serde(default = "default_continue", rename = "continue")]
    pub continue_: bool,
}

fn default_continue() -> bool {
    false
}

/// `{threshold, response}` pair enforced by the dispatcher (§4.9.4).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConcurrencyLimit {
    pub threshold: u32,
    pub response: Response,
}

/// The configured reply for a matched resource/interceptor (§3, §4.8).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Response {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default, rename = "statusCode")]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub delay: Option<Delay>,
    #[serde(default)]
    pub fail: Option<Fail>,
    #[serde(default)]
    pub template: bool,
    #[serde(default, rename = "soapFault")]
    pub soap_fault: bool,
    #[serde(default, rename = "exampleName")]
    pub example_name: Option<String>,
}

/// Fixed or ranged artificial latency (§4.8.1).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Delay {
    #[serde(default)]
    pub exact: u64,
    #[serde(default)]
    pub min: u64,
    #[serde(default)]
    pub max: u64,
}

/// Simulated failure modes (§4.8.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Fail {
    EmptyResponse,
    CloseConnection,
}

/// Where a captured value comes from (§3, §4.7).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureSource {
    PathParam(String),
    QueryParam(String),
    FormParam(String),
    Header(String),
    Expression(String),
    Const(String),
    Body {
        #[serde(default, rename = "jsonPath")]
        json_path: Option<String>,
        #[serde(default, rename = "xPath")]
        x_path: Option<String>,
        #[serde(default, rename = "xmlNamespaces")]
        xml_namespaces: HashMap<String, String>,
    },
}

/// A single named capture rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Capture {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(rename = "store")]
    pub store_name: String,
    #[serde(default, rename = "key")]
    pub key_template: Option<String>,
    #[serde(flatten)]
    pub source: CaptureSource,
}

fn default_true() -> bool {
    true
}

/// A pipeline step executed after matching and capturing, before the
/// response is built (§3, §4.10).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Step {
    Script {
        lang: String,
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        file: Option<String>,
    },
    Remote {
        url: String,
        #[serde(default = "default_get")]
        method: String,
        #[serde(default)]
        headers: HashMap<String, String>,
        #[serde(default)]
        body: Option<String>,
        #[serde(default)]
        capture: HashMap<String, Capture>,
    },
}

fn default_get() -> String {
    "GET".to_string()
}

/// OpenAPI request-validation policy (§4.12).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ValidationConfig {
    #[serde(default)]
    pub request: Option<ValidationBehaviour>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationBehaviour {
    Fail,
    Log,
    Ignore,
}
