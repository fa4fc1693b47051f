//! Error types for imposter-core.

/// Result type alias for imposter-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the dispatch engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {message}")]
    Config { message: String },

    #[error("unresolvable reference while loading config: {message}")]
    ConfigWarn { message: String },

    #[error("step execution failed: {message}")]
    Step { message: String },

    #[error("template expansion failed: {message}")]
    Template { message: String },

    #[error("invalid file path: {message}")]
    PathTraversal { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("regex error: {0}")]
    FancyRegex(#[from] fancy_regex::Error),

    #[error("{0}")]
    Generic(String),
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Self::Generic(message)
    }
}

impl Error {
    /// Create a config error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create a config warning-grade error (caller decides whether to abort).
    pub fn config_warn<S: Into<String>>(message: S) -> Self {
        Self::ConfigWarn { message: message.into() }
    }

    /// Create a step-execution error.
    pub fn step<S: Into<String>>(message: S) -> Self {
        Self::Step { message: message.into() }
    }

    /// Create a template-expansion error.
    pub fn template<S: Into<String>>(message: S) -> Self {
        Self::Template { message: message.into() }
    }

    /// Create a path-traversal error.
    pub fn path_traversal<S: Into<String>>(message: S) -> Self {
        Self::PathTraversal { message: message.into() }
    }

    /// Create a generic error.
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }
}
