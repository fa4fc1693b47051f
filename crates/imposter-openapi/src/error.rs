//! Error types for imposter-openapi.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("spec parse error: {0}")]
    Spec(String),
    #[error("unsupported OpenAPI/Swagger version")]
    UnsupportedVersion,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Core(#[from] imposter_core::Error),
}
