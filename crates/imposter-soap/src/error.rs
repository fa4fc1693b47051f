//! Error types for imposter-soap.

/// Result type alias for imposter-soap operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("WSDL parse error: {0}")]
    Wsdl(String),

    #[error("unsupported or unrecognized WSDL namespace")]
    UnknownWsdlNamespace,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error(transparent)]
    Core(#[from] imposter_core::Error),
}
