//! OpenAPI 3.x / Swagger 2.0 plugin (§4.12): loads a spec document, augments
//! a `ServerConfig` with one interceptor per operation's default response,
//! and synthesizes JSON example bodies for the operations it discovers.
//!
//! Split the way `imposter-soap` is: `spec` only reads, `example`/`validate`
//! only build values, `plugin` is the seam that wires both into the
//! dispatcher.

pub mod convert;
pub mod error;
pub mod example;
pub mod plugin;
pub mod spec;
pub mod validate;

pub use error::{Error, Result};
pub use plugin::{OpenApiAugmenter, OpenApiResponseProcessor};
pub use spec::OpenApiDocument;
