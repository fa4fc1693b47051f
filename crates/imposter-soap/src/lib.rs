//! WSDL-driven SOAP plugin (§4.11): parses a WSDL document, augments a
//! `ServerConfig` with per-operation interceptors, and synthesizes SOAP
//! envelope bodies (or faults) for the operations it discovers.
//!
//! Split the way `imposter-core`'s own matcher/response_builder modules
//! are split: `wsdl` only reads, `example`/`envelope` only build strings,
//! `plugin` is the seam that wires both into the dispatcher.

pub mod envelope;
pub mod error;
pub mod example;
pub mod plugin;
pub mod wsdl;

pub use error::{Error, Result};
pub use plugin::{SoapAugmenter, SoapContext, SoapResponseProcessor};
pub use wsdl::WsdlDocument;
