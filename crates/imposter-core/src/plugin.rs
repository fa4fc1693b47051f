//! Protocol-plugin seams (§9 design note: "model 'handlers' and
//! 'processors' passed around as an explicit trait"). `imposter-soap` and
//! `imposter-openapi` implement both traits; this crate only defines the
//! seam and the identity/no-op defaults so the dispatcher can run
//! standalone against plain REST configs.

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;
use crate::exchange::Exchange;
use crate::model::{Response, ServerConfig};
use crate::store::StoreRegistry;

/// Applies a declared `Response` to the current exchange. The base
/// implementation is `response_builder::build`; SOAP and OpenAPI compose
/// by running the base processor first and then rewriting the body if it
/// came back as the example placeholder (§4.11, §4.12 "Response
/// post-processing").
#[async_trait]
pub trait ResponseProcessor: Send + Sync {
    async fn process(
        &self,
        response: &Response,
        config_dir: &Path,
        exchange: &mut Exchange,
        registry: &StoreRegistry,
    ) -> Result<()>;
}

/// The C7 response builder, exposed as a `ResponseProcessor` so the
/// dispatcher can hold a single trait object regardless of which plugin
/// (if any) wraps it.
pub struct BaseResponseProcessor;

#[async_trait]
impl ResponseProcessor for BaseResponseProcessor {
    async fn process(
        &self,
        response: &Response,
        config_dir: &Path,
        exchange: &mut Exchange,
        registry: &StoreRegistry,
    ) -> Result<()> {
        crate::response_builder::build(response, config_dir, exchange, registry).await
    }
}

/// Runs once per loaded `ServerConfig`, after the legacy/security
/// rewriters and before the dispatcher is built. `imposter-soap` appends
/// WSDL-derived interceptors/resources; `imposter-openapi` appends
/// schema-derived ones (§4.11, §4.12 "Augmentation").
pub trait Augmenter: Send + Sync {
    fn augment(&self, config: &mut ServerConfig) -> Result<()>;
}

/// The REST plugin needs no augmentation; this is what the dispatcher uses
/// when a `ServerConfig`'s `plugin` is `Rest` or when no SOAP/OpenAPI
/// augmenter has been registered for a given kind.
pub struct NoopAugmenter;

impl Augmenter for NoopAugmenter {
    fn augment(&self, _config: &mut ServerConfig) -> Result<()> {
        Ok(())
    }
}
