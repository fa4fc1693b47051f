//! Command-line entry point: loads every config under a directory, wires up
//! the SOAP/OpenAPI plugins, and serves the result over HTTP (§4.14).
//!
//! `clap::Parser` derive + `-v/--log-level` flag + `tracing_subscriber`
//! init are grounded on `mockforge-cli/src/main.rs`, trimmed to the one
//! `serve` subcommand this spec needs.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use imposter_core::exchange::Exchange;
use imposter_core::loader::{self, RuntimeOptions};
use imposter_core::model::{PluginKind, Response, ValidationBehaviour};
use imposter_core::plugin::{Augmenter, BaseResponseProcessor, ResponseProcessor};
use imposter_core::store::StoreRegistry;
use imposter_core::{Dispatcher, ServerConfig};
use imposter_openapi::{OpenApiAugmenter, OpenApiResponseProcessor};
use imposter_soap::{SoapAugmenter, SoapResponseProcessor};

#[derive(Parser)]
#[command(name = "imposter")]
#[command(about = "A declarative REST/SOAP/OpenAPI mock server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Set log level (error, warn, info, debug, trace).
    #[arg(short = 'v', long, global = true, default_value = "info")]
    log_level: String,

    /// Directory to scan for `*-config.{yaml,yml,json}` files.
    #[arg(short, long, default_value = ".")]
    config_dir: PathBuf,

    /// HTTP port to listen on (overrides IMPOSTER_PORT).
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let mut options = RuntimeOptions::from_env();
    if let Some(port) = cli.port {
        options.port = port;
    }

    let mut augmenters: HashMap<PluginKind, Arc<dyn Augmenter>> = HashMap::new();
    augmenters.insert(PluginKind::Soap, Arc::new(SoapAugmenter));
    augmenters.insert(PluginKind::Openapi, Arc::new(OpenApiAugmenter));

    let configs = loader::load(&cli.config_dir, &options, &augmenters)?;
    tracing::info!(configs = configs.len(), dir = %cli.config_dir.display(), "loaded configs");

    let response_processor = build_response_processor(&configs, &options)?;
    let registry = StoreRegistry::new();
    let dispatcher = Arc::new(Dispatcher::new(configs, registry, response_processor));

    let router = imposter_http::build_router(dispatcher);
    let addr = SocketAddr::from(([0, 0, 0, 0], options.port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(env_filter).with(tracing_subscriber::fmt::layer()).init();
}

/// Builds the one `ResponseProcessor` the `Dispatcher` is handed, composing
/// per-config-directory SOAP/OpenAPI processors behind a dispatch-by-
/// `config_dir` wrapper (§9 "one `ResponseProcessor` trait, composed over
/// the loaded configs' plugin kinds").
fn build_response_processor(
    configs: &[ServerConfig],
    options: &RuntimeOptions,
) -> anyhow::Result<Arc<dyn ResponseProcessor>> {
    let mut by_dir: HashMap<PathBuf, Arc<dyn ResponseProcessor>> = HashMap::new();

    for config in configs {
        match config.plugin {
            PluginKind::Soap => {
                let Some(wsdl_file) = &config.wsdl_file else { continue };
                let path = config.config_dir.join(wsdl_file);
                let bytes = std::fs::read(&path)?;
                let document = Arc::new(imposter_soap::wsdl::parse(&bytes)?);
                by_dir.insert(config.config_dir.clone(), Arc::new(SoapResponseProcessor::new(document)));
            }
            PluginKind::Openapi => {
                let Some(spec_file) = &config.spec_file else { continue };
                let path = config.config_dir.join(spec_file);
                let bytes = std::fs::read(&path)?;
                let document = Arc::new(imposter_openapi::OpenApiDocument::parse(&bytes)?);
                let behaviour = config
                    .validation
                    .as_ref()
                    .and_then(|v| v.request)
                    .or_else(|| parse_behaviour(&options.openapi_validation_default_behaviour));
                by_dir.insert(
                    config.config_dir.clone(),
                    Arc::new(OpenApiResponseProcessor::new(document, behaviour)),
                );
            }
            PluginKind::Rest => {}
        }
    }

    Ok(Arc::new(CompositeResponseProcessor { by_dir, fallback: BaseResponseProcessor }))
}

fn parse_behaviour(value: &str) -> Option<ValidationBehaviour> {
    match value.to_ascii_lowercase().as_str() {
        "fail" => Some(ValidationBehaviour::Fail),
        "log" => Some(ValidationBehaviour::Log),
        _ => None,
    }
}

/// Dispatches to the `config_dir`-specific processor the loader's plugin
/// augmentation wired up, falling back to the plain REST response builder
/// for configs with no SOAP/OpenAPI document of their own.
struct CompositeResponseProcessor {
    by_dir: HashMap<PathBuf, Arc<dyn ResponseProcessor>>,
    fallback: BaseResponseProcessor,
}

#[async_trait]
impl ResponseProcessor for CompositeResponseProcessor {
    async fn process(
        &self,
        response: &Response,
        config_dir: &Path,
        exchange: &mut Exchange,
        registry: &StoreRegistry,
    ) -> imposter_core::Result<()> {
        match self.by_dir.get(config_dir) {
            Some(processor) => processor.process(response, config_dir, exchange, registry).await,
            None => self.fallback.process(response, config_dir, exchange, registry).await,
        }
    }
}
