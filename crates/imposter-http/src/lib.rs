//! Thin axum hosting layer (§4.14, ambient A5): adapts axum's request/
//! response types to `imposter_core::Exchange` and forwards everything to a
//! `Dispatcher`. Carries no matching or response logic of its own.
//!
//! Division of labour mirrors `mockforge-http::build_router` wrapping
//! `mockforge-core`: this crate only hosts, `imposter-core` decides.

pub mod router;

pub use router::build_router;
