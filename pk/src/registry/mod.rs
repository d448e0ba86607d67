//! Prompt registry access
//!
//! The `RegistryClient` trait is the only seam through which prompts are
//! fetched; `HttpRegistryClient` is the production implementation.

pub mod client;
mod error;
mod http;
pub mod wire;

pub use client::{GenerationScope, RegistryClient};
pub use error::RegistryError;
pub use http::HttpRegistryClient;
