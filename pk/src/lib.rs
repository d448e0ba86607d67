//! promptkit - versioned prompt templates with strict rendering
//!
//! This library provides:
//! - Version resolution for deployed, latest, pinned and undeployed prompts
//! - Prompt managers that cache a prompt and refresh it in the background
//! - Strict placeholder rendering of templates and tool schemas
//! - The runtime types that `pkgen`-generated code wraps
//!
//! # Modules
//!
//! - [`version`] - Version specs and fetch keys
//! - [`manager`] - Prompt cache and background refresher
//! - [`renderer`] - Strict template and tool rendering
//! - [`context`] - Execution contexts over one snapshot
//! - [`registry`] - Registry client trait and HTTP implementation
//! - [`local`] - Local overrides consulted before the registry
//! - [`config`] - Configuration types and loading

pub mod config;
pub mod context;
pub mod error;
pub mod local;
pub mod manager;
pub mod manifest;
pub mod placeholder;
pub mod registry;
pub mod renderer;
pub mod version;

// Generated code refers to these through `promptkit::` so user crates need
// no direct serde dependency.
pub use serde;
pub use serde_json;

pub use config::Config;
pub use context::{ExecutionContext, PromptSnapshot, TrackingInfo, TypedExecutionContext};
pub use error::PromptError;
pub use local::{DirectorySource, InMemorySource, LocalSource};
pub use manager::{ManagerOptions, PromptManager, RefreshOutcome, RefreshStats};
pub use manifest::{ItemKind, PromptId, PromptManifest, Template, Tool};
pub use placeholder::{NameMap, to_snake_case};
pub use registry::{GenerationScope, HttpRegistryClient, RegistryClient, RegistryError};
pub use renderer::{TemplateRenderer, ToolRenderer};
pub use version::{FetchKey, MajorVersion, MinorVersion, VersionSpec, WeightedMinor};
