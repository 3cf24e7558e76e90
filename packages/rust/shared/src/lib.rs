//! Shared types, error model, and configuration for Grounder.
//!
//! This crate is the foundation depended on by all other Grounder crates.
//! It provides:
//! - [`GrounderError`], the unified error type
//! - Domain types ([`Page`], [`Chunk`], [`ScoredChunk`], [`Product`],
//!   [`ContextPayload`], [`GroundedAnswer`], [`RequestId`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, IntentConfig, OpenAiConfig, PromptConfig, RetrievalConfig, SiteConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, validate_api_key,
};
pub use error::{GrounderError, Result};
pub use types::{
    Chunk, ContextPayload, GroundedAnswer, Page, Product, RequestId, ScoredChunk,
};
