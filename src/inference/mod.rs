//! Inference Client: OpenAI-compatible API client for the planning model.
//!
//! This module handles all communication with the model endpoint:
//! - Non-streaming chat completions with retry and exponential backoff
//! - Completion body parsing
//! - Configuration loading from `toolbox.yaml`
//!
//! The planning pipeline never sees the client directly; it depends on the
//! [`ModelCall`] trait, so tests and alternative backends plug in there.

pub mod client;
pub mod config;
pub mod errors;
pub mod types;

// Re-exports for convenience
pub use client::{InferenceClient, ModelCall};
pub use config::{
    ModelConfig, PlannerConfig, ResolvedConfig, RetryConfig, ToolboxConfig, UnknownToolPolicy,
};
pub use errors::InferenceError;
pub use types::{CallOptions, ChatMessage, Role};
