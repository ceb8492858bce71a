//! Generative model abstraction layer for stock-research-rs
//!
//! This crate provides provider-agnostic types for chat completions:
//!
//! - Message types for model communication
//! - Completion request/response types
//! - Provider trait for model implementations
//! - An OpenAI-compatible chat completions provider

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;
pub mod providers;

// Re-export main types
pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{Message, Role};
pub use provider::LLMProvider;
