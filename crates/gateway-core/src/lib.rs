//! # Gateway Core
//!
//! Core types, traits, and error handling for the chat completion gateway.
//!
//! This crate provides the foundational types used throughout the gateway:
//! - Canonical request and response shapes
//! - The backend adapter trait
//! - Completion options and per-call overrides
//! - Error taxonomy

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod options;
pub mod provider;
pub mod request;
pub mod response;
pub mod streaming;

// Re-export commonly used types
pub use error::{GatewayError, GatewayResult};
pub use options::{CompletionOptions, CompletionOverrides};
pub use provider::LLMProvider;
pub use request::{ChatRequest, Message, MessageRole};
pub use response::{ChatResponse, Choice, Completion, FinishReason, Usage};
pub use streaming::{cancellable, ChunkStream, CompletionStream};
pub use tokio_util::sync::CancellationToken;
