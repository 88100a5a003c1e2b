//! # Gateway Providers
//!
//! Backend adapters and the provider registry for the chat completion gateway.
//!
//! This crate provides:
//! - OpenRouter (OpenAI-compatible chat completions)
//! - Anthropic (Messages API)
//! - A deterministic mock backend
//! - The name-keyed provider registry

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod registry;

mod completion;
mod http;

#[cfg(feature = "openrouter")]
pub mod openrouter;

#[cfg(feature = "anthropic")]
pub mod anthropic;

#[cfg(feature = "mock")]
pub mod mock;

// Re-export main types
pub use config::ProviderConfig;
pub use registry::ProviderRegistry;

#[cfg(feature = "openrouter")]
pub use openrouter::OpenRouterProvider;

#[cfg(feature = "anthropic")]
pub use anthropic::AnthropicProvider;

#[cfg(feature = "mock")]
pub use mock::{MockFailure, MockProvider};
