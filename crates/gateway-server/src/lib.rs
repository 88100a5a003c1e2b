//! # Gateway Server
//!
//! HTTP server for the chat completion gateway.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - OpenAI-style chat completion, provider and model endpoints
//! - JSON and Server-Sent-Events response encoding
//! - Graceful shutdown handling

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod encoder;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod state;

// Re-export main types
pub use error::{ApiError, ServerError};
pub use routes::create_router;
pub use server::{Server, ServerConfig};
pub use shutdown::shutdown_signal;
pub use state::{AppState, AppStateBuilder};
