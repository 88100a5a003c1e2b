//! # Gateway Routing
//!
//! Request routing and stream multiplexing for the chat completion gateway.
//!
//! This crate provides:
//! - The request router and its lifecycle state machine
//! - Provider resolution through the registry
//! - The single-producer stream multiplexer

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod multiplexer;
pub mod router;

// Re-export main types
pub use multiplexer::{ChunkReceiver, StreamMultiplexer};
pub use router::{Dispatch, GatewayRouter, RoutePhase};
