//! # Gateway Config
//!
//! Configuration for the chat completion gateway process.
//!
//! Settings come from an optional YAML or TOML file (path in
//! `GATEWAY_CONFIG`) and are then overridden by environment variables.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod settings;

// Re-export main types
pub use error::ConfigError;
pub use loader::{load_config, load_from_path, CONFIG_PATH_ENV};
pub use settings::{
    GatewayConfig, LoggingSettings, MockSettings, ProviderSettings, ProvidersConfig,
    RateLimitSettings, ServerSettings,
};
