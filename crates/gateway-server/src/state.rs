//! Shared application state.

use gateway_providers::ProviderRegistry;
use gateway_routing::{GatewayRouter, StreamMultiplexer};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// State handed to every handler
#[derive(Debug, Clone)]
pub struct AppState {
    router: GatewayRouter,
    shutdown: CancellationToken,
    started_at: Instant,
}

impl AppState {
    /// State over `registry` with default settings
    #[must_use]
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self::builder().registry(registry).build()
    }

    /// Create a builder
    #[must_use]
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::default()
    }

    /// The request router
    #[must_use]
    pub fn router(&self) -> &GatewayRouter {
        &self.router
    }

    /// Root token; cancelling it cancels every in-flight request
    #[must_use]
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Execution context for one inbound request
    #[must_use]
    pub fn request_context(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Seconds since the state was built
    #[must_use]
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Builder for [`AppState`]
#[derive(Debug, Default)]
pub struct AppStateBuilder {
    registry: Option<Arc<ProviderRegistry>>,
    multiplexer: Option<StreamMultiplexer>,
    shutdown: Option<CancellationToken>,
}

impl AppStateBuilder {
    /// Set the provider registry
    #[must_use]
    pub fn registry(mut self, registry: Arc<ProviderRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the stream multiplexer
    #[must_use]
    pub fn multiplexer(mut self, multiplexer: StreamMultiplexer) -> Self {
        self.multiplexer = Some(multiplexer);
        self
    }

    /// Use an existing root cancellation token
    #[must_use]
    pub fn shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Build the state; an unset registry starts empty
    #[must_use]
    pub fn build(self) -> AppState {
        let registry = self.registry.unwrap_or_default();
        let router = GatewayRouter::new(registry)
            .with_multiplexer(self.multiplexer.unwrap_or_default());

        AppState {
            router,
            shutdown: self.shutdown.unwrap_or_default(),
            started_at: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_context_follows_shutdown() {
        let state = AppState::builder().build();
        let ctx = state.request_context();

        assert!(!ctx.is_cancelled());
        state.shutdown_token().cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn test_request_contexts_are_independent() {
        let state = AppState::builder().build();
        let a = state.request_context();
        let b = state.request_context();

        a.cancel();
        assert!(!b.is_cancelled());
        assert!(!state.shutdown_token().is_cancelled());
    }
}
