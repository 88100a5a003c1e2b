//! HTTP server lifecycle.

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

use crate::{error::ServerError, routes::create_router, shutdown, state::AppState};

/// Default grace period for in-flight requests
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Listener and shutdown settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Grace period before in-flight requests are cancelled
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Config for `host:port` with the default grace period
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Set the shutdown grace period
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// `host:port`
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// The gateway HTTP server
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Create a server
    #[must_use]
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Bind the configured address and serve until a process signal
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown::shutdown_signal()).await
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = self.config.addr();
        TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::bind(addr, e))
    }

    /// Serve on `listener` until `signal` resolves, then drain.
    ///
    /// After the signal no new connections are accepted. Requests still running
    /// when the grace period ends are cancelled through the root token.
    pub async fn serve<F>(self, listener: TcpListener, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local: SocketAddr = listener
            .local_addr()
            .map_err(|e| ServerError::LocalAddr(e.to_string()))?;
        let root = self.state.shutdown_token().clone();
        let grace = self.config.shutdown_timeout;
        let app = create_router(self.state);

        let (fired_tx, fired_rx) = tokio::sync::oneshot::channel::<()>();
        let graceful = async move {
            signal.await;
            let _ = fired_tx.send(());
        };

        info!(addr = %local, "Gateway listening");
        let server = axum::serve(listener, app)
            .with_graceful_shutdown(graceful)
            .into_future();
        tokio::pin!(server);

        tokio::select! {
            result = &mut server => {
                result?;
                info!("Server stopped");
                return Ok(());
            }
            _ = fired_rx => {}
        }

        info!(grace_secs = grace.as_secs(), "Draining in-flight requests");
        let (result, clean) = shutdown::drain(server, &root, grace).await;
        result?;
        info!(clean, "Server stopped");
        Ok(())
    }
}
