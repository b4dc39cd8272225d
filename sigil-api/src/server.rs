//! API server configuration, state, and lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use sigil_core::error::{Error, Result};
use sigil_core::note::{Signer, Verifier};
use sigil_storage::{ObjectLog, ObjectStore};

/// API server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Listen address.
    pub listen_addr: SocketAddr,
    /// Log origin; the first line of every checkpoint.
    pub origin: String,
    /// Note signer key string for publishing checkpoints.
    pub signer_key: String,
    /// Note verifier key string for validating the stored checkpoint.
    pub verifier_key: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".parse().expect("static address parses"),
            origin: String::new(),
            signer_key: String::new(),
            verifier_key: String::new(),
        }
    }
}

/// Shared server state.
///
/// The log client is behind an async mutex: the write path is serialized
/// in-process, and the object store's conditional writes guard against
/// anything running elsewhere.
pub struct ApiState<B> {
    pub(crate) log: Mutex<ObjectLog<B>>,
    pub(crate) signer: Signer,
    pub(crate) verifier: Verifier,
    pub(crate) origin: String,
}

impl<B: ObjectStore> ApiState<B> {
    /// Build the shared state from a config and a rooted log client.
    pub fn new(config: &ApiConfig, log: ObjectLog<B>) -> Result<Self> {
        if config.origin.is_empty() {
            return Err(Error::malformed("origin must be set"));
        }
        Ok(Self {
            log: Mutex::new(log),
            signer: Signer::new(&config.signer_key)?,
            verifier: Verifier::new(&config.verifier_key)?,
            origin: config.origin.clone(),
        })
    }
}

/// The API server.
pub struct ApiServer<B> {
    config: ApiConfig,
    state: Arc<ApiState<B>>,
}

impl<B: ObjectStore + 'static> ApiServer<B> {
    /// Create a server over a rooted log client.
    pub fn new(config: ApiConfig, log: ObjectLog<B>) -> Result<Self> {
        let state = Arc::new(ApiState::new(&config, log)?);
        Ok(Self { config, state })
    }

    /// Get a reference to the shared state.
    pub fn state(&self) -> Arc<ApiState<B>> {
        self.state.clone()
    }

    /// Create the router with the middleware stack.
    pub fn router(&self) -> Router {
        let middleware = ServiceBuilder::new().layer(TraceLayer::new_for_http());
        crate::rest::create_router()
            .layer(middleware)
            .with_state(self.state.clone())
    }

    /// Run the server until the token is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let router = self.router();
        let listener = TcpListener::bind(&self.config.listen_addr)
            .await
            .map_err(|e| Error::transport(self.config.listen_addr.to_string(), e))?;

        info!("API server listening on {}", self.config.listen_addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
            .map_err(|e| Error::transport(self.config.listen_addr.to_string(), e))
    }
}
