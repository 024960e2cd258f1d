//! HTTP playground server for sandpit.
//!
//! Serves a browser playground and two execution endpoints:
//!
//! - `POST /exec` runs the body as a script and streams its output
//! - `POST /qri` runs the body as a dataset transform and returns the
//!   resulting (ephemeral) dataset as JSON
//!
//! plus `GET /health`, the playground page at `/` and static assets under
//! `/js`.
//!
//! # Example
//!
//! ```no_run
//! use sandpit_script::{Capabilities, Interpreter};
//! use sandpit_server::{Server, ServerConfig};
//!
//! # async fn example() -> sandpit_server::Result<()> {
//! let config = ServerConfig::new().with_bind_address("127.0.0.1:3000".parse().unwrap());
//! let server = Server::new(Interpreter::new(Capabilities::default()), config);
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use middleware::{
    payload_limit_middleware, rate_limit_middleware, request_logging_middleware,
};
pub use routes::{NO_OUTPUT, TransformParams};
pub use state::AppState;

use std::net::SocketAddr;

use axum::{Router, extract::DefaultBodyLimit, middleware::from_fn_with_state};
use sandpit_script::Interpreter;
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;

/// The sandpit HTTP server.
pub struct Server {
    /// Application state.
    state: AppState,
}

impl Server {
    /// Create a new server with the given interpreter and configuration.
    pub fn new(interpreter: Interpreter, config: ServerConfig) -> Self {
        Self {
            state: AppState::new(interpreter, config),
        }
    }

    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// The shared application state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        use axum::routing::{get, post};

        let config = &self.state.config;

        Router::new()
            .route("/", get(routes::home_handler))
            .route("/exec", post(routes::exec_handler))
            .route("/qri", post(routes::transform_handler))
            .merge(routes::health_routes())
            .nest_service("/js", ServeDir::new(&config.static_dir))
            .layer(DefaultBodyLimit::max(config.max_body_size))
            // Rewrites the extractor's bare 413
            .layer(from_fn_with_state(
                self.state.clone(),
                middleware::payload_limit_middleware,
            ))
            // Request logging (inner layer, runs first)
            .layer(from_fn_with_state(
                self.state.clone(),
                middleware::request_logging_middleware,
            ))
            // Rate limiting (outer layer, runs before request logging)
            .layer(from_fn_with_state(
                self.state.clone(),
                middleware::rate_limit_middleware,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run the server on the configured address.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        self.run_on(addr).await
    }

    /// Run the server on a specific address (useful for testing).
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind {addr}: {e}")))?;
        self.serve(listener, std::future::pending()).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl std::future::Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let router = self.router();

        if let Ok(addr) = listener.local_addr() {
            info!(addr = %addr, "Starting server");
        }

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {e}")))?;

        info!("Server stopped");
        Ok(())
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }
}
