//! Application state shared across handlers.

use std::sync::Arc;

use sandpit_dataset::Node;
use sandpit_script::{ExecutionGuard, Interpreter};

use crate::config::ServerConfig;
use crate::middleware::{SharedRateLimiter, create_rate_limiter};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Interpreter used by `/exec`. Each request gets its own thread.
    pub interpreter: Interpreter,

    /// The dataset node; one `/qri` request at a time.
    pub node: ExecutionGuard<Node>,

    /// Global request limiter, present when rate limiting is enabled.
    pub limiter: Option<SharedRateLimiter>,
}

impl AppState {
    /// Create application state. The dataset node shares `interpreter`'s
    /// capabilities and the configured staging dir.
    pub fn new(interpreter: Interpreter, config: ServerConfig) -> Self {
        let node = Node::new(interpreter.clone()).with_staging_dir(&config.staging_dir);
        Self::with_node(interpreter, node, config)
    }

    /// Create application state around an existing node.
    pub fn with_node(interpreter: Interpreter, node: Node, config: ServerConfig) -> Self {
        let limiter = config
            .rate_limiting
            .then(|| create_rate_limiter(config.api_rpm));
        Self {
            config: Arc::new(config),
            interpreter,
            node: ExecutionGuard::new(node),
            limiter,
        }
    }
}
