//! Common test utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use sandpit_dataset::Node;
use sandpit_script::{Capabilities, Interpreter};
use sandpit_server::{AppState, Server, ServerConfig};

/// A test server that runs in the background.
pub struct TestServer {
    /// The server's address.
    pub addr: SocketAddr,
    /// HTTP client configured for this server.
    pub client: Client,
    /// Handle to the server task.
    _handle: JoinHandle<()>,
    /// Staging directory for `/exec` and `/qri` scripts.
    pub staging_dir: TempDir,
}

impl TestServer {
    /// Start a new test server with default configuration.
    pub async fn start() -> Result<Self> {
        Self::start_with(ServerConfig::new(), Capabilities::default()).await
    }

    /// Start a new test server with the given config and capabilities.
    ///
    /// The bind address in `config` is replaced with a free local port.
    pub async fn start_with(config: ServerConfig, capabilities: Capabilities) -> Result<Self> {
        let staging_dir = TempDir::new()?;

        // Find an available port
        let addr = find_available_port().await?;

        let config = config
            .with_bind_address(addr)
            .with_staging_dir(staging_dir.path())
            .with_request_logging(false);

        let interpreter = Interpreter::new(capabilities);
        let node = Node::new(interpreter.clone()).with_staging_dir(staging_dir.path());
        let state = AppState::with_node(interpreter, node, config);

        // Start server in background
        let server = Server::from_state(state);
        let handle = tokio::spawn(async move {
            let _ = server.run_on(addr).await;
        });

        // Wait for server to be ready
        let client = Client::new();
        wait_for_server(&client, addr).await?;

        Ok(Self {
            addr,
            client,
            _handle: handle,
            staging_dir,
        })
    }

    /// Get the base URL for the server.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get a GET request builder.
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(format!("{}{}", self.base_url(), path))
    }

    /// Get a POST request builder.
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(format!("{}{}", self.base_url(), path))
    }

    /// POST a script to `/exec`, returning status and body.
    pub async fn exec(&self, script: &str) -> Result<(u16, String)> {
        let resp = self.post("/exec").body(script.to_string()).send().await?;
        let status = resp.status().as_u16();
        Ok((status, resp.text().await?))
    }

    /// POST a transform to `/qri` with an optional query string.
    pub async fn qri(&self, query: &str, script: &str) -> Result<(u16, String)> {
        let path = if query.is_empty() {
            "/qri".to_string()
        } else {
            format!("/qri?{query}")
        };
        let resp = self.post(&path).body(script.to_string()).send().await?;
        let status = resp.status().as_u16();
        Ok((status, resp.text().await?))
    }

    /// Number of files left in the staging directory.
    pub fn staged_files(&self) -> Result<usize> {
        Ok(std::fs::read_dir(self.staging_dir.path())?.count())
    }

    /// Check if server is healthy.
    pub async fn health(&self) -> Result<bool> {
        let resp = self.get("/health").send().await?;
        Ok(resp.status().is_success())
    }
}

/// Reserve a free loopback port by binding and immediately releasing it.
async fn find_available_port() -> Result<SocketAddr> {
    let probe = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    Ok(probe.local_addr()?)
}

/// Poll `/health` until it answers or five seconds pass.
async fn wait_for_server(client: &Client, addr: SocketAddr) -> Result<()> {
    let url = format!("http://{addr}/health");
    let poll = async {
        while !client
            .get(&url)
            .send()
            .await
            .is_ok_and(|r| r.status().is_success())
        {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    };

    timeout(Duration::from_secs(5), poll)
        .await
        .map_err(|_| anyhow::anyhow!("server on {addr} did not become healthy"))
}
