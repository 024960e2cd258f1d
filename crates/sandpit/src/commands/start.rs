//! Start command - launches the playground server.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use sandpit_config::ServerSection;
use sandpit_script::Interpreter;
use sandpit_server::{Server, ServerConfig};
use tokio::net::TcpListener;

use super::Context;

/// Arguments for the start command.
///
/// CLI arguments override config file and environment values.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Directory served under /js (overrides config)
    #[arg(long)]
    pub static_dir: Option<PathBuf>,

    /// Enable global rate limiting
    #[arg(long)]
    pub rate_limit: bool,
}

/// Run the start command.
pub async fn run(args: StartArgs, ctx: &Context) -> Result<()> {
    let section = apply_overrides(ctx.config.server(), &args);
    let server_config = ServerConfig::from_section(&section)?;
    let capabilities = ctx.config.interpreter();

    if ctx.verbose {
        let mut effective = ctx.config.clone();
        *effective.server_mut() = section.clone();
        effective.interpreter = Some(capabilities.clone());
        println!("Effective config:\n{}", effective.to_toml()?);
    }

    let addr = server_config.bind_address;
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;

    let server = Server::new(Interpreter::new(capabilities), server_config);
    println!("Sandpit listening on http://{}", local);

    server.serve(listener, shutdown_signal()).await?;
    Ok(())
}

fn apply_overrides(mut section: ServerSection, args: &StartArgs) -> ServerSection {
    if let Some(port) = args.port {
        section.port = port;
    }
    if let Some(bind) = &args.bind {
        section.bind = bind.clone();
    }
    if let Some(dir) = &args.static_dir {
        section.static_dir = dir.clone();
    }
    if args.rate_limit {
        section.rate_limiting = true;
    }
    section
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Shutdown requested");
    }
}
