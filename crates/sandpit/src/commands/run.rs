//! Run command - executes a script file without the server.
//!
//! Goes through the same staging, interpreter and sanitizer path as
//! `POST /exec`, or with `--transform` the same pipeline as `POST /qri`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result, bail};
use clap::Args;
use sandpit_dataset::{Node, TransformRequest, run_transform};
use sandpit_script::{
    Interpreter, ModuleLoader, StderrSink, StdoutSink, run as run_script, sanitize, stage,
};

use super::Context;

/// Arguments for the run command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Script file to execute
    pub file: PathBuf,

    /// Run as a dataset transform and print the resulting dataset
    #[arg(short, long)]
    pub transform: bool,

    /// Allow `import` of the built-in modules (transforms always can)
    #[arg(short, long)]
    pub modules: bool,

    /// Transform config as key,value,... (with --transform)
    #[arg(long, requires = "transform")]
    pub config: Option<String>,

    /// Transform secrets as key,value,... (with --transform)
    #[arg(long, requires = "transform")]
    pub secrets: Option<String>,
}

/// Run the run command.
pub async fn run(args: RunArgs, ctx: &Context) -> Result<()> {
    let script = std::fs::read(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;
    let interpreter = Interpreter::new(ctx.config.interpreter());

    if args.transform {
        let mut request = TransformRequest::new();
        if let Some(config) = args.config {
            request = request.with_config(config);
        }
        if let Some(secrets) = args.secrets {
            request = request.with_secrets(secrets);
        }
        let json = tokio::task::spawn_blocking(move || transform(interpreter, &script, &request))
            .await??;
        println!("{}", json);
        return Ok(());
    }

    let loader = if args.modules {
        ModuleLoader::Builtin
    } else {
        ModuleLoader::None
    };
    tokio::task::spawn_blocking(move || execute(&interpreter, &script, loader)).await?
}

fn execute(interpreter: &Interpreter, script: &[u8], loader: ModuleLoader) -> Result<()> {
    let staged = stage(script)?;
    let outcome = run_script(interpreter, staged.path(), Arc::new(StdoutSink), loader);
    let error = outcome
        .error
        .map(|e| sanitize(&e.to_string(), staged.path()));
    staged.release();

    if outcome.wrote_output {
        println!();
    }
    match error {
        Some(message) => bail!(message),
        None => Ok(()),
    }
}

fn transform(interpreter: Interpreter, script: &[u8], request: &TransformRequest) -> Result<String> {
    // Transform prints go to stderr; stdout carries only the dataset.
    let mut node = Node::new(interpreter).with_output(Arc::new(StderrSink));
    let mut response = None;
    run_transform(&mut node, script, request, |result| response = Some(result));

    match response {
        Some(Ok(bytes)) => Ok(String::from_utf8(bytes)?),
        Some(Err(e)) => bail!(e),
        None => bail!("transform produced no response"),
    }
}
