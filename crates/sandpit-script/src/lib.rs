//! Sandboxed script execution for the sandpit playground.
//!
//! This crate owns everything between "a request handed us some bytes" and
//! "here is what the script printed (or why it failed)":
//!
//! - [`staging`]: write the payload to a uniquely named temp file that is
//!   removed on every exit path
//! - [`guard`]: single-flight access to an execution context that must not
//!   be used concurrently
//! - [`interpreter`]: capability-restricted Rhai engines, one per request,
//!   streaming `print` output into an [`OutputSink`]
//! - [`sanitize`](mod@sanitize): strip staged file paths from error text
//!
//! # Security Model
//!
//! | Concern | Mechanism |
//! |---------|-----------|
//! | Grammar | [`Capabilities`] `allow_*` flags, fixed at startup |
//! | Resources | operation, depth, size limits and a wall-clock timeout |
//! | Imports | no resolver unless [`ModuleLoader::Builtin`]; built-ins only |
//! | Path leakage | [`sanitize()`] rewrites the staged path to `line` |
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sandpit_script::{BufferSink, Capabilities, Interpreter, ModuleLoader, run, sanitize, stage};
//!
//! let interpreter = Interpreter::new(Capabilities::default());
//! let staged = stage(b"print(\"hello\");").unwrap();
//! let sink = Arc::new(BufferSink::new());
//!
//! match run(&interpreter, staged.path(), sink.clone(), ModuleLoader::None).into_result() {
//!     Ok(_) => println!("{}", sink.contents()),
//!     Err(e) => eprintln!("{}", sanitize(&e.to_string(), staged.path())),
//! }
//! staged.release();
//! ```

mod config;
mod error;
pub mod guard;
pub mod interpreter;
mod modules;
pub mod sanitize;
mod sink;
pub mod staging;

pub use config::Capabilities;
pub use error::{GuardError, ScriptError, ScriptErrorKind, ScriptResult, StagingError};
pub use guard::ExecutionGuard;
pub use interpreter::{ExecutionThread, Interpreter, ModuleLoader, RunOutcome, run};
pub use modules::ModuleLibrary;
pub use sanitize::{PATH_PLACEHOLDER, sanitize, sanitize_str};
pub use sink::{BufferSink, ChannelSink, OutputSink, StderrSink, StdoutSink, TracingSink};
pub use staging::{StagedScript, stage, stage_in};

/// Re-export of the interpreter crate so downstream crates register host
/// types against the same version.
pub use rhai;
