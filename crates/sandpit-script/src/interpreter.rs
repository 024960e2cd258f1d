//! Interpreter invocation: capability-restricted engines, one per request.
//!
//! # Flow
//!
//! 1. [`Interpreter`] is built once at startup from [`Capabilities`]
//! 2. Each request asks it for a fresh [`ExecutionThread`] bound to an
//!    [`OutputSink`] and a [`ModuleLoader`]
//! 3. The thread executes the staged file; every `print` goes straight to
//!    the sink
//! 4. Failures come back as raw [`ScriptError`]s (path included);
//!    sanitizing them is the caller's job

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rhai::module_resolvers::DummyModuleResolver;
use rhai::{AST, CallFnOptions, Dynamic, Engine, EvalAltResult, FuncArgs, Scope};
use tracing::debug;

use crate::config::Capabilities;
use crate::error::{ScriptError, ScriptErrorKind};
use crate::modules::ModuleLibrary;
use crate::sink::OutputSink;

/// How `import` statements are satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModuleLoader {
    /// No modules; every `import` fails.
    #[default]
    None,
    /// Resolve against the interpreter's built-in [`ModuleLibrary`].
    Builtin,
}

/// Process-wide interpreter settings.
///
/// Immutable after construction; cloning shares the same settings.
#[derive(Debug, Clone)]
pub struct Interpreter {
    capabilities: Arc<Capabilities>,
    library: Arc<ModuleLibrary>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Capabilities::default())
    }
}

impl Interpreter {
    /// Create an interpreter with the built-in module library.
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            capabilities: Arc::new(capabilities),
            library: Arc::new(ModuleLibrary::builtin()),
        }
    }

    /// Replace the module library.
    pub fn with_library(mut self, library: ModuleLibrary) -> Self {
        self.library = Arc::new(library);
        self
    }

    /// The capability settings every thread is built with.
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// The module library used by [`ModuleLoader::Builtin`].
    pub fn library(&self) -> &ModuleLibrary {
        &self.library
    }

    /// Build a fresh execution thread.
    pub fn thread(&self, sink: Arc<dyn OutputSink>, loader: ModuleLoader) -> ExecutionThread {
        let caps = &self.capabilities;
        let mut engine = Engine::new();

        engine.set_allow_looping(caps.allow_looping);
        engine.set_allow_anonymous_fn(caps.allow_anonymous_fn);
        engine.set_allow_shadowing(caps.allow_shadowing);
        engine.set_allow_if_expression(caps.allow_if_expression);
        engine.set_allow_switch_expression(caps.allow_switch_expression);
        engine.set_allow_statement_expression(caps.allow_statement_expression);
        engine.set_strict_variables(caps.strict_variables);
        engine.set_max_call_levels(caps.max_call_levels);
        engine.set_max_operations(caps.max_operations);
        engine.set_max_expr_depths(caps.max_expr_depth, caps.max_function_expr_depth);
        engine.set_max_string_size(caps.max_string_size);
        engine.set_max_array_size(caps.max_array_size);
        engine.set_max_map_size(caps.max_map_size);

        match loader {
            ModuleLoader::None => {
                engine.set_module_resolver(DummyModuleResolver::new());
            }
            ModuleLoader::Builtin => {
                engine.set_module_resolver(self.library.resolver());
            }
        }

        let wrote = Arc::new(AtomicBool::new(false));
        {
            let wrote = Arc::clone(&wrote);
            engine.on_print(move |text| {
                sink.write(text);
                wrote.store(true, Ordering::Release);
            });
        }
        engine.on_debug(|text, source, pos| {
            debug!(source = ?source, position = %pos, "{}", text);
        });

        let deadline = Arc::new(Mutex::new(None::<Instant>));
        let timed_out = Arc::new(AtomicBool::new(false));
        if !caps.timeout.is_zero() {
            let deadline = Arc::clone(&deadline);
            let timed_out = Arc::clone(&timed_out);
            engine.on_progress(move |_ops| {
                let expired = deadline.lock().is_some_and(|d| Instant::now() >= d);
                if expired {
                    timed_out.store(true, Ordering::Release);
                    Some(Dynamic::from("timeout"))
                } else {
                    None
                }
            });
        }

        ExecutionThread {
            engine,
            wrote,
            deadline,
            timed_out,
            timeout: caps.timeout,
        }
    }
}

/// One interpreter session bound to one output sink.
///
/// Created per request and dropped when the request's script finishes.
pub struct ExecutionThread {
    engine: Engine,
    wrote: Arc<AtomicBool>,
    deadline: Arc<Mutex<Option<Instant>>>,
    timed_out: Arc<AtomicBool>,
    timeout: Duration,
}

impl ExecutionThread {
    /// The underlying engine, for registering host types and functions.
    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Whether any `print` reached the sink.
    pub fn wrote_output(&self) -> bool {
        self.wrote.load(Ordering::Acquire)
    }

    /// Execute a script file with no predeclared bindings.
    pub fn exec_file(&mut self, path: &Path) -> Result<(), ScriptError> {
        self.arm();
        self.engine
            .run_file(path.to_path_buf())
            .map_err(|e| self.convert(path, e))
    }

    /// Compile a script file.
    pub fn compile_file(&self, path: &Path) -> Result<AST, ScriptError> {
        self.engine
            .compile_file(path.to_path_buf())
            .map_err(|e| self.convert(path, e))
    }

    /// Run the top-level statements of `ast`, then call `name` with `args`.
    pub fn call_entrypoint(
        &mut self,
        path: &Path,
        ast: &AST,
        name: &str,
        args: impl FuncArgs,
    ) -> Result<Dynamic, ScriptError> {
        self.arm();
        let mut scope = Scope::new();
        let options = CallFnOptions::new().eval_ast(true).rewind_scope(true);
        self.engine
            .call_fn_with_options::<Dynamic>(options, &mut scope, ast, name, args)
            .map_err(|e| self.convert(path, e))
    }

    fn arm(&self) {
        self.timed_out.store(false, Ordering::Release);
        *self.deadline.lock() = Some(Instant::now() + self.timeout);
    }

    fn convert(&self, path: &Path, mut err: Box<EvalAltResult>) -> ScriptError {
        if self.timed_out.load(Ordering::Acquire) {
            return ScriptError::timed_out(path, self.timeout);
        }

        let kind = match &*err {
            EvalAltResult::ErrorParsing(..) => ScriptErrorKind::Syntax,
            EvalAltResult::ErrorTooManyOperations(..)
            | EvalAltResult::ErrorStackOverflow(..)
            | EvalAltResult::ErrorDataTooLarge(..)
            | EvalAltResult::ErrorTerminated(..) => ScriptErrorKind::Limit,
            EvalAltResult::ErrorSystem(..) => ScriptErrorKind::Io,
            _ => ScriptErrorKind::Runtime,
        };

        let pos = err.take_position();
        ScriptError::new(path, kind, err.to_string()).at(pos.line(), pos.position())
    }
}

/// What a single run produced.
#[derive(Debug)]
pub struct RunOutcome {
    /// At least one `print` reached the sink.
    pub wrote_output: bool,
    /// The interpreter error, if the script failed.
    pub error: Option<ScriptError>,
}

impl RunOutcome {
    /// Convert into a `Result`, dropping the output flag on failure.
    pub fn into_result(self) -> Result<bool, ScriptError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.wrote_output),
        }
    }
}

/// Execute `script_path` on a fresh thread, streaming prints into `sink`.
pub fn run(
    interpreter: &Interpreter,
    script_path: &Path,
    sink: Arc<dyn OutputSink>,
    loader: ModuleLoader,
) -> RunOutcome {
    let mut thread = interpreter.thread(sink, loader);
    let error = thread.exec_file(script_path).err();
    RunOutcome {
        wrote_output: thread.wrote_output(),
        error,
    }
}
