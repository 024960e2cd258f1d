//! Running transform scripts.
//!
//! A transform script defines `fn transform(ds, ctx)`:
//!
//! ```text
//! fn transform(ds, ctx) {
//!     ds.set_meta("title", "numbers");
//!     ds.set_body([1, 2, 3]);
//! }
//! ```
//!
//! | Receiver | Function | Notes |
//! |----------|----------|-------|
//! | `ds` | `set_body(value)` | replaces the body |
//! | `ds` | `get_body()` | `()` until set |
//! | `ds` | `set_meta(key, value)` | |
//! | `ds` | `get_meta(key)` | `()` when missing |
//! | `ctx` | `get_config(key)` | `()` when missing |
//! | `ctx` | `get_secret(key)` | `()` when missing |
//!
//! Top-level statements run before `transform` is called. If `set_body` is
//! never called, a non-unit return value becomes the body.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use sandpit_script::rhai::{self, Dynamic, EvalAltResult, ImmutableString};
use sandpit_script::{Interpreter, ModuleLoader, OutputSink, ScriptError, ScriptErrorKind};
use serde_json::Value;
use tracing::debug;

use crate::error::{DatasetError, Result};
use crate::types::Secrets;

/// Name of the function every transform script must define.
pub const ENTRYPOINT: &str = "transform";

type FnResult<T> = std::result::Result<T, Box<EvalAltResult>>;

/// What a transform produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformOutput {
    pub body: Option<Value>,
    pub meta: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
struct DatasetState {
    body: Option<Value>,
    meta: BTreeMap<String, Value>,
}

/// The `ds` argument. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct DatasetHandle {
    state: Arc<Mutex<DatasetState>>,
}

impl DatasetHandle {
    fn set_body(&mut self, value: Dynamic) -> FnResult<()> {
        let body: Value = rhai::serde::from_dynamic(&value)?;
        self.state.lock().body = Some(body);
        Ok(())
    }

    fn get_body(&mut self) -> FnResult<Dynamic> {
        match &self.state.lock().body {
            Some(body) => rhai::serde::to_dynamic(body),
            None => Ok(Dynamic::UNIT),
        }
    }

    fn set_meta(&mut self, key: ImmutableString, value: Dynamic) -> FnResult<()> {
        let value: Value = rhai::serde::from_dynamic(&value)?;
        self.state.lock().meta.insert(key.to_string(), value);
        Ok(())
    }

    fn get_meta(&mut self, key: ImmutableString) -> FnResult<Dynamic> {
        match self.state.lock().meta.get(key.as_str()) {
            Some(value) => rhai::serde::to_dynamic(value),
            None => Ok(Dynamic::UNIT),
        }
    }

    fn into_output(self) -> TransformOutput {
        let mut state = self.state.lock();
        TransformOutput {
            body: state.body.take(),
            meta: std::mem::take(&mut state.meta),
        }
    }
}

/// The `ctx` argument: read-only config and secrets.
#[derive(Debug, Clone, Default)]
pub struct TransformContext {
    config: Arc<BTreeMap<String, Value>>,
    secrets: Arc<Secrets>,
}

impl TransformContext {
    pub fn new(config: BTreeMap<String, Value>, secrets: Secrets) -> Self {
        Self {
            config: Arc::new(config),
            secrets: Arc::new(secrets),
        }
    }

    fn get_config(&mut self, key: ImmutableString) -> FnResult<Dynamic> {
        match self.config.get(key.as_str()) {
            Some(value) => rhai::serde::to_dynamic(value),
            None => Ok(Dynamic::UNIT),
        }
    }

    fn get_secret(&mut self, key: ImmutableString) -> Dynamic {
        self.secrets
            .get(key.as_str())
            .map(|s| Dynamic::from(s.clone()))
            .unwrap_or(Dynamic::UNIT)
    }
}

/// Compile and run the transform at `script_path`.
///
/// Script failures come back as [`DatasetError::Script`] carrying the raw
/// interpreter error, path included.
pub fn execute(
    interpreter: &Interpreter,
    sink: Arc<dyn OutputSink>,
    script_path: &Path,
    config: BTreeMap<String, Value>,
    secrets: Secrets,
) -> Result<TransformOutput> {
    let mut thread = interpreter.thread(sink, ModuleLoader::Builtin);

    thread
        .engine_mut()
        .register_type_with_name::<DatasetHandle>("Dataset")
        .register_fn("set_body", DatasetHandle::set_body)
        .register_fn("get_body", DatasetHandle::get_body)
        .register_fn("set_meta", DatasetHandle::set_meta)
        .register_fn("get_meta", DatasetHandle::get_meta)
        .register_type_with_name::<TransformContext>("TransformContext")
        .register_fn("get_config", TransformContext::get_config)
        .register_fn("get_secret", TransformContext::get_secret);

    let ast = thread.compile_file(script_path)?;

    let has_entrypoint = ast
        .iter_functions()
        .any(|f| f.name == ENTRYPOINT && f.params.len() == 2);
    if !has_entrypoint {
        return Err(ScriptError::new(
            script_path,
            ScriptErrorKind::Runtime,
            format!("script does not define fn {ENTRYPOINT}(ds, ctx)"),
        )
        .into());
    }

    let ds = DatasetHandle::default();
    let ctx = TransformContext::new(config, secrets);
    let returned = thread.call_entrypoint(script_path, &ast, ENTRYPOINT, (ds.clone(), ctx))?;

    let mut output = ds.into_output();
    if output.body.is_none() && !returned.is_unit() {
        debug!("Using transform return value as body");
        let body: Value = rhai::serde::from_dynamic(&returned)
            .map_err(|e| DatasetError::Transform(e.to_string()))?;
        output.body = Some(body);
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandpit_script::{BufferSink, stage_in};

    fn run_transform(
        src: &str,
        config: BTreeMap<String, Value>,
        secrets: Secrets,
    ) -> (String, Result<TransformOutput>) {
        let dir = tempfile::tempdir().unwrap();
        let staged = stage_in(dir.path(), src.as_bytes()).unwrap();
        let sink = Arc::new(BufferSink::new());
        let result = execute(
            &Interpreter::default(),
            sink.clone(),
            staged.path(),
            config,
            secrets,
        );
        (sink.contents(), result)
    }

    #[test]
    fn test_set_body() {
        let (_, result) = run_transform(
            "fn transform(ds, ctx) { ds.set_body([1, 2, 3]); }",
            BTreeMap::new(),
            Secrets::new(),
        );
        let output = result.unwrap();
        assert_eq!(output.body, Some(serde_json::json!([1, 2, 3])));
    }

    #[test]
    fn test_return_value_becomes_body() {
        let (_, result) = run_transform(
            "fn transform(ds, ctx) { [\"a\", \"b\"] }",
            BTreeMap::new(),
            Secrets::new(),
        );
        assert_eq!(result.unwrap().body, Some(serde_json::json!(["a", "b"])));
    }

    #[test]
    fn test_meta_roundtrips_inside_script() {
        let (out, result) = run_transform(
            r#"fn transform(ds, ctx) {
                ds.set_meta("title", "numbers");
                print(ds.get_meta("title"));
                ds.set_body([]);
            }"#,
            BTreeMap::new(),
            Secrets::new(),
        );
        let output = result.unwrap();
        assert_eq!(out, "numbers");
        assert_eq!(output.meta["title"], Value::String("numbers".into()));
    }

    #[test]
    fn test_config_and_secrets_visible() {
        let mut config = BTreeMap::new();
        config.insert("limit".to_string(), Value::String("3".into()));
        let mut secrets = Secrets::new();
        secrets.insert("token".to_string(), "s3cr3t".to_string());

        let (out, result) = run_transform(
            r#"fn transform(ds, ctx) {
                print(ctx.get_config("limit"));
                print(ctx.get_secret("token"));
                if type_of(ctx.get_config("missing")) == "()" { print("!"); }
                ds.set_body([]);
            }"#,
            config,
            secrets,
        );
        result.unwrap();
        assert_eq!(out, "3s3cr3t!");
    }

    #[test]
    fn test_top_level_runs_first() {
        let (out, result) = run_transform(
            "print(\"top\");\nfn transform(ds, ctx) { print(\"fn\"); ds.set_body([]); }",
            BTreeMap::new(),
            Secrets::new(),
        );
        result.unwrap();
        assert_eq!(out, "topfn");
    }

    #[test]
    fn test_missing_entrypoint() {
        let (_, result) = run_transform("let x = 1;", BTreeMap::new(), Secrets::new());
        match result {
            Err(DatasetError::Script(e)) => assert!(e.message.contains("fn transform")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_script_error_is_raw() {
        let (_, result) = run_transform(
            "fn transform(ds, ctx) {\n  throw \"nope\";\n}",
            BTreeMap::new(),
            Secrets::new(),
        );
        match result {
            Err(DatasetError::Script(e)) => {
                assert!(e.to_string().contains("exec_script"));
                assert!(e.message.contains("nope"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_transform_can_import_builtins() {
        let (_, result) = run_transform(
            "fn transform(ds, ctx) {\n  import \"hash\" as hash;\n  ds.set_body([hash::sha256(\"\")]);\n}",
            BTreeMap::new(),
            Secrets::new(),
        );
        let body = result.unwrap().body.unwrap();
        assert_eq!(body[0].as_str().unwrap().len(), 64);
    }
}
