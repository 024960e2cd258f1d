//! Built-in module library available to `import` statements.
//!
//! | Module | Functions |
//! |--------|-----------|
//! | `json` | `encode(value)`, `encode_pretty(value)`, `decode(text)` |
//! | `time` | `now()`, `format(ts, fmt)`, `iso8601()` |
//! | `hash` | `sha256(text)` |

use std::collections::BTreeMap;

use rhai::module_resolvers::StaticModuleResolver;
use rhai::{Dynamic, EvalAltResult, INT, ImmutableString, Module, Shared};
use sha2::{Digest, Sha256};

type FnResult<T> = Result<T, Box<EvalAltResult>>;

/// Named modules that scripts may import.
#[derive(Clone)]
pub struct ModuleLibrary {
    modules: BTreeMap<String, Shared<Module>>,
}

impl std::fmt::Debug for ModuleLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleLibrary")
            .field("modules", &self.names())
            .finish()
    }
}

impl Default for ModuleLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ModuleLibrary {
    /// An empty library.
    pub fn empty() -> Self {
        Self {
            modules: BTreeMap::new(),
        }
    }

    /// The standard set: `json`, `time`, `hash`.
    pub fn builtin() -> Self {
        Self::empty()
            .with_module("json", json_module())
            .with_module("time", time_module())
            .with_module("hash", hash_module())
    }

    /// Add or replace a module.
    pub fn with_module(mut self, name: impl Into<String>, module: Module) -> Self {
        let mut module = module;
        module.build_index();
        self.modules.insert(name.into(), Shared::new(module));
        self
    }

    /// Names of all modules, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.modules.keys().map(String::as_str).collect()
    }

    /// Whether `name` resolves.
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Build a resolver over this library.
    pub(crate) fn resolver(&self) -> StaticModuleResolver {
        let mut resolver = StaticModuleResolver::new();
        for (name, module) in &self.modules {
            resolver.insert(name.as_str(), (**module).clone());
        }
        resolver
    }
}

fn json_module() -> Module {
    let mut m = Module::new();
    m.set_native_fn("encode", |value: Dynamic| -> FnResult<String> {
        let v: serde_json::Value = rhai::serde::from_dynamic(&value)?;
        serde_json::to_string(&v).map_err(|e| e.to_string().into())
    });
    m.set_native_fn("encode_pretty", |value: Dynamic| -> FnResult<String> {
        let v: serde_json::Value = rhai::serde::from_dynamic(&value)?;
        serde_json::to_string_pretty(&v).map_err(|e| e.to_string().into())
    });
    m.set_native_fn("decode", |text: ImmutableString| -> FnResult<Dynamic> {
        let v: serde_json::Value =
            serde_json::from_str(text.as_str()).map_err(|e| format!("json.decode: {e}"))?;
        rhai::serde::to_dynamic(v)
    });
    m
}

fn time_module() -> Module {
    let mut m = Module::new();
    m.set_native_fn("now", || -> FnResult<INT> { Ok(chrono::Utc::now().timestamp()) });
    m.set_native_fn("iso8601", || -> FnResult<String> {
        Ok(chrono::Utc::now().to_rfc3339())
    });
    m.set_native_fn("format", |ts: INT, fmt: ImmutableString| -> FnResult<String> {
        let dt = chrono::DateTime::from_timestamp(ts, 0)
            .ok_or_else(|| format!("time.format: timestamp out of range: {ts}"))?;
        Ok(dt.format(fmt.as_str()).to_string())
    });
    m
}

fn hash_module() -> Module {
    let mut m = Module::new();
    m.set_native_fn("sha256", |text: ImmutableString| -> FnResult<String> {
        Ok(hex::encode(Sha256::digest(text.as_bytes())))
    });
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        let lib = ModuleLibrary::builtin();
        assert_eq!(lib.names(), vec!["hash", "json", "time"]);
        assert!(lib.contains("json"));
        assert!(!lib.contains("http"));
    }

    #[test]
    fn test_empty_library() {
        assert!(ModuleLibrary::empty().names().is_empty());
    }

    #[test]
    fn test_custom_module() {
        let mut m = Module::new();
        m.set_var("answer", 42 as INT);
        let lib = ModuleLibrary::empty().with_module("consts", m);
        assert_eq!(lib.names(), vec!["consts"]);
    }

    #[test]
    fn test_resolver_serves_library_modules() {
        let mut m = Module::new();
        m.set_var("answer", 42 as INT);
        let lib = ModuleLibrary::builtin().with_module("consts", m);

        let mut engine = rhai::Engine::new();
        engine.set_module_resolver(lib.resolver());

        let answer: INT = engine.eval(r#"import "consts" as c; c::answer"#).unwrap();
        assert_eq!(answer, 42);
        let digest: String = engine
            .eval(r#"import "hash" as h; h::sha256("abc")"#)
            .unwrap();
        assert_eq!(digest.len(), 64);
    }
}
