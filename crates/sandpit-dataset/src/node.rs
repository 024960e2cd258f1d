//! The shared execution context: store, refs, interpreter and output sink.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sandpit_script::{Interpreter, OutputSink, TracingSink};

use crate::store::{MemStore, Store};

/// Peer name used when none is configured.
pub const DEFAULT_PEERNAME: &str = "sandpit";

/// Owns everything needed to create, read and delete datasets.
///
/// Not thread safe on its own; callers share it through an
/// [`ExecutionGuard`](sandpit_script::ExecutionGuard).
pub struct Node {
    store: Box<dyn Store>,
    refs: BTreeMap<String, String>,
    peername: String,
    interpreter: Interpreter,
    sink: Arc<dyn OutputSink>,
    staging_dir: PathBuf,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("peername", &self.peername)
            .field("refs", &self.refs)
            .field("blobs", &self.store.len())
            .field("staging_dir", &self.staging_dir)
            .finish()
    }
}

impl Node {
    /// A node backed by an in-memory store.
    pub fn new(interpreter: Interpreter) -> Self {
        Self {
            store: Box::new(MemStore::new()),
            refs: BTreeMap::new(),
            peername: DEFAULT_PEERNAME.to_string(),
            interpreter,
            sink: Arc::new(TracingSink::new("transform")),
            staging_dir: std::env::temp_dir(),
        }
    }

    /// Replace the backing store.
    pub fn with_store(mut self, store: impl Store + 'static) -> Self {
        self.store = Box::new(store);
        self
    }

    /// Set the peer name stamped on new datasets.
    pub fn with_peername(mut self, peername: impl Into<String>) -> Self {
        self.peername = peername.into();
        self
    }

    /// Route transform `print` output to `sink`.
    pub fn with_output(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Directory scripts are staged into.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    /// Sink transform `print` output goes to. Defaults to a [`TracingSink`]
    /// labelled `transform`.
    pub fn output(&self) -> Arc<dyn OutputSink> {
        Arc::clone(&self.sink)
    }

    pub fn peername(&self) -> &str {
        &self.peername
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn store_mut(&mut self) -> &mut dyn Store {
        self.store.as_mut()
    }

    /// Path registered under `name`.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.refs.get(name).map(String::as_str)
    }

    /// Names of all registered datasets.
    pub fn names(&self) -> Vec<&str> {
        self.refs.keys().map(String::as_str).collect()
    }

    pub(crate) fn register(&mut self, name: &str, path: &str) {
        self.refs.insert(name.to_string(), path.to_string());
    }

    pub(crate) fn unregister(&mut self, name: &str) -> Option<String> {
        self.refs.remove(name)
    }
}
