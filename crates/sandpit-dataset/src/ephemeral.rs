//! Single-use dataset lifecycle: stage, create, read, serialize, respond,
//! delete.
//!
//! The whole lifecycle runs against one [`Node`] while the caller holds
//! exclusive access to it. The response is handed to `respond` before the
//! dataset is deleted; deletion is attempted whenever creation succeeded
//! and its failure is only logged.

use std::fmt;

use sandpit_script::{ExecutionGuard, GuardError, StagedScript, sanitize, stage_in};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::value::RawValue;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::actions::{create_dataset, delete_dataset, lookup_body, new_dataset, read_dataset};
use crate::error::{DatasetError, PipelineError};
use crate::node::Node;
use crate::params::parse_flat_list;
use crate::types::{DataFormat, DatasetRef, TransformDescriptor};

/// Name every ephemeral dataset is created under.
pub const EPHEMERAL_DATASET_NAME: &str = "test_dataset";

/// Form field carrying transform config.
pub const CONFIG_FIELD: &str = "config";

/// Form field carrying transform secrets.
pub const SECRETS_FIELD: &str = "secrets";

/// Raw, unparsed parameters for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct TransformRequest {
    /// Dataset name; defaults to [`EPHEMERAL_DATASET_NAME`].
    pub name: Option<String>,
    /// Comma-separated `key,value,...` list.
    pub config: Option<String>,
    /// Comma-separated `key,value,...` list.
    pub secrets: Option<String>,
}

impl TransformRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, raw: impl Into<String>) -> Self {
        self.config = Some(raw.into());
        self
    }

    pub fn with_secrets(mut self, raw: impl Into<String>) -> Self {
        self.secrets = Some(raw.into());
        self
    }

    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(EPHEMERAL_DATASET_NAME)
    }
}

/// Lifecycle position of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Staging,
    Configuring,
    Creating,
    Reading,
    Serializing,
    Responded,
    Deleting,
    Done,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineState::Staging => "staging",
            PipelineState::Configuring => "configuring",
            PipelineState::Creating => "creating",
            PipelineState::Reading => "reading",
            PipelineState::Serializing => "serializing",
            PipelineState::Responded => "responded",
            PipelineState::Deleting => "deleting",
            PipelineState::Done => "done",
        };
        f.write_str(s)
    }
}

/// States visited by one run, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lifecycle {
    pub states: Vec<PipelineState>,
}

impl Lifecycle {
    fn enter(&mut self, state: PipelineState) {
        debug!(state = %state, "Pipeline state");
        self.states.push(state);
    }

    /// Whether the run reached `state`.
    pub fn visited(&self, state: PipelineState) -> bool {
        self.states.contains(&state)
    }
}

/// Run the full lifecycle for `script` on `node`.
///
/// `respond` is called exactly once, with either the pretty-printed dataset
/// or the first failure. Script errors are sanitized against the staged
/// path before they reach `respond`.
pub fn run_transform<F>(
    node: &mut Node,
    script: &[u8],
    request: &TransformRequest,
    respond: F,
) -> Lifecycle
where
    F: FnOnce(Result<Vec<u8>, PipelineError>),
{
    let mut lifecycle = Lifecycle::default();

    lifecycle.enter(PipelineState::Staging);
    let staged = match stage_in(node.staging_dir(), script) {
        Ok(s) => s,
        Err(e) => {
            respond(Err(e.into()));
            lifecycle.enter(PipelineState::Done);
            return lifecycle;
        }
    };

    lifecycle.enter(PipelineState::Configuring);
    let mut created: Option<DatasetRef> = None;
    let result = configure(&staged, request).and_then(|descriptor| {
        lifecycle.enter(PipelineState::Creating);
        let (ds, secrets) = new_dataset(descriptor).map_err(PipelineError::Configure)?;
        let r = create_dataset(node, request.name(), ds, secrets).map_err(|e| {
            PipelineError::Create {
                message: sanitize(&e.to_string(), staged.path()),
            }
        })?;
        created = Some(r.clone());

        lifecycle.enter(PipelineState::Reading);
        let mut r = r;
        read_dataset(node, &mut r).map_err(PipelineError::Read)?;

        lifecycle.enter(PipelineState::Serializing);
        serialize(node, r)
    });

    // The script bytes are in the store by now; the staged file is not
    // needed past this point.
    staged.release();
    respond(result);
    lifecycle.enter(PipelineState::Responded);

    if let Some(r) = created {
        lifecycle.enter(PipelineState::Deleting);
        if let Err(e) = delete_dataset(node, &r) {
            warn!(dataset = %r, error = %e, "Failed to delete ephemeral dataset");
        }
    }

    lifecycle.enter(PipelineState::Done);
    lifecycle
}

/// Run the lifecycle under `guard`, returning as soon as the response is
/// ready. Deletion finishes in the background while the guard is still
/// held.
pub async fn run_transform_guarded(
    guard: &ExecutionGuard<Node>,
    script: Vec<u8>,
    request: TransformRequest,
) -> Result<Vec<u8>, PipelineError> {
    let (tx, rx) = oneshot::channel();
    let guard = guard.clone();

    let worker = tokio::spawn(async move {
        guard
            .with_exclusive_access(move |node| {
                run_transform(node, &script, &request, move |result| {
                    let _ = tx.send(result);
                })
            })
            .await
    });

    if let Ok(result) = rx.await {
        return result;
    }

    // The sender only drops unanswered if the worker never ran the pipeline
    // to the point of responding.
    match worker.await {
        Ok(Err(e)) => Err(e.into()),
        Ok(Ok(_)) => Err(PipelineError::Guard(GuardError::Worker(
            "pipeline finished without a response".to_string(),
        ))),
        Err(e) => Err(PipelineError::Guard(GuardError::Worker(e.to_string()))),
    }
}

fn configure(
    staged: &StagedScript,
    request: &TransformRequest,
) -> Result<TransformDescriptor, PipelineError> {
    let mut descriptor = TransformDescriptor::for_script(staged.path());
    if let Some(config) = parse_flat_list(CONFIG_FIELD, request.config.as_deref())? {
        descriptor = descriptor.with_config(config);
    }
    if let Some(secrets) = parse_flat_list(SECRETS_FIELD, request.secrets.as_deref())? {
        descriptor = descriptor.with_secrets(secrets);
    }
    Ok(descriptor)
}

/// Attach the body and render the dataset with tab indentation.
fn serialize(node: &Node, r: DatasetRef) -> Result<Vec<u8>, PipelineError> {
    let mut ds = r
        .dataset
        .ok_or_else(|| PipelineError::Read(DatasetError::NotFound(r.path.clone())))?;
    let body_path = ds
        .body_path
        .clone()
        .ok_or_else(|| PipelineError::Read(DatasetError::Invalid("dataset has no body".into())))?;

    let body = lookup_body(node, &body_path, DataFormat::Json, 0, 0, true)
        .map_err(PipelineError::Read)?;
    let body = String::from_utf8(body)
        .map_err(|e| PipelineError::Serialize(DatasetError::Invalid(e.to_string())))?;
    ds.body = Some(
        RawValue::from_string(body)
            .map_err(|e| PipelineError::Serialize(DatasetError::Serialization(e)))?,
    );

    let mut out = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"\t");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    ds.serialize(&mut ser)
        .map_err(|e| PipelineError::Serialize(DatasetError::Serialization(e)))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandpit_script::Interpreter;

    fn run(
        node: &mut Node,
        script: &str,
        request: TransformRequest,
    ) -> (Lifecycle, Result<Vec<u8>, PipelineError>) {
        let mut response = None;
        let lifecycle = run_transform(node, script.as_bytes(), &request, |r| response = Some(r));
        (lifecycle, response.expect("respond was called"))
    }

    #[test]
    fn test_success_visits_every_state() {
        let mut node = Node::new(Interpreter::default());
        let (lifecycle, result) = run(
            &mut node,
            "fn transform(ds, ctx) { ds.set_body([1, 2, 3]); }",
            TransformRequest::new(),
        );
        let text = String::from_utf8(result.unwrap()).unwrap();
        assert!(text.contains("\"body\": [1,2,3]"));
        assert!(text.contains("\n\t\"qri\": \"ds:0\""));
        assert_eq!(
            lifecycle.states,
            vec![
                PipelineState::Staging,
                PipelineState::Configuring,
                PipelineState::Creating,
                PipelineState::Reading,
                PipelineState::Serializing,
                PipelineState::Responded,
                PipelineState::Deleting,
                PipelineState::Done,
            ]
        );
        assert_eq!(node.resolve(EPHEMERAL_DATASET_NAME), None);
        assert!(node.store().is_empty());
    }

    #[test]
    fn test_odd_config_fails_before_creation() {
        let mut node = Node::new(Interpreter::default());
        let (lifecycle, result) = run(
            &mut node,
            "fn transform(ds, ctx) { ds.set_body([]); }",
            TransformRequest::new().with_config("key"),
        );
        let err = result.unwrap_err();
        assert!(err.is_client_error());
        assert!(!lifecycle.visited(PipelineState::Creating));
        assert!(!lifecycle.visited(PipelineState::Deleting));
        assert!(node.store().is_empty());
    }

    #[test]
    fn test_script_error_is_sanitized() {
        let mut node = Node::new(Interpreter::default());
        let (lifecycle, result) = run(
            &mut node,
            "fn transform(ds, ctx) {\n  throw \"nope\";\n}",
            TransformRequest::new(),
        );
        let msg = result.unwrap_err().to_string();
        assert!(msg.starts_with("line:"), "{msg}");
        assert!(!msg.contains("exec_script"));
        assert!(!lifecycle.visited(PipelineState::Deleting));
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let mut node = Node::new(Interpreter::default());
        let (_, result) = run(
            &mut node,
            "fn transform(ds, ctx) { ds.set_body([ctx.get_config(\"a\")]); }",
            TransformRequest::new()
                .with_config("a,1")
                .with_secrets("token,hunter2"),
        );
        let text = String::from_utf8(result.unwrap()).unwrap();
        assert!(text.contains("\"body\": [\"1\"]"));
        assert!(!text.contains("hunter2"));
    }

    #[test]
    fn test_staged_script_is_released_before_respond() {
        let dir = tempfile::tempdir().unwrap();
        let mut node = Node::new(Interpreter::default()).with_staging_dir(dir.path());
        let mut left = None;
        run_transform(
            &mut node,
            b"fn transform(ds, ctx) { ds.set_body([1]); }",
            &TransformRequest::new(),
            |result| {
                assert!(result.is_ok());
                left = Some(std::fs::read_dir(dir.path()).unwrap().count());
            },
        );
        assert_eq!(left, Some(0));
    }

    #[test]
    fn test_staged_script_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let mut node = Node::new(Interpreter::default()).with_staging_dir(dir.path());
        let _ = run(&mut node, "fn transform(ds, ctx) { [] }", TransformRequest::new());
        let _ = run(&mut node, "fn transform(ds, ctx) { throw 1; }", TransformRequest::new());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_guarded_run() {
        let guard = ExecutionGuard::new(Node::new(Interpreter::default()));
        let bytes = run_transform_guarded(
            &guard,
            b"fn transform(ds, ctx) { ds.set_body([1]); }".to_vec(),
            TransformRequest::new(),
        )
        .await
        .unwrap();
        assert!(String::from_utf8(bytes).unwrap().contains("\"body\": [1]"));

        let empty = guard
            .with_exclusive_access(|node| node.store().is_empty())
            .await
            .unwrap();
        assert!(empty);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_guarded_runs_always_answer() {
        let guard = ExecutionGuard::new(Node::new(Interpreter::default()));
        for i in 0..200 {
            let result = run_transform_guarded(
                &guard,
                b"fn transform(ds, ctx) { ds.set_body([1]); }".to_vec(),
                TransformRequest::new(),
            )
            .await;
            assert!(result.is_ok(), "run {i} failed: {:?}", result.err());
        }
    }
}
