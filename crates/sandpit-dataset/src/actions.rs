//! Dataset lifecycle operations on a [`Node`].
//!
//! ```text
//! new_dataset ──▶ create_dataset ──▶ read_dataset ──▶ lookup_body
//!                       │                                  │
//!                       └──────────── delete_dataset ◀─────┘
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{DatasetError, Result};
use crate::node::Node;
use crate::transform;
use crate::types::{
    Commit, DataFormat, Dataset, DatasetRef, Meta, Secrets, Structure, TRANSFORM_SYNTAX, Transform,
    TransformDescriptor, kinds,
};

/// Commit title stamped on every created dataset.
pub const CREATE_COMMIT_TITLE: &str = "created dataset";

/// Build an in-memory dataset from a descriptor, splitting off its secrets.
///
/// Validates everything that can be checked without running the script.
pub fn new_dataset(descriptor: TransformDescriptor) -> Result<(Dataset, Secrets)> {
    if descriptor.script_path.as_os_str().is_empty() {
        return Err(DatasetError::Invalid("transform script path is required".into()));
    }
    let format: DataFormat = descriptor.structure.format.parse()?;
    if !descriptor.structure.schema.is_object() {
        return Err(DatasetError::Invalid("schema must be a JSON object".into()));
    }

    let mut ds = Dataset::new();
    ds.structure = Some(Structure {
        qri: kinds::STRUCTURE.to_string(),
        format,
        schema: descriptor.structure.schema,
        entries: None,
        length: None,
        checksum: None,
    });
    ds.transform = Some(Transform {
        qri: kinds::TRANSFORM.to_string(),
        syntax: TRANSFORM_SYNTAX.to_string(),
        script_path: descriptor.script_path.to_string_lossy().into_owned(),
        config: descriptor.config,
    });
    let mut meta = descriptor.meta;
    meta.qri = kinds::META.to_string();
    ds.meta = Some(meta);

    Ok((ds, descriptor.secrets))
}

/// Run the dataset's transform and persist the result under `name`.
///
/// Script errors are returned raw ([`DatasetError::Script`]). Nothing stays
/// in the store if creation fails.
pub fn create_dataset(
    node: &mut Node,
    name: &str,
    mut ds: Dataset,
    secrets: Secrets,
) -> Result<DatasetRef> {
    validate_name(name)?;

    let mut tf = ds
        .transform
        .take()
        .ok_or_else(|| DatasetError::Invalid("dataset has no transform".into()))?;
    let mut structure = ds
        .structure
        .take()
        .ok_or_else(|| DatasetError::Invalid("dataset has no structure".into()))?;

    let script_path = Path::new(&tf.script_path).to_path_buf();
    debug!(name, script = %script_path.display(), "Running transform");

    let output = transform::execute(
        node.interpreter(),
        node.output(),
        &script_path,
        tf.config.clone(),
        secrets,
    )?;

    let body = output
        .body
        .ok_or_else(|| DatasetError::Transform("transform did not set a body".into()))?;
    validate_schema(&structure.schema, &body)?;

    let body_bytes = serde_json::to_vec(&body)?;
    structure.entries = Some(count_entries(&body));
    structure.length = Some(body_bytes.len());
    structure.checksum = Some(hex::encode(Sha256::digest(&body_bytes)));

    let script_bytes = std::fs::read(&script_path).map_err(|e| {
        DatasetError::Storage(format!("reading transform script: {e}"))
    })?;

    if !output.meta.is_empty() {
        let meta = ds.meta.get_or_insert_with(Meta::new);
        meta.fields.extend(output.meta);
    }

    let mut written = Vec::new();
    let result = persist(
        node,
        &mut written,
        name,
        ds,
        structure,
        &mut tf,
        body_bytes,
        script_bytes,
    );

    match result {
        Ok(path) => {
            let previous = node.resolve(name).map(str::to_string);
            node.register(name, &path);
            if let Some(previous) = previous.filter(|p| *p != path) {
                debug!(name, previous = %previous, "Replacing existing dataset ref");
                let collected =
                    load(node, &previous).and_then(|old| drop_blobs(node, previous.clone(), old));
                if let Err(e) = collected {
                    warn!(name, previous = %previous, error = %e, "Failed to collect replaced dataset");
                }
            }
            debug!(name, path = %path, "Created dataset");
            Ok(DatasetRef {
                peername: node.peername().to_string(),
                name: name.to_string(),
                path,
                dataset: None,
            })
        }
        Err(e) => {
            for path in written {
                if let Err(cleanup) = node.store_mut().delete(&path) {
                    warn!(path = %path, error = %cleanup, "Failed to roll back blob");
                }
            }
            Err(e)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn persist(
    node: &mut Node,
    written: &mut Vec<String>,
    name: &str,
    mut ds: Dataset,
    structure: Structure,
    tf: &mut Transform,
    body_bytes: Vec<u8>,
    script_bytes: Vec<u8>,
) -> Result<String> {
    let body_path = put_tracked(node, written, body_bytes)?;
    tf.script_path = put_tracked(node, written, script_bytes)?;

    ds.peername = node.peername().to_string();
    ds.name = name.to_string();
    ds.commit = Some(Commit::now(CREATE_COMMIT_TITLE));
    ds.structure = Some(structure);
    ds.transform = Some(tf.clone());
    ds.body_path = Some(body_path);

    let doc = serde_json::to_vec(&ds)?;
    put_tracked(node, written, doc)
}

/// Put `data`, remembering the path only if this call created it.
fn put_tracked(node: &mut Node, written: &mut Vec<String>, data: Vec<u8>) -> Result<String> {
    let before = node.store().len();
    let path = node.store_mut().put(data)?;
    if node.store().len() > before {
        written.push(path.clone());
    }
    Ok(path)
}

/// Load the stored dataset `r` points at into `r.dataset`.
///
/// Resolves by name when `r.path` is empty.
pub fn read_dataset(node: &Node, r: &mut DatasetRef) -> Result<()> {
    if r.path.is_empty() {
        r.path = node
            .resolve(&r.name)
            .ok_or_else(|| DatasetError::NotFound(r.name.clone()))?
            .to_string();
    }

    let bytes = node.store().get(&r.path)?;
    let mut ds: Dataset = serde_json::from_slice(&bytes)?;
    ds.path = Some(r.path.clone());
    r.dataset = Some(ds);
    Ok(())
}

/// Fetch a stored body, re-encoded in `format`.
///
/// With `all`, the whole body is returned. Otherwise array bodies are
/// windowed by `offset` and `limit` (`limit == 0` means no upper bound);
/// other bodies are returned whole.
pub fn lookup_body(
    node: &Node,
    body_path: &str,
    format: DataFormat,
    limit: usize,
    offset: usize,
    all: bool,
) -> Result<Vec<u8>> {
    let bytes = node.store().get(body_path)?;
    if all {
        return Ok(bytes);
    }

    let body: Value = serde_json::from_slice(&bytes)?;
    let window = match body {
        Value::Array(items) => {
            let iter = items.into_iter().skip(offset);
            let items: Vec<Value> = if limit == 0 {
                iter.collect()
            } else {
                iter.take(limit).collect()
            };
            Value::Array(items)
        }
        other => other,
    };

    match format {
        DataFormat::Json => Ok(serde_json::to_vec(&window)?),
    }
}

/// Remove the dataset `r` names, along with blobs no other dataset uses.
pub fn delete_dataset(node: &mut Node, r: &DatasetRef) -> Result<()> {
    let path = node
        .resolve(&r.name)
        .ok_or_else(|| DatasetError::NotFound(r.to_string()))?
        .to_string();

    let ds = load(node, &path)?;
    node.unregister(&r.name);
    drop_blobs(node, path, ds)?;

    debug!(dataset = %r, "Deleted dataset");
    Ok(())
}

fn load(node: &Node, path: &str) -> Result<Dataset> {
    let bytes = node.store().get(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Delete the blobs of `ds` (stored at `path`) that no registered ref uses.
fn drop_blobs(node: &mut Node, path: String, ds: Dataset) -> Result<()> {
    let shared = referenced_blobs(node);
    let mut owned = vec![path];
    owned.extend(ds.body_path);
    owned.extend(ds.transform.map(|t| t.script_path));

    for blob in owned {
        if shared.contains(&blob) || !node.store().has(&blob) {
            continue;
        }
        node.store_mut().delete(&blob)?;
    }
    Ok(())
}

/// Every blob reachable from a registered ref.
fn referenced_blobs(node: &Node) -> BTreeSet<String> {
    let mut blobs = BTreeSet::new();
    for name in node.names() {
        let Some(path) = node.resolve(name) else {
            continue;
        };
        blobs.insert(path.to_string());
        let Ok(bytes) = node.store().get(path) else {
            continue;
        };
        if let Ok(ds) = serde_json::from_slice::<Dataset>(&bytes) {
            blobs.extend(ds.body_path);
            blobs.extend(ds.transform.map(|t| t.script_path));
        }
    }
    blobs
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DatasetError::Invalid("dataset name is required".into()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(DatasetError::Invalid(format!(
            "dataset name {name:?} may only contain letters, digits, '_' and '-'"
        )));
    }
    Ok(())
}

/// Check `body` against the top-level `type` keyword of `schema`.
pub fn validate_schema(schema: &Value, body: &Value) -> Result<()> {
    let Some(expected) = schema.get("type") else {
        return Ok(());
    };
    let expected = expected
        .as_str()
        .ok_or_else(|| DatasetError::Schema("schema type must be a string".into()))?;

    let ok = match expected {
        "array" => body.is_array(),
        "object" => body.is_object(),
        "string" => body.is_string(),
        "number" => body.is_number(),
        "integer" => body.is_i64() || body.is_u64(),
        "boolean" => body.is_boolean(),
        "null" => body.is_null(),
        other => {
            return Err(DatasetError::Schema(format!("unknown schema type {other:?}")));
        }
    };

    if ok {
        Ok(())
    } else {
        Err(DatasetError::Schema(format!(
            "expected {expected}, got {}",
            json_type_name(body)
        )))
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn count_entries(body: &Value) -> usize {
    match body {
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        _ => 1,
    }
}
