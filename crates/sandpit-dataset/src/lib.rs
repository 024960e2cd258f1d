//! Ephemeral datasets built by transform scripts.
//!
//! A [`Node`] owns a content-addressed [`Store`], a table of named refs and
//! the [`Interpreter`](sandpit_script::Interpreter) transforms run on. The
//! [`actions`] module exposes the dataset lifecycle; [`ephemeral`] strings
//! it together into the single-use create, read, serialize, delete flow
//! behind `POST /qri`.
//!
//! ```no_run
//! use sandpit_dataset::{Node, TransformRequest, run_transform};
//! use sandpit_script::Interpreter;
//!
//! let mut node = Node::new(Interpreter::default());
//! let script = b"fn transform(ds, ctx) { ds.set_body([1, 2, 3]); }";
//! run_transform(&mut node, script, &TransformRequest::new(), |result| {
//!     match result {
//!         Ok(json) => println!("{}", String::from_utf8_lossy(&json)),
//!         Err(e) => eprintln!("{e}"),
//!     }
//! });
//! ```

pub mod actions;
pub mod ephemeral;
mod error;
mod node;
pub mod params;
mod store;
pub mod transform;
mod types;

pub use actions::{create_dataset, delete_dataset, lookup_body, new_dataset, read_dataset};
pub use ephemeral::{
    EPHEMERAL_DATASET_NAME, Lifecycle, PipelineState, TransformRequest, run_transform,
    run_transform_guarded,
};
pub use error::{DatasetError, ParamError, PipelineError, Result};
pub use node::{DEFAULT_PEERNAME, Node};
pub use params::{parse_flat_list, parse_flat_pairs, split_flat_list};
pub use store::{MemStore, Store};
pub use transform::{DatasetHandle, TransformContext, TransformOutput};
pub use types::{
    Commit, DataFormat, Dataset, DatasetRef, Meta, Secrets, Structure, StructureDescriptor,
    Transform, TransformDescriptor,
};
