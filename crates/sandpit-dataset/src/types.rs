//! Dataset model.
//!
//! ```text
//! Dataset ─┬─ commit      when/why it was created
//!          ├─ meta        free-form descriptive fields
//!          ├─ structure   format + schema + body stats
//!          ├─ transform   script reference + config (never secrets)
//!          └─ body        materialized data, attached on read
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::value::RawValue;

use crate::error::DatasetError;

/// Kind tags carried by each component, mirroring the on-disk format.
pub(crate) mod kinds {
    pub const DATASET: &str = "ds:0";
    pub const COMMIT: &str = "cm:0";
    pub const META: &str = "md:0";
    pub const STRUCTURE: &str = "st:0";
    pub const TRANSFORM: &str = "tf:0";
}

/// Syntax identifier recorded on transforms.
pub const TRANSFORM_SYNTAX: &str = "rhai";

/// Body encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    /// JSON document.
    #[default]
    Json,
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for DataFormat {
    type Err = DatasetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(DataFormat::Json),
            other => Err(DatasetError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Secrets handed to a transform. Never serialized.
pub type Secrets = BTreeMap<String, String>;

/// A dataset document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    /// Kind tag (`ds:0`).
    #[serde(default)]
    pub qri: String,
    /// Content address of this dataset, set when read back from storage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Owning peer.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub peername: String,
    /// Dataset name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<Commit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<Structure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    /// Content address of the stored body.
    #[serde(default, rename = "bodyPath", skip_serializing_if = "Option::is_none")]
    pub body_path: Option<String>,
    /// Materialized body, emitted verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Box<RawValue>>,
}

impl Dataset {
    /// An empty dataset with its kind tag set.
    pub fn new() -> Self {
        Self {
            qri: kinds::DATASET.to_string(),
            ..Default::default()
        }
    }
}

/// Creation record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub qri: String,
    pub title: String,
    pub timestamp: DateTime<Utc>,
}

impl Commit {
    /// A commit stamped now.
    pub fn now(title: impl Into<String>) -> Self {
        Self {
            qri: kinds::COMMIT.to_string(),
            title: title.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Free-form descriptive metadata (`title`, `description`, `keywords`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub qri: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl Meta {
    /// Empty metadata with its kind tag set.
    pub fn new() -> Self {
        Self {
            qri: kinds::META.to_string(),
            fields: BTreeMap::new(),
        }
    }

    /// Set one field.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    /// The `title` field, if it is a string.
    pub fn title(&self) -> Option<&str> {
        self.fields.get("title").and_then(Value::as_str)
    }
}

/// Body format, schema and statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    #[serde(default)]
    pub qri: String,
    pub format: DataFormat,
    pub schema: Value,
    /// Number of top-level entries in the body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<usize>,
    /// Encoded body size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
    /// SHA-256 of the encoded body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Script reference and configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    #[serde(default)]
    pub qri: String,
    pub syntax: String,
    /// Where the script lives. A local file before creation; a content
    /// address afterwards.
    #[serde(rename = "scriptPath")]
    pub script_path: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, Value>,
}

/// Reference to a stored dataset.
#[derive(Debug, Clone, Default)]
pub struct DatasetRef {
    pub peername: String,
    pub name: String,
    /// Content address of the dataset document.
    pub path: String,
    /// Populated by [`crate::actions::read_dataset`].
    pub dataset: Option<Dataset>,
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.peername, self.name, self.path)
    }
}

/// Declared output structure of a transform.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureDescriptor {
    pub format: String,
    pub schema: Value,
}

impl Default for StructureDescriptor {
    fn default() -> Self {
        Self {
            format: DataFormat::Json.to_string(),
            schema: serde_json::json!({ "type": "array" }),
        }
    }
}

/// Input contract of the dataset engine: a script plus everything it needs.
#[derive(Debug, Clone, Default)]
pub struct TransformDescriptor {
    pub structure: StructureDescriptor,
    pub script_path: PathBuf,
    pub config: BTreeMap<String, Value>,
    pub secrets: Secrets,
    pub meta: Meta,
}

impl TransformDescriptor {
    /// Descriptor for `script_path` with a JSON array body.
    pub fn for_script(script_path: impl Into<PathBuf>) -> Self {
        Self {
            script_path: script_path.into(),
            meta: Meta::new(),
            ..Default::default()
        }
    }

    /// Set config from string pairs.
    pub fn with_config(mut self, config: BTreeMap<String, String>) -> Self {
        self.config = config
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        self
    }

    /// Set secrets.
    pub fn with_secrets(mut self, secrets: Secrets) -> Self {
        self.secrets = secrets;
        self
    }

    /// Override the declared structure.
    pub fn with_structure(mut self, format: impl Into<String>, schema: Value) -> Self {
        self.structure = StructureDescriptor {
            format: format.into(),
            schema,
        };
        self
    }
}
