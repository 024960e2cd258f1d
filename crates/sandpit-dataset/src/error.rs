//! Error types for the dataset engine and the ephemeral pipeline.

use sandpit_script::{GuardError, ScriptError, StagingError};
use thiserror::Error;

/// Result type for dataset operations.
pub type Result<T> = std::result::Result<T, DatasetError>;

/// A flat `key,value,...` list had an odd number of entries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    /// Odd number of values.
    #[error("expected even number of (key,value) pairs for {field}, got {count} values")]
    OddLength { field: String, count: usize },
}

/// Errors from dataset engine operations.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The dataset descriptor is malformed.
    #[error("invalid dataset: {0}")]
    Invalid(String),

    /// Unknown body format.
    #[error("unsupported data format: {0}")]
    UnsupportedFormat(String),

    /// The transform script failed. Carries the raw interpreter error.
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// The transform ran but did not produce a usable dataset.
    #[error("transform error: {0}")]
    Transform(String),

    /// The body does not satisfy the declared schema.
    #[error("body does not match schema: {0}")]
    Schema(String),

    /// Nothing is stored under the given path or name.
    #[error("not found: {0}")]
    NotFound(String),

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing store failed.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors from the ephemeral pipeline, one variant per stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The script could not be staged.
    #[error("{0}")]
    Staging(#[from] StagingError),

    /// Config or secrets could not be parsed.
    #[error("{0}")]
    Params(#[from] ParamError),

    /// The transform descriptor was rejected before execution.
    #[error("{0}")]
    Configure(DatasetError),

    /// Dataset creation failed. The message is already sanitized.
    #[error("{message}")]
    Create { message: String },

    /// The created dataset could not be read back.
    #[error("error reading dataset: {0}")]
    Read(DatasetError),

    /// The dataset could not be serialized.
    #[error("error serializing dataset: {0}")]
    Serialize(DatasetError),

    /// The execution guard's worker failed.
    #[error("{0}")]
    Guard(#[from] GuardError),
}

impl PipelineError {
    /// Whether the caller is at fault (bad parameters).
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::Params(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_error_display() {
        let err = ParamError::OddLength {
            field: "config".to_string(),
            count: 3,
        };
        assert_eq!(
            err.to_string(),
            "expected even number of (key,value) pairs for config, got 3 values"
        );
    }

    #[test]
    fn test_client_error_classification() {
        let params: PipelineError = ParamError::OddLength {
            field: "secrets".to_string(),
            count: 1,
        }
        .into();
        assert!(params.is_client_error());

        let create = PipelineError::Create {
            message: "line:1:1: boom".to_string(),
        };
        assert!(!create.is_client_error());
        assert_eq!(create.to_string(), "line:1:1: boom");
    }
}
