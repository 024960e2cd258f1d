//! Request-scoped temp-file staging for script payloads.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::StagingError;

/// Filename prefix for staged scripts.
const STAGED_PREFIX: &str = "exec_script";

/// Filename suffix for staged scripts.
const STAGED_SUFFIX: &str = ".rhai";

/// A script payload persisted to a uniquely named temporary file.
///
/// The file is removed by [`StagedScript::release`]; if the value is dropped
/// without an explicit release (early return, panic unwind) the file is
/// removed on drop instead. Removal failures are logged, never returned.
#[derive(Debug)]
pub struct StagedScript {
    file: Option<NamedTempFile>,
    path: PathBuf,
}

impl StagedScript {
    /// Path of the staged file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the staged file as a string, for textual error rewriting.
    pub fn path_str(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Remove the staged file.
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if let Some(file) = self.file.take() {
            match file.close() {
                Ok(()) => debug!(path = %self.path.display(), "Released staged script"),
                Err(e) => warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove staged script"
                ),
            }
        }
    }
}

impl Drop for StagedScript {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Stage `bytes` in the system temp directory.
pub fn stage(bytes: &[u8]) -> Result<StagedScript, StagingError> {
    stage_in(&std::env::temp_dir(), bytes)
}

/// Stage `bytes` in `dir`.
pub fn stage_in(dir: &Path, bytes: &[u8]) -> Result<StagedScript, StagingError> {
    let mut file = tempfile::Builder::new()
        .prefix(STAGED_PREFIX)
        .suffix(STAGED_SUFFIX)
        .tempfile_in(dir)
        .map_err(StagingError::Allocate)?;

    let path = file.path().to_path_buf();

    // The NamedTempFile is owned by the staged script from here on, so a
    // failed write still removes the file when `staged` drops.
    let write = file.write_all(bytes).and_then(|_| file.flush());
    let staged = StagedScript {
        file: Some(file),
        path: path.clone(),
    };
    if let Err(source) = write {
        return Err(StagingError::Write { path, source });
    }

    debug!(path = %staged.path.display(), bytes = bytes.len(), "Staged script");
    Ok(staged)
}
