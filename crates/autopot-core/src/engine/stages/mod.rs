//! The five per-iteration stages of the active-learning loop.
//!
//! Every stage receives its working directory explicitly through the
//! iteration layout, honors an existing checkpoint marker in restart mode,
//! and writes the marker only after its outputs are complete.

pub mod explore;
pub mod fit;
pub mod label;
pub mod select_active;
pub mod select_new;

use super::error::{EngineError, io_err};
use super::scheduler::JobSpec;
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) fn ensure_dir(dir: &Path) -> Result<(), EngineError> {
    fs::create_dir_all(dir).map_err(|e| io_err(dir, e))
}

pub(crate) fn copy_file(from: &Path, to: &Path) -> Result<(), EngineError> {
    fs::copy(from, to).map(|_| ()).map_err(|e| io_err(from, e))
}

/// A required input or produced output must exist and be non-empty.
pub(crate) fn require_nonempty(path: &Path) -> Result<(), EngineError> {
    match fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(EngineError::MissingOutput {
            path: path.to_path_buf(),
        }),
    }
}

/// Stages a job script into the task directory and builds its submission.
pub(crate) fn stage_script(script: &Path, dir: &Path) -> Result<JobSpec, EngineError> {
    let name = script.file_name().ok_or_else(|| EngineError::Submission {
        script: script.to_path_buf(),
        reason: "script path has no file name".to_string(),
    })?;
    let staged: PathBuf = dir.join(name);
    copy_file(script, &staged)?;
    Ok(JobSpec {
        script: staged,
        workdir: dir.to_path_buf(),
    })
}
