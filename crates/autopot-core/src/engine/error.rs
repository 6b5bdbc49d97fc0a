use crate::core::fitting::shift::ShiftError;
use crate::core::io::active_set::AsiError;
use crate::core::io::potential::PotentialError;
use crate::core::io::projection::ProjectionError;
use crate::core::io::xyz::XyzError;
use crate::core::models::descriptors::DescriptorError;
use crate::core::selection::maxvol::SelectionError;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::config::ConfigError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("selection failed: {0}")]
    Selection(#[from] SelectionError),

    #[error("descriptor assembly failed: {0}")]
    Descriptors(#[from] DescriptorError),

    #[error("energy shift failed: {0}")]
    Shift(#[from] ShiftError),

    #[error("structure I/O failed: {0}")]
    Structures(#[from] XyzError),

    #[error("active-set file error: {0}")]
    ActiveSetFile(#[from] AsiError),

    #[error("potential file error: {0}")]
    Potential(#[from] PotentialError),

    #[error("projection dump error: {0}")]
    Projections(#[from] ProjectionError),

    #[error("stage '{stage}' failed: {reason}")]
    StageFailed { stage: &'static str, reason: String },

    #[error("required output missing or empty: {path}", path = path.display())]
    MissingOutput { path: PathBuf },

    #[error("job submission failed for '{script}': {reason}", script = script.display())]
    Submission { script: PathBuf, reason: String },

    #[error("surrogate evaluation failed: {reason}")]
    Evaluation { reason: String },

    #[error("I/O error at {path}: {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Attaches the offending path to a raw I/O error.
pub(crate) fn io_err(path: &Path, source: io::Error) -> EngineError {
    EngineError::Io {
        path: path.to_path_buf(),
        source,
    }
}
