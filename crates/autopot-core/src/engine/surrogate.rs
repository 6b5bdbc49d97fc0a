use super::error::{EngineError, io_err};
use super::pipeline::files;
use crate::core::io::projection::ProjectionFile;
use crate::core::io::xyz::write_structures_to_path;
use crate::core::models::structure::Structure;
use nalgebra::DMatrix;
use std::fs;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Seam to the surrogate potential's descriptor computation.
///
/// For every structure the surrogate returns one matrix with a descriptor
/// projection row per atom. How the quantities are computed is opaque to
/// this crate.
pub trait Surrogate {
    fn projections(
        &self,
        potential: &Path,
        structures: &[Structure],
        workdir: &Path,
    ) -> Result<Vec<DMatrix<f64>>, EngineError>;
}

/// Evaluates projections through an external command invoked as
/// `<command> <potential> <structures> <output>`, with the structure file
/// and projection dump staged in the given working directory.
#[derive(Debug, Clone)]
pub struct CommandSurrogate {
    program: String,
    args: Vec<String>,
}

impl CommandSurrogate {
    pub fn new(command: &str) -> Self {
        let mut tokens = command.split_whitespace().map(str::to_string);
        let program = tokens.next().unwrap_or_default();
        Self {
            program,
            args: tokens.collect(),
        }
    }
}

impl Surrogate for CommandSurrogate {
    fn projections(
        &self,
        potential: &Path,
        structures: &[Structure],
        workdir: &Path,
    ) -> Result<Vec<DMatrix<f64>>, EngineError> {
        fs::create_dir_all(workdir).map_err(|e| io_err(workdir, e))?;
        let input = workdir.join(files::PROJECTION_INPUT);
        let output = workdir.join(files::PROJECTIONS);
        write_structures_to_path(structures, &input)?;

        debug!(
            structures = structures.len(),
            potential = %potential.display(),
            "evaluating descriptor projections"
        );
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(potential)
            .arg(&input)
            .arg(&output)
            .current_dir(workdir)
            .status()
            .map_err(|e| EngineError::Evaluation {
                reason: format!("failed to run '{}': {e}", self.program),
            })?;
        if !status.success() {
            return Err(EngineError::Evaluation {
                reason: format!("'{}' exited with {status}", self.program),
            });
        }

        let projections = ProjectionFile::load(&output)?;
        if projections.len() != structures.len() {
            return Err(EngineError::Evaluation {
                reason: format!(
                    "expected {} projection blocks, got {}",
                    structures.len(),
                    projections.len()
                ),
            });
        }
        Ok(projections)
    }
}
