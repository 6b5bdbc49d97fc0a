use crate::core::io::active_set::AsiFile;
use crate::core::io::potential;
use crate::core::io::traits::StructureFile;
use crate::core::io::xyz::{XyzFile, write_structures_to_path};
use crate::core::models::descriptors::DescriptorPool;
use crate::core::models::structure::Structure;
use crate::core::selection::active_set::select_active_set;
use crate::core::selection::batched::SelectionOptions;
use crate::engine::error::EngineError;
use crate::engine::pipeline::files;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::stages::ensure_dir;
use crate::engine::surrogate::Surrogate;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Result of a standalone active-set selection.
#[derive(Debug, Clone)]
pub struct SelectOutcome {
    pub asi_path: PathBuf,
    pub selected_path: PathBuf,
    /// Number of structures contributing to any element's active set.
    pub structures: usize,
    pub converged: bool,
}

/// Selects the active set of a fitted potential over a structure file and
/// writes the active-set file plus the contributing structures, outside the
/// iterative pipeline.
#[instrument(skip_all, name = "select_workflow")]
pub fn run<M: Surrogate>(
    structures_path: &Path,
    potential_path: &Path,
    out_dir: &Path,
    options: &SelectionOptions,
    surrogate: &M,
    reporter: &ProgressReporter,
) -> Result<SelectOutcome, EngineError> {
    reporter.report(Progress::PhaseStart {
        name: "Select Active Set",
    });
    ensure_dir(out_dir)?;

    let structures = XyzFile::read_from_path(structures_path)?;
    let elements = potential::read_elements(potential_path)?;
    info!(
        structures = structures.len(),
        ?elements,
        "selecting the active set"
    );

    let projections = surrogate.projections(potential_path, &structures, out_dir)?;
    let pool = DescriptorPool::from_projections(&structures, &projections, &elements)?;
    let selection = select_active_set(&pool, options)?;
    if !selection.fully_converged() {
        warn!("refinement did not converge for every element; the active set may be approximate");
    }

    let asi_path = out_dir.join(files::ACTIVE_SET);
    AsiFile::save(&selection.inverse_map(), &asi_path)?;

    let picked: Vec<Structure> = selection
        .structures
        .iter()
        .map(|&index| structures[index].clone())
        .collect();
    let selected_path = out_dir.join(files::ACTIVE_DUMP);
    write_structures_to_path(&picked, &selected_path)?;
    info!(selected = picked.len(), "active-set selection finished");

    reporter.report(Progress::PhaseFinish);
    Ok(SelectOutcome {
        asi_path,
        selected_path,
        structures: picked.len(),
        converged: selection.fully_converged(),
    })
}
