use super::{ensure_dir, require_nonempty};
use crate::core::io::active_set::AsiFile;
use crate::core::io::potential;
use crate::core::io::traits::StructureFile;
use crate::core::io::xyz::{XyzFile, write_structures_to_path};
use crate::core::models::descriptors::DescriptorPool;
use crate::core::models::structure::Structure;
use crate::core::selection::active_set::select_active_set;
use crate::engine::checkpoint;
use crate::engine::context::PipelineContext;
use crate::engine::error::EngineError;
use crate::engine::labeler::Labeler;
use crate::engine::pipeline::{IterationLayout, Stage, files};
use crate::engine::progress::Progress;
use crate::engine::scheduler::Scheduler;
use crate::engine::surrogate::Surrogate;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Stage 3: select the active set of the freshly fitted potential.
///
/// Builds per-element descriptor matrices for the whole training set, runs
/// MaxVol selection per element and writes the active-set file consumed by
/// the exploration runs, plus a dump of the contributing structures.
#[instrument(skip_all, name = "select_active_stage", fields(iteration = layout.index))]
pub fn run<S, L, M>(
    ctx: &PipelineContext<S, L, M>,
    layout: &IterationLayout,
    potential: &Path,
) -> Result<PathBuf, EngineError>
where
    S: Scheduler,
    L: Labeler,
    M: Surrogate,
{
    let dir = layout.stage_dir(Stage::SelectActive);
    ensure_dir(&dir)?;
    let asi_path = dir.join(files::ACTIVE_SET);

    ctx.reporter.report(Progress::PhaseStart {
        name: Stage::SelectActive.title(),
    });
    info!(iteration = layout.index, "stage 3: select active set");

    if ctx.restart() && checkpoint::is_done(&dir) {
        info!("restart: stage already accomplished");
        ctx.reporter.report(Progress::PhaseFinish);
        return Ok(asi_path);
    }

    let train_path = layout.stage_dir(Stage::Fit).join(files::TRAIN);
    require_nonempty(&train_path)?;
    let structures = XyzFile::read_from_path(&train_path)?;

    let elements = potential::read_elements(potential)?;
    info!(?elements, "elements supported by the potential");

    let projections = ctx
        .surrogate
        .projections(potential, &structures, &dir)?;
    let pool = DescriptorPool::from_projections(&structures, &projections, &elements)?;
    for set in pool.sets() {
        info!(
            element = %set.element,
            rows = set.rows(),
            cols = set.cols(),
            "descriptor matrix"
        );
    }

    let selection = select_active_set(&pool, &ctx.config.selection)?;
    if !selection.fully_converged() {
        warn!("refinement did not converge for every element; the active set may be approximate");
    }
    AsiFile::save(&selection.inverse_map(), &asi_path)?;

    let picked: Vec<Structure> = selection
        .structures
        .iter()
        .map(|&index| structures[index].clone())
        .collect();
    write_structures_to_path(&picked, dir.join(files::ACTIVE_DUMP))?;
    info!(structures = picked.len(), "actively sampled structures");

    require_nonempty(&asi_path)?;
    checkpoint::mark_done(&dir)?;
    ctx.reporter.report(Progress::PhaseFinish);
    Ok(asi_path)
}
