use super::{ensure_dir, require_nonempty};
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
use crate::engine::sampling::capped_sample;
use crate::engine::scheduler::Scheduler;
use crate::engine::surrogate::Surrogate;
use std::path::Path;
use tracing::{info, instrument};

/// Stage 5: pick which exploration candidates are worth labeling.
///
/// The training set and the candidates are pooled, MaxVol selection runs
/// over the union, and only candidates whose environments made it into the
/// active set survive. The per-iteration cap bounds the next labeling bill.
#[instrument(skip_all, name = "select_new_stage", fields(iteration = layout.index))]
pub fn run<S, L, M>(
    ctx: &PipelineContext<S, L, M>,
    layout: &IterationLayout,
    potential: &Path,
    candidates: Vec<Structure>,
) -> Result<Vec<Structure>, EngineError>
where
    S: Scheduler,
    L: Labeler,
    M: Surrogate,
{
    let dir = layout.stage_dir(Stage::SelectNew);
    ensure_dir(&dir)?;
    let output = dir.join(files::SELECTED);

    ctx.reporter.report(Progress::PhaseStart {
        name: Stage::SelectNew.title(),
    });
    info!(iteration = layout.index, "stage 5: select new structures");

    if ctx.restart() && checkpoint::is_done(&dir) {
        info!("restart: stage already accomplished");
        let picked = XyzFile::read_from_path(&output)?;
        ctx.reporter.report(Progress::PhaseFinish);
        return Ok(picked);
    }

    let train_path = layout.stage_dir(Stage::Fit).join(files::TRAIN);
    require_nonempty(&train_path)?;
    let mut pool_structures = XyzFile::read_from_path(&train_path)?;
    let train_len = pool_structures.len();
    pool_structures.extend(candidates);

    let elements = potential::read_elements(potential)?;
    let projections = ctx
        .surrogate
        .projections(potential, &pool_structures, &dir)?;
    let pool = DescriptorPool::from_projections(&pool_structures, &projections, &elements)?;
    let selection = select_active_set(&pool, &ctx.config.selection)?;

    let mut picked: Vec<Structure> = selection
        .structures
        .iter()
        .filter(|&&index| index >= train_len)
        .map(|&index| pool_structures[index].clone())
        .collect();
    info!(selected = picked.len(), "candidates selected for labeling");

    let cap = ctx.config.active.max_structures_per_iteration;
    if picked.len() > cap {
        info!(cap, "applying the per-iteration cap");
        picked = capped_sample(picked, cap, ctx.config.active.seed);
    }

    write_structures_to_path(&picked, &output)?;
    checkpoint::mark_done(&dir)?;
    ctx.reporter.report(Progress::PhaseFinish);
    Ok(picked)
}
