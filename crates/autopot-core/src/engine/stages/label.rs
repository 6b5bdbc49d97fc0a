use super::{copy_file, ensure_dir, require_nonempty};
use crate::engine::checkpoint;
use crate::engine::context::PipelineContext;
use crate::engine::error::EngineError;
use crate::engine::labeler::Labeler;
use crate::engine::pipeline::{IterationLayout, Stage, files};
use crate::engine::progress::Progress;
use crate::engine::scheduler::Scheduler;
use crate::engine::surrogate::Surrogate;
use std::path::PathBuf;
use tracing::{info, instrument};

/// Stage 1: label the structures selected by the previous iteration.
///
/// Iteration 0 has nothing to label yet; the initial training set is taken
/// over verbatim as this stage's output.
#[instrument(skip_all, name = "label_stage", fields(iteration = layout.index))]
pub fn run<S, L, M>(
    ctx: &PipelineContext<S, L, M>,
    layout: &IterationLayout,
) -> Result<PathBuf, EngineError>
where
    S: Scheduler,
    L: Labeler,
    M: Surrogate,
{
    let dir = layout.stage_dir(Stage::Label);
    ensure_dir(&dir)?;
    let output = dir.join(files::LABELED);

    ctx.reporter.report(Progress::PhaseStart {
        name: Stage::Label.title(),
    });
    info!(iteration = layout.index, "stage 1: label");

    if ctx.restart() && checkpoint::is_done(&dir) {
        info!("restart: stage already accomplished");
        ctx.reporter.report(Progress::PhaseFinish);
        return Ok(output);
    }

    if layout.index == 0 {
        copy_file(&ctx.config.active.init_train, &output)?;
    } else {
        let previous = layout.previous().ok_or_else(|| EngineError::StageFailed {
            stage: "label",
            reason: "iteration has no predecessor".to_string(),
        })?;
        let selected = previous.stage_dir(Stage::SelectNew).join(files::SELECTED);
        require_nonempty(&selected)?;

        let labeled = ctx.labeler.label(&selected, &dir, ctx.reporter)?;
        copy_file(&labeled, &output)?;
    }

    require_nonempty(&output)?;
    checkpoint::mark_done(&dir)?;
    ctx.reporter.report(Progress::PhaseFinish);
    Ok(output)
}
