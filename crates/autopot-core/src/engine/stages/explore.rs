use super::{copy_file, ensure_dir, stage_script};
use crate::core::io::traits::StructureFile;
use crate::core::io::xyz::{XyzFile, write_structures_to_path};
use crate::core::models::structure::Structure;
use crate::engine::checkpoint;
use crate::engine::context::PipelineContext;
use crate::engine::error::{EngineError, io_err};
use crate::engine::labeler::Labeler;
use crate::engine::pipeline::{IterationLayout, Stage, files};
use crate::engine::progress::Progress;
use crate::engine::sampling::capped_sample;
use crate::engine::scheduler::Scheduler;
use crate::engine::surrogate::Surrogate;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Stage 4: explore configuration space with the fitted potential.
///
/// One task directory per model file; every run is expected to dump the
/// structures it found extrapolating. Dumps larger than the per-model cap
/// are cut down by the fixed-seed shuffle before aggregation, bounding the
/// labeling cost of whatever the runs discover. An empty aggregate is the
/// pipeline's convergence signal, not an error.
#[instrument(skip_all, name = "explore_stage", fields(iteration = layout.index))]
pub fn run<S, L, M>(
    ctx: &PipelineContext<S, L, M>,
    layout: &IterationLayout,
    potential: &Path,
    asi_path: &Path,
) -> Result<Vec<Structure>, EngineError>
where
    S: Scheduler,
    L: Labeler,
    M: Surrogate,
{
    let dir = layout.stage_dir(Stage::Explore);
    ensure_dir(&dir)?;
    let aggregate = dir.join(files::CANDIDATES);

    ctx.reporter.report(Progress::PhaseStart {
        name: Stage::Explore.title(),
    });
    info!(iteration = layout.index, "stage 4: explore");

    if ctx.restart() && checkpoint::is_done(&dir) {
        info!("restart: stage already accomplished");
        let candidates = if aggregate.is_file() {
            XyzFile::read_from_path(&aggregate)?
        } else {
            Vec::new()
        };
        ctx.reporter.report(Progress::PhaseFinish);
        return Ok(candidates);
    }

    copy_file(asi_path, &dir.join(files::ACTIVE_SET))?;

    let active = &ctx.config.active;
    let models = list_models(&active.model_dir)?;
    if models.is_empty() {
        return Err(EngineError::StageFailed {
            stage: "explore",
            reason: format!("no model files in {}", active.model_dir.display()),
        });
    }

    ctx.reporter.report(Progress::TaskStart {
        total: models.len() as u64,
    });
    let mut task_dirs = Vec::with_capacity(models.len());
    for model in &models {
        let name = model
            .file_name()
            .ok_or_else(|| EngineError::StageFailed {
                stage: "explore",
                reason: format!("model path {} has no file name", model.display()),
            })?
            .to_string_lossy()
            .into_owned();
        let task = dir.join(&name);
        ensure_dir(&task)?;
        task_dirs.push(task.clone());

        if ctx.restart() && checkpoint::is_done(&task) {
            info!(task = %name, "restart: exploration run already accomplished");
            ctx.reporter.report(Progress::TaskIncrement { amount: 1 });
            continue;
        }

        copy_file(model, &task.join(files::MODEL))?;
        copy_file(&active.explore_input, &task.join(files::EXPLORE_INPUT))?;
        copy_file(potential, &task.join(files::POTENTIAL))?;

        let job = stage_script(&active.explore_script, &task)?;
        ctx.scheduler.submit(&job)?;
        ctx.reporter.report(Progress::TaskIncrement { amount: 1 });
    }
    ctx.reporter.report(Progress::TaskFinish);

    ctx.poller().wait_all(&task_dirs, ctx.reporter);

    let mut candidates = Vec::new();
    for task in &task_dirs {
        let dump = task.join(files::EXTRAPOLATION);
        if !dump.is_file() {
            // A run that never left the well-described region dumps nothing.
            continue;
        }
        let mut frames = XyzFile::read_from_path(&dump)?;
        if frames.len() > active.max_structures_per_model {
            warn!(
                task = %task.display(),
                found = frames.len(),
                cap = active.max_structures_per_model,
                "capping exploration candidates"
            );
            frames = capped_sample(frames, active.max_structures_per_model, active.seed);
            write_structures_to_path(&frames, &dump)?;
        }
        candidates.extend(frames);
    }

    write_structures_to_path(&candidates, &aggregate)?;
    info!(candidates = candidates.len(), "extrapolating structures aggregated");

    checkpoint::mark_done(&dir)?;
    ctx.reporter.report(Progress::PhaseFinish);
    Ok(candidates)
}

/// Model files in deterministic (sorted) order.
fn list_models(model_dir: &Path) -> Result<Vec<PathBuf>, EngineError> {
    let entries = fs::read_dir(model_dir).map_err(|e| io_err(model_dir, e))?;
    let mut models = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(model_dir, e))?;
        let path = entry.path();
        if path.is_file() {
            models.push(path);
        }
    }
    models.sort();
    Ok(models)
}
