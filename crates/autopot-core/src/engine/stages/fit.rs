use super::{copy_file, ensure_dir, require_nonempty, stage_script};
use crate::core::fitting::shift::shift_energies;
use crate::core::io::traits::StructureFile;
use crate::core::io::xyz::XyzFile;
use crate::engine::checkpoint;
use crate::engine::context::PipelineContext;
use crate::engine::error::{EngineError, io_err};
use crate::engine::labeler::Labeler;
use crate::engine::pipeline::{IterationLayout, Stage, files};
use crate::engine::progress::Progress;
use crate::engine::scheduler::Scheduler;
use crate::engine::surrogate::Surrogate;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Stage 2: assemble the training set and fit the surrogate potential.
///
/// Iteration 0 only seeds the initial training set, potential and restart
/// files; no fit job is submitted. Later iterations extend the previous
/// training set with the freshly labeled structures (keeping the unshifted
/// accumulation chain intact when energy shifting is on), then submit the
/// fit job and block until its marker appears. The stage's output is the
/// updated potential file.
#[instrument(skip_all, name = "fit_stage", fields(iteration = layout.index))]
pub fn run<S, L, M>(
    ctx: &PipelineContext<S, L, M>,
    layout: &IterationLayout,
) -> Result<PathBuf, EngineError>
where
    S: Scheduler,
    L: Labeler,
    M: Surrogate,
{
    let dir = layout.stage_dir(Stage::Fit);
    ensure_dir(&dir)?;
    let potential = dir.join(files::POTENTIAL);

    ctx.reporter.report(Progress::PhaseStart {
        name: Stage::Fit.title(),
    });
    info!(iteration = layout.index, "stage 2: fit");

    if ctx.restart() && checkpoint::is_done(&dir) {
        info!("restart: stage already accomplished");
        ctx.reporter.report(Progress::PhaseFinish);
        return Ok(potential);
    }

    let active = &ctx.config.active;
    if layout.index == 0 {
        seed_initial_inputs(ctx, &dir)?;
        require_nonempty(&potential)?;
        checkpoint::mark_done(&dir)?;
        ctx.reporter.report(Progress::PhaseFinish);
        return Ok(potential);
    }

    let previous = layout.previous().ok_or_else(|| EngineError::StageFailed {
        stage: "fit",
        reason: "iteration has no predecessor".to_string(),
    })?;
    let prev_fit = previous.stage_dir(Stage::Fit);
    let labeled = layout.stage_dir(Stage::Label).join(files::LABELED);
    require_nonempty(&labeled)?;

    if active.shift_energy {
        let prev_raw = prev_fit.join(files::TRAIN_RAW);
        require_nonempty(&prev_raw)?;
        let raw = dir.join(files::TRAIN_RAW);
        concat_files(&[&prev_raw, &labeled], &raw)?;

        info!("shifting energies of the extended training set");
        let mut structures = XyzFile::read_from_path(&raw)?;
        shift_energies(&mut structures)?;
        XyzFile::write_to_path(&structures, dir.join(files::TRAIN))?;
    } else {
        let prev_train = prev_fit.join(files::TRAIN);
        require_nonempty(&prev_train)?;
        concat_files(&[&prev_train, &labeled], &dir.join(files::TRAIN))?;
    }

    let prev_potential = prev_fit.join(files::POTENTIAL);
    require_nonempty(&prev_potential)?;
    copy_file(&prev_potential, &potential)?;
    let prev_restart = prev_fit.join(files::RESTART);
    if prev_restart.is_file() {
        copy_file(&prev_restart, &dir.join(files::RESTART))?;
    }
    copy_file(&active.fit_input, &dir.join(files::FIT_INPUT))?;

    let job = stage_script(&active.fit_script, &dir)?;
    ctx.scheduler.submit(&job)?;
    ctx.poller().wait_all(std::slice::from_ref(&dir), ctx.reporter);

    require_nonempty(&potential)?;
    checkpoint::mark_done(&dir)?;
    ctx.reporter.report(Progress::PhaseFinish);
    Ok(potential)
}

fn seed_initial_inputs<S, L, M>(
    ctx: &PipelineContext<S, L, M>,
    dir: &Path,
) -> Result<(), EngineError>
where
    S: Scheduler,
    L: Labeler,
    M: Surrogate,
{
    let active = &ctx.config.active;
    if active.shift_energy {
        copy_file(&active.init_train, &dir.join(files::TRAIN_RAW))?;

        info!("shifting energies of the initial training set");
        let mut structures = XyzFile::read_from_path(&active.init_train)?;
        shift_energies(&mut structures)?;
        XyzFile::write_to_path(&structures, dir.join(files::TRAIN))?;
    } else {
        copy_file(&active.init_train, &dir.join(files::TRAIN))?;
    }

    copy_file(&active.init_potential, &dir.join(files::POTENTIAL))?;
    if let Some(restart) = &active.init_restart {
        copy_file(restart, &dir.join(files::RESTART))?;
    }
    Ok(())
}

fn concat_files(sources: &[&Path], dest: &Path) -> Result<(), EngineError> {
    let mut out = File::create(dest).map_err(|e| io_err(dest, e))?;
    for source in sources {
        let mut file = File::open(source).map_err(|e| io_err(source, e))?;
        std::io::copy(&mut file, &mut out).map_err(|e| io_err(source, e))?;
    }
    Ok(())
}
