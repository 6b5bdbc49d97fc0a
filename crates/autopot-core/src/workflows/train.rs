use crate::engine::config::TrainConfig;
use crate::engine::context::PipelineContext;
use crate::engine::error::EngineError;
use crate::engine::labeler::Labeler;
use crate::engine::pipeline::IterationLayout;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::scheduler::Scheduler;
use crate::engine::stages::{self, ensure_dir};
use crate::engine::surrogate::Surrogate;
use std::time::Instant;
use tracing::{info, instrument};

/// Result of a completed active-learning run.
#[derive(Debug, Clone, Copy)]
pub struct TrainOutcome {
    /// Number of iterations actually executed.
    pub iterations: usize,
    /// True when exploration stopped producing extrapolating structures
    /// before the iteration budget ran out.
    pub converged: bool,
}

/// Drives the iterative label -> fit -> select -> explore -> select loop to
/// convergence or the configured maximum number of iterations.
#[instrument(skip_all, name = "train_workflow")]
pub fn run<S, L, M>(
    config: &TrainConfig,
    scheduler: &S,
    labeler: &L,
    surrogate: &M,
    reporter: &ProgressReporter,
) -> Result<TrainOutcome, EngineError>
where
    S: Scheduler,
    L: Labeler,
    M: Surrogate,
{
    config.validate()?;
    let ctx = PipelineContext::new(config, scheduler, labeler, surrogate, reporter);
    let work_dir = &config.active.work_dir;
    ensure_dir(work_dir)?;

    for iteration in 0..config.active.max_iterations {
        let started = Instant::now();
        info!(iteration, "active-learning iteration started");
        reporter.report(Progress::Message(format!("iteration {iteration}")));

        let layout = IterationLayout::new(work_dir, iteration);
        ensure_dir(layout.dir())?;

        stages::label::run(&ctx, &layout)?;
        let potential = stages::fit::run(&ctx, &layout)?;
        let asi_path = stages::select_active::run(&ctx, &layout, &potential)?;
        let candidates = stages::explore::run(&ctx, &layout, &potential, &asi_path)?;

        if candidates.is_empty() {
            info!(
                iteration,
                "exploration produced no extrapolating structures"
            );
            reporter.report(Progress::Message("active learning converged".to_string()));
            return Ok(TrainOutcome {
                iterations: iteration + 1,
                converged: true,
            });
        }

        let picked = stages::select_new::run(&ctx, &layout, &potential, candidates)?;
        info!(
            iteration,
            selected = picked.len(),
            elapsed_min = started.elapsed().as_secs_f64() / 60.0,
            "iteration finished"
        );
    }

    info!(
        iterations = config.active.max_iterations,
        "maximum number of iterations reached without convergence"
    );
    Ok(TrainOutcome {
        iterations: config.active.max_iterations,
        converged: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::traits::StructureFile;
    use crate::core::io::xyz::{XyzFile, write_structures_to_path};
    use crate::core::models::structure::Structure;
    use crate::core::selection::batched::SelectionOptions;
    use crate::engine::checkpoint;
    use crate::engine::config::{ActiveConfig, PollConfig};
    use crate::engine::pipeline::{Stage, files};
    use crate::engine::scheduler::{JobHandle, JobSpec};
    use nalgebra::{DMatrix, Matrix3, Point3, Vector3};
    use std::cell::RefCell;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// One Si atom at the given x coordinate.
    fn atom_at(x: f64) -> Structure {
        Structure::new(
            vec!["Si".to_string()],
            vec![Point3::new(x, 0.0, 0.0)],
            Matrix3::identity() * 10.0,
        )
    }

    fn labeled_atom_at(x: f64) -> Structure {
        let mut s = atom_at(x);
        s.energy = Some(-x);
        s.forces = Some(vec![Vector3::zeros()]);
        s
    }

    /// Deterministic stand-in for the surrogate: each atom's descriptor row
    /// is `[x, x^2 / 10]`, so far-out candidates dominate the selection.
    struct MockSurrogate;

    impl Surrogate for MockSurrogate {
        fn projections(
            &self,
            _potential: &Path,
            structures: &[Structure],
            _workdir: &Path,
        ) -> Result<Vec<DMatrix<f64>>, EngineError> {
            Ok(structures
                .iter()
                .map(|s| {
                    DMatrix::from_fn(s.len(), 2, |atom, j| {
                        let x = s.positions[atom].x;
                        if j == 0 { x } else { x * x / 10.0 }
                    })
                })
                .collect())
        }
    }

    /// Labels by attaching mock energies and zero forces.
    struct MockLabeler;

    impl Labeler for MockLabeler {
        fn label(
            &self,
            input: &Path,
            stage_dir: &Path,
            _reporter: &ProgressReporter,
        ) -> Result<PathBuf, EngineError> {
            let mut structures = XyzFile::read_from_path(input)?;
            for s in &mut structures {
                s.energy = Some(-1.0);
                s.forces = Some(vec![Vector3::zeros(); s.len()]);
            }
            let out = stage_dir.join("mock_labeled.xyz");
            XyzFile::write_to_path(&structures, &out)?;
            Ok(out)
        }
    }

    /// Scheduler double that completes every job synchronously. Exploration
    /// jobs dump the configured number of candidates, drained one count per
    /// submission.
    struct MockScheduler {
        submitted: RefCell<Vec<String>>,
        explore_dumps: RefCell<Vec<usize>>,
    }

    impl MockScheduler {
        fn new(explore_dumps: Vec<usize>) -> Self {
            Self {
                submitted: RefCell::new(Vec::new()),
                explore_dumps: RefCell::new(explore_dumps),
            }
        }

        fn submitted_scripts(&self) -> Vec<String> {
            self.submitted.borrow().clone()
        }
    }

    impl Scheduler for MockScheduler {
        fn submit(&self, job: &JobSpec) -> Result<JobHandle, EngineError> {
            let name = job
                .script
                .file_name()
                .unwrap()
                .to_string_lossy()
                .into_owned();
            self.submitted.borrow_mut().push(name.clone());

            if name == "explore.sh" {
                let mut dumps = self.explore_dumps.borrow_mut();
                let count = if dumps.is_empty() { 0 } else { dumps.remove(0) };
                if count > 0 {
                    let candidates: Vec<Structure> =
                        (0..count).map(|i| atom_at(50.0 + i as f64)).collect();
                    write_structures_to_path(
                        &candidates,
                        job.workdir.join(files::EXTRAPOLATION),
                    )
                    .unwrap();
                }
            }

            checkpoint::mark_done(&job.workdir).unwrap();
            Ok(JobHandle {
                id: "mock".to_string(),
            })
        }
    }

    fn test_config(root: &Path, max_iterations: usize, restart: bool) -> TrainConfig {
        let train: Vec<Structure> = (1..=6).map(|i| labeled_atom_at(0.5 * i as f64)).collect();
        XyzFile::write_to_path(&train, root.join("init_train.xyz")).unwrap();
        fs::write(root.join("potential.txt"), "nep3 1 Si zbl\nopaque body\n").unwrap();

        let models = root.join("models");
        fs::create_dir_all(&models).unwrap();
        write_structures_to_path(&[atom_at(1.0)], models.join("model-a.xyz")).unwrap();

        for name in ["fit.in", "explore.in", "fit.sh", "explore.sh", "label.sh"] {
            fs::write(root.join(name), "#").unwrap();
        }

        TrainConfig {
            active: ActiveConfig {
                work_dir: root.join("run"),
                init_train: root.join("init_train.xyz"),
                init_potential: root.join("potential.txt"),
                init_restart: None,
                model_dir: models,
                fit_input: root.join("fit.in"),
                explore_input: root.join("explore.in"),
                fit_script: root.join("fit.sh"),
                explore_script: root.join("explore.sh"),
                label_script: root.join("label.sh"),
                submit_command: "true".to_string(),
                projection_command: "true".to_string(),
                max_iterations,
                max_structures_per_iteration: 20,
                max_structures_per_model: 50,
                shift_energy: false,
                restart,
                seed: 10,
            },
            selection: SelectionOptions::default(),
            poll: PollConfig {
                interval_secs: 0,
                report_every: 1,
                ..PollConfig::default()
            },
        }
    }

    fn run_with(
        config: &TrainConfig,
        scheduler: &MockScheduler,
    ) -> Result<TrainOutcome, EngineError> {
        let reporter = ProgressReporter::default();
        run(config, scheduler, &MockLabeler, &MockSurrogate, &reporter)
    }

    #[test]
    fn converges_when_exploration_finds_nothing() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path(), 5, false);
        let scheduler = MockScheduler::new(vec![0]);

        let outcome = run_with(&config, &scheduler).unwrap();

        assert!(outcome.converged);
        assert_eq!(outcome.iterations, 1);

        // Stages 1-4 checkpointed, stage 5 never entered.
        let layout = IterationLayout::new(&config.active.work_dir, 0);
        for stage in [Stage::Label, Stage::Fit, Stage::SelectActive, Stage::Explore] {
            assert!(
                checkpoint::is_done(&layout.stage_dir(stage)),
                "{} must be checkpointed",
                stage.dir_name()
            );
        }
        assert!(!layout.stage_dir(Stage::SelectNew).exists());

        // Iteration 0 seeds the potential without a fit job; only the
        // exploration run was submitted.
        assert_eq!(scheduler.submitted_scripts(), vec!["explore.sh"]);

        // The active-set file is in place and non-empty.
        let asi = layout.stage_dir(Stage::SelectActive).join(files::ACTIVE_SET);
        assert!(fs::metadata(asi).unwrap().len() > 0);
    }

    #[test]
    fn feeds_selected_candidates_into_the_next_iteration() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path(), 5, false);
        // Iteration 0 discovers two candidates, iteration 1 none.
        let scheduler = MockScheduler::new(vec![2, 0]);

        let outcome = run_with(&config, &scheduler).unwrap();

        assert!(outcome.converged);
        assert_eq!(outcome.iterations, 2);

        // The second fit trains on the six seeds plus the selected candidate.
        let layout = IterationLayout::new(&config.active.work_dir, 1);
        let train = XyzFile::read_from_path(layout.stage_dir(Stage::Fit).join(files::TRAIN))
            .unwrap();
        assert_eq!(train.len(), 7);
        assert!(train.iter().all(|s| s.is_labeled()));

        // Iteration 1 submitted a real fit job before exploring again.
        assert_eq!(
            scheduler.submitted_scripts(),
            vec!["explore.sh", "fit.sh", "explore.sh"]
        );

        // The selection stage kept only candidates, and capped below 20.
        let selected = XyzFile::read_from_path(
            IterationLayout::new(&config.active.work_dir, 0)
                .stage_dir(Stage::SelectNew)
                .join(files::SELECTED),
        )
        .unwrap();
        assert_eq!(selected.len(), 1);
        assert!(selected[0].positions[0].x >= 50.0);
    }

    #[test]
    fn restart_skips_checkpointed_stages_and_resumes_at_the_first_open_one() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path(), 1, true);

        // Pre-populate iteration 0 as if a previous run died after stage 2:
        // stages 1 and 2 carry markers and outputs, stage 3 does not exist.
        let layout = IterationLayout::new(&config.active.work_dir, 0);
        let label_dir = layout.stage_dir(Stage::Label);
        let fit_dir = layout.stage_dir(Stage::Fit);
        fs::create_dir_all(&label_dir).unwrap();
        fs::create_dir_all(&fit_dir).unwrap();

        fs::write(label_dir.join(files::LABELED), "SENTINEL").unwrap();
        let train: Vec<Structure> = (1..=6).map(|i| labeled_atom_at(0.5 * i as f64)).collect();
        XyzFile::write_to_path(&train, fit_dir.join(files::TRAIN)).unwrap();
        fs::write(fit_dir.join(files::POTENTIAL), "nep3 1 Si zbl\nSENTINEL\n").unwrap();
        checkpoint::mark_done(&label_dir).unwrap();
        checkpoint::mark_done(&fit_dir).unwrap();

        let scheduler = MockScheduler::new(vec![0]);
        let outcome = run_with(&config, &scheduler).unwrap();
        assert!(outcome.converged);

        // Skipped stages were not re-executed: the sentinel outputs survive
        // and no fit job was submitted.
        assert_eq!(
            fs::read_to_string(label_dir.join(files::LABELED)).unwrap(),
            "SENTINEL"
        );
        assert!(
            fs::read_to_string(fit_dir.join(files::POTENTIAL))
                .unwrap()
                .contains("SENTINEL")
        );
        assert_eq!(scheduler.submitted_scripts(), vec!["explore.sh"]);

        // Stage 3 onward really ran.
        assert!(checkpoint::is_done(&layout.stage_dir(Stage::SelectActive)));
        assert!(checkpoint::is_done(&layout.stage_dir(Stage::Explore)));
    }

    #[test]
    fn iteration_budget_bounds_the_run() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path(), 2, false);
        // Exploration keeps finding candidates; the budget must stop the loop.
        let scheduler = MockScheduler::new(vec![2, 2]);

        let outcome = run_with(&config, &scheduler).unwrap();
        assert!(!outcome.converged);
        assert_eq!(outcome.iterations, 2);
    }

    #[test]
    fn an_empty_model_directory_is_a_stage_failure() {
        let dir = TempDir::new().unwrap();
        let config = test_config(dir.path(), 1, false);
        fs::remove_file(config.active.model_dir.join("model-a.xyz")).unwrap();

        let scheduler = MockScheduler::new(vec![0]);
        let err = run_with(&config, &scheduler).unwrap_err();
        assert!(matches!(
            err,
            EngineError::StageFailed { stage: "explore", .. }
        ));
    }

    #[test]
    fn invalid_configuration_fails_before_any_submission() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(dir.path(), 1, false);
        config.selection.gamma_tol = 0.5;

        let scheduler = MockScheduler::new(vec![0]);
        let err = run_with(&config, &scheduler).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
        assert!(scheduler.submitted_scripts().is_empty());
    }
}
