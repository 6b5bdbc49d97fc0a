use crate::cli::TrainArgs;
use crate::error::Result;
use crate::ui::UiManager;
use autopot::engine::config::TrainConfig;
use autopot::engine::labeler::ScriptLabeler;
use autopot::engine::poller::JobPoller;
use autopot::engine::progress::ProgressReporter;
use autopot::engine::scheduler::CommandScheduler;
use autopot::engine::surrogate::CommandSurrogate;
use autopot::workflows::train;
use tracing::{info, warn};

pub fn execute(args: &TrainArgs, ui: &UiManager) -> Result<()> {
    let mut config = TrainConfig::from_toml_path(&args.config)?;
    if args.restart {
        config.active.restart = true;
    }
    info!(
        config = %args.config.display(),
        restart = config.active.restart,
        "starting active-learning run"
    );

    let scheduler = CommandScheduler::new(&config.active.submit_command);
    let labeler = ScriptLabeler::new(
        &scheduler,
        config.active.label_script.clone(),
        JobPoller::new(&config.poll),
    );
    let surrogate = CommandSurrogate::new(&config.active.projection_command);
    let reporter = ProgressReporter::with_callback(ui.callback());

    let outcome = train::run(&config, &scheduler, &labeler, &surrogate, &reporter)?;

    if outcome.converged {
        info!(iterations = outcome.iterations, "active learning converged");
        println!(
            "Active learning converged after {} iteration(s).",
            outcome.iterations
        );
    } else {
        warn!(
            iterations = outcome.iterations,
            "iteration budget exhausted before convergence"
        );
        println!(
            "Stopped after {} iteration(s) without convergence.",
            outcome.iterations
        );
    }
    Ok(())
}
