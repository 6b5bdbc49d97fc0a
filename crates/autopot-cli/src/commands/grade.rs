use crate::cli::GradeArgs;
use crate::error::Result;
use crate::ui::UiManager;
use autopot::engine::progress::ProgressReporter;
use autopot::engine::surrogate::CommandSurrogate;
use autopot::workflows::grade;

pub fn execute(args: &GradeArgs, ui: &UiManager) -> Result<()> {
    let surrogate = CommandSurrogate::new(&args.projection_command);
    let reporter = ProgressReporter::with_callback(ui.callback());

    let outcome = grade::run(
        &args.input,
        &args.potential,
        &args.active_set,
        &args.out_dir,
        &surrogate,
        &reporter,
    )?;

    println!(
        "{} of {} structure(s) extrapolating; written to {}.",
        outcome.extrapolating,
        outcome.graded,
        outcome.output.display()
    );
    Ok(())
}
