use crate::cli::SelectArgs;
use crate::error::{CliError, Result};
use crate::ui::UiManager;
use autopot::core::selection::batched::SelectionOptions;
use autopot::engine::progress::ProgressReporter;
use autopot::engine::surrogate::CommandSurrogate;
use autopot::workflows::select;

pub fn execute(args: &SelectArgs, ui: &UiManager) -> Result<()> {
    if args.gamma_tol < 1.0 {
        return Err(CliError::Argument(format!(
            "--gamma-tol must be >= 1, got {}",
            args.gamma_tol
        )));
    }

    let mut options = SelectionOptions {
        gamma_tol: args.gamma_tol,
        ..SelectionOptions::default()
    };
    if args.batch_size.is_some() {
        options.batch_size = args.batch_size;
    }

    let surrogate = CommandSurrogate::new(&args.projection_command);
    let reporter = ProgressReporter::with_callback(ui.callback());

    let outcome = select::run(
        &args.input,
        &args.potential,
        &args.out_dir,
        &options,
        &surrogate,
        &reporter,
    )?;

    println!(
        "Active set written to {} ({} contributing structure(s){}).",
        outcome.asi_path.display(),
        outcome.structures,
        if outcome.converged {
            ""
        } else {
            ", refinement incomplete"
        }
    );
    Ok(())
}
