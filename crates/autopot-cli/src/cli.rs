use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Rong Yi",
    version,
    about = "autopot CLI - automated active-learning generation of training data for machine-learned interatomic potentials.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the iterative active-learning loop from a TOML configuration.
    Train(TrainArgs),
    /// Select the active set of a fitted potential over a structure file.
    Select(SelectArgs),
    /// Grade structures against a stored active set and extract the
    /// extrapolating ones.
    Grade(GradeArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Path to the run configuration in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Resume from existing checkpoint markers instead of starting fresh.
    #[arg(long)]
    pub restart: bool,
}

#[derive(Args, Debug)]
pub struct SelectArgs {
    /// Path to the structure file (extended XYZ).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path to the fitted potential file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub potential: PathBuf,

    /// Directory receiving the active-set file and the selected structures.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub out_dir: PathBuf,

    /// External evaluator producing descriptor-projection dumps; invoked as
    /// `<command> <potential> <structures> <output>`.
    #[arg(long, required = true, value_name = "CMD")]
    pub projection_command: String,

    /// MaxVol accuracy parameter (>= 1).
    #[arg(long, default_value_t = 1.001, value_name = "FLOAT")]
    pub gamma_tol: f64,

    /// Rows per batch for the cumulative selection pass.
    #[arg(long, value_name = "NUM")]
    pub batch_size: Option<usize>,
}

#[derive(Args, Debug)]
pub struct GradeArgs {
    /// Path to the structure file to grade (extended XYZ).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path to the fitted potential file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub potential: PathBuf,

    /// Path to the stored active-set file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub active_set: PathBuf,

    /// Directory receiving the extrapolating structures.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub out_dir: PathBuf,

    /// External evaluator producing descriptor-projection dumps.
    #[arg(long, required = true, value_name = "CMD")]
    pub projection_command: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn train_subcommand_parses() {
        let cli = Cli::parse_from(["autopot", "train", "--config", "run.toml", "--restart"]);
        match cli.command {
            Commands::Train(args) => {
                assert_eq!(args.config, PathBuf::from("run.toml"));
                assert!(args.restart);
            }
            _ => panic!("expected the train subcommand"),
        }
    }

    #[test]
    fn select_subcommand_applies_defaults() {
        let cli = Cli::parse_from([
            "autopot",
            "select",
            "--input",
            "train.xyz",
            "--potential",
            "potential.txt",
            "--out-dir",
            "out",
            "--projection-command",
            "evaluate",
        ]);
        match cli.command {
            Commands::Select(args) => {
                assert_eq!(args.gamma_tol, 1.001);
                assert_eq!(args.batch_size, None);
            }
            _ => panic!("expected the select subcommand"),
        }
    }
}
