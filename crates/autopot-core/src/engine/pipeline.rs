use std::path::{Path, PathBuf};

/// The five stages of one active-learning iteration, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Label,
    Fit,
    SelectActive,
    Explore,
    SelectNew,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Label,
        Stage::Fit,
        Stage::SelectActive,
        Stage::Explore,
        Stage::SelectNew,
    ];

    pub fn dir_name(&self) -> &'static str {
        match self {
            Stage::Label => "1-label",
            Stage::Fit => "2-fit",
            Stage::SelectActive => "3-select-active",
            Stage::Explore => "4-explore",
            Stage::SelectNew => "5-select-new",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Stage::Label => "Label",
            Stage::Fit => "Fit",
            Stage::SelectActive => "Select Active Set",
            Stage::Explore => "Explore",
            Stage::SelectNew => "Select New Structures",
        }
    }
}

/// Well-known file names inside the iteration tree.
pub mod files {
    /// Accumulated training set consumed by the fit job.
    pub const TRAIN: &str = "train.xyz";
    /// Unshifted accumulation chain kept alongside `TRAIN` when energy
    /// shifting is enabled.
    pub const TRAIN_RAW: &str = "train-raw.xyz";
    pub const POTENTIAL: &str = "potential.txt";
    pub const RESTART: &str = "potential.restart";
    pub const FIT_INPUT: &str = "fit.in";
    pub const EXPLORE_INPUT: &str = "explore.in";
    pub const MODEL: &str = "model.xyz";
    /// Stage-1 output: the labeled additions to the training set.
    pub const LABELED: &str = "labeled.xyz";
    /// Structures handed to the labeling job.
    pub const TO_LABEL: &str = "to_label.xyz";
    /// Aggregated extrapolating candidates from all exploration runs.
    pub const CANDIDATES: &str = "large_gamma.xyz";
    /// Stage-5 output: the capped selection entering the next iteration.
    pub const SELECTED: &str = "to_add.xyz";
    pub const ACTIVE_SET: &str = "active_set.asi";
    /// Structures whose environments made it into the active set.
    pub const ACTIVE_DUMP: &str = "select_active.xyz";
    /// Per-run extrapolation dump written by the exploration engine.
    pub const EXTRAPOLATION: &str = "extrapolation_dump.xyz";
    pub const PROJECTION_INPUT: &str = "projection_input.xyz";
    pub const PROJECTIONS: &str = "projections.dat";
}

/// Directory layout of one iteration under the run's working directory.
#[derive(Debug, Clone)]
pub struct IterationLayout {
    work_dir: PathBuf,
    dir: PathBuf,
    pub index: usize,
}

impl IterationLayout {
    pub fn new(work_dir: &Path, index: usize) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
            dir: work_dir.join(format!("iter_{index}")),
            index,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stage_dir(&self, stage: Stage) -> PathBuf {
        self.dir.join(stage.dir_name())
    }

    /// Layout of the preceding iteration, if any.
    pub fn previous(&self) -> Option<IterationLayout> {
        self.index
            .checked_sub(1)
            .map(|index| IterationLayout::new(&self.work_dir, index))
    }
}
