use super::config::TrainConfig;
use super::labeler::Labeler;
use super::poller::JobPoller;
use super::progress::ProgressReporter;
use super::scheduler::Scheduler;
use super::surrogate::Surrogate;

/// Shared view of the run handed to every stage: the configuration plus the
/// three external collaborators and the progress sink.
pub struct PipelineContext<'a, S, L, M>
where
    S: Scheduler,
    L: Labeler,
    M: Surrogate,
{
    pub config: &'a TrainConfig,
    pub scheduler: &'a S,
    pub labeler: &'a L,
    pub surrogate: &'a M,
    pub reporter: &'a ProgressReporter<'a>,
}

impl<'a, S, L, M> PipelineContext<'a, S, L, M>
where
    S: Scheduler,
    L: Labeler,
    M: Surrogate,
{
    pub fn new(
        config: &'a TrainConfig,
        scheduler: &'a S,
        labeler: &'a L,
        surrogate: &'a M,
        reporter: &'a ProgressReporter<'a>,
    ) -> Self {
        Self {
            config,
            scheduler,
            labeler,
            surrogate,
            reporter,
        }
    }

    /// A poller configured from this run's polling section.
    pub fn poller(&self) -> JobPoller {
        JobPoller::new(&self.config.poll)
    }

    /// True when the stage's checkpoint marker must be honored.
    pub fn restart(&self) -> bool {
        self.config.active.restart
    }
}
