use super::checkpoint;
use super::error::{EngineError, io_err};
use super::pipeline::files;
use super::poller::JobPoller;
use super::progress::ProgressReporter;
use super::scheduler::{JobSpec, Scheduler};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Seam to the external reference-labeling service.
///
/// Implementations receive the structures to label and the stage directory
/// to work in, and must return the path of the labeled structure file.
pub trait Labeler {
    fn label(
        &self,
        input: &Path,
        stage_dir: &Path,
        reporter: &ProgressReporter,
    ) -> Result<PathBuf, EngineError>;
}

/// Labels through a batch job: stages the input, submits the configured
/// script and polls until the job's completion marker appears. The external
/// tooling is expected to write `labeled.xyz` next to the marker.
pub struct ScriptLabeler<'a, S: Scheduler> {
    scheduler: &'a S,
    script: PathBuf,
    poller: JobPoller,
}

impl<'a, S: Scheduler> ScriptLabeler<'a, S> {
    pub fn new(scheduler: &'a S, script: PathBuf, poller: JobPoller) -> Self {
        Self {
            scheduler,
            script,
            poller,
        }
    }
}

impl<S: Scheduler> Labeler for ScriptLabeler<'_, S> {
    fn label(
        &self,
        input: &Path,
        stage_dir: &Path,
        reporter: &ProgressReporter,
    ) -> Result<PathBuf, EngineError> {
        let job_dir = stage_dir.join("job");
        fs::create_dir_all(&job_dir).map_err(|e| io_err(&job_dir, e))?;
        let labeled = job_dir.join(files::LABELED);

        // A completed labeling job survives a restart untouched.
        if checkpoint::is_done(&job_dir) && labeled.is_file() {
            info!(dir = %job_dir.display(), "labeling job already accomplished");
            return Ok(labeled);
        }

        let staged_input = job_dir.join(files::TO_LABEL);
        fs::copy(input, &staged_input).map_err(|e| io_err(input, e))?;

        let script_name = self.script.file_name().ok_or_else(|| EngineError::Submission {
            script: self.script.clone(),
            reason: "label script path has no file name".to_string(),
        })?;
        let staged_script = job_dir.join(script_name);
        fs::copy(&self.script, &staged_script).map_err(|e| io_err(&self.script, e))?;

        self.scheduler.submit(&JobSpec {
            script: staged_script,
            workdir: job_dir.clone(),
        })?;
        self.poller.wait_all(&[job_dir], reporter);

        if !labeled.is_file() {
            return Err(EngineError::MissingOutput { path: labeled });
        }
        Ok(labeled)
    }
}
