use super::error::EngineError;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, info};

/// A job handed to the external batch scheduler: the submission script and
/// the directory it must run in.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub script: PathBuf,
    pub workdir: PathBuf,
}

/// Opaque identifier returned by the scheduler at submission time. The
/// engine never queries it; completion is observed through marker files.
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub id: String,
}

/// Submission seam to the external batch system.
pub trait Scheduler {
    fn submit(&self, job: &JobSpec) -> Result<JobHandle, EngineError>;
}

/// Submits jobs by spawning the configured command (e.g. `qsub`, `sbatch`)
/// with the script path appended, in the job's working directory.
#[derive(Debug, Clone)]
pub struct CommandScheduler {
    program: String,
    args: Vec<String>,
}

impl CommandScheduler {
    pub fn new(command: &str) -> Self {
        let mut tokens = command.split_whitespace().map(str::to_string);
        let program = tokens.next().unwrap_or_default();
        Self {
            program,
            args: tokens.collect(),
        }
    }
}

impl Scheduler for CommandScheduler {
    fn submit(&self, job: &JobSpec) -> Result<JobHandle, EngineError> {
        debug!(
            script = %job.script.display(),
            workdir = %job.workdir.display(),
            "submitting job"
        );
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&job.script)
            .current_dir(&job.workdir)
            .output()
            .map_err(|e| EngineError::Submission {
                script: job.script.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(EngineError::Submission {
                script: job.script.clone(),
                reason: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        info!(script = %job.script.display(), id, "job submitted");
        Ok(JobHandle { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(workdir: &std::path::Path) -> JobSpec {
        JobSpec {
            script: workdir.join("job.sh"),
            workdir: workdir.to_path_buf(),
        }
    }

    #[test]
    fn successful_submission_returns_the_schedulers_output() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = CommandScheduler::new("echo");

        let handle = scheduler.submit(&job(dir.path())).unwrap();
        assert!(handle.id.ends_with("job.sh"));
    }

    #[test]
    fn failing_submit_command_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = CommandScheduler::new("false");

        let err = scheduler.submit(&job(dir.path())).unwrap_err();
        assert!(matches!(err, EngineError::Submission { .. }));
    }

    #[test]
    fn unknown_submit_command_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = CommandScheduler::new("definitely-not-a-real-scheduler");

        assert!(scheduler.submit(&job(dir.path())).is_err());
    }
}
