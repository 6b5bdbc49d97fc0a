use super::checkpoint;
use super::config::PollConfig;
use super::progress::{Progress, ProgressReporter};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Blocking, polling-based wait for externally submitted jobs.
///
/// Tasks are plain directories; the poller never talks to the scheduler.
/// A task is accomplished once its completion marker exists, in progress
/// once its progress file exists, and waiting otherwise.
#[derive(Debug, Clone)]
pub struct JobPoller {
    pub interval: Duration,
    pub report_every: u32,
    pub progress_file: String,
    pub status_file: String,
}

#[derive(Debug, Default)]
pub struct TaskCensus {
    pub accomplished: Vec<PathBuf>,
    pub in_progress: Vec<PathBuf>,
    pub waiting: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
pub struct PollSummary {
    pub passes: u64,
    pub elapsed: Duration,
    pub mean_per_task: Duration,
}

impl JobPoller {
    pub fn new(config: &PollConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            report_every: config.report_every,
            progress_file: config.progress_file.clone(),
            status_file: config.status_file.clone(),
        }
    }

    /// Classifies every task directory by marker and progress-file presence.
    pub fn classify(&self, tasks: &[PathBuf]) -> TaskCensus {
        let mut census = TaskCensus::default();
        for task in tasks {
            if checkpoint::is_done(task) {
                census.accomplished.push(task.clone());
            } else if task.join(&self.progress_file).is_file() {
                census.in_progress.push(task.clone());
            } else {
                census.waiting.push(task.clone());
            }
        }
        census
    }

    /// Best-effort current step of a running task, parsed from the last
    /// line of its status file. Any failure yields `None`; polling goes on.
    pub fn task_status(&self, task: &Path) -> Option<String> {
        let content = std::fs::read_to_string(task.join(&self.status_file)).ok()?;
        let last = content.lines().rev().find(|l| !l.trim().is_empty())?;
        let mut tokens = last.split_whitespace();
        while let Some(token) = tokens.next() {
            if token == "step" {
                let step: u64 = tokens.next()?.parse().ok()?;
                return Some(format!("step {step}"));
            }
        }
        None
    }

    /// Blocks until every task directory carries its completion marker,
    /// reporting aggregate progress at the configured cadence.
    pub fn wait_all(&self, tasks: &[PathBuf], reporter: &ProgressReporter) -> PollSummary {
        let start = Instant::now();
        let mut passes = 0u64;

        loop {
            let census = self.classify(tasks);
            if census.accomplished.len() == tasks.len() {
                let elapsed = start.elapsed();
                let mean_per_task = elapsed / tasks.len().max(1) as u32;
                info!(
                    tasks = tasks.len(),
                    elapsed_secs = elapsed.as_secs_f64(),
                    mean_secs = mean_per_task.as_secs_f64(),
                    "all tasks accomplished"
                );
                reporter.report(Progress::Message(format!(
                    "{} task(s) finished in {:.1} s (mean {:.1} s)",
                    tasks.len(),
                    elapsed.as_secs_f64(),
                    mean_per_task.as_secs_f64()
                )));
                return PollSummary {
                    passes,
                    elapsed,
                    mean_per_task,
                };
            }

            if passes % u64::from(self.report_every.max(1)) == 0 {
                reporter.report(Progress::StatusUpdate {
                    text: format!(
                        "{}/{} tasks done, {:.0} s elapsed",
                        census.accomplished.len(),
                        tasks.len(),
                        start.elapsed().as_secs_f64()
                    ),
                });
                for task in &census.in_progress {
                    let status = self
                        .task_status(task)
                        .unwrap_or_else(|| "unknown".to_string());
                    reporter.report(Progress::Message(format!(
                        "running {}: {status}",
                        task.display()
                    )));
                }
                debug!(
                    accomplished = census.accomplished.len(),
                    in_progress = census.in_progress.len(),
                    waiting = census.waiting.len(),
                    "poll pass"
                );
            }

            passes += 1;
            thread::sleep(self.interval);
        }
    }
}
