use crate::core::selection::batched::SelectionOptions;
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}", path = path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {path}: {source}", path = path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("required path for {name} not found: {path}", path = path.display())]
    MissingPath { name: &'static str, path: PathBuf },

    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

/// Full configuration of an active-learning run, usually loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainConfig {
    pub active: ActiveConfig,
    #[serde(default)]
    pub selection: SelectionOptions,
    #[serde(default)]
    pub poll: PollConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActiveConfig {
    /// Root of the iteration directory tree.
    pub work_dir: PathBuf,
    /// Labeled training set seeding iteration 0.
    pub init_train: PathBuf,
    /// Potential file seeding iteration 0.
    pub init_potential: PathBuf,
    /// Optional fit-restart file staged next to the potential.
    #[serde(default)]
    pub init_restart: Option<PathBuf>,
    /// Directory of model structures, one exploration run per file.
    pub model_dir: PathBuf,
    /// Input file staged for every fit job.
    pub fit_input: PathBuf,
    /// Input file staged for every exploration run.
    pub explore_input: PathBuf,
    pub fit_script: PathBuf,
    pub explore_script: PathBuf,
    pub label_script: PathBuf,
    /// Batch-scheduler submit command, e.g. `qsub` or `sbatch`.
    #[serde(default = "default_submit_command")]
    pub submit_command: String,
    /// External evaluator producing descriptor-projection dumps; invoked as
    /// `<command> <potential> <structures> <output>`.
    pub projection_command: String,
    pub max_iterations: usize,
    /// Cap on newly selected structures per iteration.
    pub max_structures_per_iteration: usize,
    /// Cap on candidate structures kept per exploration run.
    pub max_structures_per_model: usize,
    /// Shift energies by fitted atomic reference energies before fitting.
    #[serde(default)]
    pub shift_energy: bool,
    /// Resume from existing checkpoint markers instead of starting fresh.
    #[serde(default)]
    pub restart: bool,
    /// Seed for every capped random subsampling step.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollConfig {
    /// Seconds between filesystem polls.
    pub interval_secs: u64,
    /// Emit a progress report every this many polls.
    pub report_every: u32,
    /// File whose presence marks a task as started.
    pub progress_file: String,
    /// File whose last line carries the task's current step.
    pub status_file: String,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            report_every: 6,
            progress_file: "out.log".to_string(),
            status_file: "neighbor.out".to_string(),
        }
    }
}

fn default_submit_command() -> String {
    "qsub".to_string()
}

fn default_seed() -> u64 {
    10
}

impl TrainConfig {
    pub fn from_toml_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Pre-flight check: every configured input must exist and every knob
    /// must be usable before the first external job is submitted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let active = &self.active;
        require_file("active.init_train", &active.init_train)?;
        require_file("active.init_potential", &active.init_potential)?;
        if let Some(restart) = &active.init_restart {
            require_file("active.init_restart", restart)?;
        }
        require_dir("active.model_dir", &active.model_dir)?;
        require_file("active.fit_input", &active.fit_input)?;
        require_file("active.explore_input", &active.explore_input)?;
        require_file("active.fit_script", &active.fit_script)?;
        require_file("active.explore_script", &active.explore_script)?;
        require_file("active.label_script", &active.label_script)?;

        if active.submit_command.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "active.submit_command",
                reason: "must not be empty".to_string(),
            });
        }
        if active.projection_command.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "active.projection_command",
                reason: "must not be empty".to_string(),
            });
        }
        if active.max_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                name: "active.max_iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        if active.max_structures_per_iteration == 0 || active.max_structures_per_model == 0 {
            return Err(ConfigError::InvalidValue {
                name: "active.max_structures_per_*",
                reason: "caps must be at least 1".to_string(),
            });
        }

        if self.selection.gamma_tol < 1.0 {
            return Err(ConfigError::InvalidValue {
                name: "selection.gamma_tol",
                reason: format!("must be >= 1, got {}", self.selection.gamma_tol),
            });
        }
        if self.selection.batch_size == Some(0) {
            return Err(ConfigError::InvalidValue {
                name: "selection.batch_size",
                reason: "must be at least 1 when set".to_string(),
            });
        }
        if self.poll.report_every == 0 {
            return Err(ConfigError::InvalidValue {
                name: "poll.report_every",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn require_file(name: &'static str, path: &Path) -> Result<(), ConfigError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ConfigError::MissingPath {
            name,
            path: path.to_path_buf(),
        })
    }
}

fn require_dir(name: &'static str, path: &Path) -> Result<(), ConfigError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(ConfigError::MissingPath {
            name,
            path: path.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::selection::maxvol::MaxVolBackend;
    use std::fs;
    use tempfile::TempDir;

    fn write_inputs(dir: &TempDir) -> String {
        let root = dir.path();
        for name in [
            "train.xyz",
            "potential.txt",
            "fit.in",
            "explore.in",
            "fit.sh",
            "explore.sh",
            "label.sh",
        ] {
            fs::write(root.join(name), "x").unwrap();
        }
        fs::create_dir(root.join("models")).unwrap();
        root.display().to_string()
    }

    fn toml_text(root: &str) -> String {
        format!(
            r#"
[active]
work_dir = "{root}/run"
init_train = "{root}/train.xyz"
init_potential = "{root}/potential.txt"
model_dir = "{root}/models"
fit_input = "{root}/fit.in"
explore_input = "{root}/explore.in"
fit_script = "{root}/fit.sh"
explore_script = "{root}/explore.sh"
label_script = "{root}/label.sh"
projection_command = "evaluate-projections"
max_iterations = 5
max_structures_per_iteration = 20
max_structures_per_model = 50
"#
        )
    }

    #[test]
    fn toml_round_trip_applies_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_inputs(&dir);
        let path = dir.path().join("train.toml");
        fs::write(&path, toml_text(&root)).unwrap();

        let config = TrainConfig::from_toml_path(&path).unwrap();

        assert_eq!(config.active.max_iterations, 5);
        assert_eq!(config.active.seed, 10);
        assert_eq!(config.active.submit_command, "qsub");
        assert!(!config.active.restart);
        assert!(!config.active.shift_energy);
        assert_eq!(config.selection.gamma_tol, 1.001);
        assert_eq!(config.selection.backend, MaxVolBackend::Incremental);
        assert_eq!(config.poll.interval_secs, 10);
        assert_eq!(config.poll.report_every, 6);

        config.validate().unwrap();
    }

    #[test]
    fn missing_input_file_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_inputs(&dir);
        let path = dir.path().join("train.toml");
        fs::write(&path, toml_text(&root)).unwrap();
        fs::remove_file(dir.path().join("explore.in")).unwrap();

        let config = TrainConfig::from_toml_path(&path).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingPath {
                name: "active.explore_input",
                ..
            }
        ));
    }

    #[test]
    fn gamma_tol_below_one_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_inputs(&dir);
        let path = dir.path().join("train.toml");
        let text = format!("{}\n[selection]\ngamma_tol = 0.5\n", toml_text(&root));
        fs::write(&path, text).unwrap();

        let config = TrainConfig::from_toml_path(&path).unwrap();
        assert!(matches!(
            config.validate().unwrap_err(),
            ConfigError::InvalidValue {
                name: "selection.gamma_tol",
                ..
            }
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let root = write_inputs(&dir);
        let path = dir.path().join("train.toml");
        let text = format!("{}\nnonsense = true\n", toml_text(&root));
        fs::write(&path, text).unwrap();

        assert!(matches!(
            TrainConfig::from_toml_path(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
