use crate::core::io::active_set::AsiFile;
use crate::core::io::traits::StructureFile;
use crate::core::io::xyz::{XyzFile, write_structures_to_path};
use crate::core::models::structure::Structure;
use crate::core::selection::gamma::{extrapolating_indices, grade_structures};
use crate::engine::error::EngineError;
use crate::engine::pipeline::files;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::stages::ensure_dir;
use crate::engine::surrogate::Surrogate;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Result of a standalone extrapolation-grading pass.
#[derive(Debug, Clone)]
pub struct GradeOutcome {
    pub graded: usize,
    pub extrapolating: usize,
    /// File holding the structures flagged as extrapolating.
    pub output: PathBuf,
}

/// Grades a structure file against a stored active set and writes the
/// structures the surrogate is unreliable for.
#[instrument(skip_all, name = "grade_workflow")]
pub fn run<M: Surrogate>(
    structures_path: &Path,
    potential_path: &Path,
    asi_path: &Path,
    out_dir: &Path,
    surrogate: &M,
    reporter: &ProgressReporter,
) -> Result<GradeOutcome, EngineError> {
    reporter.report(Progress::PhaseStart {
        name: "Grade Structures",
    });
    ensure_dir(out_dir)?;

    let structures = XyzFile::read_from_path(structures_path)?;
    let asi = AsiFile::load(asi_path)?;
    let projections = surrogate.projections(potential_path, &structures, out_dir)?;

    let grades = grade_structures(&structures, &projections, &asi)?;
    let flagged = extrapolating_indices(&grades);
    let picked: Vec<Structure> = flagged.iter().map(|&i| structures[i].clone()).collect();

    let output = out_dir.join(files::CANDIDATES);
    write_structures_to_path(&picked, &output)?;
    info!(
        graded = structures.len(),
        extrapolating = picked.len(),
        "grading finished"
    );

    reporter.report(Progress::PhaseFinish);
    Ok(GradeOutcome {
        graded: structures.len(),
        extrapolating: picked.len(),
        output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::active_set::ActiveSetInverse;
    use nalgebra::{DMatrix, Matrix3, Point3};
    use std::fs;

    /// Descriptor row per atom is `[x, 0]`.
    struct MockSurrogate;

    impl Surrogate for MockSurrogate {
        fn projections(
            &self,
            _potential: &Path,
            structures: &[Structure],
            _workdir: &Path,
        ) -> Result<Vec<DMatrix<f64>>, EngineError> {
            Ok(structures
                .iter()
                .map(|s| {
                    DMatrix::from_fn(s.len(), 2, |atom, j| {
                        if j == 0 { s.positions[atom].x } else { 0.0 }
                    })
                })
                .collect())
        }
    }

    #[test]
    fn flags_only_structures_beyond_the_active_span() {
        let dir = tempfile::tempdir().unwrap();

        let mut asi = ActiveSetInverse::new();
        asi.insert("Si".to_string(), DMatrix::identity(2, 2));
        let asi_path = dir.path().join("active_set.asi");
        AsiFile::save(&asi, &asi_path).unwrap();

        // x = 0.5 grades to 0.5, x = 3.0 grades to 3.0 (> 1, extrapolating).
        let structures: Vec<Structure> = [0.5, 3.0]
            .iter()
            .map(|&x| {
                Structure::new(
                    vec!["Si".to_string()],
                    vec![Point3::new(x, 0.0, 0.0)],
                    Matrix3::identity(),
                )
            })
            .collect();
        let input = dir.path().join("to_select.xyz");
        write_structures_to_path(&structures, &input).unwrap();
        let potential = dir.path().join("potential.txt");
        fs::write(&potential, "nep3 1 Si zbl\n").unwrap();

        let reporter = ProgressReporter::default();
        let outcome = run(
            &input,
            &potential,
            &asi_path,
            &dir.path().join("out"),
            &MockSurrogate,
            &reporter,
        )
        .unwrap();

        assert_eq!(outcome.graded, 2);
        assert_eq!(outcome.extrapolating, 1);

        let flagged = XyzFile::read_from_path(&outcome.output).unwrap();
        assert_eq!(flagged.len(), 1);
        assert!((flagged[0].positions[0].x - 3.0).abs() < 1e-12);
    }
}
