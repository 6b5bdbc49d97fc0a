use nalgebra::DMatrix;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed header on line {line}: '{content}'")]
    MalformedHeader { line: usize, content: String },

    #[error("invalid value on line {line}: '{value}'")]
    InvalidValue { line: usize, value: String },

    #[error("unexpected end of file: structure {structure} needs {expected} values")]
    Truncated { structure: usize, expected: usize },
}

/// The descriptor-projection dump exchanged with the external surrogate
/// evaluator: for each structure a header `<atoms> <cols>` followed by
/// `atoms * cols` lines of one value each, row-major (one row per atom).
pub struct ProjectionFile;

impl ProjectionFile {
    pub fn save_to(
        projections: &[DMatrix<f64>],
        writer: &mut impl Write,
    ) -> Result<(), ProjectionError> {
        for matrix in projections {
            writeln!(writer, "{} {}", matrix.nrows(), matrix.ncols())?;
            for i in 0..matrix.nrows() {
                for j in 0..matrix.ncols() {
                    writeln!(writer, "{}", matrix[(i, j)])?;
                }
            }
        }
        Ok(())
    }

    pub fn load_from(reader: &mut impl BufRead) -> Result<Vec<DMatrix<f64>>, ProjectionError> {
        let mut projections = Vec::new();
        let mut lines = reader.lines().enumerate();

        while let Some((index, line)) = lines.next() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let tokens: Vec<&str> = line.split_whitespace().collect();
            let malformed = || ProjectionError::MalformedHeader {
                line: index + 1,
                content: line.clone(),
            };
            if tokens.len() != 2 {
                return Err(malformed());
            }
            let rows: usize = tokens[0].parse().map_err(|_| malformed())?;
            let cols: usize = tokens[1].parse().map_err(|_| malformed())?;

            let expected = rows * cols;
            let mut values = Vec::with_capacity(expected);
            while values.len() < expected {
                let Some((value_index, value_line)) = lines.next() else {
                    return Err(ProjectionError::Truncated {
                        structure: projections.len(),
                        expected,
                    });
                };
                let value_line = value_line?;
                let value = value_line
                    .trim()
                    .parse()
                    .map_err(|_| ProjectionError::InvalidValue {
                        line: value_index + 1,
                        value: value_line.trim().to_string(),
                    })?;
                values.push(value);
            }

            projections.push(DMatrix::from_row_iterator(rows, cols, values));
        }

        Ok(projections)
    }

    pub fn save<P: AsRef<Path>>(
        projections: &[DMatrix<f64>],
        path: P,
    ) -> Result<(), ProjectionError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::save_to(projections, &mut writer)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Vec<DMatrix<f64>>, ProjectionError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::load_from(&mut reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    #[test]
    fn round_trip_preserves_shapes_and_values() {
        let projections = vec![
            DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, -4.0, 5.5e-3, 6.0]),
            DMatrix::from_row_slice(1, 3, &[0.25, -0.5, 0.75]),
        ];

        let mut buffer = Vec::new();
        ProjectionFile::save_to(&projections, &mut buffer).unwrap();
        let read = ProjectionFile::load_from(&mut BufReader::new(buffer.as_slice())).unwrap();

        assert_eq!(read, projections);
    }

    #[test]
    fn truncated_dump_is_rejected() {
        let err =
            ProjectionFile::load_from(&mut BufReader::new("2 2\n1.0\n".as_bytes())).unwrap_err();
        assert!(matches!(
            err,
            ProjectionError::Truncated {
                structure: 0,
                expected: 4,
            }
        ));
    }

    #[test]
    fn invalid_value_reports_line() {
        let err = ProjectionFile::load_from(&mut BufReader::new("1 1\nnan?\n".as_bytes()))
            .unwrap_err();
        assert!(matches!(err, ProjectionError::InvalidValue { line: 2, .. }));
    }
}
