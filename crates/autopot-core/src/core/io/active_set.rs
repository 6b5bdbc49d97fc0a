use nalgebra::DMatrix;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Per-element pseudo-inverse matrices of the selected active sets, keyed by
/// chemical symbol.
pub type ActiveSetInverse = BTreeMap<String, DMatrix<f64>>;

#[derive(Debug, Error)]
pub enum AsiError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed header on line {line}: '{content}'")]
    MalformedHeader { line: usize, content: String },

    #[error("invalid value on line {line}: '{value}'")]
    InvalidValue { line: usize, value: String },

    #[error("unexpected end of file: element {element} needs {expected} values")]
    Truncated { element: String, expected: usize },
}

/// The active-set file: for each element a header `<symbol> <rows> <cols>`
/// followed by `rows * cols` lines of one value each, row-major.
///
/// Values are printed with the shortest representation that parses back to
/// the identical `f64`, so a save/load cycle reproduces the matrices exactly.
pub struct AsiFile;

impl AsiFile {
    pub fn save_to(asi: &ActiveSetInverse, writer: &mut impl Write) -> Result<(), AsiError> {
        for (element, matrix) in asi {
            writeln!(writer, "{} {} {}", element, matrix.nrows(), matrix.ncols())?;
            for i in 0..matrix.nrows() {
                for j in 0..matrix.ncols() {
                    writeln!(writer, "{}", matrix[(i, j)])?;
                }
            }
        }
        Ok(())
    }

    pub fn load_from(reader: &mut impl BufRead) -> Result<ActiveSetInverse, AsiError> {
        let mut asi = ActiveSetInverse::new();
        let mut lines = reader.lines().enumerate();

        while let Some((index, line)) = lines.next() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let tokens: Vec<&str> = line.split_whitespace().collect();
            let malformed = || AsiError::MalformedHeader {
                line: index + 1,
                content: line.clone(),
            };
            if tokens.len() != 3 {
                return Err(malformed());
            }
            let element = tokens[0].to_string();
            let rows: usize = tokens[1].parse().map_err(|_| malformed())?;
            let cols: usize = tokens[2].parse().map_err(|_| malformed())?;

            let expected = rows * cols;
            let mut values = Vec::with_capacity(expected);
            while values.len() < expected {
                let Some((value_index, value_line)) = lines.next() else {
                    return Err(AsiError::Truncated { element, expected });
                };
                let value_line = value_line?;
                let value = value_line
                    .trim()
                    .parse()
                    .map_err(|_| AsiError::InvalidValue {
                        line: value_index + 1,
                        value: value_line.trim().to_string(),
                    })?;
                values.push(value);
            }

            asi.insert(element, DMatrix::from_row_iterator(rows, cols, values));
        }

        Ok(asi)
    }

    pub fn save<P: AsRef<Path>>(asi: &ActiveSetInverse, path: P) -> Result<(), AsiError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::save_to(asi, &mut writer)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<ActiveSetInverse, AsiError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::load_from(&mut reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    fn round_trip(asi: &ActiveSetInverse) -> ActiveSetInverse {
        let mut buffer = Vec::new();
        AsiFile::save_to(asi, &mut buffer).unwrap();
        AsiFile::load_from(&mut BufReader::new(buffer.as_slice())).unwrap()
    }

    #[test]
    fn round_trip_is_exact_for_square_matrices() {
        let mut asi = ActiveSetInverse::new();
        asi.insert(
            "Te".to_string(),
            DMatrix::from_row_slice(2, 2, &[0.1, -2.5e-7, 3.0f64.sqrt(), 1e12]),
        );
        asi.insert(
            "Pb".to_string(),
            DMatrix::from_row_slice(3, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]),
        );

        assert_eq!(round_trip(&asi), asi);
    }

    #[test]
    fn round_trip_handles_one_by_one_and_rectangular() {
        let mut asi = ActiveSetInverse::new();
        asi.insert("H".to_string(), DMatrix::from_row_slice(1, 1, &[-0.125]));
        asi.insert(
            "O".to_string(),
            DMatrix::from_row_slice(2, 3, &[1.5, 2.5, 3.5, -1.5, -2.5, -3.5]),
        );

        let read = round_trip(&asi);
        assert_eq!(read, asi);
        assert_eq!(read["O"].nrows(), 2);
        assert_eq!(read["O"].ncols(), 3);
    }

    #[test]
    fn values_are_stored_row_major() {
        let mut asi = ActiveSetInverse::new();
        asi.insert(
            "Te".to_string(),
            DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]),
        );

        let mut buffer = Vec::new();
        AsiFile::save_to(&asi, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["Te 2 2", "1", "2", "3", "4"]);
    }

    #[test]
    fn malformed_header_is_rejected() {
        let err = AsiFile::load_from(&mut BufReader::new("Te 2\n".as_bytes())).unwrap_err();
        assert!(matches!(err, AsiError::MalformedHeader { line: 1, .. }));
    }

    #[test]
    fn truncated_body_is_rejected() {
        let err = AsiFile::load_from(&mut BufReader::new("Te 2 2\n1.0\n".as_bytes())).unwrap_err();
        assert!(matches!(
            err,
            AsiError::Truncated { expected: 4, .. }
        ));
    }
}
