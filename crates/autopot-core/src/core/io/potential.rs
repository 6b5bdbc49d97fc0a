use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PotentialError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("potential file is empty")]
    Empty,

    #[error("malformed potential header: '{header}'")]
    MalformedHeader { header: String },
}

/// Reads the chemical elements a fitted potential supports.
///
/// Only the first line of the file is interpreted: it is whitespace-split
/// and the tokens from position 2 up to (but excluding) the last one are the
/// element symbols. Everything after the first line is opaque to this crate
/// and is passed through to the external evaluation services unmodified.
pub fn read_elements<P: AsRef<Path>>(path: P) -> Result<Vec<String>, PotentialError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut first_line = String::new();
    if reader.read_line(&mut first_line)? == 0 {
        return Err(PotentialError::Empty);
    }
    parse_header(&first_line)
}

fn parse_header(header: &str) -> Result<Vec<String>, PotentialError> {
    let tokens: Vec<&str> = header.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(PotentialError::MalformedHeader {
            header: header.trim().to_string(),
        });
    }
    Ok(tokens[2..tokens.len() - 1]
        .iter()
        .map(|t| t.to_string())
        .collect())
}
