use crate::core::io::traits::StructureFile;
use crate::core::models::structure::Structure;
use nalgebra::{Matrix3, Point3, Vector3};
use std::io::{self, BufRead, Write};
use std::path::Path;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum XyzError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("parse error on line {line}: {kind}")]
    Parse { line: usize, kind: XyzParseErrorKind },

    #[error("structure {index} is missing energy or forces")]
    MissingLabels { index: usize },
}

#[derive(Debug, Error)]
pub enum XyzParseErrorKind {
    #[error("invalid atom count '{value}'")]
    InvalidAtomCount { value: String },

    #[error("invalid number '{value}' for {field}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("frame truncated: expected {expected} atom lines")]
    TruncatedFrame { expected: usize },

    #[error("atom line has too few columns")]
    ShortAtomLine,

    #[error("malformed {field} entry")]
    MalformedField { field: &'static str },
}

/// Extended-XYZ structure sequences.
///
/// The reader accepts the subset of the format produced by the labeling,
/// fitting and exploration tooling: a `Lattice` entry, a `Properties`
/// column layout containing at least `species` and `pos` (with optional
/// `forces`), and optional `energy`, `virial` and `pbc` entries on the
/// comment line. The primary writer emits the fully labeled form and
/// refuses structures without energy and forces; [`write_structures_to_path`]
/// implements the explicit geometry-only fallback.
pub struct XyzFile;

struct ColumnLayout {
    species: usize,
    position: usize,
    forces: Option<usize>,
    total: usize,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        // species:S:1:pos:R:3
        Self {
            species: 0,
            position: 1,
            forces: None,
            total: 4,
        }
    }
}

fn parse_error(line: usize, kind: XyzParseErrorKind) -> XyzError {
    XyzError::Parse { line, kind }
}

fn parse_float(token: &str, field: &'static str, line: usize) -> Result<f64, XyzError> {
    token.parse().map_err(|_| {
        parse_error(
            line,
            XyzParseErrorKind::InvalidNumber {
                field,
                value: token.to_string(),
            },
        )
    })
}

/// Splits an extended-XYZ comment line into `key=value` pairs, honoring
/// double quotes around values.
fn split_key_values(comment: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut rest = comment.trim();
    while !rest.is_empty() {
        let Some(eq) = rest.find('=') else { break };
        let key = rest[..eq].trim().to_string();
        rest = &rest[eq + 1..];
        let value;
        if let Some(stripped) = rest.strip_prefix('"') {
            match stripped.find('"') {
                Some(end) => {
                    value = stripped[..end].to_string();
                    rest = stripped[end + 1..].trim_start();
                }
                None => {
                    value = stripped.to_string();
                    rest = "";
                }
            }
        } else {
            match rest.find(char::is_whitespace) {
                Some(end) => {
                    value = rest[..end].to_string();
                    rest = rest[end..].trim_start();
                }
                None => {
                    value = rest.to_string();
                    rest = "";
                }
            }
        }
        pairs.push((key, value));
    }
    pairs
}

fn parse_matrix3(value: &str, field: &'static str, line: usize) -> Result<Matrix3<f64>, XyzError> {
    let values: Vec<f64> = value
        .split_whitespace()
        .map(|t| parse_float(t, field, line))
        .collect::<Result<_, _>>()?;
    if values.len() != 9 {
        return Err(parse_error(line, XyzParseErrorKind::MalformedField { field }));
    }
    Ok(Matrix3::from_row_slice(&values))
}

fn parse_pbc(value: &str, line: usize) -> Result<[bool; 3], XyzError> {
    let flags: Vec<bool> = value
        .split_whitespace()
        .map(|t| match t {
            "T" | "true" | "True" => Ok(true),
            "F" | "false" | "False" => Ok(false),
            _ => Err(parse_error(
                line,
                XyzParseErrorKind::MalformedField { field: "pbc" },
            )),
        })
        .collect::<Result<_, _>>()?;
    if flags.len() != 3 {
        return Err(parse_error(
            line,
            XyzParseErrorKind::MalformedField { field: "pbc" },
        ));
    }
    Ok([flags[0], flags[1], flags[2]])
}

fn parse_properties(value: &str, line: usize) -> Result<ColumnLayout, XyzError> {
    let tokens: Vec<&str> = value.split(':').collect();
    if tokens.len() % 3 != 0 || tokens.is_empty() {
        return Err(parse_error(
            line,
            XyzParseErrorKind::MalformedField {
                field: "Properties",
            },
        ));
    }

    let mut layout = ColumnLayout {
        species: usize::MAX,
        position: usize::MAX,
        forces: None,
        total: 0,
    };
    let mut column = 0;
    for triple in tokens.chunks(3) {
        let count: usize = triple[2].parse().map_err(|_| {
            parse_error(
                line,
                XyzParseErrorKind::MalformedField {
                    field: "Properties",
                },
            )
        })?;
        match triple[0] {
            "species" => layout.species = column,
            "pos" => layout.position = column,
            "forces" => layout.forces = Some(column),
            _ => {}
        }
        column += count;
    }
    layout.total = column;

    if layout.species == usize::MAX || layout.position == usize::MAX {
        return Err(parse_error(
            line,
            XyzParseErrorKind::MalformedField {
                field: "Properties",
            },
        ));
    }
    Ok(layout)
}

impl StructureFile for XyzFile {
    type Error = XyzError;

    fn read_from(reader: &mut impl BufRead) -> Result<Vec<Structure>, XyzError> {
        let lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;
        let mut structures = Vec::new();
        let mut cursor = 0;

        while cursor < lines.len() {
            if lines[cursor].trim().is_empty() {
                cursor += 1;
                continue;
            }

            let header_line = cursor + 1;
            let natoms: usize = lines[cursor].trim().parse().map_err(|_| {
                parse_error(
                    header_line,
                    XyzParseErrorKind::InvalidAtomCount {
                        value: lines[cursor].trim().to_string(),
                    },
                )
            })?;

            let comment_line = cursor + 2;
            if cursor + 1 >= lines.len() {
                return Err(parse_error(
                    comment_line,
                    XyzParseErrorKind::TruncatedFrame { expected: natoms },
                ));
            }

            let mut lattice = Matrix3::zeros();
            let mut pbc = [false; 3];
            let mut pbc_seen = false;
            let mut energy = None;
            let mut virial = None;
            let mut layout = ColumnLayout::default();
            for (key, value) in split_key_values(&lines[cursor + 1]) {
                if key.eq_ignore_ascii_case("lattice") {
                    lattice = parse_matrix3(&value, "Lattice", comment_line)?;
                    if !pbc_seen {
                        pbc = [true; 3];
                    }
                } else if key.eq_ignore_ascii_case("properties") {
                    layout = parse_properties(&value, comment_line)?;
                } else if key.eq_ignore_ascii_case("energy") {
                    energy = Some(parse_float(&value, "energy", comment_line)?);
                } else if key.eq_ignore_ascii_case("virial")
                    || key.eq_ignore_ascii_case("stress")
                {
                    virial = Some(parse_matrix3(&value, "virial", comment_line)?);
                } else if key.eq_ignore_ascii_case("pbc") {
                    pbc = parse_pbc(&value, comment_line)?;
                    pbc_seen = true;
                }
            }

            if cursor + 2 + natoms > lines.len() {
                return Err(parse_error(
                    comment_line,
                    XyzParseErrorKind::TruncatedFrame { expected: natoms },
                ));
            }

            let mut species = Vec::with_capacity(natoms);
            let mut positions = Vec::with_capacity(natoms);
            let mut forces = layout.forces.map(|_| Vec::with_capacity(natoms));
            for atom in 0..natoms {
                let line_no = cursor + 3 + atom;
                let tokens: Vec<&str> = lines[cursor + 2 + atom].split_whitespace().collect();
                if tokens.len() < layout.total {
                    return Err(parse_error(line_no, XyzParseErrorKind::ShortAtomLine));
                }
                species.push(tokens[layout.species].to_string());
                positions.push(Point3::new(
                    parse_float(tokens[layout.position], "position", line_no)?,
                    parse_float(tokens[layout.position + 1], "position", line_no)?,
                    parse_float(tokens[layout.position + 2], "position", line_no)?,
                ));
                if let (Some(col), Some(list)) = (layout.forces, forces.as_mut()) {
                    list.push(Vector3::new(
                        parse_float(tokens[col], "force", line_no)?,
                        parse_float(tokens[col + 1], "force", line_no)?,
                        parse_float(tokens[col + 2], "force", line_no)?,
                    ));
                }
            }

            structures.push(Structure {
                species,
                positions,
                lattice,
                pbc,
                energy,
                virial,
                forces,
            });
            cursor += 2 + natoms;
        }

        Ok(structures)
    }

    fn write_to(structures: &[Structure], writer: &mut impl Write) -> Result<(), XyzError> {
        if let Some(index) = structures.iter().position(|s| !s.is_labeled()) {
            return Err(XyzError::MissingLabels { index });
        }
        for structure in structures {
            write_frame(structure, writer, true)?;
        }
        Ok(())
    }
}

impl XyzFile {
    /// Writes the geometry-only form, dropping energies, virials and forces.
    pub fn write_geometry_to(
        structures: &[Structure],
        writer: &mut impl Write,
    ) -> Result<(), XyzError> {
        for structure in structures {
            write_frame(structure, writer, false)?;
        }
        Ok(())
    }
}

fn format_matrix3(m: &Matrix3<f64>) -> String {
    let mut out = String::new();
    for i in 0..3 {
        for j in 0..3 {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&m[(i, j)].to_string());
        }
    }
    out
}

fn write_frame(
    structure: &Structure,
    writer: &mut impl Write,
    labeled: bool,
) -> Result<(), XyzError> {
    writeln!(writer, "{}", structure.len())?;

    let pbc: Vec<&str> = structure
        .pbc
        .iter()
        .map(|&p| if p { "T" } else { "F" })
        .collect();
    let mut comment = format!("Lattice=\"{}\"", format_matrix3(&structure.lattice));
    if labeled {
        comment.push_str(" Properties=species:S:1:pos:R:3:forces:R:3");
        if let Some(energy) = structure.energy {
            comment.push_str(&format!(" energy={energy}"));
        }
        if let Some(virial) = &structure.virial {
            comment.push_str(&format!(" virial=\"{}\"", format_matrix3(virial)));
        }
    } else {
        comment.push_str(" Properties=species:S:1:pos:R:3");
    }
    comment.push_str(&format!(" pbc=\"{}\"", pbc.join(" ")));
    writeln!(writer, "{comment}")?;

    for (atom, (symbol, position)) in structure
        .species
        .iter()
        .zip(&structure.positions)
        .enumerate()
    {
        write!(writer, "{symbol} {} {} {}", position.x, position.y, position.z)?;
        if labeled {
            if let Some(forces) = &structure.forces {
                let f = forces[atom];
                write!(writer, " {} {} {}", f.x, f.y, f.z)?;
            }
        }
        writeln!(writer)?;
    }
    Ok(())
}

/// Writes a structure sequence, preferring the fully labeled form.
///
/// When any structure lacks labels the writer falls back to the
/// geometry-only form; every other error propagates unchanged.
pub fn write_structures_to_path<P: AsRef<Path>>(
    structures: &[Structure],
    path: P,
) -> Result<(), XyzError> {
    match XyzFile::write_to_path(structures, path.as_ref()) {
        Ok(()) => Ok(()),
        Err(XyzError::MissingLabels { index }) => {
            warn!(
                path = %path.as_ref().display(),
                index,
                "unlabeled structures present, writing geometry-only form"
            );
            let file = std::fs::File::create(path.as_ref())?;
            let mut writer = std::io::BufWriter::new(file);
            XyzFile::write_geometry_to(structures, &mut writer)
        }
        Err(other) => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufReader;

    fn labeled_structure() -> Structure {
        Structure {
            species: vec!["Te".into(), "Pb".into()],
            positions: vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.5, 0.25, 3.0)],
            lattice: Matrix3::from_row_slice(&[6.0, 0.0, 0.0, 0.0, 6.0, 0.0, 0.0, 0.0, 6.0]),
            pbc: [true, true, false],
            energy: Some(-12.375),
            virial: Some(Matrix3::identity() * 0.5),
            forces: Some(vec![
                Vector3::new(0.1, -0.2, 0.3),
                Vector3::new(-0.1, 0.2, -0.3),
            ]),
        }
    }

    fn round_trip(structures: &[Structure]) -> Vec<Structure> {
        let mut buffer = Vec::new();
        XyzFile::write_to(structures, &mut buffer).unwrap();
        XyzFile::read_from(&mut BufReader::new(buffer.as_slice())).unwrap()
    }

    #[test]
    fn labeled_round_trip_preserves_everything() {
        let original = vec![labeled_structure(), labeled_structure()];
        let read = round_trip(&original);

        assert_eq!(read.len(), 2);
        assert_eq!(read[0].species, original[0].species);
        assert_eq!(read[0].positions, original[0].positions);
        assert_eq!(read[0].lattice, original[0].lattice);
        assert_eq!(read[0].pbc, original[0].pbc);
        assert_eq!(read[0].energy, original[0].energy);
        assert_eq!(read[0].virial, original[0].virial);
        assert_eq!(read[0].forces, original[0].forces);
    }

    #[test]
    fn labeled_write_rejects_unlabeled_structures() {
        let unlabeled = Structure::new(
            vec!["Te".into()],
            vec![Point3::origin()],
            Matrix3::identity(),
        );
        let mut buffer = Vec::new();
        let err = XyzFile::write_to(&[unlabeled], &mut buffer).unwrap_err();
        assert!(matches!(err, XyzError::MissingLabels { index: 0 }));
    }

    #[test]
    fn fallback_write_emits_geometry_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xyz");
        let unlabeled = Structure::new(
            vec!["Te".into()],
            vec![Point3::new(0.5, 0.5, 0.5)],
            Matrix3::identity(),
        );

        write_structures_to_path(&[unlabeled], &path).unwrap();

        let read = XyzFile::read_from_path(&path).unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].energy, None);
        assert_eq!(read[0].forces, None);
        assert_eq!(read[0].positions[0], Point3::new(0.5, 0.5, 0.5));
    }

    #[test]
    fn reads_plain_xyz_without_properties() {
        let text = "2\n\nH 0.0 0.0 0.0\nO 1.0 0.0 0.0\n";
        let read = XyzFile::read_from(&mut BufReader::new(text.as_bytes())).unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].species, vec!["H".to_string(), "O".to_string()]);
        assert_eq!(read[0].pbc, [false; 3]);
        assert_eq!(read[0].forces, None);
    }

    #[test]
    fn truncated_frame_is_rejected() {
        let text = "3\ncomment\nH 0.0 0.0 0.0\n";
        let err = XyzFile::read_from(&mut BufReader::new(text.as_bytes())).unwrap_err();
        assert!(matches!(
            err,
            XyzError::Parse {
                kind: XyzParseErrorKind::TruncatedFrame { expected: 3 },
                ..
            }
        ));
    }

    #[test]
    fn invalid_atom_count_reports_line() {
        let text = "abc\ncomment\n";
        let err = XyzFile::read_from(&mut BufReader::new(text.as_bytes())).unwrap_err();
        assert!(matches!(err, XyzError::Parse { line: 1, .. }));
    }

    #[test]
    fn empty_input_yields_no_structures() {
        let read = XyzFile::read_from(&mut BufReader::new("".as_bytes())).unwrap();
        assert!(read.is_empty());
    }
}
