use super::error::{EngineError, io_err};
use std::fs::File;
use std::path::Path;

/// Name of the sentinel file marking a completed stage or task directory.
/// Its mere existence is the completion signal; content is ignored.
pub const MARKER: &str = "DONE";

pub fn is_done(dir: &Path) -> bool {
    dir.join(MARKER).is_file()
}

/// Writes the (empty) completion marker into `dir`.
pub fn mark_done(dir: &Path) -> Result<(), EngineError> {
    let path = dir.join(MARKER);
    File::create(&path).map_err(|e| io_err(&path, e))?;
    Ok(())
}
