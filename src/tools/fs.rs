//! Filesystem-backed tool implementations

use std::io::{Error, ErrorKind};
use std::path::Path;

use super::ToolError;

/// List the entry names of `dir`, sorted
///
/// Any failure to read the directory, including a missing one, is an I/O
/// error. Names that are not valid UTF-8 are rejected rather than lossily
/// converted, so every listed name can be passed back to `read_file`.
pub async fn list_files(dir: &Path) -> Result<Vec<String>, ToolError> {
    let io_error = |source: Error| ToolError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_error)?;

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
        let name = entry.file_name().into_string().map_err(|raw| ToolError::Io {
            path: dir.join(&raw),
            source: Error::new(ErrorKind::InvalidData, "file name is not valid UTF-8"),
        })?;
        names.push(name);
    }
    names.sort();

    Ok(names)
}

/// Read `filename` (relative to `root`) as UTF-8 text
///
/// Non-UTF-8 content surfaces as an I/O error instead of being transcoded.
pub async fn read_file(root: &Path, filename: &str) -> Result<String, ToolError> {
    let path = root.join(filename);
    tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| ToolError::from_io(&path, e))
}
